use crate::error::{CliError, Result};
use ndarray::Array2;
use stemsim::core::spectral::log_scaled;
use stemsim::workflows::simulate::SimulationOutput;
use std::path::{Path, PathBuf};
use tracing::info;

/// Relative floor for log-scaled patterns.
const LOG_FLOOR: f64 = 1e-8;

/// Writes one grid row per CSV record.
pub fn write_matrix(path: &Path, values: &Array2<f64>) -> Result<()> {
    let wrap = |source: csv::Error| CliError::Output {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(wrap)?;
    for row in values.rows() {
        writer
            .write_record(row.iter().map(|v| format!("{v:e}")))
            .map_err(wrap)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes every output of a run into `dir` and returns the written paths.
pub fn write_outputs(
    dir: &Path,
    output: &SimulationOutput,
    log_scale: bool,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let pattern = if log_scale {
        log_scaled(&output.pattern, LOG_FLOOR)
    } else {
        output.pattern.clone()
    };
    let files = [
        ("probe_reciprocal.csv", &output.probe_intensity.reciprocal),
        ("probe_real.csv", &output.probe_intensity.real),
        ("specimen_phase.csv", &output.specimen_phase),
        ("diffraction.csv", &pattern),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, values) in files {
        let path = dir.join(name);
        write_matrix(&path, values)?;
        info!("Wrote {:?}", &path);
        written.push(path);
    }
    Ok(written)
}
