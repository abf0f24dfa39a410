use crate::core::atoms::cell::UnitCell;
use crate::core::atoms::lattice::object_phase;
use crate::core::electron::Electron;
use crate::core::grid::{ReciprocalGrid, sampling_for_max_angle};
use crate::core::optics::diffraction::diffraction_pattern;
use crate::core::optics::probe::{FormedProbe, ProbeIntensity, form_probe};
use crate::core::spectral::fftshift;
use crate::engine::config::SimulationParameters;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use ndarray::Array2;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub electron: Electron,
    /// Real-space pixel size (Å).
    pub sampling: f64,
    pub grid: ReciprocalGrid,
    pub probe: FormedProbe,
    pub probe_intensity: ProbeIntensity,
    /// Specimen phase (rad), centred for display.
    pub specimen_phase: Array2<f64>,
    /// Diffraction intensity at the scan position, centred.
    pub pattern: Array2<f64>,
}

#[instrument(skip_all, name = "simulation_workflow")]
pub fn run(
    params: &SimulationParameters,
    cell: &UnitCell,
    reporter: &ProgressReporter,
) -> Result<SimulationOutput, EngineError> {
    params.validate()?;

    let (electron, sampling, grid) = reporter.phase("Sampling", || {
        let electron = Electron::from_kilovolts(params.voltage_kv)?;
        let sampling = sampling_for_max_angle(electron.wavelength, params.max_angle_mrad)?;
        let [ny, nx] = params.grid_shape;
        let grid = ReciprocalGrid::new([sampling * ny as f64, sampling * nx as f64], [ny, nx])?;
        info!(
            wavelength = electron.wavelength,
            sampling,
            extent = ?grid.extent(),
            "Sampling resolved."
        );
        reporter.report(Progress::Message(format!(
            "λ = {:.5} Å, pixel = {:.4} Å",
            electron.wavelength, sampling
        )));
        Ok::<_, EngineError>((electron, sampling, grid))
    })?;

    let probe = reporter.phase("Probe", || {
        form_probe(
            &grid,
            electron.wavelength,
            params.aperture_mrad,
            &params.aberrations,
        )
    })?;

    let phase = reporter.phase("Specimen", || object_phase(&grid, &electron, cell))?;

    let pattern = reporter.phase("Diffraction", || {
        diffraction_pattern(&grid, &probe, &phase, params.scan_position)
    })?;

    info!("Simulation complete.");
    Ok(SimulationOutput {
        electron,
        sampling,
        probe_intensity: probe.intensity(),
        specimen_phase: fftshift(&phase),
        grid,
        probe,
        pattern,
    })
}
