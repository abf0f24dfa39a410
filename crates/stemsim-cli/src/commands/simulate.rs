use crate::cli::SimulateArgs;
use crate::config::build_parameters;
use crate::error::{CliError, Result};
use crate::output::write_outputs;
use crate::utils::progress::CliProgressHandler;
use stemsim::{core::atoms::cell::UnitCell, engine::progress::ProgressReporter, workflows};
use tracing::info;

pub async fn run(args: SimulateArgs) -> Result<()> {
    info!("Resolving parameters from the command line and config file...");
    let params = build_parameters(&args.parameters)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Simulating {}×{} grid at {} kV...",
        params.grid_shape[0], params.grid_shape[1], params.voltage_kv
    );
    info!("Invoking the core simulation workflow...");

    let output = tokio::task::spawn_blocking(move || {
        workflows::simulate::run(&params, &UnitCell::mos2(), &reporter)
    })
    .await
    .map_err(|e| CliError::Other(anyhow::anyhow!("Simulation task failed: {}", e)))??;

    let written = write_outputs(&args.output, &output, args.log_scale)?;
    println!(
        "Workflow complete. Wrote {} file(s) to {}",
        written.len(),
        args.output.display()
    );
    Ok(())
}
