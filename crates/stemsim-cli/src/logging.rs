use crate::error::{CliError, Result};
use std::fs::File;
use std::path::Path;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{
        self,
        format::{DefaultFields, Format},
    },
    prelude::*,
};

pub fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::OFF
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

/// Plain-text layer for `--log-file`, tagging each event with its thread.
fn file_layer<S>(file: File) -> fmt::Layer<S, DefaultFields, Format, File> {
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_target(true)
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let file = log_file
        .map(|path| File::create(path).map_err(CliError::Io))
        .transpose()?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(level_for(verbosity, quiet))
        .with(stderr_layer)
        .with(file.map(file_layer))
        .try_init()
        .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to install logger: {e}")))
}
