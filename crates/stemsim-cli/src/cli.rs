use crate::utils::parser::parse_position;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The stemsim developers",
    version,
    about = "stemsim - simulate STEM probes and diffraction patterns of a crystalline specimen.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the whole pipeline once and write every output as CSV.
    Simulate(SimulateArgs),
    /// Edit parameters from stdin and watch the outputs refresh.
    Interactive(InteractiveArgs),
}

/// Parameter overrides shared by every subcommand. Each one takes precedence
/// over the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ParameterOverrides {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Accelerating voltage in kV.
    #[arg(long, value_name = "KV")]
    pub voltage: Option<f64>,

    /// Largest collection angle on the grid, in mrad.
    #[arg(long, value_name = "MRAD")]
    pub max_angle: Option<f64>,

    /// Probe-forming aperture half-angle, in mrad.
    #[arg(short, long, value_name = "MRAD")]
    pub aperture: Option<f64>,

    /// Edge length of the square simulation grid, in pixels.
    #[arg(short, long, value_name = "N")]
    pub grid: Option<usize>,

    /// Probe position in Å, as `X,Y`.
    #[arg(long, value_name = "X,Y", value_parser = parse_position, allow_hyphen_values = true)]
    pub scan: Option<[f64; 2]>,
}

/// Arguments for the `simulate` subcommand.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub parameters: ParameterOverrides,

    /// Directory the CSV outputs are written to. Created if missing.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Write the diffraction pattern as log10 intensity.
    #[arg(long)]
    pub log_scale: bool,
}

/// Arguments for the `interactive` subcommand.
#[derive(Args, Debug)]
pub struct InteractiveArgs {
    #[command(flatten)]
    pub parameters: ParameterOverrides,

    /// Quiet period before a background stage recomputes, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 50)]
    pub debounce_ms: u64,
}
