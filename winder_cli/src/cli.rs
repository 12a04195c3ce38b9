//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "winder", version, about = "Winder estimation CLI")]
pub struct Cli {
    /// Path to config TOML (typed); built-in defaults are used when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a recorded process trace through the estimators
    Replay {
        /// Trace CSV (strict header)
        #[arg(long, value_name = "FILE")]
        trace: PathBuf,
        /// Print only the final estimates instead of one record per cycle
        #[arg(long, action = ArgAction::SetTrue)]
        summary: bool,
        /// Print every Nth cycle (1 = every cycle)
        #[arg(long, value_name = "N", default_value_t = 1)]
        every: usize,
        /// Attach the friction observer from [friction] to the tension observer
        #[arg(long, action = ArgAction::SetTrue)]
        friction: bool,
    },
    /// Validate the config and print the effective values
    CheckConfig,
}
