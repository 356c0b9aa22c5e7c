//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "corrector", version, about = "Step-triggered correction client")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/corrector.toml")]
    pub config: PathBuf,

    /// Optional node binding CSV (strict header: node_id,name)
    #[arg(long, value_name = "FILE")]
    pub binding: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect, subscribe, and write corrections until the stream ends or Ctrl-C
    Run {
        /// Override sim.cycles (0 runs until interrupted)
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// Log every data-change notification at debug level
        #[arg(long, action = ArgAction::SetTrue)]
        trace_notifications: bool,
    },
    /// Parse and validate the config (and binding, if given)
    CheckConfig,
    /// Health check for operational monitoring
    Health,
}
