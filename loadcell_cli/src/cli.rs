//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "loadcell", version, about = "Load-cell weighing gateway")]
pub struct Cli {
    /// Path to config TOML; built-in defaults (plus env overrides) when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report errors as JSON lines instead of pretty text
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
    /// Drive the gateway from a recorded scenario and print fan-out events
    Replay {
        /// Scenario file, one JSON step per line
        #[arg(value_name = "SCENARIO")]
        scenario: PathBuf,
        /// Order API fixtures: JSON object keyed by MO number
        #[arg(long, value_name = "FILE")]
        orders: Option<PathBuf>,
        /// Honour `delay` steps in real time instead of only advancing the clock
        #[arg(long, action = ArgAction::SetTrue)]
        paced: bool,
    },
    /// Answer an HTTP facade route, optionally after replaying a scenario
    Query {
        /// Route with optional query string, e.g. /api/weight/history?limit=5
        #[arg(value_name = "ROUTE")]
        route: String,
        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,
        /// JSON request body (for POST routes)
        #[arg(long, value_name = "JSON")]
        body: Option<String>,
        /// Scenario to replay before answering
        #[arg(long, value_name = "FILE")]
        scenario: Option<PathBuf>,
        /// Order API fixtures used while replaying
        #[arg(long, value_name = "FILE")]
        orders: Option<PathBuf>,
    },
    /// Load and validate the configuration, then print the effective values
    CheckConfig,
    /// Health check for operational monitoring
    Health,
}
