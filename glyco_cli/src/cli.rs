//! CLI argument definitions.

use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "glyco", version, about = "Glucose forecasting CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/glyco.toml")]
    pub config: PathBuf,

    /// Optional basal schedule CSV (strict `start,value` header); replaces schedules.basal
    #[arg(long = "basal-csv", value_name = "FILE")]
    pub basal_csv: Option<PathBuf>,

    /// Print results and errors as JSON instead of text
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
    /// Forecast glucose from a history file
    Forecast {
        /// History JSON: { glucose, doses, carbs }
        #[arg(long, value_name = "FILE")]
        history: PathBuf,
        /// Forecast as of this instant (RFC 3339); defaults to the system clock
        #[arg(long, value_name = "RFC3339")]
        now: Option<DateTime<Utc>>,
    },
    /// Run the engine directly on a recorded fixture
    Replay {
        /// Fixture JSON written by `glyco fixture`
        #[arg(long, value_name = "FILE")]
        fixture: PathBuf,
        /// Forecast as of this instant; defaults to the latest glucose sample
        #[arg(long, value_name = "RFC3339")]
        now: Option<DateTime<Utc>>,
    },
    /// Gather a history into a self-contained fixture
    Fixture {
        #[arg(long, value_name = "FILE")]
        history: PathBuf,
        #[arg(long, value_name = "RFC3339")]
        now: Option<DateTime<Utc>>,
        /// Output path (replaced atomically)
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Insulin on board and net insulin effect over a window
    Timeline {
        #[arg(long, value_name = "FILE")]
        history: PathBuf,
        #[arg(long, value_name = "RFC3339")]
        start: DateTime<Utc>,
        #[arg(long, value_name = "RFC3339")]
        end: DateTime<Utc>,
        #[arg(long, value_name = "MIN", default_value_t = 30)]
        stride_minutes: u32,
    },
    /// Forecast at `now` and score it against the samples recorded afterwards
    Evaluate {
        #[arg(long, value_name = "FILE")]
        history: PathBuf,
        #[arg(long, value_name = "RFC3339")]
        now: DateTime<Utc>,
    },
    /// Load and validate the configuration
    SelfCheck,
}
