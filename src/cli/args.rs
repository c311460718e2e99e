//! Command-line argument parsing using clap

use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::logging::LogFormat;
use crate::strategy::{BatchConfig, EngineOptions};

#[derive(Parser, Debug)]
#[command(name = "ledger-engine")]
#[command(
    about = "Replay ledger operations from CSV and print the resulting account states",
    long_about = None
)]
pub struct CliArgs {
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for sequential or 'async' for parallel batches"
    )]
    pub strategy: StrategyType,

    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of account groups processed concurrently (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    #[arg(
        long = "clock",
        value_name = "CLOCK",
        default_value = "system",
        help = "Time source: 'system' for wall-clock time or 'manual' to move only on 'advance' rows"
    )]
    pub clock: ClockType,

    #[arg(
        long = "start-time",
        value_name = "RFC3339",
        help = "Start time of the manual clock (default: 1970-01-01T00:00:00Z)"
    )]
    pub start_time: Option<DateTime<Utc>>,

    #[arg(
        long = "log-level",
        value_name = "FILTER",
        default_value = "warn",
        help = "Log filter used when RUST_LOG is unset"
    )]
    pub log_level: String,

    #[arg(long = "log-json", help = "Write logs to stderr as JSON lines")]
    pub log_json: bool,
}

/// Processing strategy type
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

/// Time source for the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, ValueEnum)]
pub enum ClockType {
    #[default]
    System,
    Manual,
}

impl CliArgs {
    /// Convert CLI arguments to BatchConfig
    ///
    /// Zero values fall back to the defaults with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    pub fn to_engine_options(&self) -> EngineOptions {
        EngineOptions {
            clock: self.clock,
            start_time: self.start_time,
        }
    }

    pub fn log_format(&self) -> LogFormat {
        if self.log_json {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}
