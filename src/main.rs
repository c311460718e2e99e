//! Ledger engine CLI
//!
//! Replays ledger operations from a CSV file and prints the final account
//! states to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- ops.csv > accounts.csv
//! cargo run -- --strategy sync ops.csv > accounts.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 ops.csv > accounts.csv
//! cargo run -- --clock manual --start-time 2024-01-01T00:00:00Z ops.csv
//! RUST_LOG=rust_ledger_engine=debug cargo run -- --log-json ops.csv
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success (rejected commands are logged, not fatal)
//! - 1: Error (file not found, file not readable, output not writable)

use rust_ledger_engine::{cli, logging, strategy};
use std::process;

fn main() {
    let args = cli::parse_args();

    if let Err(e) = logging::init_logging(&args.log_level, args.log_format()) {
        eprintln!("Error: failed to initialize logging: {}", e);
        process::exit(1);
    }

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy, config, args.to_engine_options())
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        tracing::error!(error = %e, "processing failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
