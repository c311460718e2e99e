// CLI module
// Command-line interface and argument parsing

mod args;

pub use args::{CliArgs, ClockType, StrategyType};

use clap::Parser;

/// Parse command-line arguments
///
/// Exits the process with a usage message on invalid input.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
