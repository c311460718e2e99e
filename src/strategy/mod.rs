//! Processing strategies
//!
//! A strategy is a complete pipeline: read commands from a CSV file, apply
//! them to a fresh [`LedgerEngine`], and write the final account states.
//! Strategies are selected at runtime; every strategy produces the same
//! output for the same input.

use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::cli::{ClockType, StrategyType};
use crate::core::{LedgerContext, LedgerEngine, ManualClock, SequentialIdGenerator, SystemClock};
use crate::store::MemoryStore;
use crate::types::{Actor, LedgerError};

pub mod r#async;
pub mod batch_processor;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use batch_processor::{BatchProcessor, ProcessingResult, Segment};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete pipelines
pub trait ProcessingStrategy: Send + Sync {
    /// Apply every command in `input_path` and write account states to `output`
    ///
    /// Rejected commands and malformed rows are logged and skipped.
    ///
    /// # Errors
    ///
    /// Only fatal conditions: the input cannot be opened, or output cannot
    /// be written.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LedgerError>;
}

/// How strategies build their engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub clock: ClockType,
    /// Start of a manual clock; the Unix epoch when unset
    pub start_time: Option<DateTime<Utc>>,
}

impl EngineOptions {
    pub fn manual(start_time: DateTime<Utc>) -> Self {
        Self {
            clock: ClockType::Manual,
            start_time: Some(start_time),
        }
    }

    /// Fresh in-memory engine with sequential IDs
    ///
    /// Sequential IDs make `lock-1`, `alloc-1` and `tx-1` predictable, so
    /// input files can refer to objects created earlier in the same file.
    pub fn build_engine(&self) -> LedgerEngine {
        let ctx = LedgerContext::new(Arc::new(MemoryStore::new()))
            .with_id_generator(Arc::new(SequentialIdGenerator::new()));

        let ctx = match self.clock {
            ClockType::System => {
                if self.start_time.is_some() {
                    warn!("start time is ignored with the system clock");
                }
                ctx.with_clock(Arc::new(SystemClock))
            }
            ClockType::Manual => {
                let start = self.start_time.unwrap_or(DateTime::UNIX_EPOCH);
                ctx.with_clock(Arc::new(ManualClock::new(start)))
            }
        };

        LedgerEngine::new(ctx, Actor::operator("cli"))
    }
}

/// Running tally of what happened to the input rows
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingSummary {
    pub applied: usize,
    pub rejected: usize,
    pub malformed: usize,
}

/// Create a processing strategy
///
/// `config` only affects the async strategy; `None` uses its defaults.
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
    options: EngineOptions,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(options)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(config, options))
        }
    }
}
