//! Asynchronous batch processing strategy
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (barriers + account groups on blocking workers)
//!     └── LedgerEngine (shared by every worker)
//! ```
//!
//! Batches are processed one after another so a batch never overtakes the
//! one before it. Inside a batch, commands on disjoint accounts run in
//! parallel; see [`BatchProcessor`] for the partitioning rules.

use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_accounts_csv;
use crate::io::sync_reader::open_error;
use crate::strategy::{BatchProcessor, EngineOptions, ProcessingStrategy, ProcessingSummary};
use crate::types::LedgerError;

/// Configuration for batch processing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Maximum number of account groups processing concurrently
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
    options: EngineOptions,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig, options: EngineOptions) -> Self {
        Self { config, options }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LedgerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| LedgerError::IoError {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let engine = self.options.build_engine();
            let processor =
                BatchProcessor::new(engine.clone(), self.config.max_concurrent_batches);

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| open_error(input_path, e))?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);
            let mut summary = ProcessingSummary::default();

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                for outcome in processor.process_batch(batch).await {
                    match outcome.result {
                        Ok(()) => summary.applied += 1,
                        Err(e) => {
                            summary.rejected += 1;
                            warn!(
                                op = outcome.command.op(),
                                kind = %e.kind(),
                                error = %e,
                                "command rejected"
                            );
                        }
                    }
                }
            }

            write_accounts_csv(&engine.accounts(), output)?;

            info!(
                applied = summary.applied,
                rejected = summary.rejected,
                "processing complete"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    fn create_temp_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(file, "op,account,counterparty,amount,reference\n{}", rows).unwrap();
        file.flush().unwrap();
        file
    }

    #[rstest]
    #[case::zero_batch_size(0, 4, 1000, 4)]
    #[case::zero_max_concurrent(10, 0, 10, num_cpus::get())]
    #[case::custom(10, 4, 10, 4)]
    fn test_batch_config_new(
        #[case] batch_size: usize,
        #[case] max_concurrent: usize,
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = BatchConfig::new(batch_size, max_concurrent);
        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[test]
    fn test_async_strategy_handles_missing_file() {
        let strategy = AsyncProcessingStrategy::new(BatchConfig::default(), EngineOptions::default());
        let mut output = Vec::new();

        let err = strategy
            .process(Path::new("nonexistent.csv"), &mut output)
            .unwrap_err();
        assert!(matches!(err, LedgerError::FileNotFound { .. }));
    }

    #[test]
    fn test_async_strategy_maintains_ordering_across_batches() {
        let file = create_temp_csv(
            "create,A,,,\ncreate,B,,,\n\
             deposit,A,,100,\ndeposit,B,,50,\n\
             withdraw,A,,30,\ndeposit,B,,25,\n\
             withdraw,A,,20,\ntransfer,B,A,75,\n\
             withdraw,A,,125,\n",
        );

        let strategy = AsyncProcessingStrategy::new(BatchConfig::new(2, 4), EngineOptions::default());
        let mut output = Vec::new();
        strategy.process(file.path(), &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("A,0.0000,"), "got: {}", output);
        assert!(output.contains("B,0.0000,"), "got: {}", output);
    }
}
