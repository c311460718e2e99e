//! Synchronous processing strategy
//!
//! Single-threaded pipeline. The strategy only orchestrates:
//! - CSV parsing is done by `SyncReader` (iterator interface)
//! - Commands are applied by `LedgerEngine`
//! - Output is written by `csv_format::write_accounts_csv`
//!
//! Commands are applied strictly in file order, one row in memory at a time.

use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::io::csv_format::write_accounts_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{EngineOptions, ProcessingStrategy, ProcessingSummary};
use crate::types::LedgerError;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncProcessingStrategy {
    options: EngineOptions,
}

impl SyncProcessingStrategy {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LedgerError> {
        let engine = self.options.build_engine();
        let reader = SyncReader::new(input_path)?;
        let mut summary = ProcessingSummary::default();

        for result in reader {
            match result {
                Ok(command) => match engine.process(&command) {
                    Ok(()) => summary.applied += 1,
                    Err(e) => {
                        summary.rejected += 1;
                        warn!(op = command.op(), kind = %e.kind(), error = %e, "command rejected");
                    }
                },
                Err(e) => {
                    summary.malformed += 1;
                    warn!(error = %e, "skipping malformed row");
                }
            }
        }

        write_accounts_csv(&engine.accounts(), output)?;

        info!(
            applied = summary.applied,
            rejected = summary.rejected,
            malformed = summary.malformed,
            "processing complete"
        );
        Ok(())
    }
}
