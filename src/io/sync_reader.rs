//! Synchronous CSV reader with iterator interface
//!
//! Streams [`LedgerCommand`]s from a CSV file one row at a time. Consecutive
//! `batch` rows that share a reference are yielded as a single command, so
//! the reader keeps one row of lookahead. If any row of such a group is bad,
//! the whole group is yielded as one error.
//!
//! ```no_run
//! use rust_ledger_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("ops.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(command) => println!("{:?}", command),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - A missing file is reported by `new()` as `FileNotFound`
//! - Bad rows are yielded as `ParseError` carrying the 1-based line number
//!   (the header is line 1); iteration continues after them

use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

use crate::io::batch_rows::{BatchGroup, ParsedRow};
use crate::io::csv_format::CsvRecord;
use crate::types::{LedgerCommand, LedgerError};

type Row = Result<LedgerCommand, LedgerError>;

pub(crate) fn open_error(path: &Path, error: std::io::Error) -> LedgerError {
    match error.kind() {
        std::io::ErrorKind::NotFound => LedgerError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => LedgerError::IoError {
            message: format!("Failed to open file '{}': {}", path.display(), error),
        },
    }
}

#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: u64,
    pending: Option<ParsedRow>,
}

impl SyncReader {
    /// Open a CSV file for streaming
    ///
    /// Fields are trimmed and rows may omit trailing columns.
    ///
    /// # Errors
    ///
    /// `FileNotFound` if the path does not exist, `IoError` for anything
    /// else that stops the file from opening
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let file = File::open(path).map_err(|e| open_error(path, e))?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 1,
            pending: None,
        })
    }

    fn read_row(&mut self) -> Option<ParsedRow> {
        let mut deserializer = self.reader.deserialize::<CsvRecord>();
        let row = deserializer.next()?;
        self.line_num += 1;

        Some(ParsedRow::new(row.map_err(LedgerError::from), self.line_num))
    }
}

impl Iterator for SyncReader {
    type Item = Row;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.pending.take() {
            Some(row) => row,
            None => self.read_row()?,
        };

        let mut group = match BatchGroup::start(row) {
            Ok(group) => group,
            Err(row) => return Some(row.result),
        };
        while let Some(row) = self.read_row() {
            if let Some(other) = group.push(row) {
                self.pending = Some(other);
                break;
            }
        }

        Some(group.finish())
    }
}
