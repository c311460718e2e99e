//! Grouping of `batch` rows shared by both readers
//!
//! Consecutive rows with op `batch` and the same reference form one
//! all-or-nothing command. A group is decided by its raw reference column,
//! before conversion, so a leg that fails to parse still belongs to its
//! group and rejects every other leg of it.
//!
//! ```text
//! batch,A,B,30,b1      ┐
//! batch,A,C,oops,b1    ├─ one error for b1, nothing applied
//! batch,A,C,5,b1       ┘
//! deposit,A,,1,        ── next command
//! ```

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::{LedgerCommand, LedgerError};

/// Attach a line number to a row conversion error
pub(crate) fn at_line(error: LedgerError, line: u64) -> LedgerError {
    LedgerError::ParseError {
        line: Some(line),
        message: message_of(error),
    }
}

fn message_of(error: LedgerError) -> String {
    match error {
        LedgerError::ParseError { message, .. } => message,
        other => other.to_string(),
    }
}

fn batch_reference(record: &CsvRecord) -> Option<String> {
    if !record.op.trim().eq_ignore_ascii_case("batch") {
        return None;
    }
    record
        .reference
        .as_deref()
        .map(str::trim)
        .filter(|reference| !reference.is_empty())
        .map(str::to_string)
}

/// One input row after conversion
#[derive(Debug)]
pub(crate) struct ParsedRow {
    pub line: u64,
    /// Reference of a `batch` row, known even when conversion failed
    pub batch: Option<String>,
    pub result: Result<LedgerCommand, LedgerError>,
}

impl ParsedRow {
    /// Convert a deserialized row; deserialization errors pass through as-is
    pub fn new(record: Result<CsvRecord, LedgerError>, line: u64) -> Self {
        match record {
            Ok(record) => Self {
                line,
                batch: batch_reference(&record),
                result: convert_csv_record(record).map_err(|e| at_line(e, line)),
            },
            Err(e) => Self {
                line,
                batch: None,
                result: Err(e),
            },
        }
    }
}

/// Rows of one batch reference, gathered until a row with another reference
#[derive(Debug)]
pub(crate) struct BatchGroup {
    reference: String,
    legs: Result<LedgerCommand, LedgerError>,
}

impl BatchGroup {
    /// Open a group on a `batch` row; any other row is handed back
    pub fn start(row: ParsedRow) -> Result<Self, ParsedRow> {
        let Some(reference) = row.batch.clone() else {
            return Err(row);
        };
        let legs = row
            .result
            .map_err(|e| Self::rejected(&reference, row.line, e));
        Ok(Self { reference, legs })
    }

    /// Take the row if it belongs to this batch; hands it back otherwise
    pub fn push(&mut self, row: ParsedRow) -> Option<ParsedRow> {
        if row.batch.as_deref() != Some(self.reference.as_str()) {
            return Some(row);
        }

        let line = row.line;
        let failure = match (&mut self.legs, row.result) {
            (Ok(command), Ok(next)) => command.absorb_batch_leg(next).map(|stray| {
                LedgerError::ParseError {
                    line: None,
                    message: format!("unexpected {} row", stray.op()),
                }
            }),
            (Ok(_), Err(e)) => Some(e),
            // Already rejected; the first failure is the one reported
            (Err(_), _) => None,
        };
        if let Some(e) = failure {
            self.legs = Err(Self::rejected(&self.reference, line, e));
        }
        None
    }

    pub fn finish(self) -> Result<LedgerCommand, LedgerError> {
        self.legs
    }

    fn rejected(reference: &str, line: u64, error: LedgerError) -> LedgerError {
        LedgerError::ParseError {
            line: Some(line),
            message: format!("batch '{}' rejected: {}", reference, message_of(error)),
        }
    }
}
