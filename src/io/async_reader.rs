//! Asynchronous CSV reader with batch interface
//!
//! Reads [`LedgerCommand`]s in batches for the async strategy.
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of LedgerCommands
//!                  ↓
//!           csv_format module
//!           (CsvRecord, convert_csv_record)
//! ```
//!
//! Bad rows are logged and skipped. `batch` rows sharing a reference are
//! coalesced into one command even when they straddle a read boundary: the
//! reader keeps one row of lookahead between calls. A bad row inside such a
//! group drops the whole group, as the sync reader does.

use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

use crate::io::batch_rows::{BatchGroup, ParsedRow};
use crate::io::csv_format::CsvRecord;
use crate::types::{LedgerCommand, LedgerError};

pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: u64,
    pending: Option<ParsedRow>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 1,
            pending: None,
        }
    }

    async fn next_row(&mut self) -> Option<ParsedRow> {
        let row = self.csv_reader.deserialize::<CsvRecord>().next().await?;
        self.line_num += 1;

        Some(ParsedRow::new(row.map_err(LedgerError::from), self.line_num))
    }

    /// Next valid command, skipping bad rows; `None` at end of input
    async fn next_command(&mut self) -> Option<LedgerCommand> {
        loop {
            let row = match self.pending.take() {
                Some(row) => row,
                None => self.next_row().await?,
            };

            let result = match BatchGroup::start(row) {
                Ok(mut group) => {
                    while let Some(row) = self.next_row().await {
                        if let Some(other) = group.push(row) {
                            self.pending = Some(other);
                            break;
                        }
                    }
                    group.finish()
                }
                Err(row) => row.result,
            };

            match result {
                Ok(command) => return Some(command),
                Err(error) => warn!(error = %error, "skipping malformed row"),
            }
        }
    }

    /// Read up to `batch_size` commands
    ///
    /// A batch command counts once no matter how many rows it spans.
    /// Returns an empty vector once the input is exhausted.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<LedgerCommand> {
        let batch_size = batch_size.max(1);
        let mut batch: Vec<LedgerCommand> = Vec::with_capacity(batch_size);

        while batch.len() < batch_size {
            match self.next_command().await {
                Some(command) => batch.push(command),
                None => break,
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;
    use rust_decimal::Decimal;

    fn reader(rows: &str) -> AsyncReader<Cursor<Vec<u8>>> {
        let content = format!("op,account,counterparty,amount,reference\n{}", rows);
        AsyncReader::new(Cursor::new(content.into_bytes()))
    }

    fn deposit(account: &str, amount: i64) -> LedgerCommand {
        LedgerCommand::Deposit {
            account: account.into(),
            amount: Decimal::new(amount, 0),
        }
    }

    #[tokio::test]
    async fn test_async_reader_read_batch() {
        let mut async_reader = reader("deposit,A,,1,\ndeposit,B,,2,\ndeposit,C,,3,\n");

        let batch = async_reader.read_batch(2).await;
        assert_eq!(batch, vec![deposit("A", 1), deposit("B", 2)]);

        let batch = async_reader.read_batch(2).await;
        assert_eq!(batch, vec![deposit("C", 3)]);

        assert!(async_reader.read_batch(2).await.is_empty());
    }

    #[tokio::test]
    async fn test_async_reader_empty_csv() {
        let mut async_reader = reader("");
        assert!(async_reader.read_batch(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_async_reader_skips_invalid_rows() {
        let mut async_reader = reader("teleport,A,,1,\ndeposit,A,,x,\ndeposit,A,,2,\n");

        let batch = async_reader.read_batch(10).await;
        assert_eq!(batch, vec![deposit("A", 2)]);
    }

    #[tokio::test]
    async fn test_async_reader_coalesces_across_read_boundary() {
        let mut async_reader =
            reader("deposit,A,,1,\nbatch,A,B,1,b1\nbatch,B,C,1,b1\nbatch,C,A,1,b1\ndeposit,B,,2,\n");

        let first = async_reader.read_batch(2).await;
        assert_eq!(first.len(), 2);
        assert!(matches!(&first[1], LedgerCommand::Batch { transfers, .. } if transfers.len() == 3));

        let second = async_reader.read_batch(2).await;
        assert_eq!(second, vec![deposit("B", 2)]);
    }

    #[tokio::test]
    async fn test_async_reader_bad_leg_drops_whole_batch() {
        let mut async_reader = reader(
            "batch,A,B,30,b1\nbatch,A,C,notanumber,b1\nbatch,A,C,9999,b1\ndeposit,A,,1,\n",
        );

        let batch = async_reader.read_batch(10).await;
        assert_eq!(batch, vec![deposit("A", 1)]);
    }

    #[tokio::test]
    async fn test_async_reader_case_insensitive_op() {
        let mut async_reader = reader("DEPOSIT,A,,1,\nDeposit,B,,2,\n");
        assert_eq!(async_reader.read_batch(10).await.len(), 2);
    }
}
