//! CSV format handling for ledger commands and account output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to [`LedgerCommand`]s
//! - Account output serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! # Input columns
//!
//! `op,account,counterparty,amount,reference`. Which columns an operation
//! reads:
//!
//! | op | account | counterparty | amount | reference |
//! |----|---------|--------------|--------|-----------|
//! | create, delete, freeze, unfreeze, tempunfreeze, flag, review, clear | id | | | |
//! | deposit, withdraw, hold, release, reserve, unreserve | id | | amount | |
//! | fee, reward, loss | id | | signed delta | |
//! | tempfreeze | id | | seconds | |
//! | transfer, submit | from | to | amount | |
//! | merge | from | to | | |
//! | lock | from | to | amount | seconds until unlock |
//! | unlock | holder | destination (defaults to holder) | | lock ID |
//! | allocate | id | | amount | purpose |
//! | redeem | id | | | allocation ID |
//! | finalize, refund, rollback | | | | transaction ID |
//! | batch | from | to | amount | batch reference |
//! | advance | | | seconds | |

use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

use crate::types::{Account, LedgerCommand, LedgerError, TransferRequest};

/// CSV record structure for deserialization
///
/// Every column except `op` is optional; which ones an operation needs is
/// checked during conversion.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CsvRecord {
    pub op: String,
    pub account: Option<String>,
    pub counterparty: Option<String>,
    pub amount: Option<String>,
    pub reference: Option<String>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn required(field: &Option<String>, op: &str, name: &str) -> Result<String, LedgerError> {
    present(field)
        .map(str::to_string)
        .ok_or_else(|| LedgerError::missing_field(op, name))
}

fn parse_amount(field: &Option<String>, op: &str) -> Result<Decimal, LedgerError> {
    let raw = present(field).ok_or_else(|| LedgerError::missing_field(op, "amount"))?;
    Decimal::from_str(raw).map_err(|_| LedgerError::ParseError {
        line: None,
        message: format!("invalid amount '{}' for {}", raw, op),
    })
}

fn parse_seconds(field: &Option<String>, op: &str, name: &str) -> Result<i64, LedgerError> {
    let raw = present(field).ok_or_else(|| LedgerError::missing_field(op, name))?;
    raw.parse::<i64>().map_err(|_| LedgerError::ParseError {
        line: None,
        message: format!("invalid {} '{}' for {}", name, raw, op),
    })
}

/// Convert a CsvRecord to a LedgerCommand
///
/// Operation names are case-insensitive. A `batch` row becomes a one-leg
/// batch; readers merge consecutive rows that share a reference.
///
/// # Errors
///
/// - `InvalidCommand` for an unknown operation
/// - `MissingField` when a column the operation needs is empty
/// - `ParseError` for unparseable amounts or durations
pub fn convert_csv_record(record: CsvRecord) -> Result<LedgerCommand, LedgerError> {
    let op = record.op.trim().to_lowercase();
    let account = || required(&record.account, &op, "account");
    let counterparty = || required(&record.counterparty, &op, "counterparty");
    let amount = || parse_amount(&record.amount, &op);
    let reference = || required(&record.reference, &op, "reference");

    let command = match op.as_str() {
        "create" => LedgerCommand::Create { account: account()? },
        "delete" => LedgerCommand::Delete { account: account()? },
        "deposit" => LedgerCommand::Deposit {
            account: account()?,
            amount: amount()?,
        },
        "withdraw" => LedgerCommand::Withdraw {
            account: account()?,
            amount: amount()?,
        },
        "transfer" => LedgerCommand::Transfer {
            from: account()?,
            to: counterparty()?,
            amount: amount()?,
        },
        "hold" => LedgerCommand::Hold {
            account: account()?,
            amount: amount()?,
        },
        "release" => LedgerCommand::Release {
            account: account()?,
            amount: amount()?,
        },
        "reserve" => LedgerCommand::Reserve {
            account: account()?,
            amount: amount()?,
        },
        "unreserve" => LedgerCommand::Unreserve {
            account: account()?,
            amount: amount()?,
        },
        "fee" => LedgerCommand::Fee {
            account: account()?,
            delta: amount()?,
        },
        "reward" => LedgerCommand::Reward {
            account: account()?,
            delta: amount()?,
        },
        "loss" => LedgerCommand::Loss {
            account: account()?,
            delta: amount()?,
        },
        "freeze" => LedgerCommand::Freeze { account: account()? },
        "unfreeze" => LedgerCommand::Unfreeze { account: account()? },
        "tempfreeze" => LedgerCommand::TempFreeze {
            account: account()?,
            seconds: parse_seconds(&record.amount, &op, "amount")?,
        },
        "tempunfreeze" => LedgerCommand::TempUnfreeze { account: account()? },
        "flag" => LedgerCommand::FlagSuspicious { account: account()? },
        "review" => LedgerCommand::FlagForReview { account: account()? },
        "clear" => LedgerCommand::ClearFlags { account: account()? },
        "merge" => LedgerCommand::Merge {
            from: account()?,
            to: counterparty()?,
        },
        "lock" => LedgerCommand::Lock {
            from: account()?,
            to: counterparty()?,
            amount: amount()?,
            seconds: parse_seconds(&record.reference, &op, "reference")?,
        },
        "unlock" => {
            let holder = account()?;
            let to = present(&record.counterparty)
                .map(str::to_string)
                .unwrap_or_else(|| holder.clone());
            LedgerCommand::Unlock {
                holder,
                to,
                lock: reference()?,
            }
        }
        "allocate" => LedgerCommand::Allocate {
            account: account()?,
            amount: amount()?,
            purpose: reference()?,
        },
        "redeem" => LedgerCommand::Redeem {
            account: account()?,
            allocation: reference()?,
        },
        "submit" => LedgerCommand::Submit {
            from: account()?,
            to: counterparty()?,
            amount: amount()?,
        },
        "finalize" => LedgerCommand::Finalize { tx: reference()? },
        "refund" => LedgerCommand::Refund { tx: reference()? },
        "rollback" => LedgerCommand::Rollback { tx: reference()? },
        "batch" => LedgerCommand::Batch {
            reference: reference()?,
            transfers: vec![TransferRequest::new(account()?, counterparty()?, amount()?)],
        },
        "advance" => LedgerCommand::Advance {
            seconds: parse_seconds(&record.amount, &op, "amount")?,
        },
        _ => {
            return Err(LedgerError::InvalidCommand {
                op: record.op.clone(),
            })
        }
    };

    Ok(command)
}

fn io_error(context: &str, error: csv::Error) -> LedgerError {
    LedgerError::IoError {
        message: format!("{}: {}", context, error),
    }
}

/// Write account states to CSV format
///
/// Columns: `account,available,held,reserved,locked,allocated,total,status`.
/// Accounts are sorted by ID and amounts carry four decimal places.
///
/// # Errors
///
/// `IoError` if the writer fails
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record([
            "account",
            "available",
            "held",
            "reserved",
            "locked",
            "allocated",
            "total",
            "status",
        ])
        .map_err(|e| io_error("Failed to write CSV header", e))?;

    let mut sorted: Vec<&Account> = accounts.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    for account in sorted {
        writer
            .write_record(&[
                account.id.clone(),
                format!("{:.4}", account.balance),
                format!("{:.4}", account.held_balance),
                format!("{:.4}", account.reserved_balance),
                format!("{:.4}", account.locked_total()),
                format!("{:.4}", account.allocated_total()),
                format!("{:.4}", account.total_value()),
                account.status.label().to_string(),
            ])
            .map_err(|e| io_error("Failed to write account record", e))?;
    }

    writer.flush()?;
    Ok(())
}
