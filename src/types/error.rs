//! Error types for the ledger engine
//!
//! Every failing operation returns a [`LedgerError`] synchronously and leaves
//! the ledger untouched. Variants carry enough context to diagnose the
//! failure from a log line alone.
//!
//! # Error Categories
//!
//! Each variant maps onto one [`ErrorKind`]:
//!
//! - **Validation**: malformed account IDs, non-positive amounts, bad times
//! - **NotFound**: missing account, transaction, lock or allocation
//! - **InsufficientFunds**: a balance bucket is below the requested amount
//! - **StateConflict**: double redemption, double finalize, frozen accounts
//! - **Permission**: the actor lacks a capability for an admin operation
//! - **Storage** / **Io**: failures at the store or CLI boundary

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use super::actor::Capability;
use super::transaction::TransactionStatus;

/// Coarse classification of a [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientFunds,
    StateConflict,
    Permission,
    Storage,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::StateConflict => "state_conflict",
            ErrorKind::Permission => "permission",
            ErrorKind::Storage => "storage",
            ErrorKind::Io => "io",
        };
        f.write_str(label)
    }
}

/// Main error type for the ledger engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Input file does not exist
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// I/O error while reading commands or writing account state
    #[error("I/O error: {message}")]
    IoError { message: String },

    /// CSV record could not be parsed
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },

    /// Unknown command name in the input
    #[error("Invalid command '{op}'")]
    InvalidCommand { op: String },

    /// A command is missing a field it requires
    #[error("{op} requires a {field}")]
    MissingField { op: String, field: String },

    /// Account ID is empty or malformed
    #[error("Invalid account ID '{account}': {reason}")]
    InvalidAccountId { account: String, reason: String },

    /// Amount is zero, negative, or otherwise unusable for the operation
    #[error("Invalid amount {amount} for {operation}")]
    InvalidAmount { amount: Decimal, operation: String },

    /// Trust amounts must be strictly positive
    #[error("Invalid trust amount {amount}")]
    InvalidTrustAmount { amount: BigInt },

    /// Source and destination are the same account
    #[error("{operation} requires two distinct accounts, got '{account}' twice")]
    SameAccount { account: String, operation: String },

    /// Lock unlock time is not in the future
    #[error("Unlock time {unlock_at} is not after current time {now}")]
    InvalidUnlockTime {
        unlock_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// Allocation expiry is not in the future
    #[error("Allocation expiry {expires_at} is not after current time {now}")]
    InvalidExpiry {
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// Duration is not positive, or moves time past the representable range
    #[error("Invalid duration of {seconds} seconds")]
    InvalidDuration { seconds: i64 },

    /// Batch contains no transfers
    #[error("Batch contains no transfers")]
    EmptyBatch,

    /// Batch exceeds the configured number of legs
    #[error("Batch of {legs} transfers exceeds the limit of {max}")]
    BatchTooLarge { legs: usize, max: usize },

    /// Account does not exist
    #[error("Account '{account}' not found")]
    AccountNotFound { account: String },

    /// Transaction does not exist
    #[error("Transaction '{tx}' not found for {operation}")]
    TransactionNotFound { tx: String, operation: String },

    /// Lock is not held by the account (never existed or already released)
    #[error("Lock '{lock}' not found on account '{account}'")]
    LockNotFound { account: String, lock: String },

    /// Allocation is missing or has already been redeemed
    #[error("Allocation '{allocation}' on account '{account}' not found or already redeemed")]
    AllocationNotFoundOrRedeemed { account: String, allocation: String },

    /// Available balance is below the requested amount
    #[error("Insufficient funds on account '{account}': available {available}, requested {requested}")]
    InsufficientFunds {
        account: String,
        available: Decimal,
        requested: Decimal,
    },

    /// Held balance is below the requested amount
    #[error("Insufficient held funds on account '{account}': held {held}, requested {requested}")]
    InsufficientHeld {
        account: String,
        held: Decimal,
        requested: Decimal,
    },

    /// Reserved balance is below the requested amount
    #[error("Insufficient reserved funds on account '{account}': reserved {reserved}, requested {requested}")]
    InsufficientReserved {
        account: String,
        reserved: Decimal,
        requested: Decimal,
    },

    /// Trust balance is below the requested amount
    #[error("Insufficient trust funds on account '{account}': available {available}, requested {requested}")]
    InsufficientTrustFunds {
        account: String,
        available: BigInt,
        requested: BigInt,
    },

    /// Account ID is already taken
    #[error("Account '{account}' already exists")]
    AccountExists { account: String },

    /// Transaction ID is already taken
    #[error("Transaction '{tx}' already exists")]
    TransactionExists { tx: String },

    /// Account is frozen (permanently or until a deadline)
    #[error("Account '{account}' is frozen")]
    AccountFrozen { account: String },

    /// Account is flagged and blocked from mutation
    #[error("Account '{account}' is {status}")]
    AccountFlagged { account: String, status: String },

    /// Account has been deleted
    #[error("Account '{account}' is closed")]
    AccountClosed { account: String },

    /// Account still carries earmarked value and cannot be deleted
    #[error("Account '{account}' still holds earmarked funds")]
    AccountNotEmpty { account: String },

    /// Unfreeze requested on an account that is not frozen
    #[error("Account '{account}' is not frozen")]
    NotFrozen { account: String },

    /// Flag clearing requested on an account that carries no flag
    #[error("Account '{account}' is not flagged")]
    NotFlagged { account: String },

    /// Lock release attempted before its unlock time
    #[error("Lock '{lock}' cannot be released before {unlock_at}")]
    LockNotMatured {
        lock: String,
        unlock_at: DateTime<Utc>,
    },

    /// Finalize called on a transaction that already left Pending
    #[error("Transaction '{tx}' is already finalized ({status})")]
    AlreadyFinalized {
        tx: String,
        status: TransactionStatus,
    },

    /// Refund or rollback on a transaction in the wrong state
    #[error("Cannot {operation} transaction '{tx}': expected {expected}, found {actual}")]
    InvalidTransactionState {
        tx: String,
        operation: String,
        expected: TransactionStatus,
        actual: TransactionStatus,
    },

    /// Actor lacks the capability required by an admin operation
    #[error("Actor '{actor}' lacks the {capability} capability")]
    PermissionDenied {
        actor: String,
        capability: Capability,
    },

    /// Arithmetic overflow in a balance calculation
    #[error("Arithmetic overflow in {operation} for account '{account}'")]
    ArithmeticOverflow { operation: String, account: String },

    /// Stored account version moved since it was read
    #[error("Stale write to account '{account}': read version {expected}, stored version {actual}")]
    StaleWrite {
        account: String,
        expected: u64,
        actual: u64,
    },

    /// The configured clock cannot be moved
    #[error("Clock cannot be advanced")]
    ClockNotAdjustable,

    /// Store-level failure
    #[error("Storage error: {message}")]
    StorageError { message: String },

    /// A processing worker stopped before reporting its commands
    #[error("Worker failed: {message}")]
    WorkerFailed { message: String },

    /// One leg of a batch failed; nothing in the batch was applied
    #[error("Batch leg {index} failed: {source}")]
    BatchFailed {
        index: usize,
        source: Box<LedgerError>,
    },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<csv_async::Error> for LedgerError {
    fn from(error: csv_async::Error) -> Self {
        LedgerError::ParseError {
            line: None,
            message: error.to_string(),
        }
    }
}

impl LedgerError {
    /// Classify this error into the ledger's error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::FileNotFound { .. } | LedgerError::IoError { .. } => ErrorKind::Io,

            LedgerError::ParseError { .. }
            | LedgerError::InvalidCommand { .. }
            | LedgerError::MissingField { .. }
            | LedgerError::InvalidAccountId { .. }
            | LedgerError::InvalidAmount { .. }
            | LedgerError::InvalidTrustAmount { .. }
            | LedgerError::SameAccount { .. }
            | LedgerError::InvalidUnlockTime { .. }
            | LedgerError::InvalidExpiry { .. }
            | LedgerError::InvalidDuration { .. }
            | LedgerError::EmptyBatch
            | LedgerError::BatchTooLarge { .. } => ErrorKind::Validation,

            LedgerError::AccountNotFound { .. }
            | LedgerError::TransactionNotFound { .. }
            | LedgerError::LockNotFound { .. } => ErrorKind::NotFound,

            LedgerError::InsufficientFunds { .. }
            | LedgerError::InsufficientHeld { .. }
            | LedgerError::InsufficientReserved { .. }
            | LedgerError::InsufficientTrustFunds { .. } => ErrorKind::InsufficientFunds,

            LedgerError::AllocationNotFoundOrRedeemed { .. }
            | LedgerError::AccountExists { .. }
            | LedgerError::TransactionExists { .. }
            | LedgerError::AccountFrozen { .. }
            | LedgerError::AccountFlagged { .. }
            | LedgerError::AccountClosed { .. }
            | LedgerError::AccountNotEmpty { .. }
            | LedgerError::NotFrozen { .. }
            | LedgerError::NotFlagged { .. }
            | LedgerError::LockNotMatured { .. }
            | LedgerError::AlreadyFinalized { .. }
            | LedgerError::InvalidTransactionState { .. }
            | LedgerError::StaleWrite { .. }
            | LedgerError::ClockNotAdjustable => ErrorKind::StateConflict,

            LedgerError::PermissionDenied { .. } => ErrorKind::Permission,

            LedgerError::ArithmeticOverflow { .. }
            | LedgerError::StorageError { .. }
            | LedgerError::WorkerFailed { .. } => ErrorKind::Storage,

            LedgerError::BatchFailed { source, .. } => source.kind(),
        }
    }

    pub fn invalid_account_id(account: &str, reason: &str) -> Self {
        LedgerError::InvalidAccountId {
            account: account.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_amount(amount: Decimal, operation: &str) -> Self {
        LedgerError::InvalidAmount {
            amount,
            operation: operation.to_string(),
        }
    }

    pub fn missing_field(op: &str, field: &str) -> Self {
        LedgerError::MissingField {
            op: op.to_string(),
            field: field.to_string(),
        }
    }

    pub fn same_account(account: &str, operation: &str) -> Self {
        LedgerError::SameAccount {
            account: account.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn account_not_found(account: &str) -> Self {
        LedgerError::AccountNotFound {
            account: account.to_string(),
        }
    }

    pub fn transaction_not_found(tx: &str, operation: &str) -> Self {
        LedgerError::TransactionNotFound {
            tx: tx.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn insufficient_funds(account: &str, available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            account: account.to_string(),
            available,
            requested,
        }
    }

    pub fn insufficient_held(account: &str, held: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientHeld {
            account: account.to_string(),
            held,
            requested,
        }
    }

    pub fn insufficient_reserved(account: &str, reserved: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientReserved {
            account: account.to_string(),
            reserved,
            requested,
        }
    }

    pub fn arithmetic_overflow(operation: &str, account: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            account: account.to_string(),
        }
    }

    pub fn invalid_transaction_state(
        tx: &str,
        operation: &str,
        expected: TransactionStatus,
        actual: TransactionStatus,
    ) -> Self {
        LedgerError::InvalidTransactionState {
            tx: tx.to_string(),
            operation: operation.to_string(),
            expected,
            actual,
        }
    }

    /// A duration that cannot be represented or applied to the clock
    pub fn invalid_duration(seconds: i64) -> Self {
        LedgerError::InvalidDuration { seconds }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::StorageError {
            message: message.into(),
        }
    }

    pub fn batch_failed(index: usize, source: LedgerError) -> Self {
        LedgerError::BatchFailed {
            index,
            source: Box::new(source),
        }
    }
}
