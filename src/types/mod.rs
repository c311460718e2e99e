//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: accounts, balance locks, allocations, trust accounts
//! - `transaction`: transactions, transfer legs, balance snapshots
//! - `actor`: callers and capabilities for admin-gated operations
//! - `command`: operations read from input files
//! - `error`: error types for the ledger engine

pub mod account;
pub mod actor;
pub mod command;
pub mod error;
pub mod transaction;

pub use account::{
    validate_account_id, Account, AccountId, AccountStatus, Allocation, AllocationId,
    BalanceLock, LockId, TrustAccount,
};
pub use actor::{Actor, Capability};
pub use command::LedgerCommand;
pub use error::{ErrorKind, LedgerError};
pub use transaction::{
    BalanceSnapshot, Transaction, TransactionId, TransactionStatus, TransferRequest,
};
