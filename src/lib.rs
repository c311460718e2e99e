//! Rust Ledger Engine Library
//!
//! # Overview
//!
//! An account balance ledger: accounts carry an available balance plus
//! held, reserved, time-locked and allocated buckets, and every operation
//! either applies completely or leaves the ledger untouched.
//!
//! # Architecture
//!
//! - [`types`] - Accounts, transactions, commands and errors
//! - [`store`] - The `LedgerStore` collaborator and its in-memory implementation
//! - [`core`] - The ledger components over a shared context:
//!   - [`core::balance_mutator`] - Balances, account status, merges and trust funds
//!   - [`core::lock_manager`] - Time-delayed balance locks
//!   - [`core::allocation_manager`] - Purpose-bound allocations
//!   - [`core::transaction_finalizer`] - Transaction state machine
//!   - [`core::batch_coordinator`] - All-or-nothing transfer batches
//!   - [`core::engine`] - Facade routing commands to the components
//! - [`io`] - CSV command input and account output
//! - [`strategy`] - Sync and async processing pipelines
//! - [`cli`] - CLI argument parsing
//! - [`logging`] - Tracing subscriber setup
//!
//! # Concurrency
//!
//! Every mutation locks the accounts it touches, in sorted order, for its
//! whole read-validate-write cycle. Operations on disjoint accounts run in
//! parallel; operations sharing an account serialize.

pub mod cli;
pub mod core;
pub mod io;
pub mod logging;
pub mod store;
pub mod strategy;
pub mod types;

pub use core::{
    AllocationManager, BalanceMutator, BatchCoordinator, LedgerContext, LedgerEngine,
    LockManager, TransactionFinalizer,
};
pub use io::write_accounts_csv;
pub use store::{LedgerStore, MemoryStore};
pub use types::{
    Account, AccountId, AccountStatus, Actor, LedgerCommand, LedgerError, Transaction,
    TransactionStatus, TransferRequest,
};
