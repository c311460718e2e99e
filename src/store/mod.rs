//! Ledger store
//!
//! The engine does not own persistence. It reads and writes accounts,
//! transactions, snapshots and trust balances through the [`LedgerStore`]
//! trait, so a database-backed store can replace [`MemoryStore`] without
//! touching the balance logic.
//!
//! Multi-record writes go through [`LedgerStore::commit`], which must apply
//! a [`WriteSet`] entirely or not at all. Balance snapshots travel in the
//! same write set as the account state they record.

mod memory;

pub use memory::MemoryStore;

use crate::types::{Account, BalanceSnapshot, LedgerError, Transaction, TrustAccount};

/// Records written together by one ledger operation
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    /// Accounts that must not exist yet
    pub new_accounts: Vec<Account>,
    /// Account copies carrying the version they were read at
    pub accounts: Vec<Account>,
    /// Transactions that must not exist yet
    pub new_transactions: Vec<Transaction>,
    /// Transactions that must already exist
    pub updated_transactions: Vec<Transaction>,
    /// Appended to balance history once everything else is applied
    pub snapshots: Vec<BalanceSnapshot>,
}

impl WriteSet {
    pub fn is_empty(&self) -> bool {
        self.new_accounts.is_empty()
            && self.accounts.is_empty()
            && self.new_transactions.is_empty()
            && self.updated_transactions.is_empty()
            && self.snapshots.is_empty()
    }
}

/// Persistent key-value store of ledger records
pub trait LedgerStore: Send + Sync {
    fn get_account(&self, id: &str) -> Result<Account, LedgerError>;

    /// Insert a brand-new account; fails `AccountExists` on a taken ID
    fn insert_account(&self, account: Account) -> Result<(), LedgerError> {
        self.commit(WriteSet {
            new_accounts: vec![account],
            ..WriteSet::default()
        })
    }

    fn update_account(&self, account: Account) -> Result<(), LedgerError> {
        self.commit(WriteSet {
            accounts: vec![account],
            ..WriteSet::default()
        })
    }

    fn list_accounts(&self) -> Vec<Account>;

    fn get_transaction(&self, id: &str) -> Result<Transaction, LedgerError>;

    fn update_transaction(&self, transaction: Transaction) -> Result<(), LedgerError> {
        self.commit(WriteSet {
            updated_transactions: vec![transaction],
            ..WriteSet::default()
        })
    }

    /// Apply every record in the write set, or none of them
    fn commit(&self, writes: WriteSet) -> Result<(), LedgerError>;

    fn balance_history(&self, id: &str) -> Vec<BalanceSnapshot>;

    fn get_trust_account(&self, id: &str) -> Result<TrustAccount, LedgerError>;

    fn update_trust_account(&self, account: TrustAccount) -> Result<(), LedgerError>;
}
