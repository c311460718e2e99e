//! Shared ledger context
//!
//! `LedgerContext` bundles what every component needs: the store, lock
//! striping for accounts and transactions, the clock, the ID generator and
//! the external collaborators.
//!
//! # Critical sections
//!
//! All account mutations run through [`LedgerContext::with_accounts`]:
//!
//! ```text
//! lock accounts (sorted) → load copies on demand → validate + mutate copies
//!     → commit touched copies and their snapshots in one WriteSet → unlock
//! ```
//!
//! An error anywhere before the commit drops the copies, so a failed
//! operation leaves no trace in the store.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::hooks::{ConsensusHook, KeyCipher, NoopConsensus, PassthroughCipher, SyncEvent};
use super::ids::{IdGenerator, UuidGenerator};
use super::lock_table::{LockGuards, LockTable};
use crate::store::{LedgerStore, WriteSet};
use crate::types::{
    validate_account_id, Account, AccountId, AccountStatus, LedgerError, Transaction,
    TransactionId,
};

/// Engine-level settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Largest number of transfers accepted in one batch
    pub max_batch_legs: usize,
    /// Append a balance snapshot for every committed account write
    pub record_history: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_batch_legs: 10_000,
            record_history: true,
        }
    }
}

pub struct LedgerContext {
    store: Arc<dyn LedgerStore>,
    account_locks: LockTable<AccountId>,
    transaction_locks: LockTable<TransactionId>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    consensus: Arc<dyn ConsensusHook>,
    cipher: Arc<dyn KeyCipher>,
    config: LedgerConfig,
}

impl LedgerContext {
    /// Context with the system clock, UUIDs and no-op collaborators
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            account_locks: LockTable::new(),
            transaction_locks: LockTable::new(),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            consensus: Arc::new(NoopConsensus),
            cipher: Arc::new(PassthroughCipher),
            config: LedgerConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_consensus(mut self, consensus: Arc<dyn ConsensusHook>) -> Self {
        self.consensus = consensus;
        self
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn KeyCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn cipher(&self) -> &dyn KeyCipher {
        self.cipher.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn next_id(&self, prefix: &str) -> String {
        self.ids.next_id(prefix)
    }

    /// Serialize on one account without loading it (account creation)
    pub(crate) fn lock_account(&self, account: &str) -> LockGuards<AccountId> {
        self.account_locks.lock(account.to_string())
    }

    #[cfg(test)]
    pub(crate) fn transaction_lock_count(&self) -> usize {
        self.transaction_locks.len()
    }

    /// Serialize on one transaction; always taken before any account lock
    pub(crate) fn lock_transaction(&self, tx: &str) -> LockGuards<TransactionId> {
        self.transaction_locks.lock(tx.to_string())
    }

    /// Run `f` against working copies of `accounts` and commit what it touched
    pub(crate) fn with_accounts<T, F>(
        &self,
        operation: &'static str,
        accounts: &[&str],
        f: F,
    ) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut WorkingSet<'_>) -> Result<T, LedgerError>,
    {
        for account in accounts {
            validate_account_id(account)?;
        }

        let guards = self
            .account_locks
            .lock_many(accounts.iter().map(|account| account.to_string()));
        let mut working = WorkingSet {
            store: self.store.as_ref(),
            guards: &guards,
            now: self.clock.now(),
            accounts: BTreeMap::new(),
            new_transactions: Vec::new(),
            updated_transactions: Vec::new(),
        };

        let output = f(&mut working)?;
        let writes = working.into_write_set(self.config.record_history);
        let touched: Vec<AccountId> = writes
            .accounts
            .iter()
            .map(|account| account.id.clone())
            .collect();

        if !writes.is_empty() {
            self.store.commit(writes)?;
        }
        drop(guards);

        debug!(operation, accounts = ?touched, "committed");
        Ok(output)
    }

    /// Tell consensus about an account event; failures are only logged
    pub(crate) fn sync_consensus(&self, account: &str, event: SyncEvent) {
        if let Err(e) = self.consensus.sync_with_consensus(account, event) {
            warn!(account, %event, error = %e, "consensus sync failed");
        }
    }
}

/// Working copies of the accounts locked by one operation
pub struct WorkingSet<'a> {
    store: &'a dyn LedgerStore,
    guards: &'a LockGuards<AccountId>,
    now: DateTime<Utc>,
    accounts: BTreeMap<AccountId, (Account, bool)>,
    new_transactions: Vec<Transaction>,
    updated_transactions: Vec<Transaction>,
}

impl<'a> WorkingSet<'a> {
    /// Time the critical section started
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn load(&mut self, account: &str) -> Result<&mut (Account, bool), LedgerError> {
        if !self.accounts.contains_key(account) {
            if !self.guards.holds(&account.to_string()) {
                return Err(LedgerError::storage(format!(
                    "account '{}' is not locked by this operation",
                    account
                )));
            }
            let loaded = self.store.get_account(account)?;
            self.accounts.insert(account.to_string(), (loaded, false));
        }
        self.accounts
            .get_mut(account)
            .ok_or_else(|| LedgerError::account_not_found(account))
    }

    /// Read-only view; no status check
    pub fn get(&mut self, account: &str) -> Result<&Account, LedgerError> {
        Ok(&self.load(account)?.0)
    }

    /// Run the status guard without marking the account as written
    pub fn check(&mut self, account: &str) -> Result<&Account, LedgerError> {
        let now = self.now;
        let entry = self.load(account)?;
        entry.0.ensure_mutable(now)?;
        Ok(&entry.0)
    }

    /// Mutable copy of an account that passes the status guard
    pub fn mutable(&mut self, account: &str) -> Result<&mut Account, LedgerError> {
        let now = self.now;
        let entry = self.load(account)?;
        entry.0.ensure_mutable(now)?;
        entry.1 = true;
        Ok(&mut entry.0)
    }

    /// Mutable copy for admin status changes; only closed accounts are refused
    pub fn admin(&mut self, account: &str) -> Result<&mut Account, LedgerError> {
        let entry = self.load(account)?;
        if entry.0.status == AccountStatus::Closed {
            return Err(LedgerError::AccountClosed {
                account: account.to_string(),
            });
        }
        entry.1 = true;
        Ok(&mut entry.0)
    }

    pub fn insert_transaction(&mut self, transaction: Transaction) {
        self.new_transactions.push(transaction);
    }

    pub fn update_transaction(&mut self, transaction: Transaction) {
        self.updated_transactions.push(transaction);
    }

    fn into_write_set(self, record_history: bool) -> WriteSet {
        let now = self.now;
        let accounts: Vec<Account> = self
            .accounts
            .into_values()
            .filter(|(_, touched)| *touched)
            .map(|(mut account, _)| {
                if account.status.is_expired_freeze(now) {
                    account.status = AccountStatus::Active;
                }
                account.last_updated = now;
                account
            })
            .collect();

        let snapshots = if record_history {
            accounts.iter().map(|account| account.snapshot(now)).collect()
        } else {
            Vec::new()
        };

        WriteSet {
            new_accounts: Vec::new(),
            accounts,
            new_transactions: self.new_transactions,
            updated_transactions: self.updated_transactions,
            snapshots,
        }
    }
}
