//! In-memory ledger store
//!
//! `MemoryStore` keeps every record in a `DashMap`, so reads of different
//! accounts never contend. Writes check the account version recorded on the
//! copy against the stored one and reject the whole write set on mismatch.
//! A short commit mutex makes the check-then-write step atomic across the
//! records of one write set.

use dashmap::DashMap;
use parking_lot::Mutex;

use super::{LedgerStore, WriteSet};
use crate::types::{
    Account, AccountId, BalanceSnapshot, LedgerError, Transaction, TransactionId, TrustAccount,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: DashMap<AccountId, Account>,
    transactions: DashMap<TransactionId, Transaction>,
    history: DashMap<AccountId, Vec<BalanceSnapshot>>,
    trust_accounts: DashMap<AccountId, TrustAccount>,
    commit_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(&self, writes: &WriteSet) -> Result<(), LedgerError> {
        for account in &writes.new_accounts {
            if self.accounts.contains_key(&account.id) {
                return Err(LedgerError::AccountExists {
                    account: account.id.clone(),
                });
            }
        }
        for account in &writes.accounts {
            let stored = self
                .accounts
                .get(&account.id)
                .ok_or_else(|| LedgerError::account_not_found(&account.id))?;
            if stored.version != account.version {
                return Err(LedgerError::StaleWrite {
                    account: account.id.clone(),
                    expected: account.version,
                    actual: stored.version,
                });
            }
        }
        for transaction in &writes.new_transactions {
            if self.transactions.contains_key(&transaction.id) {
                return Err(LedgerError::TransactionExists {
                    tx: transaction.id.clone(),
                });
            }
        }
        for transaction in &writes.updated_transactions {
            if !self.transactions.contains_key(&transaction.id) {
                return Err(LedgerError::transaction_not_found(
                    &transaction.id,
                    "update",
                ));
            }
        }
        Ok(())
    }
}

impl LedgerStore for MemoryStore {
    fn get_account(&self, id: &str) -> Result<Account, LedgerError> {
        self.accounts
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    fn list_accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }

    fn get_transaction(&self, id: &str) -> Result<Transaction, LedgerError> {
        self.transactions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LedgerError::transaction_not_found(id, "lookup"))
    }

    fn commit(&self, writes: WriteSet) -> Result<(), LedgerError> {
        let _commit = self.commit_lock.lock();
        self.validate(&writes)?;

        for account in writes.new_accounts {
            self.accounts.insert(account.id.clone(), account);
        }
        for mut account in writes.accounts {
            account.version += 1;
            self.accounts.insert(account.id.clone(), account);
        }
        for transaction in writes
            .new_transactions
            .into_iter()
            .chain(writes.updated_transactions)
        {
            self.transactions
                .insert(transaction.id.clone(), transaction);
        }
        for snapshot in writes.snapshots {
            self.history
                .entry(snapshot.account_id.clone())
                .or_default()
                .push(snapshot);
        }
        Ok(())
    }

    fn balance_history(&self, id: &str) -> Vec<BalanceSnapshot> {
        self.history
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn get_trust_account(&self, id: &str) -> Result<TrustAccount, LedgerError> {
        self.trust_accounts
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    fn update_trust_account(&self, account: TrustAccount) -> Result<(), LedgerError> {
        self.trust_accounts.insert(account.id.clone(), account);
        Ok(())
    }
}
