//! Transaction lifecycle
//!
//! A submitted transaction has already moved value from `from_address` to
//! `to_address`. Its record then advances through the state machine below;
//! refund and rollback apply compensating balance effects in the same
//! commit as the status change.
//!
//! ```text
//! Pending ──finalize──▶ Completed ──refund───▶ Refunded
//!                                 └─rollback─▶ RolledBack
//! ```
//!
//! Each transition holds the transaction's lock for its whole duration, so
//! two concurrent calls on one ID cannot both succeed. Unknown IDs are
//! rejected before any lock is taken.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use super::balance_mutator::{ensure_positive, move_funds};
use super::context::LedgerContext;
use super::lock_table::LockGuards;
use crate::types::{LedgerError, Transaction, TransactionId, TransactionStatus};

#[derive(Clone)]
pub struct TransactionFinalizer {
    ctx: Arc<LedgerContext>,
}

impl TransactionFinalizer {
    pub fn new(ctx: Arc<LedgerContext>) -> Self {
        Self { ctx }
    }

    /// Transfer `amount` and record a `Pending` transaction for it
    ///
    /// Both accounts' `last_transaction_id` point at the new record.
    pub fn submit(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<Transaction, LedgerError> {
        ensure_positive(amount, "submit")?;
        if from == to {
            return Err(LedgerError::same_account(from, "submit"));
        }

        let ctx = &self.ctx;
        let transaction = ctx.with_accounts("submit", &[from, to], |set| {
            move_funds(set, from, to, amount, "submit")?;

            let id = ctx.next_id("tx");
            let transaction = Transaction::pending(id, from, to, amount, set.now());
            set.mutable(from)?.last_transaction_id = Some(transaction.id.clone());
            set.mutable(to)?.last_transaction_id = Some(transaction.id.clone());
            set.insert_transaction(transaction.clone());
            Ok(transaction)
        })?;

        debug!(tx = %transaction.id, from, to, %amount, "transaction submitted");
        Ok(transaction)
    }

    /// Move a transaction from `Pending` to `Completed`
    ///
    /// # Errors
    ///
    /// - `TransactionNotFound` for an unknown ID
    /// - `AlreadyFinalized` if the transaction has left `Pending`
    pub fn finalize(&self, tx_id: &str) -> Result<Transaction, LedgerError> {
        let (_guard, mut transaction) = self.lock_existing(tx_id, "finalize")?;

        if !transaction
            .status
            .can_transition_to(TransactionStatus::Completed)
        {
            return Err(LedgerError::AlreadyFinalized {
                tx: tx_id.to_string(),
                status: transaction.status,
            });
        }

        transaction.status = TransactionStatus::Completed;
        transaction.updated_at = self.ctx.now();
        self.ctx.store().update_transaction(transaction.clone())?;

        debug!(tx = tx_id, "transaction finalized");
        Ok(transaction)
    }

    /// Refund a completed transaction to its sender
    ///
    /// The refund is new value issued to `from_address`; the recipient keeps
    /// what it received.
    ///
    /// # Errors
    ///
    /// - `InvalidTransactionState` unless the transaction is `Completed`
    pub fn request_refund(&self, tx_id: &str) -> Result<Transaction, LedgerError> {
        let (_guard, mut transaction) = self.lock_existing(tx_id, "refund")?;
        Self::ensure_transition(&transaction, TransactionStatus::Refunded, "refund")?;

        let from = transaction.from_address.clone();
        let amount = transaction.amount;
        let transaction = self.ctx.with_accounts("refund", &[from.as_str()], |set| {
            let account = set.mutable(&from)?;
            account.credit(amount, "refund")?;
            account.total_deposited = account
                .total_deposited
                .checked_add(amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("refund", &from))?;
            account.last_transaction_id = Some(transaction.id.clone());

            transaction.status = TransactionStatus::Refunded;
            transaction.refund_amount = amount;
            transaction.updated_at = set.now();
            set.update_transaction(transaction.clone());
            Ok(transaction)
        })?;

        info!(tx = tx_id, account = %from, %amount, "transaction refunded");
        Ok(transaction)
    }

    /// Reverse a completed transaction
    ///
    /// Fails without changing anything if the recipient no longer holds the
    /// amount; the transaction stays `Completed` and may be retried.
    ///
    /// # Errors
    ///
    /// - `InvalidTransactionState` unless the transaction is `Completed`
    /// - `InsufficientFunds` if `to_address` cannot cover the reversal
    pub fn rollback(&self, tx_id: &str) -> Result<Transaction, LedgerError> {
        let (_guard, mut transaction) = self.lock_existing(tx_id, "rollback")?;
        Self::ensure_transition(&transaction, TransactionStatus::RolledBack, "rollback")?;

        let from = transaction.from_address.clone();
        let to = transaction.to_address.clone();
        let amount = transaction.amount;
        let accounts = [from.as_str(), to.as_str()];
        let transaction = self.ctx.with_accounts("rollback", &accounts, |set| {
            move_funds(set, &to, &from, amount, "rollback")?;

            transaction.status = TransactionStatus::RolledBack;
            transaction.refund_amount = amount;
            transaction.updated_at = set.now();
            set.update_transaction(transaction.clone());
            Ok(transaction)
        })?;

        info!(tx = tx_id, from = %from, to = %to, %amount, "transaction rolled back");
        Ok(transaction)
    }

    /// Look up a transaction record
    pub fn transaction(&self, tx_id: &str) -> Result<Transaction, LedgerError> {
        self.ctx.store().get_transaction(tx_id)
    }

    /// Lock a known transaction and read it under the lock
    ///
    /// Records are never removed, so one that exists before locking still
    /// exists after.
    fn lock_existing(
        &self,
        tx_id: &str,
        operation: &str,
    ) -> Result<(LockGuards<TransactionId>, Transaction), LedgerError> {
        self.load(tx_id, operation)?;
        let guard = self.ctx.lock_transaction(tx_id);
        let transaction = self.load(tx_id, operation)?;
        Ok((guard, transaction))
    }

    fn load(&self, tx_id: &str, operation: &str) -> Result<Transaction, LedgerError> {
        match self.ctx.store().get_transaction(tx_id) {
            Err(LedgerError::TransactionNotFound { .. }) => {
                Err(LedgerError::transaction_not_found(tx_id, operation))
            }
            result => result,
        }
    }

    fn ensure_transition(
        transaction: &Transaction,
        next: TransactionStatus,
        operation: &str,
    ) -> Result<(), LedgerError> {
        if transaction.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(LedgerError::invalid_transaction_state(
                &transaction.id,
                operation,
                TransactionStatus::Completed,
                transaction.status,
            ))
        }
    }
}
