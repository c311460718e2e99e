//! Time-delayed balance locks
//!
//! A lock moves funds out of a source account's `balance` and parks them on
//! the recipient's `locked_balances` until `unlock_at`. Releasing a matured
//! lock removes it from the holder and credits its amount to a destination.
//! The lock record only exists between those two operations, so a second
//! release of the same ID finds nothing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use super::balance_mutator::ensure_positive;
use super::context::LedgerContext;
use crate::types::{BalanceLock, LedgerError};

#[derive(Clone)]
pub struct LockManager {
    ctx: Arc<LedgerContext>,
}

impl LockManager {
    pub fn new(ctx: Arc<LedgerContext>) -> Self {
        Self { ctx }
    }

    /// Debit `source` and lock the amount on `dest` until `unlock_at`
    ///
    /// `source` and `dest` may be the same account (a self-imposed lock).
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` unless `amount > 0`
    /// - `InvalidUnlockTime` unless `unlock_at` is in the future
    /// - `InsufficientFunds` if `source` cannot cover the amount
    pub fn create_lock(
        &self,
        source: &str,
        dest: &str,
        amount: Decimal,
        unlock_at: DateTime<Utc>,
    ) -> Result<BalanceLock, LedgerError> {
        ensure_positive(amount, "lock")?;

        let ctx = &self.ctx;
        let lock = ctx.with_accounts("lock", &[source, dest], |set| {
            let now = set.now();
            if unlock_at <= now {
                return Err(LedgerError::InvalidUnlockTime { unlock_at, now });
            }
            set.mutable(dest)?;
            set.mutable(source)?.debit(amount, "lock")?;

            let lock = BalanceLock {
                id: ctx.next_id("lock"),
                account_id: dest.to_string(),
                source_account: source.to_string(),
                amount,
                unlock_at,
                created_at: now,
            };
            set.mutable(dest)?.locked_balances.push(lock.clone());
            Ok(lock)
        })?;

        debug!(lock = %lock.id, source, dest, %amount, %unlock_at, "lock created");
        Ok(lock)
    }

    /// Release a matured lock held by `holder` into `dest`
    ///
    /// # Errors
    ///
    /// - `LockNotFound` if `holder` carries no lock with that ID
    /// - `LockNotMatured` before `unlock_at`
    pub fn release_lock(
        &self,
        holder: &str,
        lock_id: &str,
        dest: &str,
    ) -> Result<BalanceLock, LedgerError> {
        let lock = self.ctx.with_accounts("unlock", &[holder, dest], |set| {
            let now = set.now();
            set.mutable(dest)?;
            let account = set.mutable(holder)?;
            let index = account
                .locked_balances
                .iter()
                .position(|lock| lock.id == lock_id)
                .ok_or_else(|| LedgerError::LockNotFound {
                    account: holder.to_string(),
                    lock: lock_id.to_string(),
                })?;
            if !account.locked_balances[index].is_matured(now) {
                return Err(LedgerError::LockNotMatured {
                    lock: lock_id.to_string(),
                    unlock_at: account.locked_balances[index].unlock_at,
                });
            }

            let lock = account.locked_balances.remove(index);
            set.mutable(dest)?.credit(lock.amount, "unlock")?;
            Ok(lock)
        })?;

        debug!(lock = lock_id, holder, dest, amount = %lock.amount, "lock released");
        Ok(lock)
    }

    /// Release every matured lock on `holder` back into its own balance
    pub fn release_matured(&self, holder: &str) -> Result<Vec<BalanceLock>, LedgerError> {
        let released = self.ctx.with_accounts("unlock", &[holder], |set| {
            let now = set.now();
            let account = set.check(holder)?;
            if !account.locked_balances.iter().any(|lock| lock.is_matured(now)) {
                return Ok(Vec::new());
            }

            let account = set.mutable(holder)?;
            let (matured, pending): (Vec<_>, Vec<_>) = account
                .locked_balances
                .drain(..)
                .partition(|lock| lock.is_matured(now));
            account.locked_balances = pending;
            for lock in &matured {
                account.credit(lock.amount, "unlock")?;
            }
            Ok(matured)
        })?;

        debug!(holder, released = released.len(), "matured locks released");
        Ok(released)
    }

    /// Locks currently held by an account
    pub fn locks(&self, account: &str) -> Result<Vec<BalanceLock>, LedgerError> {
        Ok(self.ctx.store().get_account(account)?.locked_balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::balance_mutator::BalanceMutator;
    use crate::core::clock::{Clock, ManualClock};
    use crate::core::test_support::{funded, ledger_context};
    use chrono::Duration;

    fn setup() -> (LockManager, BalanceMutator, Arc<ManualClock>) {
        let (ctx, clock) = ledger_context();
        let mutator = BalanceMutator::new(Arc::clone(&ctx));
        funded(&mutator, "A", Decimal::new(100, 0));
        funded(&mutator, "B", Decimal::ZERO);
        (LockManager::new(ctx), mutator, clock)
    }

    fn balance(manager: &LockManager, id: &str) -> Decimal {
        manager.ctx.store().get_account(id).unwrap().balance
    }

    #[test]
    fn test_lock_matures_with_the_clock() {
        let (manager, _, clock) = setup();
        let unlock_at = clock.now() + Duration::hours(1);

        let lock = manager
            .create_lock("A", "B", Decimal::new(40, 0), unlock_at)
            .unwrap();
        assert_eq!(lock.id, "lock-1");
        assert_eq!(balance(&manager, "A"), Decimal::new(60, 0));
        assert_eq!(manager.locks("B").unwrap(), vec![lock.clone()]);

        let err = manager.release_lock("B", &lock.id, "B").unwrap_err();
        assert!(matches!(err, LedgerError::LockNotMatured { .. }));

        clock.advance(Duration::hours(1)).unwrap();
        manager.release_lock("B", &lock.id, "B").unwrap();
        assert_eq!(balance(&manager, "B"), Decimal::new(40, 0));
        assert!(manager.locks("B").unwrap().is_empty());

        let err = manager.release_lock("B", &lock.id, "B").unwrap_err();
        assert!(matches!(err, LedgerError::LockNotFound { .. }));
    }

    #[test]
    fn test_lock_in_the_past_is_rejected() {
        let (manager, _, clock) = setup();

        let err = manager
            .create_lock("A", "B", Decimal::ONE, clock.now())
            .unwrap_err();

        assert!(matches!(err, LedgerError::InvalidUnlockTime { .. }));
        assert_eq!(balance(&manager, "A"), Decimal::new(100, 0));
    }

    #[test]
    fn test_lock_larger_than_balance_is_rejected() {
        let (manager, _, clock) = setup();

        let err = manager
            .create_lock("A", "B", Decimal::new(101, 0), clock.now() + Duration::hours(1))
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert!(manager.locks("B").unwrap().is_empty());
    }

    #[test]
    fn test_release_into_third_account() {
        let (manager, mutator, clock) = setup();
        funded(&mutator, "C", Decimal::ZERO);
        let lock = manager
            .create_lock("A", "B", Decimal::new(10, 0), clock.now() + Duration::minutes(1))
            .unwrap();

        clock.advance(Duration::minutes(2)).unwrap();
        manager.release_lock("B", &lock.id, "C").unwrap();

        assert_eq!(balance(&manager, "B"), Decimal::ZERO);
        assert_eq!(balance(&manager, "C"), Decimal::new(10, 0));
    }

    #[test]
    fn test_release_matured_leaves_pending_locks() {
        let (manager, _, clock) = setup();
        let now = clock.now();
        manager
            .create_lock("A", "B", Decimal::new(10, 0), now + Duration::minutes(1))
            .unwrap();
        manager
            .create_lock("A", "B", Decimal::new(20, 0), now + Duration::hours(1))
            .unwrap();

        assert!(manager.release_matured("B").unwrap().is_empty());

        clock.advance(Duration::minutes(5)).unwrap();
        let released = manager.release_matured("B").unwrap();

        assert_eq!(released.len(), 1);
        assert_eq!(balance(&manager, "B"), Decimal::new(10, 0));
        assert_eq!(manager.locks("B").unwrap().len(), 1);
    }
}
