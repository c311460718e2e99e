//! Balance mutation module
//!
//! This module provides the `BalanceMutator`, the primitive read-modify-write
//! operations on an account's balance buckets. Every operation runs inside
//! [`LedgerContext::with_accounts`], so it sees consistent copies of the
//! accounts it names and commits all of them together or none of them.
//!
//! The BalanceMutator is responsible for:
//! - Account lifecycle (create, logical delete)
//! - Deposits, withdrawals and two-account transfers
//! - Moves between `balance` and the held / reserved buckets
//! - Signed fee / reward / loss adjustments
//! - Freeze and compliance-flag status changes
//! - Bulk moves (merge, rollup, split) with aggregate pre-validation
//! - Arbitrary-precision trust balances

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::context::{LedgerContext, WorkingSet};
use super::hooks::SyncEvent;
use crate::store::WriteSet;
use crate::types::{
    validate_account_id, Account, AccountId, AccountStatus, Actor, BalanceSnapshot, Capability,
    LedgerError, TransferRequest, TrustAccount,
};

/// Reject zero and negative amounts
pub(crate) fn ensure_positive(amount: Decimal, operation: &str) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(amount, operation));
    }
    Ok(())
}

/// Debit `from` and credit `to` inside an open working set
///
/// Both accounts must pass the status guard. Shared by transfers, bulk
/// moves, batches and transaction submission.
pub(crate) fn move_funds(
    set: &mut WorkingSet<'_>,
    from: &str,
    to: &str,
    amount: Decimal,
    operation: &str,
) -> Result<(), LedgerError> {
    if from == to {
        return Err(LedgerError::same_account(from, operation));
    }
    set.mutable(to)?;
    set.mutable(from)?.debit(amount, operation)?;
    set.mutable(to)?.credit(amount, operation)
}

fn add_checked(
    value: Decimal,
    amount: Decimal,
    operation: &str,
    account: &str,
) -> Result<Decimal, LedgerError> {
    value
        .checked_add(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow(operation, account))
}

/// Signed balance adjustments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjustment {
    Fee,
    Reward,
    Loss,
}

impl Adjustment {
    fn operation(self) -> &'static str {
        match self {
            Adjustment::Fee => "fee",
            Adjustment::Reward => "reward",
            Adjustment::Loss => "loss",
        }
    }
}

/// Primitive balance operations over the ledger store
#[derive(Clone)]
pub struct BalanceMutator {
    ctx: Arc<LedgerContext>,
}

impl BalanceMutator {
    pub fn new(ctx: Arc<LedgerContext>) -> Self {
        Self { ctx }
    }

    /// Create an empty, active account
    ///
    /// # Arguments
    ///
    /// * `actor` - Caller; must hold [`Capability::Admin`]
    /// * `id` - New account ID
    /// * `key_material` - Secret bytes sealed by the key cipher before storage
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` if the actor is not an admin
    /// - `InvalidAccountId` for a malformed ID
    /// - `AccountExists` if the ID is taken (including closed accounts)
    pub fn create_account(
        &self,
        actor: &Actor,
        id: &str,
        key_material: &[u8],
    ) -> Result<Account, LedgerError> {
        actor.require(Capability::Admin)?;
        validate_account_id(id)?;

        let sealed = self.ctx.cipher().seal(key_material)?;
        let guard = self.ctx.lock_account(id);
        let now = self.ctx.now();
        let account = Account::new(id, sealed, now);
        let snapshots = if self.ctx.config().record_history {
            vec![account.snapshot(now)]
        } else {
            Vec::new()
        };
        self.ctx.store().commit(WriteSet {
            new_accounts: vec![account.clone()],
            snapshots,
            ..WriteSet::default()
        })?;
        drop(guard);

        info!(account = id, actor = %actor.id, "account created");
        self.ctx.sync_consensus(id, SyncEvent::AccountCreated);
        Ok(account)
    }

    /// Logically delete an account
    ///
    /// The spendable balance is burned, key material is overwritten with
    /// zeros and the record stays behind as a `Closed` tombstone.
    ///
    /// # Returns
    ///
    /// The burned amount
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` if the actor is not an admin
    /// - `AccountNotEmpty` while held, reserved, locked or allocated value remains
    /// - `AccountClosed` if the account was already deleted
    pub fn delete_account(&self, actor: &Actor, id: &str) -> Result<Decimal, LedgerError> {
        actor.require(Capability::Admin)?;

        let burned = self.ctx.with_accounts("delete", &[id], |set| {
            let account = set.admin(id)?;
            if account.has_earmarks() {
                return Err(LedgerError::AccountNotEmpty {
                    account: id.to_string(),
                });
            }
            let burned = account.balance;
            account.total_withdrawn = add_checked(account.total_withdrawn, burned, "delete", id)?;
            account.balance = Decimal::ZERO;
            account.key_material.iter_mut().for_each(|byte| *byte = 0);
            account.status = AccountStatus::Closed;
            Ok(burned)
        })?;

        info!(account = id, actor = %actor.id, %burned, "account closed");
        Ok(burned)
    }

    /// Add external funds to an account
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` unless `amount > 0`
    /// - `AccountNotFound`, `AccountFrozen`, `AccountFlagged`, `AccountClosed`
    pub fn deposit(&self, id: &str, amount: Decimal) -> Result<(), LedgerError> {
        ensure_positive(amount, "deposit")?;

        self.ctx.with_accounts("deposit", &[id], |set| {
            let account = set.mutable(id)?;
            account.credit(amount, "deposit")?;
            account.total_deposited = add_checked(account.total_deposited, amount, "deposit", id)?;
            Ok(())
        })?;

        debug!(account = id, %amount, "deposit");
        Ok(())
    }

    /// Remove funds from an account
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` unless `amount > 0`
    /// - `InsufficientFunds` if `balance < amount`
    pub fn withdraw(&self, id: &str, amount: Decimal) -> Result<(), LedgerError> {
        ensure_positive(amount, "withdraw")?;

        self.ctx.with_accounts("withdraw", &[id], |set| {
            let account = set.mutable(id)?;
            account.debit(amount, "withdraw")?;
            account.total_withdrawn =
                add_checked(account.total_withdrawn, amount, "withdraw", id)?;
            Ok(())
        })?;

        debug!(account = id, %amount, "withdraw");
        Ok(())
    }

    /// Move funds between two accounts; both writes commit together
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` unless `amount > 0`
    /// - `SameAccount` if `from == to`
    /// - `InsufficientFunds` if `from` cannot cover the amount
    /// - `AccountNotFound` or a status error for either account
    pub fn transfer(&self, from: &str, to: &str, amount: Decimal) -> Result<(), LedgerError> {
        ensure_positive(amount, "transfer")?;
        if from == to {
            return Err(LedgerError::same_account(from, "transfer"));
        }

        self.ctx.with_accounts("transfer", &[from, to], |set| {
            move_funds(set, from, to, amount, "transfer")
        })?;

        debug!(from, to, %amount, "transfer");
        Ok(())
    }

    /// Move funds from `balance` into `held_balance`
    pub fn hold(&self, id: &str, amount: Decimal) -> Result<(), LedgerError> {
        ensure_positive(amount, "hold")?;

        self.ctx.with_accounts("hold", &[id], |set| {
            let account = set.mutable(id)?;
            account.debit(amount, "hold")?;
            account.held_balance = add_checked(account.held_balance, amount, "hold", id)?;
            Ok(())
        })?;

        debug!(account = id, %amount, "hold");
        Ok(())
    }

    /// Move funds from `held_balance` back into `balance`
    ///
    /// # Errors
    ///
    /// - `InsufficientHeld` if `held_balance < amount`
    pub fn release(&self, id: &str, amount: Decimal) -> Result<(), LedgerError> {
        ensure_positive(amount, "release")?;

        self.ctx.with_accounts("release", &[id], |set| {
            let account = set.mutable(id)?;
            if account.held_balance < amount {
                return Err(LedgerError::insufficient_held(
                    id,
                    account.held_balance,
                    amount,
                ));
            }
            account.held_balance -= amount;
            account.credit(amount, "release")
        })?;

        debug!(account = id, %amount, "release");
        Ok(())
    }

    /// Move funds from `balance` into `reserved_balance`
    pub fn reserve(&self, id: &str, amount: Decimal) -> Result<(), LedgerError> {
        ensure_positive(amount, "reserve")?;

        self.ctx.with_accounts("reserve", &[id], |set| {
            let account = set.mutable(id)?;
            account.debit(amount, "reserve")?;
            account.reserved_balance =
                add_checked(account.reserved_balance, amount, "reserve", id)?;
            Ok(())
        })?;

        debug!(account = id, %amount, "reserve");
        Ok(())
    }

    /// Move funds from `reserved_balance` back into `balance`
    ///
    /// # Errors
    ///
    /// - `InsufficientReserved` if `reserved_balance < amount`
    pub fn release_reserve(&self, id: &str, amount: Decimal) -> Result<(), LedgerError> {
        ensure_positive(amount, "unreserve")?;

        self.ctx.with_accounts("unreserve", &[id], |set| {
            let account = set.mutable(id)?;
            if account.reserved_balance < amount {
                return Err(LedgerError::insufficient_reserved(
                    id,
                    account.reserved_balance,
                    amount,
                ));
            }
            account.reserved_balance -= amount;
            account.credit(amount, "unreserve")
        })?;

        debug!(account = id, %amount, "release reserve");
        Ok(())
    }

    pub fn adjust_for_fee(&self, id: &str, delta: Decimal) -> Result<Decimal, LedgerError> {
        self.adjust(Adjustment::Fee, id, delta)
    }

    pub fn adjust_for_reward(&self, id: &str, delta: Decimal) -> Result<Decimal, LedgerError> {
        self.adjust(Adjustment::Reward, id, delta)
    }

    pub fn adjust_for_loss(&self, id: &str, delta: Decimal) -> Result<Decimal, LedgerError> {
        self.adjust(Adjustment::Loss, id, delta)
    }

    /// Apply a signed delta to `balance`, returning the new balance
    ///
    /// Positive deltas count as inflow, negative ones as outflow. The
    /// result must stay non-negative.
    fn adjust(
        &self,
        kind: Adjustment,
        id: &str,
        delta: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let operation = kind.operation();
        if delta.is_zero() {
            return Err(LedgerError::invalid_amount(delta, operation));
        }

        let balance = self.ctx.with_accounts(operation, &[id], |set| {
            let account = set.mutable(id)?;
            if delta.is_sign_negative() {
                let amount = -delta;
                account.debit(amount, operation)?;
                account.total_withdrawn =
                    add_checked(account.total_withdrawn, amount, operation, id)?;
            } else {
                account.credit(delta, operation)?;
                account.total_deposited =
                    add_checked(account.total_deposited, delta, operation, id)?;
            }
            Ok(account.balance)
        })?;

        debug!(account = id, %delta, %balance, operation, "adjusted");
        Ok(balance)
    }

    /// Block every mutation on the account until it is unfrozen
    ///
    /// Supersedes temporary freezes and compliance flags.
    pub fn freeze(&self, actor: &Actor, id: &str) -> Result<(), LedgerError> {
        actor.require_compliance()?;

        self.ctx.with_accounts("freeze", &[id], |set| {
            set.admin(id)?.status = AccountStatus::Frozen;
            Ok(())
        })?;

        info!(account = id, actor = %actor.id, "account frozen");
        self.ctx.sync_consensus(id, SyncEvent::AccountFrozen);
        Ok(())
    }

    /// # Errors
    ///
    /// - `NotFrozen` unless the account is permanently frozen
    pub fn unfreeze(&self, actor: &Actor, id: &str) -> Result<(), LedgerError> {
        actor.require_compliance()?;

        self.ctx.with_accounts("unfreeze", &[id], |set| {
            let account = set.admin(id)?;
            if account.status != AccountStatus::Frozen {
                return Err(LedgerError::NotFrozen {
                    account: id.to_string(),
                });
            }
            account.status = AccountStatus::Active;
            Ok(())
        })?;

        info!(account = id, actor = %actor.id, "account unfrozen");
        self.ctx.sync_consensus(id, SyncEvent::AccountUnfrozen);
        Ok(())
    }

    /// Freeze the account until `now + duration`
    ///
    /// A second temporary freeze replaces the deadline.
    ///
    /// # Errors
    ///
    /// - `InvalidDuration` unless the duration is positive and the deadline
    ///   stays within the calendar range
    /// - `AccountFrozen` if the account is permanently frozen
    /// - `AccountFlagged` while a compliance flag is set
    pub fn temp_freeze(
        &self,
        actor: &Actor,
        id: &str,
        duration: chrono::Duration,
    ) -> Result<chrono::DateTime<chrono::Utc>, LedgerError> {
        actor.require_compliance()?;
        if duration <= chrono::Duration::zero() {
            return Err(LedgerError::InvalidDuration {
                seconds: duration.num_seconds(),
            });
        }

        let until = self.ctx.with_accounts("tempfreeze", &[id], |set| {
            let until = set
                .now()
                .checked_add_signed(duration)
                .ok_or_else(|| LedgerError::invalid_duration(duration.num_seconds()))?;
            let account = set.admin(id)?;
            match account.status {
                AccountStatus::Active | AccountStatus::TemporarilyFrozen { .. } => {}
                AccountStatus::Frozen => {
                    return Err(LedgerError::AccountFrozen {
                        account: id.to_string(),
                    })
                }
                _ => {
                    return Err(LedgerError::AccountFlagged {
                        account: id.to_string(),
                        status: account.status.label().to_string(),
                    })
                }
            }
            account.status = AccountStatus::TemporarilyFrozen { until };
            Ok(until)
        })?;

        info!(account = id, actor = %actor.id, %until, "account temporarily frozen");
        self.ctx.sync_consensus(id, SyncEvent::AccountFrozen);
        Ok(until)
    }

    /// Lift a temporary freeze before its deadline
    ///
    /// # Errors
    ///
    /// - `NotFrozen` unless the account is temporarily frozen
    pub fn temp_unfreeze(&self, actor: &Actor, id: &str) -> Result<(), LedgerError> {
        actor.require_compliance()?;

        self.ctx.with_accounts("tempunfreeze", &[id], |set| {
            let account = set.admin(id)?;
            if !matches!(account.status, AccountStatus::TemporarilyFrozen { .. }) {
                return Err(LedgerError::NotFrozen {
                    account: id.to_string(),
                });
            }
            account.status = AccountStatus::Active;
            Ok(())
        })?;

        info!(account = id, actor = %actor.id, "temporary freeze lifted");
        self.ctx.sync_consensus(id, SyncEvent::AccountUnfrozen);
        Ok(())
    }

    pub fn flag_suspicious(&self, actor: &Actor, id: &str) -> Result<(), LedgerError> {
        self.set_flag(actor, id, AccountStatus::Suspicious)
    }

    pub fn flag_for_review(&self, actor: &Actor, id: &str) -> Result<(), LedgerError> {
        self.set_flag(actor, id, AccountStatus::UnderReview)
    }

    fn set_flag(&self, actor: &Actor, id: &str, flag: AccountStatus) -> Result<(), LedgerError> {
        actor.require_compliance()?;
        let label = flag.label();

        self.ctx.with_accounts("flag", &[id], |set| {
            let now = set.now();
            let account = set.admin(id)?;
            if account.is_frozen(now) {
                return Err(LedgerError::AccountFrozen {
                    account: id.to_string(),
                });
            }
            account.status = flag;
            Ok(())
        })?;

        info!(account = id, actor = %actor.id, status = label, "account flagged");
        Ok(())
    }

    /// # Errors
    ///
    /// - `NotFlagged` unless the account is suspicious or under review
    pub fn clear_flags(&self, actor: &Actor, id: &str) -> Result<(), LedgerError> {
        actor.require_compliance()?;

        self.ctx.with_accounts("clear", &[id], |set| {
            let account = set.admin(id)?;
            if !matches!(
                account.status,
                AccountStatus::Suspicious | AccountStatus::UnderReview
            ) {
                return Err(LedgerError::NotFlagged {
                    account: id.to_string(),
                });
            }
            account.status = AccountStatus::Active;
            Ok(())
        })?;

        info!(account = id, actor = %actor.id, "flags cleared");
        Ok(())
    }

    /// Move the whole spendable balance of `from` into `to`
    ///
    /// # Returns
    ///
    /// The amount moved
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `from` has nothing to move
    pub fn merge(&self, from: &str, to: &str) -> Result<Decimal, LedgerError> {
        if from == to {
            return Err(LedgerError::same_account(from, "merge"));
        }

        let amount = self.ctx.with_accounts("merge", &[from, to], |set| {
            let amount = set.mutable(from)?.balance;
            ensure_positive(amount, "merge")?;
            move_funds(set, from, to, amount, "merge")?;
            Ok(amount)
        })?;

        debug!(from, to, %amount, "merge");
        Ok(amount)
    }

    /// Gather amounts from several sources into one account
    pub fn rollup(
        &self,
        sources: &[(AccountId, Decimal)],
        to: &str,
    ) -> Result<Decimal, LedgerError> {
        let legs = sources
            .iter()
            .map(|(from, amount)| TransferRequest::new(from.clone(), to, *amount))
            .collect();
        self.bulk_move("rollup", legs)
    }

    /// Spread amounts from one account over several destinations
    pub fn split(
        &self,
        from: &str,
        legs: &[(AccountId, Decimal)],
    ) -> Result<Decimal, LedgerError> {
        let legs = legs
            .iter()
            .map(|(to, amount)| TransferRequest::new(from, to.clone(), *amount))
            .collect();
        self.bulk_move("split", legs)
    }

    /// Apply several transfers after checking each source covers its total
    fn bulk_move(
        &self,
        operation: &'static str,
        legs: Vec<TransferRequest>,
    ) -> Result<Decimal, LedgerError> {
        if legs.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }

        let mut debits: BTreeMap<&str, Decimal> = BTreeMap::new();
        for leg in &legs {
            ensure_positive(leg.amount, operation)?;
            if leg.from == leg.to {
                return Err(LedgerError::same_account(&leg.from, operation));
            }
            let total = debits.entry(leg.from.as_str()).or_insert(Decimal::ZERO);
            *total = add_checked(*total, leg.amount, operation, &leg.from)?;
        }
        let moved = debits
            .values()
            .try_fold(Decimal::ZERO, |sum, amount| sum.checked_add(*amount))
            .ok_or_else(|| LedgerError::arithmetic_overflow(operation, &legs[0].from))?;

        let ids: Vec<&str> = legs
            .iter()
            .flat_map(|leg| [leg.from.as_str(), leg.to.as_str()])
            .collect();

        self.ctx.with_accounts(operation, &ids, |set| {
            for (from, requested) in &debits {
                let account = set.check(from)?;
                if account.balance < *requested {
                    return Err(LedgerError::insufficient_funds(
                        from,
                        account.balance,
                        *requested,
                    ));
                }
            }
            for leg in &legs {
                move_funds(set, &leg.from, &leg.to, leg.amount, operation)?;
            }
            Ok(())
        })?;

        debug!(operation, legs = legs.len(), %moved, "bulk move");
        Ok(moved)
    }

    /// Add to the account's arbitrary-precision trust balance
    ///
    /// The trust record is created on first deposit. Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `InvalidTrustAmount` unless `amount > 0`
    /// - status errors from the owning account
    pub fn deposit_trust(&self, id: &str, amount: &BigInt) -> Result<BigInt, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidTrustAmount {
                amount: amount.clone(),
            });
        }

        let store = self.ctx.store();
        let balance = self.ctx.with_accounts("deposit_trust", &[id], |set| {
            set.check(id)?;
            let now = set.now();
            let mut trust = match store.get_trust_account(id) {
                Ok(trust) => trust,
                Err(LedgerError::AccountNotFound { .. }) => TrustAccount::new(id, now),
                Err(e) => return Err(e),
            };
            trust.balance += amount;
            trust.last_updated = now;
            let balance = trust.balance.clone();
            store.update_trust_account(trust)?;
            Ok(balance)
        })?;

        debug!(account = id, %amount, %balance, "trust deposit");
        Ok(balance)
    }

    /// Remove from the account's trust balance, returning the new balance
    ///
    /// # Errors
    ///
    /// - `InvalidTrustAmount` unless `amount > 0`
    /// - `InsufficientTrustFunds` if the trust balance cannot cover it
    pub fn withdraw_trust(&self, id: &str, amount: &BigInt) -> Result<BigInt, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidTrustAmount {
                amount: amount.clone(),
            });
        }

        let store = self.ctx.store();
        let balance = self.ctx.with_accounts("withdraw_trust", &[id], |set| {
            set.check(id)?;
            let now = set.now();
            let mut trust = match store.get_trust_account(id) {
                Ok(trust) => trust,
                Err(LedgerError::AccountNotFound { .. }) => TrustAccount::new(id, now),
                Err(e) => return Err(e),
            };
            if &trust.balance < amount {
                return Err(LedgerError::InsufficientTrustFunds {
                    account: id.to_string(),
                    available: trust.balance,
                    requested: amount.clone(),
                });
            }
            trust.balance -= amount;
            trust.last_updated = now;
            let balance = trust.balance.clone();
            store.update_trust_account(trust)?;
            Ok(balance)
        })?;

        debug!(account = id, %amount, %balance, "trust withdrawal");
        Ok(balance)
    }

    /// Current trust balance; zero when no trust record exists yet
    pub fn trust_balance(&self, id: &str) -> Result<BigInt, LedgerError> {
        match self.ctx.store().get_trust_account(id) {
            Ok(trust) => Ok(trust.balance),
            Err(LedgerError::AccountNotFound { .. }) => {
                self.ctx.store().get_account(id)?;
                Ok(BigInt::zero())
            }
            Err(e) => Err(e),
        }
    }

    /// Append-only balance history, oldest first
    pub fn balance_history(&self, id: &str) -> Vec<BalanceSnapshot> {
        self.ctx.store().balance_history(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::{Clock, ManualClock};
    use crate::core::test_support::{actor, funded, ledger_context};
    use crate::types::ErrorKind;
    use chrono::Duration;

    fn mutator() -> (BalanceMutator, Arc<ManualClock>) {
        let (ctx, clock) = ledger_context();
        (BalanceMutator::new(ctx), clock)
    }

    fn balance(mutator: &BalanceMutator, id: &str) -> Decimal {
        mutator.ctx.store().get_account(id).unwrap().balance
    }

    #[test]
    fn test_create_account_requires_admin() {
        let (mutator, _) = mutator();

        let err = mutator
            .create_account(&Actor::user("alice"), "ACC001", b"key")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);

        let account = mutator.create_account(&actor(), "ACC001", b"key").unwrap();
        assert_eq!(account.key_material, b"key".to_vec());
        assert_eq!(account.status, AccountStatus::Active);
    }

    #[test]
    fn test_create_account_rejects_duplicates_and_bad_ids() {
        let (mutator, _) = mutator();
        mutator.create_account(&actor(), "ACC001", b"").unwrap();

        let err = mutator.create_account(&actor(), "ACC001", b"").unwrap_err();
        assert!(matches!(err, LedgerError::AccountExists { .. }));

        let err = mutator.create_account(&actor(), "", b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_deposit_then_withdraw_is_a_no_op() {
        let (mutator, _) = mutator();
        funded(&mutator, "ACC001", Decimal::new(100, 0));

        mutator.deposit("ACC001", Decimal::new(255, 1)).unwrap();
        mutator.withdraw("ACC001", Decimal::new(255, 1)).unwrap();

        let account = mutator.ctx.store().get_account("ACC001").unwrap();
        assert_eq!(account.balance, Decimal::new(100, 0));
        assert_eq!(account.total_deposited, Decimal::new(1255, 1));
        assert_eq!(account.total_withdrawn, Decimal::new(255, 1));
    }

    #[test]
    fn test_withdraw_insufficient_funds_leaves_balance() {
        let (mutator, _) = mutator();
        funded(&mutator, "ACC001", Decimal::new(100, 0));

        mutator.withdraw("ACC001", Decimal::new(50, 0)).unwrap();
        let err = mutator.withdraw("ACC001", Decimal::new(60, 0)).unwrap_err();

        assert_eq!(
            err,
            LedgerError::insufficient_funds("ACC001", Decimal::new(50, 0), Decimal::new(60, 0))
        );
        assert_eq!(balance(&mutator, "ACC001"), Decimal::new(50, 0));
    }

    #[test]
    fn test_non_positive_amounts_are_rejected() {
        let (mutator, _) = mutator();
        funded(&mutator, "ACC001", Decimal::new(10, 0));

        for amount in [Decimal::ZERO, Decimal::new(-5, 0)] {
            assert!(matches!(
                mutator.deposit("ACC001", amount),
                Err(LedgerError::InvalidAmount { .. })
            ));
            assert!(matches!(
                mutator.hold("ACC001", amount),
                Err(LedgerError::InvalidAmount { .. })
            ));
        }
    }

    #[test]
    fn test_deposit_to_missing_account_fails() {
        let (mutator, _) = mutator();
        let err = mutator.deposit("NOPE", Decimal::ONE).unwrap_err();
        assert_eq!(err, LedgerError::account_not_found("NOPE"));
    }

    #[test]
    fn test_transfer_conserves_pair_total() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(100, 0));
        funded(&mutator, "B", Decimal::new(5, 0));

        mutator.transfer("A", "B", Decimal::new(30, 0)).unwrap();

        assert_eq!(balance(&mutator, "A"), Decimal::new(70, 0));
        assert_eq!(balance(&mutator, "B"), Decimal::new(35, 0));
    }

    #[test]
    fn test_transfer_to_frozen_account_changes_nothing() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(100, 0));
        funded(&mutator, "B", Decimal::ZERO);
        mutator.freeze(&actor(), "B").unwrap();

        let err = mutator.transfer("A", "B", Decimal::new(30, 0)).unwrap_err();

        assert!(matches!(err, LedgerError::AccountFrozen { .. }));
        assert_eq!(balance(&mutator, "A"), Decimal::new(100, 0));
    }

    #[test]
    fn test_transfer_to_self_is_rejected() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(100, 0));
        let err = mutator.transfer("A", "A", Decimal::ONE).unwrap_err();
        assert!(matches!(err, LedgerError::SameAccount { .. }));
    }

    #[test]
    fn test_hold_then_release_restores_buckets() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(100, 0));

        mutator.hold("A", Decimal::new(40, 0)).unwrap();
        let held = mutator.ctx.store().get_account("A").unwrap();
        assert_eq!(held.balance, Decimal::new(60, 0));
        assert_eq!(held.held_balance, Decimal::new(40, 0));

        mutator.release("A", Decimal::new(40, 0)).unwrap();
        let released = mutator.ctx.store().get_account("A").unwrap();
        assert_eq!(released.balance, Decimal::new(100, 0));
        assert_eq!(released.held_balance, Decimal::ZERO);
    }

    #[test]
    fn test_release_more_than_held_fails() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(100, 0));
        mutator.hold("A", Decimal::new(10, 0)).unwrap();

        let err = mutator.release("A", Decimal::new(11, 0)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientHeld { .. }));
    }

    #[test]
    fn test_reserve_is_separate_from_held() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(100, 0));

        mutator.hold("A", Decimal::new(10, 0)).unwrap();
        mutator.reserve("A", Decimal::new(20, 0)).unwrap();

        let err = mutator.release_reserve("A", Decimal::new(25, 0)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientReserved { .. }));

        mutator.release_reserve("A", Decimal::new(20, 0)).unwrap();
        let account = mutator.ctx.store().get_account("A").unwrap();
        assert_eq!(account.balance, Decimal::new(90, 0));
        assert_eq!(account.held_balance, Decimal::new(10, 0));
        assert_eq!(account.reserved_balance, Decimal::ZERO);
    }

    #[test]
    fn test_signed_adjustments() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(10, 0));

        assert_eq!(
            mutator.adjust_for_fee("A", Decimal::new(-3, 0)).unwrap(),
            Decimal::new(7, 0)
        );
        assert_eq!(
            mutator.adjust_for_reward("A", Decimal::new(5, 0)).unwrap(),
            Decimal::new(12, 0)
        );
        assert!(matches!(
            mutator.adjust_for_loss("A", Decimal::new(-13, 0)),
            Err(LedgerError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            mutator.adjust_for_fee("A", Decimal::ZERO),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert_eq!(balance(&mutator, "A"), Decimal::new(12, 0));
    }

    #[test]
    fn test_freeze_blocks_every_mutation_until_unfrozen() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(100, 0));
        mutator.freeze(&actor(), "A").unwrap();

        assert!(mutator.deposit("A", Decimal::ONE).is_err());
        assert!(mutator.withdraw("A", Decimal::ONE).is_err());
        assert!(mutator.hold("A", Decimal::ONE).is_err());
        assert!(mutator.reserve("A", Decimal::ONE).is_err());
        assert!(mutator.adjust_for_reward("A", Decimal::ONE).is_err());

        mutator.unfreeze(&actor(), "A").unwrap();
        mutator.deposit("A", Decimal::ONE).unwrap();
        assert_eq!(balance(&mutator, "A"), Decimal::new(101, 0));
    }

    #[test]
    fn test_unfreeze_active_account_is_state_conflict() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::ZERO);

        let err = mutator.unfreeze(&actor(), "A").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[test]
    fn test_freeze_requires_compliance() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::ZERO);

        let err = mutator.freeze(&Actor::user("alice"), "A").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[test]
    fn test_temp_freeze_expires_with_the_clock() {
        let (mutator, clock) = mutator();
        funded(&mutator, "A", Decimal::new(10, 0));

        mutator
            .temp_freeze(&actor(), "A", Duration::minutes(10))
            .unwrap();
        assert!(matches!(
            mutator.withdraw("A", Decimal::ONE),
            Err(LedgerError::AccountFrozen { .. })
        ));

        clock.advance(Duration::minutes(10)).unwrap();
        mutator.withdraw("A", Decimal::ONE).unwrap();

        let account = mutator.ctx.store().get_account("A").unwrap();
        assert_eq!(account.status, AccountStatus::Active);
    }

    #[test]
    fn test_temp_unfreeze_lifts_freeze_early() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(10, 0));

        assert!(matches!(
            mutator.temp_unfreeze(&actor(), "A"),
            Err(LedgerError::NotFrozen { .. })
        ));
        assert!(matches!(
            mutator.temp_freeze(&actor(), "A", Duration::zero()),
            Err(LedgerError::InvalidDuration { seconds: 0 })
        ));

        mutator
            .temp_freeze(&actor(), "A", Duration::hours(1))
            .unwrap();
        mutator.temp_unfreeze(&actor(), "A").unwrap();
        mutator.withdraw("A", Decimal::ONE).unwrap();
    }

    #[test]
    fn test_flags_block_and_clear() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(10, 0));

        mutator.flag_for_review(&actor(), "A").unwrap();
        let err = mutator.deposit("A", Decimal::ONE).unwrap_err();
        assert_eq!(
            err,
            LedgerError::AccountFlagged {
                account: "A".to_string(),
                status: "under_review".to_string()
            }
        );

        mutator.clear_flags(&actor(), "A").unwrap();
        assert!(matches!(
            mutator.clear_flags(&actor(), "A"),
            Err(LedgerError::NotFlagged { .. })
        ));
        mutator.deposit("A", Decimal::ONE).unwrap();
    }

    #[test]
    fn test_flag_on_frozen_account_is_rejected() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::ZERO);
        mutator.freeze(&actor(), "A").unwrap();

        assert!(matches!(
            mutator.flag_suspicious(&actor(), "A"),
            Err(LedgerError::AccountFrozen { .. })
        ));
    }

    #[test]
    fn test_delete_account_burns_balance_and_wipes_keys() {
        let (mutator, _) = mutator();
        mutator.create_account(&actor(), "A", b"secret").unwrap();
        mutator.deposit("A", Decimal::new(25, 0)).unwrap();

        let burned = mutator.delete_account(&actor(), "A").unwrap();

        assert_eq!(burned, Decimal::new(25, 0));
        let account = mutator.ctx.store().get_account("A").unwrap();
        assert_eq!(account.status, AccountStatus::Closed);
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.key_material, vec![0; 6]);
        assert!(matches!(
            mutator.deposit("A", Decimal::ONE),
            Err(LedgerError::AccountClosed { .. })
        ));
        assert!(matches!(
            mutator.delete_account(&actor(), "A"),
            Err(LedgerError::AccountClosed { .. })
        ));
    }

    #[test]
    fn test_delete_account_with_earmarks_is_refused() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(10, 0));
        mutator.reserve("A", Decimal::new(1, 0)).unwrap();

        let err = mutator.delete_account(&actor(), "A").unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotEmpty { .. }));
    }

    #[test]
    fn test_merge_moves_whole_balance() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(42, 0));
        funded(&mutator, "B", Decimal::new(8, 0));

        assert_eq!(mutator.merge("A", "B").unwrap(), Decimal::new(42, 0));
        assert_eq!(balance(&mutator, "A"), Decimal::ZERO);
        assert_eq!(balance(&mutator, "B"), Decimal::new(50, 0));

        assert!(matches!(
            mutator.merge("A", "B"),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_split_pre_validates_aggregate() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(50, 0));
        funded(&mutator, "B", Decimal::ZERO);
        funded(&mutator, "C", Decimal::ZERO);

        let legs = vec![
            ("B".to_string(), Decimal::new(30, 0)),
            ("C".to_string(), Decimal::new(30, 0)),
        ];
        let err = mutator.split("A", &legs).unwrap_err();

        assert_eq!(
            err,
            LedgerError::insufficient_funds("A", Decimal::new(50, 0), Decimal::new(60, 0))
        );
        assert_eq!(balance(&mutator, "A"), Decimal::new(50, 0));
        assert_eq!(balance(&mutator, "B"), Decimal::ZERO);
    }

    #[test]
    fn test_rollup_gathers_sources() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(10, 0));
        funded(&mutator, "B", Decimal::new(20, 0));
        funded(&mutator, "T", Decimal::ZERO);

        let sources = vec![
            ("A".to_string(), Decimal::new(10, 0)),
            ("B".to_string(), Decimal::new(15, 0)),
        ];
        assert_eq!(mutator.rollup(&sources, "T").unwrap(), Decimal::new(25, 0));
        assert_eq!(balance(&mutator, "T"), Decimal::new(25, 0));
        assert_eq!(balance(&mutator, "B"), Decimal::new(5, 0));
    }

    #[test]
    fn test_trust_balance_round_trip() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::ZERO);
        let big: BigInt = "123456789012345678901234567890".parse().unwrap();

        assert_eq!(mutator.trust_balance("A").unwrap(), BigInt::zero());
        assert_eq!(mutator.deposit_trust("A", &big).unwrap(), big);

        let err = mutator
            .withdraw_trust("A", &(big.clone() + 1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientTrustFunds { .. }));

        assert_eq!(mutator.withdraw_trust("A", &big).unwrap(), BigInt::zero());
        assert!(matches!(
            mutator.deposit_trust("A", &BigInt::zero()),
            Err(LedgerError::InvalidTrustAmount { .. })
        ));
    }

    #[test]
    fn test_history_records_each_commit() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::new(10, 0));
        mutator.withdraw("A", Decimal::new(4, 0)).unwrap();

        let balances: Vec<Decimal> = mutator
            .balance_history("A")
            .into_iter()
            .map(|snapshot| snapshot.balance)
            .collect();
        assert_eq!(
            balances,
            vec![Decimal::ZERO, Decimal::new(10, 0), Decimal::new(6, 0)]
        );
    }

    #[test]
    fn test_history_follows_commit_order_under_contention() {
        let (mutator, _) = mutator();
        funded(&mutator, "A", Decimal::ZERO);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        mutator.deposit("A", Decimal::ONE).unwrap();
                    }
                });
            }
        });

        let balances: Vec<Decimal> = mutator
            .balance_history("A")
            .into_iter()
            .map(|snapshot| snapshot.balance)
            .collect();
        let expected: Vec<Decimal> = (0..=400).map(Decimal::from).collect();
        assert_eq!(balances, expected);
    }
}
