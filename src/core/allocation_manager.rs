//! Purpose-bound allocations
//!
//! Allocating debits `balance` and records an [`Allocation`] with
//! `allocated = true`. Redeeming flips the flag to `false` and credits the
//! amount back. The flag only ever moves once, which is what makes double
//! redemption detectable.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use super::balance_mutator::ensure_positive;
use super::context::LedgerContext;
use crate::types::{Allocation, LedgerError};

#[derive(Clone)]
pub struct AllocationManager {
    ctx: Arc<LedgerContext>,
}

impl AllocationManager {
    pub fn new(ctx: Arc<LedgerContext>) -> Self {
        Self { ctx }
    }

    /// Earmark `amount` of the account's balance for `purpose`
    ///
    /// `expires_at` is recorded for callers that sweep stale allocations; it
    /// does not block redemption.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` unless `amount > 0`
    /// - `MissingField` for an empty purpose
    /// - `InvalidExpiry` if `expires_at` is not in the future
    /// - `InsufficientFunds` if the balance cannot cover the amount
    pub fn allocate(
        &self,
        id: &str,
        amount: Decimal,
        purpose: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Allocation, LedgerError> {
        ensure_positive(amount, "allocate")?;
        if purpose.trim().is_empty() {
            return Err(LedgerError::missing_field("allocate", "purpose"));
        }

        let ctx = &self.ctx;
        let allocation = ctx.with_accounts("allocate", &[id], |set| {
            let now = set.now();
            if let Some(expires_at) = expires_at.filter(|expires_at| *expires_at <= now) {
                return Err(LedgerError::InvalidExpiry { expires_at, now });
            }

            let account = set.mutable(id)?;
            account.debit(amount, "allocate")?;
            let allocation = Allocation {
                id: ctx.next_id("alloc"),
                account_id: id.to_string(),
                resource_type: purpose.to_string(),
                amount,
                allocated_at: now,
                expires_at,
                allocated: true,
                redeemed_at: None,
            };
            account.allocations.push(allocation.clone());
            Ok(allocation)
        })?;

        debug!(account = id, allocation = %allocation.id, %amount, purpose, "allocated");
        Ok(allocation)
    }

    /// Return an active allocation's amount to the balance
    ///
    /// # Returns
    ///
    /// The redeemed amount
    ///
    /// # Errors
    ///
    /// - `AllocationNotFoundOrRedeemed` if no active allocation has that ID
    pub fn redeem(&self, id: &str, allocation_id: &str) -> Result<Decimal, LedgerError> {
        let amount = self.ctx.with_accounts("redeem", &[id], |set| {
            let now = set.now();
            let account = set.mutable(id)?;
            let allocation = account
                .allocations
                .iter_mut()
                .find(|allocation| allocation.id == allocation_id && allocation.allocated)
                .ok_or_else(|| LedgerError::AllocationNotFoundOrRedeemed {
                    account: id.to_string(),
                    allocation: allocation_id.to_string(),
                })?;
            allocation.allocated = false;
            allocation.redeemed_at = Some(now);
            let amount = allocation.amount;

            account.credit(amount, "redeem")?;
            Ok(amount)
        })?;

        debug!(account = id, allocation = allocation_id, %amount, "redeemed");
        Ok(amount)
    }

    /// Every allocation on the account, redeemed ones included
    pub fn allocations(&self, id: &str) -> Result<Vec<Allocation>, LedgerError> {
        Ok(self.ctx.store().get_account(id)?.allocations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::balance_mutator::BalanceMutator;
    use crate::core::clock::Clock;
    use crate::core::test_support::{funded, ledger_context};
    use crate::types::ErrorKind;
    use chrono::Duration;

    fn setup() -> (AllocationManager, BalanceMutator) {
        let (ctx, _) = ledger_context();
        let mutator = BalanceMutator::new(Arc::clone(&ctx));
        funded(&mutator, "ACC001", Decimal::new(50, 0));
        (AllocationManager::new(ctx), mutator)
    }

    fn balance(manager: &AllocationManager) -> Decimal {
        manager.ctx.store().get_account("ACC001").unwrap().balance
    }

    #[test]
    fn test_allocate_then_redeem_exactly_once() {
        let (manager, _) = setup();

        let allocation = manager
            .allocate("ACC001", Decimal::new(30, 0), "grant", None)
            .unwrap();
        assert_eq!(allocation.id, "alloc-1");
        assert!(allocation.allocated);
        assert_eq!(balance(&manager), Decimal::new(20, 0));

        assert_eq!(
            manager.redeem("ACC001", &allocation.id).unwrap(),
            Decimal::new(30, 0)
        );
        assert_eq!(balance(&manager), Decimal::new(50, 0));

        let err = manager.redeem("ACC001", &allocation.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(balance(&manager), Decimal::new(50, 0));

        let stored = manager.allocations("ACC001").unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].allocated);
        assert!(stored[0].redeemed_at.is_some());
    }

    #[test]
    fn test_redeem_unknown_allocation() {
        let (manager, _) = setup();
        let err = manager.redeem("ACC001", "alloc-9").unwrap_err();
        assert!(matches!(
            err,
            LedgerError::AllocationNotFoundOrRedeemed { .. }
        ));
    }

    #[test]
    fn test_allocate_validates_inputs() {
        let (manager, _) = setup();
        let now = manager.ctx.clock().now();

        assert!(matches!(
            manager.allocate("ACC001", Decimal::new(60, 0), "grant", None),
            Err(LedgerError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            manager.allocate("ACC001", Decimal::ONE, "  ", None),
            Err(LedgerError::MissingField { .. })
        ));
        assert!(matches!(
            manager.allocate("ACC001", Decimal::ONE, "grant", Some(now)),
            Err(LedgerError::InvalidExpiry { .. })
        ));
        assert_eq!(balance(&manager), Decimal::new(50, 0));

        let allocation = manager
            .allocate("ACC001", Decimal::ONE, "compute", Some(now + Duration::days(1)))
            .unwrap();
        assert_eq!(allocation.expires_at, Some(now + Duration::days(1)));
    }

    #[test]
    fn test_redeem_on_frozen_account_is_blocked() {
        let (manager, mutator) = setup();
        let allocation = manager
            .allocate("ACC001", Decimal::new(10, 0), "grant", None)
            .unwrap();
        mutator
            .freeze(&crate::core::test_support::actor(), "ACC001")
            .unwrap();

        let err = manager.redeem("ACC001", &allocation.id).unwrap_err();
        assert!(matches!(err, LedgerError::AccountFrozen { .. }));

        let stored = manager.allocations("ACC001").unwrap();
        assert!(stored[0].allocated);
    }
}
