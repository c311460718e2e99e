//! All-or-nothing transfer batches
//!
//! A batch runs in two phases:
//!
//! 1. **Validate**: every leg is checked on its own (account IDs, positive
//!    amount, distinct endpoints) before any lock is taken.
//! 2. **Apply**: every account the batch names is locked at once, and the
//!    legs are applied in order to working copies. Each leg sees the effect
//!    of the legs before it, so a source that is drained by leg 0 fails
//!    leg 1. Only when every leg succeeds are the copies committed.
//!
//! Either way, the first failure is reported as `BatchFailed { index, .. }`
//! and the store is left exactly as it was.

use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use super::balance_mutator::{ensure_positive, move_funds};
use super::context::LedgerContext;
use crate::types::{validate_account_id, AccountId, LedgerError, TransferRequest};

/// Summary of a committed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReceipt {
    pub legs: usize,
    pub total_amount: Decimal,
    /// Every account the batch touched, sorted
    pub accounts: Vec<AccountId>,
}

#[derive(Clone)]
pub struct BatchCoordinator {
    ctx: Arc<LedgerContext>,
}

impl BatchCoordinator {
    pub fn new(ctx: Arc<LedgerContext>) -> Self {
        Self { ctx }
    }

    /// Apply every transfer, or none of them
    ///
    /// # Errors
    ///
    /// - `EmptyBatch` / `BatchTooLarge` for the batch as a whole
    /// - `BatchFailed` wrapping the first failing leg's error
    pub fn process_batch(
        &self,
        transfers: &[TransferRequest],
    ) -> Result<BatchReceipt, LedgerError> {
        if transfers.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        let max = self.ctx.config().max_batch_legs;
        if transfers.len() > max {
            return Err(LedgerError::BatchTooLarge {
                legs: transfers.len(),
                max,
            });
        }

        let mut total_amount = Decimal::ZERO;
        for (index, leg) in transfers.iter().enumerate() {
            Self::validate_leg(leg).map_err(|e| LedgerError::batch_failed(index, e))?;
            total_amount = total_amount.checked_add(leg.amount).ok_or_else(|| {
                let overflow = LedgerError::arithmetic_overflow("batch", &leg.from);
                LedgerError::batch_failed(index, overflow)
            })?;
        }

        let accounts: BTreeSet<&str> = transfers
            .iter()
            .flat_map(|leg| [leg.from.as_str(), leg.to.as_str()])
            .collect();
        let ids: Vec<&str> = accounts.iter().copied().collect();

        self.ctx.with_accounts("batch", &ids, |set| {
            for (index, leg) in transfers.iter().enumerate() {
                move_funds(set, &leg.from, &leg.to, leg.amount, "batch")
                    .map_err(|e| LedgerError::batch_failed(index, e))?;
            }
            Ok(())
        })?;

        debug!(legs = transfers.len(), %total_amount, "batch committed");
        Ok(BatchReceipt {
            legs: transfers.len(),
            total_amount,
            accounts: ids.into_iter().map(str::to_string).collect(),
        })
    }

    fn validate_leg(leg: &TransferRequest) -> Result<(), LedgerError> {
        validate_account_id(&leg.from)?;
        validate_account_id(&leg.to)?;
        ensure_positive(leg.amount, "batch")?;
        if leg.from == leg.to {
            return Err(LedgerError::same_account(&leg.from, "batch"));
        }
        Ok(())
    }
}
