//! Ledger engine
//!
//! This module provides the `LedgerEngine`, a facade over the five ledger
//! components sharing one [`LedgerContext`]. It is what callers hold: the
//! components are reachable through accessors, and [`LedgerEngine::process`]
//! routes a parsed [`LedgerCommand`] to the component that owns it.
//!
//! The engine is cheap to clone; clones share the store, locks and clock,
//! which is how the async strategy hands it to worker tasks.

use chrono::Duration;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::allocation_manager::AllocationManager;
use super::balance_mutator::BalanceMutator;
use super::batch_coordinator::BatchCoordinator;
use super::context::LedgerContext;
use super::lock_manager::LockManager;
use super::transaction_finalizer::TransactionFinalizer;
use crate::store::MemoryStore;
use crate::types::{Account, AccountStatus, Actor, LedgerCommand, LedgerError};

#[derive(Clone)]
pub struct LedgerEngine {
    ctx: Arc<LedgerContext>,
    balances: BalanceMutator,
    locks: LockManager,
    allocations: AllocationManager,
    transactions: TransactionFinalizer,
    batches: BatchCoordinator,
    actor: Actor,
}

impl LedgerEngine {
    /// Build an engine over a configured context
    ///
    /// Commands passed to [`process`](Self::process) run as `actor`.
    pub fn new(ctx: LedgerContext, actor: Actor) -> Self {
        let ctx = Arc::new(ctx);
        LedgerEngine {
            balances: BalanceMutator::new(Arc::clone(&ctx)),
            locks: LockManager::new(Arc::clone(&ctx)),
            allocations: AllocationManager::new(Arc::clone(&ctx)),
            transactions: TransactionFinalizer::new(Arc::clone(&ctx)),
            batches: BatchCoordinator::new(Arc::clone(&ctx)),
            ctx,
            actor,
        }
    }

    /// Engine over an empty [`MemoryStore`] with default collaborators
    pub fn in_memory() -> Self {
        Self::new(
            LedgerContext::new(Arc::new(MemoryStore::new())),
            Actor::operator("operator"),
        )
    }

    pub fn context(&self) -> &LedgerContext {
        &self.ctx
    }

    pub fn balances(&self) -> &BalanceMutator {
        &self.balances
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn allocations(&self) -> &AllocationManager {
        &self.allocations
    }

    pub fn transactions(&self) -> &TransactionFinalizer {
        &self.transactions
    }

    pub fn batches(&self) -> &BatchCoordinator {
        &self.batches
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Process a single command
    ///
    /// Routes the command to the component that owns the operation. Time
    /// offsets in the command (lock maturity, freeze length) are relative
    /// to the engine clock at the moment of processing.
    ///
    /// # Errors
    ///
    /// Whatever the owning component returns; the ledger is unchanged on error.
    pub fn process(&self, command: &LedgerCommand) -> Result<(), LedgerError> {
        let actor = &self.actor;
        match command {
            LedgerCommand::Create { account } => {
                self.balances.create_account(actor, account, &[])?;
            }
            LedgerCommand::Delete { account } => {
                self.balances.delete_account(actor, account)?;
            }
            LedgerCommand::Deposit { account, amount } => {
                self.balances.deposit(account, *amount)?;
            }
            LedgerCommand::Withdraw { account, amount } => {
                self.balances.withdraw(account, *amount)?;
            }
            LedgerCommand::Transfer { from, to, amount } => {
                self.balances.transfer(from, to, *amount)?;
            }
            LedgerCommand::Hold { account, amount } => {
                self.balances.hold(account, *amount)?;
            }
            LedgerCommand::Release { account, amount } => {
                self.balances.release(account, *amount)?;
            }
            LedgerCommand::Reserve { account, amount } => {
                self.balances.reserve(account, *amount)?;
            }
            LedgerCommand::Unreserve { account, amount } => {
                self.balances.release_reserve(account, *amount)?;
            }
            LedgerCommand::Fee { account, delta } => {
                self.balances.adjust_for_fee(account, *delta)?;
            }
            LedgerCommand::Reward { account, delta } => {
                self.balances.adjust_for_reward(account, *delta)?;
            }
            LedgerCommand::Loss { account, delta } => {
                self.balances.adjust_for_loss(account, *delta)?;
            }
            LedgerCommand::Freeze { account } => self.balances.freeze(actor, account)?,
            LedgerCommand::Unfreeze { account } => self.balances.unfreeze(actor, account)?,
            LedgerCommand::TempFreeze { account, seconds } => {
                self.balances
                    .temp_freeze(actor, account, seconds_to_duration(*seconds)?)?;
            }
            LedgerCommand::TempUnfreeze { account } => {
                self.balances.temp_unfreeze(actor, account)?;
            }
            LedgerCommand::FlagSuspicious { account } => {
                self.balances.flag_suspicious(actor, account)?;
            }
            LedgerCommand::FlagForReview { account } => {
                self.balances.flag_for_review(actor, account)?;
            }
            LedgerCommand::ClearFlags { account } => self.balances.clear_flags(actor, account)?,
            LedgerCommand::Merge { from, to } => {
                self.balances.merge(from, to)?;
            }
            LedgerCommand::Lock {
                from,
                to,
                amount,
                seconds,
            } => {
                let unlock_at = self
                    .ctx
                    .now()
                    .checked_add_signed(seconds_to_duration(*seconds)?)
                    .ok_or_else(|| LedgerError::invalid_duration(*seconds))?;
                self.locks.create_lock(from, to, *amount, unlock_at)?;
            }
            LedgerCommand::Unlock { holder, to, lock } => {
                self.locks.release_lock(holder, lock, to)?;
            }
            LedgerCommand::Allocate {
                account,
                amount,
                purpose,
            } => {
                self.allocations.allocate(account, *amount, purpose, None)?;
            }
            LedgerCommand::Redeem {
                account,
                allocation,
            } => {
                self.allocations.redeem(account, allocation)?;
            }
            LedgerCommand::Submit { from, to, amount } => {
                self.transactions.submit(from, to, *amount)?;
            }
            LedgerCommand::Finalize { tx } => {
                self.transactions.finalize(tx)?;
            }
            LedgerCommand::Refund { tx } => {
                self.transactions.request_refund(tx)?;
            }
            LedgerCommand::Rollback { tx } => {
                self.transactions.rollback(tx)?;
            }
            LedgerCommand::Batch { transfers, .. } => {
                self.batches.process_batch(transfers)?;
            }
            LedgerCommand::Advance { seconds } => {
                self.advance_clock(seconds_to_duration(*seconds)?)?;
            }
        }
        Ok(())
    }

    /// Move the engine clock forward (manual clocks only)
    pub fn advance_clock(&self, by: Duration) -> Result<(), LedgerError> {
        if by <= Duration::zero() {
            return Err(LedgerError::InvalidDuration {
                seconds: by.num_seconds(),
            });
        }
        self.ctx.clock().advance(by)
    }

    /// Get all accounts sorted by ID
    pub fn accounts(&self) -> Vec<Account> {
        self.ctx.store().list_accounts()
    }

    pub fn account(&self, id: &str) -> Result<Account, LedgerError> {
        self.ctx.store().get_account(id)
    }

    /// Value held across every open account, all buckets included
    pub fn total_value(&self) -> Decimal {
        self.accounts()
            .iter()
            .filter(|account| account.status != AccountStatus::Closed)
            .map(Account::total_value)
            .sum()
    }
}

impl Default for LedgerEngine {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Whole seconds from a command; values past the `Duration` range are rejected
fn seconds_to_duration(seconds: i64) -> Result<Duration, LedgerError> {
    Duration::try_seconds(seconds).ok_or_else(|| LedgerError::invalid_duration(seconds))
}
