//! Account-related types for the ledger engine
//!
//! This module defines the [`Account`] record and the earmarks it carries:
//! time-delayed [`BalanceLock`]s and purpose-bound [`Allocation`]s. Value in
//! an account lives in exactly one bucket at a time:
//!
//! - `balance`: spendable funds
//! - `held_balance`: funds pending settlement
//! - `reserved_balance`: funds set aside for a future obligation
//! - `locked_balances`: funds received but inaccessible until `unlock_at`
//! - `allocations`: funds earmarked for a named purpose until redeemed

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::LedgerError;
use super::transaction::{BalanceSnapshot, TransactionId};

/// Account identifier
pub type AccountId = String;

/// Balance lock identifier
pub type LockId = String;

/// Allocation identifier
pub type AllocationId = String;

/// Longest accepted account ID
pub const MAX_ACCOUNT_ID_LEN: usize = 64;

/// Check that an account ID is non-empty, bounded, and uses `[A-Za-z0-9_-]`
pub fn validate_account_id(account: &str) -> Result<(), LedgerError> {
    if account.is_empty() {
        return Err(LedgerError::invalid_account_id(account, "empty"));
    }
    if account.len() > MAX_ACCOUNT_ID_LEN {
        return Err(LedgerError::invalid_account_id(
            account,
            "longer than 64 characters",
        ));
    }
    if !account
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(LedgerError::invalid_account_id(
            account,
            "contains characters outside [A-Za-z0-9_-]",
        ));
    }
    Ok(())
}

/// Lifecycle and compliance status of an account
///
/// This is the single source of truth consulted by
/// [`Account::ensure_mutable`] before any balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Frozen,
    TemporarilyFrozen { until: DateTime<Utc> },
    Suspicious,
    UnderReview,
    /// Tombstone left by account deletion
    Closed,
}

impl AccountStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Frozen => "frozen",
            AccountStatus::TemporarilyFrozen { .. } => "temporarily_frozen",
            AccountStatus::Suspicious => "suspicious",
            AccountStatus::UnderReview => "under_review",
            AccountStatus::Closed => "closed",
        }
    }

    /// A temporary freeze whose deadline has passed no longer blocks anything
    pub fn is_expired_freeze(&self, now: DateTime<Utc>) -> bool {
        matches!(self, AccountStatus::TemporarilyFrozen { until } if *until <= now)
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Funds transferred to a recipient but inaccessible until `unlock_at`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceLock {
    pub id: LockId,
    /// Recipient account that holds the lock
    pub account_id: AccountId,
    /// Account the funds were debited from
    pub source_account: AccountId,
    pub amount: Decimal,
    pub unlock_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl BalanceLock {
    pub fn is_matured(&self, now: DateTime<Utc>) -> bool {
        now >= self.unlock_at
    }
}

/// Funds earmarked for a named purpose
///
/// `allocated` flips from `true` to `false` exactly once, on redemption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocationId,
    pub account_id: AccountId,
    /// Purpose the funds are earmarked for (e.g. "grant", "compute")
    pub resource_type: String,
    pub amount: Decimal,
    pub allocated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub allocated: bool,
    pub redeemed_at: Option<DateTime<Utc>>,
}

/// Ledger account state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    /// Spendable funds; never negative after a committed operation
    pub balance: Decimal,

    pub held_balance: Decimal,

    pub reserved_balance: Decimal,

    /// Locks where this account is the recipient
    pub locked_balances: Vec<BalanceLock>,

    pub allocations: Vec<Allocation>,

    pub status: AccountStatus,

    pub last_transaction_id: Option<TransactionId>,

    /// Value that entered the ledger through this account
    pub total_deposited: Decimal,

    /// Value that left the ledger through this account
    pub total_withdrawn: Decimal,

    /// Key material as sealed by the key cipher; zeroed on deletion
    pub key_material: Vec<u8>,

    pub created_at: DateTime<Utc>,

    pub last_updated: DateTime<Utc>,

    /// Bumped by the store on every committed write
    pub version: u64,
}

impl Account {
    /// Create an empty, active account
    pub fn new(id: impl Into<AccountId>, key_material: Vec<u8>, now: DateTime<Utc>) -> Self {
        Account {
            id: id.into(),
            balance: Decimal::ZERO,
            held_balance: Decimal::ZERO,
            reserved_balance: Decimal::ZERO,
            locked_balances: Vec::new(),
            allocations: Vec::new(),
            status: AccountStatus::Active,
            last_transaction_id: None,
            total_deposited: Decimal::ZERO,
            total_withdrawn: Decimal::ZERO,
            key_material,
            created_at: now,
            last_updated: now,
            version: 0,
        }
    }

    pub fn locked_total(&self) -> Decimal {
        self.locked_balances.iter().map(|lock| lock.amount).sum()
    }

    /// Sum of allocations not yet redeemed
    pub fn allocated_total(&self) -> Decimal {
        self.allocations
            .iter()
            .filter(|allocation| allocation.allocated)
            .map(|allocation| allocation.amount)
            .sum()
    }

    /// All value attributed to this account across every bucket
    pub fn total_value(&self) -> Decimal {
        self.balance
            + self.held_balance
            + self.reserved_balance
            + self.locked_total()
            + self.allocated_total()
    }

    /// True when any earmark bucket still carries value
    pub fn has_earmarks(&self) -> bool {
        !self.held_balance.is_zero()
            || !self.reserved_balance.is_zero()
            || !self.locked_balances.is_empty()
            || self.allocations.iter().any(|allocation| allocation.allocated)
    }

    pub fn is_frozen(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            AccountStatus::Frozen => true,
            AccountStatus::TemporarilyFrozen { until } => until > now,
            _ => false,
        }
    }

    /// Guard consulted before every balance mutation
    pub fn ensure_mutable(&self, now: DateTime<Utc>) -> Result<(), LedgerError> {
        match &self.status {
            AccountStatus::Active => Ok(()),
            status if status.is_expired_freeze(now) => Ok(()),
            AccountStatus::Frozen | AccountStatus::TemporarilyFrozen { .. } => {
                Err(LedgerError::AccountFrozen {
                    account: self.id.clone(),
                })
            }
            AccountStatus::Suspicious | AccountStatus::UnderReview => {
                Err(LedgerError::AccountFlagged {
                    account: self.id.clone(),
                    status: self.status.label().to_string(),
                })
            }
            AccountStatus::Closed => Err(LedgerError::AccountClosed {
                account: self.id.clone(),
            }),
        }
    }

    /// Add to the spendable balance
    pub fn credit(&mut self, amount: Decimal, operation: &str) -> Result<(), LedgerError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow(operation, &self.id))?;
        Ok(())
    }

    /// Remove from the spendable balance, refusing to go below zero
    pub fn debit(&mut self, amount: Decimal, operation: &str) -> Result<(), LedgerError> {
        if self.balance < amount {
            return Err(LedgerError::insufficient_funds(
                &self.id,
                self.balance,
                amount,
            ));
        }
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow(operation, &self.id))?;
        Ok(())
    }

    pub fn snapshot(&self, timestamp: DateTime<Utc>) -> BalanceSnapshot {
        BalanceSnapshot {
            account_id: self.id.clone(),
            balance: self.balance,
            timestamp,
        }
    }
}

/// Arbitrary-precision trust balance kept beside a regular account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustAccount {
    pub id: AccountId,
    pub balance: BigInt,
    pub last_updated: DateTime<Utc>,
}

impl TrustAccount {
    pub fn new(id: impl Into<AccountId>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            balance: BigInt::from(0),
            last_updated: now,
        }
    }
}
