//! Transaction-related types for the ledger engine
//!
//! A [`Transaction`] records a transfer that has already moved value
//! between two accounts. Its status then advances through
//! `Pending → Completed → {Refunded, RolledBack}`; no other edge exists.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::AccountId;

/// Transaction identifier
pub type TransactionId = String;

/// Transaction lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Refunded,
    RolledBack,
}

impl TransactionStatus {
    /// Whether `self → next` is an edge of the lifecycle graph
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Completed, TransactionStatus::Refunded)
                | (TransactionStatus::Completed, TransactionStatus::RolledBack)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Refunded | TransactionStatus::RolledBack
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::RolledBack => "rolled_back",
        };
        f.write_str(label)
    }
}

/// Transfer record tracked by the finalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub from_address: AccountId,
    pub to_address: AccountId,
    pub amount: Decimal,
    pub status: TransactionStatus,
    /// Amount returned to the sender by a refund or rollback
    pub refund_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn pending(
        id: impl Into<TransactionId>,
        from_address: impl Into<AccountId>,
        to_address: impl Into<AccountId>,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            from_address: from_address.into(),
            to_address: to_address.into(),
            amount,
            status: TransactionStatus::Pending,
            refund_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One leg of a transfer request, as used by batches and bulk moves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
}

impl TransferRequest {
    pub fn new(from: impl Into<AccountId>, to: impl Into<AccountId>, amount: Decimal) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }
}

/// Immutable point-in-time record of an account's spendable balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub account_id: AccountId,
    pub balance: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use TransactionStatus::*;

    #[rstest]
    #[case(Pending, Completed, true)]
    #[case(Completed, Refunded, true)]
    #[case(Completed, RolledBack, true)]
    #[case(Pending, Refunded, false)]
    #[case(Pending, RolledBack, false)]
    #[case(Completed, Pending, false)]
    #[case(Refunded, RolledBack, false)]
    #[case(RolledBack, Completed, false)]
    #[case(Completed, Completed, false)]
    fn test_lifecycle_edges(
        #[case] from: TransactionStatus,
        #[case] to: TransactionStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!Pending.is_terminal());
        assert!(!Completed.is_terminal());
        assert!(Refunded.is_terminal());
        assert!(RolledBack.is_terminal());
    }
}
