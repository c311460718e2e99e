//! Ledger commands
//!
//! A [`LedgerCommand`] is one operation read from an input file. The engine
//! dispatches it to the component that owns the operation; the async
//! strategy uses [`LedgerCommand::accounts`] and
//! [`LedgerCommand::is_barrier`] to decide what may run concurrently.

use rust_decimal::Decimal;

use super::account::{AccountId, AllocationId, LockId};
use super::transaction::{TransactionId, TransferRequest};

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCommand {
    Create { account: AccountId },
    Delete { account: AccountId },
    Deposit { account: AccountId, amount: Decimal },
    Withdraw { account: AccountId, amount: Decimal },
    Transfer { from: AccountId, to: AccountId, amount: Decimal },
    Hold { account: AccountId, amount: Decimal },
    Release { account: AccountId, amount: Decimal },
    Reserve { account: AccountId, amount: Decimal },
    Unreserve { account: AccountId, amount: Decimal },
    Fee { account: AccountId, delta: Decimal },
    Reward { account: AccountId, delta: Decimal },
    Loss { account: AccountId, delta: Decimal },
    Freeze { account: AccountId },
    Unfreeze { account: AccountId },
    TempFreeze { account: AccountId, seconds: i64 },
    TempUnfreeze { account: AccountId },
    FlagSuspicious { account: AccountId },
    FlagForReview { account: AccountId },
    ClearFlags { account: AccountId },
    Merge { from: AccountId, to: AccountId },
    Lock {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        seconds: i64,
    },
    Unlock {
        holder: AccountId,
        to: AccountId,
        lock: LockId,
    },
    Allocate {
        account: AccountId,
        amount: Decimal,
        purpose: String,
    },
    Redeem {
        account: AccountId,
        allocation: AllocationId,
    },
    Submit { from: AccountId, to: AccountId, amount: Decimal },
    Finalize { tx: TransactionId },
    Refund { tx: TransactionId },
    Rollback { tx: TransactionId },
    Batch {
        reference: String,
        transfers: Vec<TransferRequest>,
    },
    Advance { seconds: i64 },
}

impl LedgerCommand {
    /// Short operation name used in logs
    pub fn op(&self) -> &'static str {
        match self {
            LedgerCommand::Create { .. } => "create",
            LedgerCommand::Delete { .. } => "delete",
            LedgerCommand::Deposit { .. } => "deposit",
            LedgerCommand::Withdraw { .. } => "withdraw",
            LedgerCommand::Transfer { .. } => "transfer",
            LedgerCommand::Hold { .. } => "hold",
            LedgerCommand::Release { .. } => "release",
            LedgerCommand::Reserve { .. } => "reserve",
            LedgerCommand::Unreserve { .. } => "unreserve",
            LedgerCommand::Fee { .. } => "fee",
            LedgerCommand::Reward { .. } => "reward",
            LedgerCommand::Loss { .. } => "loss",
            LedgerCommand::Freeze { .. } => "freeze",
            LedgerCommand::Unfreeze { .. } => "unfreeze",
            LedgerCommand::TempFreeze { .. } => "tempfreeze",
            LedgerCommand::TempUnfreeze { .. } => "tempunfreeze",
            LedgerCommand::FlagSuspicious { .. } => "flag",
            LedgerCommand::FlagForReview { .. } => "review",
            LedgerCommand::ClearFlags { .. } => "clear",
            LedgerCommand::Merge { .. } => "merge",
            LedgerCommand::Lock { .. } => "lock",
            LedgerCommand::Unlock { .. } => "unlock",
            LedgerCommand::Allocate { .. } => "allocate",
            LedgerCommand::Redeem { .. } => "redeem",
            LedgerCommand::Submit { .. } => "submit",
            LedgerCommand::Finalize { .. } => "finalize",
            LedgerCommand::Refund { .. } => "refund",
            LedgerCommand::Rollback { .. } => "rollback",
            LedgerCommand::Batch { .. } => "batch",
            LedgerCommand::Advance { .. } => "advance",
        }
    }

    /// Accounts the command reads or writes, as far as the command itself says
    pub fn accounts(&self) -> Vec<&str> {
        match self {
            LedgerCommand::Create { account }
            | LedgerCommand::Delete { account }
            | LedgerCommand::Deposit { account, .. }
            | LedgerCommand::Withdraw { account, .. }
            | LedgerCommand::Hold { account, .. }
            | LedgerCommand::Release { account, .. }
            | LedgerCommand::Reserve { account, .. }
            | LedgerCommand::Unreserve { account, .. }
            | LedgerCommand::Fee { account, .. }
            | LedgerCommand::Reward { account, .. }
            | LedgerCommand::Loss { account, .. }
            | LedgerCommand::Freeze { account }
            | LedgerCommand::Unfreeze { account }
            | LedgerCommand::TempFreeze { account, .. }
            | LedgerCommand::TempUnfreeze { account }
            | LedgerCommand::FlagSuspicious { account }
            | LedgerCommand::FlagForReview { account }
            | LedgerCommand::ClearFlags { account }
            | LedgerCommand::Allocate { account, .. }
            | LedgerCommand::Redeem { account, .. } => vec![account.as_str()],
            LedgerCommand::Transfer { from, to, .. }
            | LedgerCommand::Merge { from, to }
            | LedgerCommand::Lock { from, to, .. }
            | LedgerCommand::Submit { from, to, .. } => vec![from.as_str(), to.as_str()],
            LedgerCommand::Unlock { holder, to, .. } => vec![holder.as_str(), to.as_str()],
            LedgerCommand::Batch { transfers, .. } => transfers
                .iter()
                .flat_map(|leg| [leg.from.as_str(), leg.to.as_str()])
                .collect(),
            LedgerCommand::Finalize { .. }
            | LedgerCommand::Refund { .. }
            | LedgerCommand::Rollback { .. }
            | LedgerCommand::Advance { .. } => Vec::new(),
        }
    }

    /// Commands that generate IDs, move the clock, or resolve accounts
    /// through a transaction must run alone, in input order.
    pub fn is_barrier(&self) -> bool {
        matches!(
            self,
            LedgerCommand::Lock { .. }
                | LedgerCommand::Allocate { .. }
                | LedgerCommand::Submit { .. }
                | LedgerCommand::Finalize { .. }
                | LedgerCommand::Refund { .. }
                | LedgerCommand::Rollback { .. }
                | LedgerCommand::Advance { .. }
        )
    }

    /// Fold a following single-leg batch row into this batch when the
    /// references match. Returns the row back when it starts something new.
    pub fn absorb_batch_leg(&mut self, next: LedgerCommand) -> Option<LedgerCommand> {
        match (self, next) {
            (
                LedgerCommand::Batch {
                    reference,
                    transfers,
                },
                LedgerCommand::Batch {
                    reference: next_reference,
                    transfers: next_transfers,
                },
            ) if *reference == next_reference => {
                transfers.extend(next_transfers);
                None
            }
            (_, next) => Some(next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(reference: &str, from: &str, to: &str, amount: i64) -> LedgerCommand {
        LedgerCommand::Batch {
            reference: reference.to_string(),
            transfers: vec![TransferRequest::new(from, to, Decimal::new(amount, 0))],
        }
    }

    #[test]
    fn test_absorb_batch_leg_with_same_reference() {
        let mut batch = leg("b1", "A", "B", 30);
        assert!(batch.absorb_batch_leg(leg("b1", "A", "C", 10)).is_none());

        match batch {
            LedgerCommand::Batch { transfers, .. } => assert_eq!(transfers.len(), 2),
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[test]
    fn test_absorb_batch_leg_rejects_other_reference() {
        let mut batch = leg("b1", "A", "B", 30);
        let next = leg("b2", "A", "C", 10);
        assert_eq!(batch.absorb_batch_leg(next.clone()), Some(next));
    }

    #[test]
    fn test_absorb_batch_leg_rejects_non_batch() {
        let mut deposit = LedgerCommand::Deposit {
            account: "A".into(),
            amount: Decimal::ONE,
        };
        let next = leg("b1", "A", "B", 1);
        assert_eq!(deposit.absorb_batch_leg(next.clone()), Some(next));
    }

    #[test]
    fn test_batch_accounts_cover_every_leg() {
        let mut batch = leg("b1", "A", "B", 30);
        batch.absorb_batch_leg(leg("b1", "A", "C", 10));
        assert_eq!(batch.accounts(), vec!["A", "B", "A", "C"]);
        assert!(!batch.is_barrier());
    }

    #[test]
    fn test_id_generating_commands_are_barriers() {
        let lock = LedgerCommand::Lock {
            from: "A".into(),
            to: "B".into(),
            amount: Decimal::ONE,
            seconds: 60,
        };
        let finalize = LedgerCommand::Finalize { tx: "tx-1".into() };
        let deposit = LedgerCommand::Deposit {
            account: "A".into(),
            amount: Decimal::ONE,
        };

        assert!(lock.is_barrier());
        assert!(finalize.is_barrier());
        assert!(finalize.accounts().is_empty());
        assert!(!deposit.is_barrier());
    }
}
