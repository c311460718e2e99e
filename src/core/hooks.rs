//! External collaborators the ledger notifies or delegates to
//!
//! - [`ConsensusHook`]: told about account creation, freezes and unfreezes.
//!   Fire-and-forget; its outcome never affects balances.
//! - [`KeyCipher`]: seals account key material before it is stored.

use std::fmt;

use crate::types::LedgerError;

/// Account-level events forwarded to consensus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    AccountCreated,
    AccountFrozen,
    AccountUnfrozen,
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncEvent::AccountCreated => "account_created",
            SyncEvent::AccountFrozen => "account_frozen",
            SyncEvent::AccountUnfrozen => "account_unfrozen",
        };
        f.write_str(label)
    }
}

pub trait ConsensusHook: Send + Sync {
    fn sync_with_consensus(&self, account: &str, event: SyncEvent) -> Result<(), LedgerError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConsensus;

impl ConsensusHook for NoopConsensus {
    fn sync_with_consensus(&self, _account: &str, _event: SyncEvent) -> Result<(), LedgerError> {
        Ok(())
    }
}

pub trait KeyCipher: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, LedgerError>;
}

/// Stores key material as given; for deployments that encrypt at the storage layer
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCipher;

impl KeyCipher for PassthroughCipher {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, LedgerError> {
        Ok(plaintext.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::balance_mutator::BalanceMutator;
    use crate::core::context::LedgerContext;
    use crate::core::test_support::actor;
    use crate::store::MemoryStore;
    use crate::types::AccountStatus;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records every event and refuses freezes
    #[derive(Default)]
    struct RecordingConsensus {
        events: Mutex<Vec<(String, SyncEvent)>>,
    }

    impl ConsensusHook for RecordingConsensus {
        fn sync_with_consensus(&self, account: &str, event: SyncEvent) -> Result<(), LedgerError> {
            self.events.lock().push((account.to_string(), event));
            if event == SyncEvent::AccountFrozen {
                return Err(LedgerError::storage("consensus unavailable"));
            }
            Ok(())
        }
    }

    struct XorCipher(u8);

    impl KeyCipher for XorCipher {
        fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, LedgerError> {
            Ok(plaintext.iter().map(|b| b ^ self.0).collect())
        }
    }

    #[test]
    fn test_consensus_failures_do_not_block_status_changes() {
        let consensus = Arc::new(RecordingConsensus::default());
        let ctx = Arc::new(
            LedgerContext::new(Arc::new(MemoryStore::new())).with_consensus(consensus.clone()),
        );
        let mutator = BalanceMutator::new(Arc::clone(&ctx));

        mutator.create_account(&actor(), "A", b"key").unwrap();
        mutator.freeze(&actor(), "A").unwrap();
        mutator.unfreeze(&actor(), "A").unwrap();

        assert_eq!(
            *consensus.events.lock(),
            vec![
                ("A".to_string(), SyncEvent::AccountCreated),
                ("A".to_string(), SyncEvent::AccountFrozen),
                ("A".to_string(), SyncEvent::AccountUnfrozen),
            ]
        );
        assert_eq!(
            ctx.store().get_account("A").unwrap().status,
            AccountStatus::Active
        );
    }

    #[test]
    fn test_cipher_seals_key_material() {
        let ctx = LedgerContext::new(Arc::new(MemoryStore::new()))
            .with_cipher(Arc::new(XorCipher(0xff)));
        let mutator = BalanceMutator::new(Arc::new(ctx));

        let account = mutator.create_account(&actor(), "A", &[0x00, 0x0f]).unwrap();
        assert_eq!(account.key_material, vec![0xff, 0xf0]);
    }
}
