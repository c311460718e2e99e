//! Identifier generation for locks, allocations and transactions
//!
//! IDs never derive from wall-clock time, so two operations in the same
//! instant cannot collide.

use dashmap::DashMap;

pub trait IdGenerator: Send + Sync {
    /// Produce a fresh ID for the given record kind (`lock`, `alloc`, `tx`)
    fn next_id(&self, prefix: &str) -> String;
}

/// Random v4 UUIDs, prefixed with the record kind
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, uuid::Uuid::new_v4())
    }
}

/// Per-prefix counters: `lock-1`, `lock-2`, `tx-1`, ...
///
/// Deterministic, which lets replayed command files refer to generated IDs.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    counters: DashMap<String, u64>,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        let mut counter = self.counters.entry(prefix.to_string()).or_insert(0);
        *counter += 1;
        format!("{}-{}", prefix, *counter)
    }
}
