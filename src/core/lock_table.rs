//! Per-key lock striping
//!
//! Each account (or transaction) gets its own mutex, created on first use
//! and kept in a `DashMap`. Operations on unrelated accounts never contend.
//! Multi-key acquisition sorts and de-duplicates the keys first, so every
//! caller takes locks in the same total order and cannot deadlock.

use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::hash::Hash;
use std::sync::Arc;

/// Guards for every key locked by one call; released on drop
#[must_use = "locks are released as soon as the guards are dropped"]
pub struct LockGuards<K> {
    keys: Vec<K>,
    _guards: Vec<ArcMutexGuard<RawMutex, ()>>,
}

impl<K> LockGuards<K> {
    /// Keys held, in acquisition order
    pub fn keys(&self) -> &[K] {
        &self.keys
    }
}

impl<K: PartialEq> LockGuards<K> {
    pub fn holds(&self, key: &K) -> bool {
        self.keys.contains(key)
    }
}

#[derive(Debug)]
pub struct LockTable<K: Eq + Hash> {
    stripes: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash> Default for LockTable<K> {
    fn default() -> Self {
        Self {
            stripes: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Ord + Clone> LockTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until every key is locked
    pub fn lock_many<I>(&self, keys: I) -> LockGuards<K>
    where
        I: IntoIterator<Item = K>,
    {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let guards = keys
            .iter()
            .map(|key| {
                let stripe = Arc::clone(self.stripes.entry(key.clone()).or_default().value());
                stripe.lock_arc()
            })
            .collect();

        LockGuards {
            keys,
            _guards: guards,
        }
    }

    pub fn lock(&self, key: K) -> LockGuards<K> {
        self.lock_many(std::iter::once(key))
    }

    /// Number of keys that have ever been locked
    pub fn len(&self) -> usize {
        self.stripes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_lock_many_sorts_and_dedups() {
        let table: LockTable<String> = LockTable::new();
        let guards = table.lock_many(vec!["B".to_string(), "A".to_string(), "B".to_string()]);

        assert_eq!(guards.keys(), &["A".to_string(), "B".to_string()]);
        assert!(guards.holds(&"A".to_string()));
        assert!(!guards.holds(&"C".to_string()));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_lock_is_released_on_drop() {
        let table: LockTable<u32> = LockTable::new();
        {
            let _guards = table.lock(1);
        }
        let _again = table.lock(1);
    }

    #[test]
    fn test_opposite_order_acquisition_does_not_deadlock() {
        let table: Arc<LockTable<u32>> = Arc::new(LockTable::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = Arc::clone(&table);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let keys = if i % 2 == 0 { vec![1, 2] } else { vec![2, 1] };
                        let _guards = table.lock_many(keys);
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1600);
    }
}
