//! Per-key single-flight locks
//!
//! At most one worker may run an order attempt for a given task key at a
//! time. Locks are in-memory and advisory; the partial unique index on the
//! task table is the durable backstop.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared::models::TaskKey;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct KeyLockTable {
    held: Arc<DashMap<TaskKey, ()>>,
}

impl KeyLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lock for `key`. `None` means another holder exists.
    pub fn try_lock(&self, key: &TaskKey) -> Option<KeyLockGuard> {
        match self.held.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(KeyLockGuard {
                    table: Arc::clone(&self.held),
                    key: key.clone(),
                })
            }
        }
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

/// RAII guard; dropping releases the key, including on panic unwind
pub struct KeyLockGuard {
    table: Arc<DashMap<TaskKey, ()>>,
    key: TaskKey,
}

impl Drop for KeyLockGuard {
    fn drop(&mut self) {
        self.table.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> TaskKey {
        TaskKey::new("sku", "gra", vec!["ram-64g".into()])
    }

    #[test]
    fn second_lock_refused_until_drop() {
        let table = KeyLockTable::new();
        let guard = table.try_lock(&key());
        assert!(guard.is_some());
        assert!(table.try_lock(&key()).is_none());

        drop(guard);
        assert!(table.try_lock(&key()).is_some());
    }

    #[test]
    fn distinct_keys_do_not_contend() {
        let table = KeyLockTable::new();
        let a = table.try_lock(&TaskKey::new("sku", "gra", vec![]));
        let b = table.try_lock(&TaskKey::new("sku", "rbx", vec![]));
        assert!(a.is_some() && b.is_some());
        assert_eq!(table.held_count(), 2);
    }

    #[test]
    fn lock_released_when_holder_panics() {
        let table = KeyLockTable::new();
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = table.try_lock(&key()).unwrap();
            panic!("worker died mid-attempt");
        }));
        assert!(unwound.is_err());
        assert_eq!(table.held_count(), 0);
        assert!(table.try_lock(&key()).is_some());
    }

    #[test]
    fn key_canonicalization_makes_permutations_contend() {
        let table = KeyLockTable::new();
        let _a = table
            .try_lock(&TaskKey::new("sku", "gra", vec!["b".into(), "a".into()]))
            .unwrap();
        assert!(table
            .try_lock(&TaskKey::new("sku", "gra", vec!["a".into(), "b".into()]))
            .is_none());
    }
}
