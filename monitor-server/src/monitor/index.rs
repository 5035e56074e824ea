//! Availability Index
//!
//! Last-known snapshot of every (SKU, facility) pair. Copy-on-write: the
//! poller swaps in a whole new `Arc` per cycle, readers clone the `Arc`
//! and never block the swap.

use shared::models::AvailabilityRecord;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Key is (sku_code, facility_code)
pub type Snapshot = HashMap<(String, String), AvailabilityRecord>;

#[derive(Default)]
pub struct AvailabilityIndex {
    current: RwLock<Arc<Snapshot>>,
}

impl AvailabilityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cheap read handle to the current snapshot
    pub fn load(&self) -> Arc<Snapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            // Writers never panic while holding the lock; recover anyway
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the snapshot, returning the previous one for diffing
    pub fn swap(&self, next: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(next);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }

    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.load().is_empty()
    }

    /// Pairs currently classified as purchasable
    pub fn available_pairs(&self) -> usize {
        self.load()
            .values()
            .filter(|r| r.status.is_available())
            .count()
    }

    /// Records for one SKU across facilities
    pub fn for_sku(&self, sku_code: &str) -> Vec<AvailabilityRecord> {
        self.load()
            .values()
            .filter(|r| r.sku_code == sku_code)
            .cloned()
            .collect()
    }

    /// Distinct SKU count in the snapshot
    pub fn sku_count(&self) -> usize {
        let snapshot = self.load();
        let mut skus: Vec<&str> = snapshot.values().map(|r| r.sku_code.as_str()).collect();
        skus.sort_unstable();
        skus.dedup();
        skus.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::models::StockStatus;

    fn rec(sku: &str, fac: &str, status: StockStatus) -> AvailabilityRecord {
        AvailabilityRecord {
            sku_code: sku.into(),
            facility_code: fac.into(),
            status,
            raw_status: "available".into(),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn swap_returns_previous_snapshot() {
        let index = AvailabilityIndex::new();
        let mut first = Snapshot::new();
        first.insert(
            ("a".into(), "gra".into()),
            rec("a", "gra", StockStatus::Unavailable),
        );
        let empty = index.swap(first);
        assert!(empty.is_empty());

        let mut second = Snapshot::new();
        second.insert(
            ("a".into(), "gra".into()),
            rec("a", "gra", StockStatus::Available),
        );
        let prev = index.swap(second);
        assert_eq!(prev.len(), 1);
        assert_eq!(index.available_pairs(), 1);
    }

    #[test]
    fn readers_keep_old_snapshot_across_swap() {
        let index = AvailabilityIndex::new();
        let mut snap = Snapshot::new();
        snap.insert(
            ("a".into(), "gra".into()),
            rec("a", "gra", StockStatus::Available),
        );
        index.swap(snap);

        let handle = index.load();
        index.swap(Snapshot::new());
        assert_eq!(handle.len(), 1);
        assert!(index.is_empty());
    }
}
