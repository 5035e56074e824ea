//! Snapshot diffing
//!
//! Transitions fire only when the boolean purchasability classification of
//! a pair flips. Raw string changes inside the same class (`1H-low` →
//! `72H`) are silent, which keeps restless facilities from spamming the
//! notification channel.

use super::index::Snapshot;
use shared::models::{StockStatus, TransitionEvent};

/// Compare two snapshots and emit one event per flipped pair.
///
/// Pairs appearing for the first time are treated as coming from
/// `Unavailable`, so a SKU that enters the snapshot already purchasable
/// still produces a became-available event. Pairs that vanish from the
/// snapshot produce nothing; the provider drops delisted configurations
/// and there is no one to act on them.
pub fn diff_snapshots(previous: &Snapshot, next: &Snapshot) -> Vec<TransitionEvent> {
    let mut events = Vec::new();
    for (key, record) in next {
        let (old_status, known_before) = match previous.get(key) {
            Some(old) => (old.status, true),
            None => (StockStatus::Unavailable, false),
        };
        if old_status.is_available() == record.status.is_available() {
            continue;
        }
        // Unknown on first sight is not a flip worth reporting
        if !known_before && !record.status.is_available() {
            continue;
        }
        events.push(TransitionEvent {
            sku_code: record.sku_code.clone(),
            facility_code: record.facility_code.clone(),
            from: old_status,
            to: record.status,
            raw_status: record.raw_status.clone(),
            observed_at: record.observed_at,
        });
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::models::AvailabilityRecord;

    fn snap(entries: &[(&str, &str, StockStatus)]) -> Snapshot {
        entries
            .iter()
            .map(|(sku, fac, status)| {
                (
                    (sku.to_string(), fac.to_string()),
                    AvailabilityRecord {
                        sku_code: sku.to_string(),
                        facility_code: fac.to_string(),
                        status: *status,
                        raw_status: format!("{status:?}"),
                        observed_at: Utc::now(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn unavailable_to_available_fires() {
        let prev = snap(&[("a", "gra", StockStatus::Unavailable)]);
        let next = snap(&[("a", "gra", StockStatus::Available)]);
        let events = diff_snapshots(&prev, &next);
        assert_eq!(events.len(), 1);
        assert!(events[0].became_available());
    }

    #[test]
    fn window_shuffle_is_silent() {
        let prev = snap(&[("a", "gra", StockStatus::WindowShort)]);
        let next = snap(&[("a", "gra", StockStatus::WindowLong)]);
        assert!(diff_snapshots(&prev, &next).is_empty());
    }

    #[test]
    fn available_to_window_is_silent() {
        let prev = snap(&[("a", "gra", StockStatus::Available)]);
        let next = snap(&[("a", "gra", StockStatus::WindowShort)]);
        assert!(diff_snapshots(&prev, &next).is_empty());
    }

    #[test]
    fn available_to_unavailable_fires_downward() {
        let prev = snap(&[("a", "gra", StockStatus::Available)]);
        let next = snap(&[("a", "gra", StockStatus::Unavailable)]);
        let events = diff_snapshots(&prev, &next);
        assert_eq!(events.len(), 1);
        assert!(!events[0].became_available());
    }

    #[test]
    fn new_pair_already_available_fires() {
        let prev = Snapshot::new();
        let next = snap(&[("a", "gra", StockStatus::Available)]);
        let events = diff_snapshots(&prev, &next);
        assert_eq!(events.len(), 1);
        assert!(events[0].became_available());
        assert_eq!(events[0].from, StockStatus::Unavailable);
    }

    #[test]
    fn new_pair_unavailable_is_silent() {
        let prev = Snapshot::new();
        let next = snap(&[("a", "gra", StockStatus::Unavailable)]);
        assert!(diff_snapshots(&prev, &next).is_empty());
    }

    #[test]
    fn vanished_pair_is_silent() {
        let prev = snap(&[("a", "gra", StockStatus::Available)]);
        let next = Snapshot::new();
        assert!(diff_snapshots(&prev, &next).is_empty());
    }

    #[test]
    fn unchanged_pairs_are_silent() {
        let prev = snap(&[
            ("a", "gra", StockStatus::Available),
            ("b", "rbx", StockStatus::Unavailable),
        ]);
        let events = diff_snapshots(&prev, &prev.clone());
        assert!(events.is_empty());
    }
}
