//! Subscription Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator-declared watch on a SKU (订阅)
///
/// An empty `facility_codes` list means "all facilities". Durable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: i64,
    pub sku_code: String,
    /// Facility codes this watch applies to; empty = all
    #[serde(default)]
    pub facility_codes: Vec<String>,
    pub notify_on_available: bool,
    pub notify_on_unavailable: bool,
    /// Auto-enqueue a purchase attempt when the SKU becomes available
    pub auto_order: bool,
    /// How many availability transitions this watch has matched
    #[serde(default)]
    pub match_count: i64,
    #[serde(default)]
    pub last_matched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Does this watch cover the given (SKU, facility) pair?
    pub fn matches(&self, sku_code: &str, facility_code: &str) -> bool {
        self.sku_code == sku_code
            && (self.facility_codes.is_empty()
                || self.facility_codes.iter().any(|f| f == facility_code))
    }
}

/// Create subscription payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCreate {
    pub sku_code: String,
    #[serde(default)]
    pub facility_codes: Vec<String>,
    #[serde(default = "default_true")]
    pub notify_on_available: bool,
    #[serde(default)]
    pub notify_on_unavailable: bool,
    #[serde(default)]
    pub auto_order: bool,
}

fn default_true() -> bool {
    true
}

/// Result of a batch operation (batch-add-all)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub added: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(facilities: &[&str]) -> Subscription {
        Subscription {
            id: 1,
            sku_code: "25skle01".into(),
            facility_codes: facilities.iter().map(|s| s.to_string()).collect(),
            notify_on_available: true,
            notify_on_unavailable: false,
            auto_order: false,
            match_count: 0,
            last_matched_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_facility_set_matches_everywhere() {
        let s = sub(&[]);
        assert!(s.matches("25skle01", "fra"));
        assert!(s.matches("25skle01", "bhs"));
        assert!(!s.matches("other", "fra"));
    }

    #[test]
    fn explicit_facilities_restrict_matching() {
        let s = sub(&["gra", "rbx"]);
        assert!(s.matches("25skle01", "gra"));
        assert!(!s.matches("25skle01", "fra"));
    }
}
