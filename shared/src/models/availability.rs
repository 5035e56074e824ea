//! Availability Model
//!
//! 库存状态分类与转换事件。Provider 返回的原始状态字符串会被归一化为
//! [`StockStatus`]，转换事件只在"可购买"布尔分类翻转时产生。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized stock status for one (SKU, facility) pair
///
/// Provider wire values map as:
///
/// | Provider value | StockStatus |
/// |----------------|-------------|
/// | `available` | `Available` |
/// | `1H-low`, `1H-high` | `WindowShort` |
/// | `72H`, `240H` | `WindowLong` |
/// | `unavailable` | `Unavailable` |
/// | anything else | `Unknown` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StockStatus {
    Unavailable,
    /// Restricted short stock window (cleared within the hour)
    WindowShort,
    /// Restricted long stock window (days)
    WindowLong,
    Available,
    Unknown,
}

impl StockStatus {
    /// Parse a provider status string, keeping unknown values non-fatal
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "available" => StockStatus::Available,
            "1H-low" | "1H-high" => StockStatus::WindowShort,
            "72H" | "240H" => StockStatus::WindowLong,
            "unavailable" => StockStatus::Unavailable,
            _ => StockStatus::Unknown,
        }
    }

    /// Purchasability classification used for transition detection
    ///
    /// The two restricted-window variants count as available. A change
    /// between `WindowShort` and `WindowLong` is therefore not a
    /// transition, which avoids event storms when a facility cycles
    /// between stock sub-states.
    pub fn is_available(&self) -> bool {
        matches!(
            self,
            StockStatus::Available | StockStatus::WindowShort | StockStatus::WindowLong
        )
    }
}

/// Last-known status of one (SKU, facility) pair
///
/// Ephemeral: rebuilt from a fresh poll on restart, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRecord {
    pub sku_code: String,
    pub facility_code: String,
    pub status: StockStatus,
    /// Original provider status string, preserved for display
    pub raw_status: String,
    pub observed_at: DateTime<Utc>,
}

/// Emitted when the purchasability classification of a pair flips
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub sku_code: String,
    pub facility_code: String,
    pub from: StockStatus,
    pub to: StockStatus,
    /// Provider string behind `to`, for display in notifications
    pub raw_status: String,
    pub observed_at: DateTime<Utc>,
}

impl TransitionEvent {
    /// True when the pair just became purchasable
    pub fn became_available(&self) -> bool {
        !self.from.is_available() && self.to.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_strings_normalize() {
        assert_eq!(StockStatus::from_provider("available"), StockStatus::Available);
        assert_eq!(StockStatus::from_provider("1H-low"), StockStatus::WindowShort);
        assert_eq!(StockStatus::from_provider("1H-high"), StockStatus::WindowShort);
        assert_eq!(StockStatus::from_provider("72H"), StockStatus::WindowLong);
        assert_eq!(StockStatus::from_provider("unavailable"), StockStatus::Unavailable);
        assert_eq!(StockStatus::from_provider("comingSoon"), StockStatus::Unknown);
    }

    #[test]
    fn window_variants_classify_as_available() {
        assert!(StockStatus::WindowShort.is_available());
        assert!(StockStatus::WindowLong.is_available());
        assert!(StockStatus::Available.is_available());
        assert!(!StockStatus::Unavailable.is_available());
        assert!(!StockStatus::Unknown.is_available());
    }
}
