//! Engine status and statistics DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monitor control-surface status (`GET /api/monitor/status`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub running: bool,
    pub poll_interval_secs: u64,
    pub subscription_count: usize,
    /// (SKU, facility) pairs currently tracked by the index
    pub known_pairs: usize,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub consecutive_poll_failures: u64,
}

/// Aggregate counters (`GET /api/stats`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub poll_cycles: u64,
    pub transitions_emitted: u64,
    pub active_queues: i64,
    pub purchase_success: i64,
    pub purchase_failed: i64,
    pub total_skus: usize,
    pub available_pairs: usize,
}
