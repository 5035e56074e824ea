//! Acquisition Task Model
//!
//! 抢购任务：一次 (SKU, facility, option-set) 的购买意图及其状态机。
//!
//! State machine (monotonic):
//!
//! ```text
//! queued ──► attempting ──► succeeded
//!    ▲            │
//!    │            ├──► failed
//!    └── retry ───┘
//!    (bounded budget, no provider call completed)
//! queued ──► canceled
//! ```
//!
//! Terminal rows (`succeeded` / `failed` / `canceled`) are audit history
//! and never mutate again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Attempting,
    Succeeded,
    Failed,
    Canceled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Attempting => "attempting",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskState::Queued),
            "attempting" => Ok(TaskState::Attempting),
            "succeeded" => Ok(TaskState::Succeeded),
            "failed" => Ok(TaskState::Failed),
            "canceled" => Ok(TaskState::Canceled),
            other => Err(ParseStateError(other.to_string())),
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown task state: {0}")]
pub struct ParseStateError(pub String);

/// Single-flight deduplication key
///
/// Options are canonicalized (sorted, deduplicated) so equality is
/// order-independent: `[ram-64g, raid-1]` and `[raid-1, ram-64g]` are the
/// same intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub sku_code: String,
    pub facility_code: String,
    pub options: Vec<String>,
}

impl TaskKey {
    pub fn new(
        sku_code: impl Into<String>,
        facility_code: impl Into<String>,
        options: Vec<String>,
    ) -> Self {
        Self {
            sku_code: sku_code.into(),
            facility_code: facility_code.into(),
            options: canonicalize_options(options),
        }
    }

    /// Stable textual form used as the DB uniqueness column
    pub fn options_key(&self) -> String {
        self.options.join(",")
    }
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}[{}]",
            self.sku_code,
            self.facility_code,
            self.options_key()
        )
    }
}

/// Sort and deduplicate option codes so key equality is well-defined
pub fn canonicalize_options(mut options: Vec<String>) -> Vec<String> {
    options.sort();
    options.dedup();
    options
}

/// A purchase intent in the acquisition queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionTask {
    pub id: i64,
    pub sku_code: String,
    pub facility_code: String,
    /// Canonical option-set (sorted, deduplicated)
    pub options: Vec<String>,
    pub state: TaskState,
    pub attempts: i64,
    pub last_error: Option<String>,
    /// Provider order reference, set on success
    pub order_id: Option<String>,
    pub order_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AcquisitionTask {
    pub fn key(&self) -> TaskKey {
        TaskKey {
            sku_code: self.sku_code.clone(),
            facility_code: self.facility_code.clone(),
            options: self.options.clone(),
        }
    }
}

/// Create task payload (operator submission)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreate {
    pub sku_code: String,
    /// Facility code, e.g. `gra`, `rbx`, `bhs`
    pub facility: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Outcome of an enqueue call
///
/// `accepted = false` means a non-terminal task with the same key already
/// exists and the intent was merged into it; `task_id` then points at the
/// existing task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueReceipt {
    pub task_id: i64,
    pub accepted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_equality_is_order_independent() {
        let a = TaskKey::new("sku", "gra", vec!["ram-64g".into(), "raid-1".into()]);
        let b = TaskKey::new("sku", "gra", vec!["raid-1".into(), "ram-64g".into()]);
        assert_eq!(a, b);
        assert_eq!(a.options_key(), b.options_key());
    }

    #[test]
    fn key_dedups_repeated_options() {
        let a = TaskKey::new("sku", "gra", vec!["ram-64g".into(), "ram-64g".into()]);
        assert_eq!(a.options, vec!["ram-64g".to_string()]);
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskState::Queued.is_terminal());
        assert!(!TaskState::Attempting.is_terminal());
        assert!(TaskState::Succeeded.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Canceled.is_terminal());
    }

    #[test]
    fn state_round_trips_through_str() {
        for s in [
            TaskState::Queued,
            TaskState::Attempting,
            TaskState::Succeeded,
            TaskState::Failed,
            TaskState::Canceled,
        ] {
            assert_eq!(s.as_str().parse::<TaskState>().unwrap(), s);
        }
        assert!("exploded".parse::<TaskState>().is_err());
    }
}
