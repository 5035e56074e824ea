//! Order Attempt Model
//!
//! Append-only child records of an acquisition task. Every provider order
//! call produces exactly one attempt row, completed or not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How one provider order call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Succeeded,
    /// Transient failure (timeout, throttling, 5xx); eligible for retry
    Retryable,
    /// Provider rejection (validation, stock gone, permissions); terminal
    Rejected,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Succeeded => "succeeded",
            AttemptOutcome::Retryable => "retryable",
            AttemptOutcome::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for AttemptOutcome {
    type Err = super::task::ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(AttemptOutcome::Succeeded),
            "retryable" => Ok(AttemptOutcome::Retryable),
            "rejected" => Ok(AttemptOutcome::Rejected),
            other => Err(super::task::ParseStateError(other.to_string())),
        }
    }
}

/// One recorded order attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderAttempt {
    pub id: i64,
    pub task_id: i64,
    pub attempt_number: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Stored as text; see [`AttemptOutcome`]
    pub outcome: String,
    /// Provider error code or HTTP status, when the call failed
    pub provider_code: Option<String>,
    pub message: Option<String>,
}
