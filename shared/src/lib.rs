//! Shared types for the inventory monitor
//!
//! Domain models and API envelope types used by both the server and the
//! provider client. Engine logic lives in `monitor-server`; wire-level
//! provider types live in `provider-client`.

pub mod models;
pub mod response;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use models::{
    AcquisitionTask, AttemptOutcome, AvailabilityRecord, BatchSummary, EngineStats,
    EnqueueReceipt, MonitorStatus, NotificationEvent, OrderAttempt, StockStatus, Subscription,
    SubscriptionCreate, TaskKey, TaskState, TransitionEvent,
};
pub use response::ApiResponse;
