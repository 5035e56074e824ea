//! Data models
//!
//! Shared between monitor-server and its API consumers.
//! API-facing fields use camelCase to match the dashboard frontend.
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (snowflake-style, SQLite INTEGER PRIMARY KEY).

pub mod attempt;
pub mod availability;
pub mod notification;
pub mod stats;
pub mod subscription;
pub mod task;

// Re-exports
pub use attempt::*;
pub use availability::*;
pub use notification::*;
pub use stats::*;
pub use subscription::*;
pub use task::*;
