//! Utilities

pub mod error;
pub mod logger;

pub use error::{ok, ok_with_message, AppError, AppResponse};

/// Result type for API handlers
pub type AppResult<T> = Result<T, AppError>;
