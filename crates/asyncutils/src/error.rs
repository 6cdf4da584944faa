//! Async Utility Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, matching the rest of the workspace.

use derive_more::{Display, Error};

/// An async utility error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for async utility operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retry options that can never produce a sensible schedule. Fix the
    /// configuration; this is raised at setup time only.
    #[display("invalid retry options: {_0}")]
    InvalidOptions(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
