//! Scan Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Lookup failures are raised *over* the original
//! [`LookupErrorKind`](crate::lookup::LookupErrorKind), so the root cause
//! stays in the error tree for callers that want to dig into it.

use derive_more::{Display, Error};

/// A scan error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
///
/// ### Resolution Errors
/// Delivered through [`ScanHandler::on_error`](crate::ScanHandler::on_error)
/// and the `Result` of the resolve methods.
/// - [`ErrorKind::ShortCode`]
/// - [`ErrorKind::TransientLookup`]
/// - [`ErrorKind::ItemNotFound`]
/// - [`ErrorKind::Unexpected`]
///
/// ### Programmer Errors
/// - [`ErrorKind::UnknownSurface`]
/// - [`ErrorKind::Config`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The code is shorter than the configured minimum; nothing was looked up.
    #[display("code too short: {_0:?}")]
    ShortCode(#[error(not(source))] String),
    /// The lookup kept failing with network/timeout errors until retries ran
    /// out.
    #[display("lookup failed after retries")]
    TransientLookup,
    /// The lookup answered, but not with a usable item.
    #[display("item not found: {_0}")]
    ItemNotFound(#[error(not(source))] String),
    /// The lookup failed in a way that is neither transient nor "not found".
    #[display("unexpected lookup failure")]
    Unexpected,
    /// The input surface was never attached (or has been disposed).
    #[display("unknown scan surface: {_0}")]
    UnknownSurface(#[error(not(source))] String),
    /// Options that can't work; raised when building a scanner.
    #[display("invalid scanner configuration: {_0}")]
    Config(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientLookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::ShortCode("AB".into()).to_string(), "code too short: \"AB\"");
        assert_eq!(ErrorKind::ItemNotFound("ZZZ999".into()).to_string(), "item not found: ZZZ999");
        assert_eq!(ErrorKind::UnknownSurface("sku".into()).to_string(), "unknown scan surface: sku");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::TransientLookup.is_retryable());
        assert!(!ErrorKind::ItemNotFound("x".into()).is_retryable());
        assert!(!ErrorKind::ShortCode("x".into()).is_retryable());
        assert!(!ErrorKind::Unexpected.is_retryable());
    }
}
