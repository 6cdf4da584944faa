//! The remote item lookup, as seen by the scanner.
//!
//! The transport is somebody else's problem: anything that can turn a code
//! into a JSON payload implements [`Lookup`]. Implementations report transient
//! trouble as [`LookupErrorKind::Network`] or [`LookupErrorKind::Timeout`]
//! (retried), and a definite miss as [`LookupErrorKind::NotFound`] or an
//! empty/invalid payload (not retried).

#[cfg(any(test, feature = "mock"))]
mod mock;

#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockLookup;
use async_trait::async_trait;
use derive_more::{Display, Error};
use shelf_asyncutils::Classify;
use std::sync::Arc;

/// A lookup error with automatic location tracking.
pub type LookupError = exn::Exn<LookupErrorKind>;
/// Result type alias for lookup operations.
pub type LookupResult<T> = std::result::Result<T, LookupError>;

pub type LookupHandle = Arc<dyn Lookup>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum LookupErrorKind {
    /// Connection-level failure; worth retrying.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// No answer in time; worth retrying.
    #[display("lookup timed out")]
    Timeout,
    /// The service definitely has no such item.
    #[display("item not found")]
    NotFound,
    /// Anything else. Retried only if the message looks transient.
    #[display("{_0}")]
    Other(#[error(not(source))] String),
}
impl Classify for LookupErrorKind {
    fn name(&self) -> &str {
        match self {
            Self::Network(_) => "NetworkError",
            Self::Timeout => "TimeoutError",
            Self::NotFound => "ItemNotFoundError",
            Self::Other(_) => "UnexpectedError",
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

/// Resolves a code into an item payload.
#[async_trait]
pub trait Lookup: Send + Sync {
    /// Look up a single (trimmed, but otherwise untouched) code.
    ///
    /// The payload is validated by the caller: anything that isn't an object
    /// with an identity field counts as "not found".
    async fn lookup(&self, code: &str) -> LookupResult<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use shelf_asyncutils::RetryPolicy;

    #[rstest]
    #[case(LookupErrorKind::Network("connection refused".into()), true)]
    #[case(LookupErrorKind::Timeout, true)]
    #[case(LookupErrorKind::NotFound, false)]
    #[case(LookupErrorKind::Other("TypeError: Failed to fetch".into()), true)]
    #[case(LookupErrorKind::Other("HTTP 500".into()), false)]
    fn test_default_retry_classification(#[case] kind: LookupErrorKind, #[case] retryable: bool) {
        let err = LookupError::from(kind);
        assert_eq!(RetryPolicy::default().is_retryable(&err), retryable);
    }
}
