//! Bounded exponential-backoff retry.
//!
//! [`RetryPolicy::execute`] runs an async operation, and when it fails with an
//! error that [looks transient](RetryPolicy::is_retryable) it sleeps and tries
//! again, up to [`RetryOptions::max_retries`] additional attempts. Errors are
//! classified by name and message through [`Classify`], so the policy works
//! for any error type without knowing about it.
//!
//! The error from the final attempt is handed back untouched: callers inspect
//! the real cause, not a wrapper.

use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::instrument;

/// Name and message of an error, for retry classification.
pub trait Classify {
    /// Stable, machine-oriented name (e.g. `NetworkError`). Matched
    /// case-sensitively and exactly.
    fn name(&self) -> &str;
    /// Human-oriented message. Matched case-insensitively as a substring.
    fn message(&self) -> String;
}
impl<E> Classify for exn::Exn<E>
where
    E: Classify + std::error::Error + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn message(&self) -> String {
        (**self).message()
    }
}

fn default_matchers() -> Vec<String> {
    ["NetworkError", "TimeoutError", "network", "timeout", "Failed to fetch"].map(String::from).to_vec()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Scale every delay by a random factor in `[0.5, 1.0]`.
    pub jitter: bool,
    pub retryable_matchers: Vec<String>,
}
impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter: false,
            retryable_matchers: default_matchers(),
        }
    }
}
impl RetryOptions {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.backoff_multiplier >= 1.0 && self.backoff_multiplier.is_finite()) {
            exn::bail!(ErrorKind::InvalidOptions(format!(
                "backoff multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            exn::bail!(ErrorKind::InvalidOptions(format!(
                "initial delay ({}ms) exceeds max delay ({}ms)",
                self.initial_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Retry wrapper around fallible async operations.
///
/// # Examples
///
/// ```
/// use shelf_asyncutils::{Classify, RetryOptions, RetryPolicy};
///
/// #[derive(Debug)]
/// struct Flaky;
/// impl Classify for Flaky {
///     fn name(&self) -> &str { "NetworkError" }
///     fn message(&self) -> String { "connection reset".into() }
/// }
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let policy = RetryPolicy::new(RetryOptions { initial_delay_ms: 500, ..Default::default() }).unwrap();
/// let mut attempts = 0;
/// let value = policy
///     .execute(|| {
///         attempts += 1;
///         let attempt = attempts;
///         async move { if attempt < 3 { Err(Flaky) } else { Ok(attempt) } }
///     })
///     .await
///     .unwrap();
/// assert_eq!(value, 3);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    options: RetryOptions,
    matchers_lower: Vec<String>,
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_valid(RetryOptions::default())
    }
}
impl RetryPolicy {
    pub fn new(options: RetryOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_valid(options))
    }

    fn from_valid(options: RetryOptions) -> Self {
        let matchers_lower = options.retryable_matchers.iter().map(|m| m.to_lowercase()).collect();
        Self { options, matchers_lower }
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Whether an error looks transient: its name equals one of the matchers,
    /// or its message contains one (ignoring case).
    pub fn is_retryable<E: Classify + ?Sized>(&self, err: &E) -> bool {
        let name = err.name();
        if self.options.retryable_matchers.iter().any(|m| m == name) {
            return true;
        }
        let message = err.message().to_lowercase();
        self.matchers_lower.iter().any(|m| !m.is_empty() && message.contains(m.as_str()))
    }

    /// Backoff before retry number `attempt_index + 1`, without jitter.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let max = self.options.max_delay();
        let exponent = i32::try_from(attempt_index).unwrap_or(i32::MAX);
        let secs = self.options.initial_delay().as_secs_f64() * self.options.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(max, |delay| delay.min(max))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.options.jitter { delay.mul_f64(rand::random_range(0.5..=1.0)) } else { delay }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or runs
    /// out of attempts. The last error is returned as-is.
    ///
    /// Backoff sleeps use [`tokio::time::sleep`], so they follow tokio's
    /// (possibly paused) clock rather than any injected [`Clock`](crate::Clock).
    #[instrument(level = "debug", skip_all, fields(max_retries = self.options.max_retries))]
    pub async fn execute<T, E, F, Fut>(&self, mut op: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Classify,
    {
        let mut attempt_index = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if attempt_index >= self.options.max_retries || !self.is_retryable(&err) {
                return Err(err);
            }
            let delay = self.jittered(self.delay_for(attempt_index));
            tracing::warn!(
                attempt = attempt_index + 1,
                delay_ms = delay.as_millis() as u64,
                error = err.name(),
                message = %err.message(),
                "Operation failed with a retryable error; backing off"
            );
            tokio::time::sleep(delay).await;
            attempt_index += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use derive_more::{Display, Error};
    use rstest::rstest;
    use std::cell::RefCell;
    use tokio::time::Instant;

    #[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
    enum TestError {
        #[display("socket closed")]
        Network,
        #[display("request timed out")]
        Timeout,
        #[display("{_0}")]
        Message(#[error(not(source))] String),
        #[display("record is gone")]
        Gone,
    }
    impl Classify for TestError {
        fn name(&self) -> &str {
            match self {
                Self::Network => "NetworkError",
                Self::Timeout => "TimeoutError",
                Self::Message(_) => "Error",
                Self::Gone => "NotFound",
            }
        }

        fn message(&self) -> String {
            self.to_string()
        }
    }

    fn policy(initial_delay_ms: u64, max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(RetryOptions { initial_delay_ms, max_retries, ..Default::default() }).unwrap()
    }

    #[rstest]
    #[case(TestError::Network, true)]
    #[case(TestError::Timeout, true)]
    #[case(TestError::Message("TypeError: Failed to fetch".into()), true)]
    #[case(TestError::Message("upstream NETWORK unreachable".into()), true)]
    #[case(TestError::Message("gateway Timeout".into()), true)]
    #[case(TestError::Message("bad request".into()), false)]
    #[case(TestError::Gone, false)]
    fn test_is_retryable(#[case] err: TestError, #[case] expected: bool) {
        assert_eq!(RetryPolicy::default().is_retryable(&err), expected);
    }

    #[test]
    fn test_name_match_is_case_sensitive() {
        let policy = RetryPolicy::new(RetryOptions {
            retryable_matchers: vec!["NotFound".into()],
            ..Default::default()
        })
        .unwrap();
        assert!(policy.is_retryable(&TestError::Gone));
        let lowercase = RetryPolicy::new(RetryOptions {
            retryable_matchers: vec!["notfound".into()],
            ..Default::default()
        })
        .unwrap();
        assert!(!lowercase.is_retryable(&TestError::Gone));
    }

    #[rstest]
    #[case(0, 500)]
    #[case(1, 1000)]
    #[case(2, 2000)]
    #[case(4, 8000)]
    #[case(5, 10_000)]
    #[case(60, 10_000)]
    fn test_delay_schedule(#[case] attempt: u32, #[case] expected_ms: u64) {
        assert_eq!(policy(500, 3).delay_for(attempt), Duration::from_millis(expected_ms));
    }

    #[rstest]
    #[case(RetryOptions { backoff_multiplier: 0.5, ..Default::default() })]
    #[case(RetryOptions { backoff_multiplier: f64::NAN, ..Default::default() })]
    #[case(RetryOptions { initial_delay_ms: 20_000, max_delay_ms: 10_000, ..Default::default() })]
    fn test_invalid_options(#[case] options: RetryOptions) {
        let err = RetryPolicy::new(options).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidOptions(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_then_success() {
        let policy = policy(500, 2);
        let started = Instant::now();
        let attempts = RefCell::new(Vec::new());
        let result = policy
            .execute(|| {
                attempts.borrow_mut().push(started.elapsed());
                let attempt = attempts.borrow().len();
                async move { if attempt < 3 { Err(TestError::Network) } else { Ok("found") } }
            })
            .await;
        assert_eq!(result, Ok("found"));
        let attempts = attempts.into_inner();
        assert_eq!(attempts, [Duration::ZERO, Duration::from_millis(500), Duration::from_millis(1500)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_not_retried() {
        let calls = RefCell::new(0);
        let result: std::result::Result<(), _> = policy(500, 3)
            .execute(|| {
                *calls.borrow_mut() += 1;
                async { Err(TestError::Gone) }
            })
            .await;
        assert_eq!(result, Err(TestError::Gone));
        assert_eq!(calls.into_inner(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = RefCell::new(0);
        let result: std::result::Result<(), _> = policy(100, 2)
            .execute(|| {
                *calls.borrow_mut() += 1;
                let n = *calls.borrow();
                async move { Err(TestError::Message(format!("network attempt {n}"))) }
            })
            .await;
        assert_eq!(result, Err(TestError::Message("network attempt 3".into())));
        assert_eq!(calls.into_inner(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exn_errors_classified_through_deref() {
        let calls = RefCell::new(0);
        let result: std::result::Result<(), exn::Exn<TestError>> = policy(10, 1)
            .execute(|| {
                *calls.borrow_mut() += 1;
                async { Err(exn::Exn::from(TestError::Timeout)) }
            })
            .await;
        assert_eq!(*result.unwrap_err(), TestError::Timeout);
        assert_eq!(calls.into_inner(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::new(RetryOptions {
            initial_delay_ms: 1000,
            max_retries: 1,
            jitter: true,
            ..Default::default()
        })
        .unwrap();
        let started = Instant::now();
        let _: std::result::Result<(), _> = policy.execute(|| async { Err(TestError::Network) }).await;
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(500) && waited <= Duration::from_millis(1000), "{waited:?}");
    }
}
