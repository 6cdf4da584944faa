use crate::classify::ClassifierOptions;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use shelf_asyncutils::RetryOptions;
use shelf_cache::CacheOptions;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupOptions {
    /// Upper bound on a single lookup attempt. Elapsing counts as a
    /// (retryable) timeout.
    pub timeout_ms: u64,
    /// Payload field that identifies an item. Payloads without it are treated
    /// as "not found".
    pub identity_field: String,
}
impl Default for LookupOptions {
    fn default() -> Self {
        Self { timeout_ms: 2000, identity_field: "id".to_string() }
    }
}
impl LookupOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Everything a [`Scanner`](crate::Scanner) can be tuned with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerOptions {
    pub classifier: ClassifierOptions,
    pub cache: CacheOptions,
    pub retry: RetryOptions,
    pub lookup: LookupOptions,
}
impl ScannerOptions {
    pub fn validate(&self) -> Result<()> {
        self.classifier.validate()?;
        self.retry.validate().or_raise(|| ErrorKind::Config("retry".into()))?;
        if self.lookup.timeout_ms == 0 {
            exn::bail!(ErrorKind::Config("lookup.timeout_ms must be greater than zero".into()));
        }
        if self.lookup.identity_field.is_empty() {
            exn::bail!(ErrorKind::Config("lookup.identity_field must not be empty".into()));
        }
        Ok(())
    }
}
