//! In-memory lookup for testing.

use super::{Lookup, LookupErrorKind, LookupResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// In-memory [`Lookup`] with scripted failures.
///
/// Codes are matched exactly. Unknown codes answer with `null`, the way an
/// API that returns an empty body would. Failures queued with
/// [`fail_next`](Self::fail_next) are served first, one per call.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shelf_scan::Lookup;
/// use shelf_scan::lookup::{LookupErrorKind, MockLookup};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let lookup = MockLookup::with_items([("SKU0099", json!({"id": 42}))]);
/// lookup.fail_next(LookupErrorKind::Timeout).await;
///
/// assert!(lookup.lookup("SKU0099").await.is_err());
/// assert_eq!(lookup.lookup("SKU0099").await.unwrap(), json!({"id": 42}));
/// assert_eq!(lookup.calls(), 2);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockLookup {
    items: RwLock<HashMap<String, Value>>,
    failures: Mutex<VecDeque<LookupErrorKind>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}
impl MockLookup {
    pub fn with_items(items: impl IntoIterator<Item = (impl Into<String>, Value)>) -> Self {
        let items = items.into_iter().map(|(code, value)| (code.into(), value)).collect();
        Self { items: RwLock::new(items), ..Self::default() }
    }

    /// Make every call take `latency` (tokio time) before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn insert(&self, code: impl Into<String>, value: Value) {
        self.items.write().await.insert(code.into(), value);
    }

    /// Queue a failure for an upcoming call.
    pub async fn fail_next(&self, kind: LookupErrorKind) {
        self.failures.lock().await.push_back(kind);
    }

    /// Number of times [`lookup`](Lookup::lookup) has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Lookup for MockLookup {
    async fn lookup(&self, code: &str) -> LookupResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(kind) = self.failures.lock().await.pop_front() {
            exn::bail!(kind);
        }
        Ok(self.items.read().await.get(code).cloned().unwrap_or(Value::Null))
    }
}
