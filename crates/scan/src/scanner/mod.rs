//! The scanner service.
//!
//! A [`Scanner`] owns everything the pipeline needs: options, the shared TTL
//! cache, the retry policy, and the injected clock, scheduler, lookup and
//! feedback sink. It is cheap to clone (all clones share state) and can be
//! handed to every input surface of an application.
//!
//! Surfaces are registered with [`attach`](Scanner::attach), fed with
//! [`on_input`](Scanner::on_input) and
//! [`on_terminal_key`](Scanner::on_terminal_key), and hear about outcomes
//! through their [`ScanHandler`](crate::ScanHandler). Codes can also be
//! resolved programmatically with [`resolve`](Scanner::resolve) and
//! [`resolve_with`](Scanner::resolve_with).

mod resolve;
mod surface;

use self::surface::SurfaceState;
use crate::error::{ErrorKind, Result};
use crate::event::SurfaceId;
use crate::feedback::{FeedbackHandle, NoFeedback};
use crate::item::ResolvedItem;
use crate::lookup::LookupHandle;
use crate::options::ScannerOptions;
use exn::ResultExt;
use shelf_asyncutils::{ClockHandle, RetryPolicy, SchedulerHandle, TokioClock, TokioScheduler};
use shelf_cache::TtlCache;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) struct Inner {
    options: ScannerOptions,
    retry: RetryPolicy,
    cache: TtlCache<ResolvedItem>,
    lookup: LookupHandle,
    feedback: FeedbackHandle,
    clock: ClockHandle,
    scheduler: SchedulerHandle,
    surfaces: Mutex<HashMap<SurfaceId, SurfaceState>>,
    attachments: AtomicU64,
}
impl Inner {
    fn surfaces(&self) -> MutexGuard<'_, HashMap<SurfaceId, SurfaceState>> {
        self.surfaces.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for a [`Scanner`].
///
/// Unless told otherwise the scanner uses tokio time ([`TokioClock`],
/// [`TokioScheduler`]) and gives no success feedback.
///
/// The injected clock drives cache expiry and input classification, and the
/// scheduler drives debounce and burst timers. Retry backoff and the
/// per-attempt lookup timeout always run on tokio time; with a
/// [`ManualClock`](shelf_asyncutils::ManualClock) they still need a runtime
/// with paused time (`#[tokio::test(start_paused = true)]`) to be
/// deterministic.
pub struct ScannerBuilder {
    options: ScannerOptions,
    lookup: LookupHandle,
    clock: Option<ClockHandle>,
    scheduler: Option<SchedulerHandle>,
    feedback: FeedbackHandle,
}
impl ScannerBuilder {
    pub fn clock(mut self, clock: ClockHandle) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn scheduler(mut self, scheduler: SchedulerHandle) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn feedback(mut self, feedback: FeedbackHandle) -> Self {
        self.feedback = feedback;
        self
    }

    /// Validate the options and assemble the scanner. Bad options are the only
    /// way this fails.
    pub fn build(self) -> Result<Scanner> {
        self.options.validate()?;
        let retry = RetryPolicy::new(self.options.retry.clone()).or_raise(|| ErrorKind::Config("retry".into()))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock::new()));
        let scheduler = self.scheduler.unwrap_or_else(|| Arc::new(TokioScheduler));
        let cache = TtlCache::from_options(&self.options.cache, clock.clone());
        tracing::debug!(
            ttl_secs = self.options.cache.ttl_secs,
            max_retries = self.options.retry.max_retries,
            "Scanner ready"
        );
        Ok(Scanner {
            inner: Arc::new(Inner {
                options: self.options,
                retry,
                cache,
                lookup: self.lookup,
                feedback: self.feedback,
                clock,
                scheduler,
                surfaces: Mutex::default(),
                attachments: AtomicU64::new(0),
            }),
        })
    }
}

/// Resolves scanned codes into items for any number of input surfaces.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shelf_scan::lookup::MockLookup;
/// use shelf_scan::{Scanner, ScannerOptions};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let lookup = Arc::new(MockLookup::with_items([("SKU0099", json!({"id": 42, "name": "Widget"}))]));
/// let scanner = Scanner::new(ScannerOptions::default(), lookup.clone()).unwrap();
///
/// let item = scanner.resolve("SKU0099").await.unwrap();
/// assert_eq!(item.name(), Some("Widget"));
///
/// // Served from the cache this time.
/// scanner.resolve("sku0099 ").await.unwrap();
/// assert_eq!(lookup.calls(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Scanner {
    inner: Arc<Inner>,
}
impl Scanner {
    pub fn builder(options: ScannerOptions, lookup: LookupHandle) -> ScannerBuilder {
        ScannerBuilder {
            options,
            lookup,
            clock: None,
            scheduler: None,
            feedback: Arc::new(NoFeedback),
        }
    }

    pub fn new(options: ScannerOptions, lookup: LookupHandle) -> Result<Self> {
        Self::builder(options, lookup).build()
    }

    pub fn options(&self) -> &ScannerOptions {
        &self.inner.options
    }

    /// The cached item for `code`, if it is still fresh. Never touches the
    /// network.
    pub fn cached_item(&self, code: &str) -> Option<ResolvedItem> {
        self.inner.cache.get(code)
    }

    /// Drop the cached item for `code`, e.g. after its SKU changed
    /// server-side. Returns `true` if there was one.
    pub fn invalidate(&self, code: &str) -> bool {
        let removed = self.inner.cache.invalidate(code);
        tracing::debug!(code, removed, "Cache entry invalidated");
        removed
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
        tracing::debug!("Cache cleared");
    }

    /// Physically drop stale cache entries; returns how many went.
    pub fn purge_expired(&self) -> usize {
        self.inner.cache.purge_expired()
    }
}
impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("options", &self.inner.options)
            .field("cache", &self.inner.cache)
            .field("surfaces", &self.inner.surfaces().len())
            .finish_non_exhaustive()
    }
}
