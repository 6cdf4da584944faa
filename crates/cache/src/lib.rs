//! In-memory TTL cache for resolved scan codes.
//!
//! The cache is shared process-wide by every scan surface: a code resolved via
//! one input populates the cache for all others. Entries go stale once they
//! are older than the TTL and are then skipped on lookup; they are only
//! removed physically by [`TtlCache::purge_expired`], an explicit
//! [`invalidate`](TtlCache::invalidate), or when a bounded cache needs room.
//!
//! # Expiry
//! An entry inserted at `t0` is returned up to and including `t0 + ttl`, and
//! never after. Lookups never refresh an entry's lifetime; only
//! [`put`](TtlCache::put) does.

use serde::{Deserialize, Serialize};
use shelf_asyncutils::ClockHandle;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Canonical cache key for a scanned code: surrounding whitespace removed and
/// case folded, so `" SKU0099\n"` and `"sku0099"` share an entry.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    pub ttl_secs: u64,
    /// Optional upper bound. When full, the oldest-inserted entry is evicted.
    pub max_entries: Option<NonZeroUsize>,
}
impl Default for CacheOptions {
    fn default() -> Self {
        Self { ttl_secs: 300, max_entries: None }
    }
}
impl CacheOptions {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Duration,
}

/// Time-to-live cache keyed by [normalized](normalize_code) codes.
///
/// # Examples
///
/// ```
/// use shelf_asyncutils::ManualClock;
/// use shelf_cache::TtlCache;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::default());
/// let cache = TtlCache::new(Duration::from_secs(60), clock.clone());
/// cache.put("SKU0099", 42);
/// assert_eq!(cache.get("  sku0099 "), Some(42));
///
/// clock.advance(Duration::from_secs(61));
/// assert_eq!(cache.get("SKU0099"), None);
/// ```
pub struct TtlCache<V> {
    ttl: Duration,
    max_entries: Option<NonZeroUsize>,
    clock: ClockHandle,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, clock: ClockHandle) -> Self {
        Self {
            ttl,
            max_entries: None,
            clock,
            entries: RwLock::default(),
        }
    }

    pub fn from_options(options: &CacheOptions, clock: ClockHandle) -> Self {
        let cache = Self::new(options.ttl(), clock);
        match options.max_entries {
            Some(max) => cache.with_max_entries(max),
            None => cache,
        }
    }

    /// Bound the number of stored entries (stale ones included).
    pub fn with_max_entries(mut self, max: NonZeroUsize) -> Self {
        self.max_entries = Some(max);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &CacheEntry<V>, now: Duration) -> bool {
        now.saturating_sub(entry.inserted_at) <= self.ttl
    }

    /// Fresh value for `code`, if any. Stale entries are skipped but left in
    /// place.
    pub fn get(&self, code: &str) -> Option<V> {
        let key = normalize_code(code);
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&key).filter(|entry| self.is_fresh(entry, now)).map(|entry| entry.value.clone())
    }

    /// Insert or overwrite the entry for `code` with a fresh timestamp.
    pub fn put(&self, code: &str, value: V) {
        let key = normalize_code(code);
        let inserted_at = self.clock.now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(max) = self.max_entries
            && !entries.contains_key(&key)
            && entries.len() >= max.get()
        {
            let oldest = entries.iter().min_by_key(|(_, entry)| entry.inserted_at).map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                tracing::debug!(evicted = %oldest, max = max.get(), "Cache full; evicting oldest entry");
                entries.remove(&oldest);
            }
        }
        entries.insert(key, CacheEntry { value, inserted_at });
    }

    /// Remove the entry for `code`. Returns `true` if one was stored (fresh or
    /// not).
    pub fn invalidate(&self, code: &str) -> bool {
        let key = normalize_code(code);
        self.entries.write().unwrap_or_else(PoisonError::into_inner).remove(&key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Physically remove every stale entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_sub(entry.inserted_at) <= self.ttl);
        before - entries.len()
    }

    /// Number of stored entries, including stale ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache").field("ttl", &self.ttl).field("max_entries", &self.max_entries).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use shelf_asyncutils::ManualClock;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(300);

    fn cache() -> (Arc<ManualClock>, TtlCache<u32>) {
        let clock = Arc::new(ManualClock::new(Duration::from_secs(1000)));
        let cache = TtlCache::new(TTL, clock.clone());
        (clock, cache)
    }

    #[rstest]
    #[case("SKU0099", "sku0099")]
    #[case("  SKU0099\n", "sku0099")]
    #[case("abc123", "abc123")]
    #[case("", "")]
    fn test_normalize_code(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_code(input), expected);
    }

    #[rstest]
    #[case(TTL - Duration::from_millis(1), Some(7))]
    #[case(TTL, Some(7))]
    #[case(TTL + Duration::from_millis(1), None)]
    fn test_expiry_boundary(#[case] elapsed: Duration, #[case] expected: Option<u32>) {
        let (clock, cache) = cache();
        cache.put("ABC123", 7);
        clock.advance(elapsed);
        assert_eq!(cache.get("abc123"), expected);
    }

    #[test]
    fn test_get_does_not_extend_lifetime() {
        let (clock, cache) = cache();
        cache.put("ABC123", 1);
        for _ in 0..5 {
            clock.advance(Duration::from_secs(60));
            assert_eq!(cache.get("ABC123"), Some(1));
        }
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("ABC123"), None);
    }

    #[test]
    fn test_expired_entries_are_lazily_kept() {
        let (clock, cache) = cache();
        cache.put("A1", 1);
        cache.put("B2", 2);
        clock.advance(TTL + Duration::from_secs(1));
        cache.put("C3", 3);
        assert_eq!(cache.get("A1"), None);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("C3"), Some(3));
    }

    #[test]
    fn test_put_overwrites_with_fresh_timestamp() {
        let (clock, cache) = cache();
        cache.put("ABC123", 1);
        clock.advance(Duration::from_secs(200));
        cache.put("abc123 ", 2);
        clock.advance(Duration::from_secs(200));
        assert_eq!(cache.get("ABC123"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (_clock, cache) = cache();
        cache.put("A1", 1);
        cache.put("B2", 2);
        assert!(cache.invalidate(" a1 "));
        assert!(!cache.invalidate("a1"));
        assert_eq!(cache.get("A1"), None);
        assert_eq!(cache.get("B2"), Some(2));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_bounded_cache_evicts_oldest_inserted() {
        let (clock, cache) = cache();
        let cache = cache.with_max_entries(NonZeroUsize::new(2).unwrap());
        cache.put("A1", 1);
        clock.advance(Duration::from_millis(1));
        cache.put("B2", 2);
        clock.advance(Duration::from_millis(1));
        // Reading doesn't count as use: A1 is still the oldest.
        assert_eq!(cache.get("A1"), Some(1));
        cache.put("C3", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("A1"), None);
        assert_eq!(cache.get("B2"), Some(2));
        assert_eq!(cache.get("C3"), Some(3));
        // Overwriting an existing key never evicts.
        cache.put("B2", 20);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("C3"), Some(3));
    }

    #[test]
    fn test_options_default() {
        let options = CacheOptions::default();
        assert_eq!(options.ttl(), Duration::from_secs(300));
        assert_eq!(options.max_entries, None);
    }
}
