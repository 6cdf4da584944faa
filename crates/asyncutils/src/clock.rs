use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

pub type ClockHandle = Arc<dyn Clock>;

/// Source of monotonic timestamps.
///
/// Timestamps are measured from an arbitrary, per-clock origin, so they are
/// only meaningful when compared with other timestamps from the same clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Clock backed by [`tokio::time::Instant`].
///
/// Follows tokio's test-time: inside `#[tokio::test(start_paused = true)]` it
/// only moves when the runtime auto-advances or [`tokio::time::advance`] is
/// called.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}
impl TokioClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}
impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Virtual clock that only moves when told to.
///
/// # Examples
///
/// ```
/// use shelf_asyncutils::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::default();
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(clock.now(), Duration::from_millis(250));
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}
impl ManualClock {
    pub fn new(start: Duration) -> Self {
        let clock = Self::default();
        clock.set(start);
        clock
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(saturating_nanos(by), Ordering::SeqCst);
    }

    /// Jump to an absolute timestamp. Going backwards is allowed; it's a test
    /// clock, and some tests want exactly that.
    pub fn set(&self, at: Duration) {
        self.nanos.store(saturating_nanos(at), Ordering::SeqCst);
    }
}
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
