//! Cancellable one-shot timers.
//!
//! A [`Scheduler`] runs a future once a delay has elapsed, and hands back a
//! [`TimerHandle`] that can call the whole thing off before it fires. Real
//! code uses [`TokioScheduler`]; tests use [`ManualScheduler`], which never
//! fires anything until the test advances its [`ManualClock`].

use crate::clock::{Clock, ManualClock};
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

pub type SchedulerHandle = Arc<dyn Scheduler>;

pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed.
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle;
}

/// Cancels a scheduled task that has not fired yet.
///
/// Dropping the handle does **not** cancel the task; a timer that has already
/// fired may still be running work that must finish.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}
impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle").field("armed", &self.cancel.is_some()).finish()
    }
}

/// Timers on the ambient tokio runtime.
///
/// Must be used from within a tokio runtime context ([`tokio::spawn`] is used
/// to host each timer).
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle {
        let (sleep, abort) = futures::future::abortable(tokio::time::sleep(delay));
        tokio::spawn(async move {
            // Only the sleep is abortable: once the timer has fired the task
            // runs to completion even if the handle is cancelled afterwards.
            if sleep.await.is_ok() {
                task.await;
            }
        });
        TimerHandle::new(move || abort.abort())
    }
}

type Queue = BTreeMap<(Duration, u64), BoxFuture<'static, ()>>;

#[derive(Default)]
struct Tasks {
    next_id: u64,
    queue: Queue,
}

/// Virtual-time scheduler driven by a [`ManualClock`].
///
/// Nothing fires until [`advance`](Self::advance) is awaited, which moves the
/// clock forward and runs every due task in order of due time (ties broken by
/// scheduling order).
///
/// # Examples
///
/// ```
/// use shelf_asyncutils::{ManualClock, ManualScheduler, Scheduler};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let scheduler = ManualScheduler::new(Arc::new(ManualClock::default()));
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = fired.clone();
/// scheduler.schedule(Duration::from_millis(300), Box::pin(async move {
///     flag.store(true, Ordering::SeqCst);
/// }));
///
/// scheduler.advance(Duration::from_millis(299)).await;
/// assert!(!fired.load(Ordering::SeqCst));
/// scheduler.advance(Duration::from_millis(1)).await;
/// assert!(fired.load(Ordering::SeqCst));
/// # }
/// ```
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    tasks: Arc<Mutex<Tasks>>,
}
impl ManualScheduler {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self { clock, tasks: Arc::default() }
    }

    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    /// Number of armed (not yet fired, not cancelled) timers.
    pub fn pending(&self) -> usize {
        lock(&self.tasks).queue.len()
    }

    /// Move the clock forward by `by`, running every task that falls due on
    /// the way. Tasks scheduled by a running task are honoured too, as long as
    /// they fall due within the window.
    pub async fn advance(&self, by: Duration) {
        let target = self.clock.now() + by;
        loop {
            let next = {
                let mut tasks = lock(&self.tasks);
                match tasks.queue.first_key_value().map(|(&(due, _), _)| due) {
                    Some(due) if due <= target => tasks.queue.pop_first(),
                    _ => None,
                }
            };
            let Some(((due, _), task)) = next else {
                break;
            };
            if due > self.clock.now() {
                self.clock.set(due);
            }
            task.await;
        }
        if target > self.clock.now() {
            self.clock.set(target);
        }
    }
}
impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle {
        let key = {
            let mut tasks = lock(&self.tasks);
            let key = (self.clock.now() + delay, tasks.next_id);
            tasks.next_id += 1;
            tasks.queue.insert(key, task);
            key
        };
        let tasks: Weak<Mutex<Tasks>> = Arc::downgrade(&self.tasks);
        TimerHandle::new(move || {
            if let Some(tasks) = tasks.upgrade() {
                lock(&tasks).queue.remove(&key);
            }
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
