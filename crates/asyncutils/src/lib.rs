//! Async building blocks shared by the scan pipeline.
//!
//! - [`Clock`] supplies monotonic timestamps ([`TokioClock`] for production,
//!   [`ManualClock`] for deterministic tests).
//! - [`Scheduler`] arms cancellable timers ([`TokioScheduler`], or the virtual
//!   [`ManualScheduler`] that only fires when told to advance).
//! - [`RetryPolicy`] wraps a fallible async operation with bounded exponential
//!   backoff.

mod clock;
pub mod error;
pub mod retry;
mod schedule;

pub use crate::clock::{Clock, ClockHandle, ManualClock, TokioClock};
pub use crate::retry::{Classify, RetryOptions, RetryPolicy};
pub use crate::schedule::{ManualScheduler, Scheduler, SchedulerHandle, TimerHandle, TokioScheduler};
