//! Barcode scan resolution.
//!
//! Turns raw keystrokes (or decoded camera frames) from one or more input
//! surfaces into resolved inventory items:
//!
//! 1. Every value change is [classified](classify::classify) as a likely
//!    hardware-scanner burst, manual typing worth debouncing, or noise.
//! 2. Each surface keeps at most one armed timer; new input re-arms it, and a
//!    per-surface epoch makes sure a stale timer can never fire.
//! 3. When a timer fires (or Enter is pressed) the surface is claimed, and the
//!    code is resolved through the shared [TTL cache](shelf_cache::TtlCache),
//!    falling back to the remote [`Lookup`] wrapped in a
//!    [`RetryPolicy`](shelf_asyncutils::RetryPolicy).
//! 4. The surface's [`ScanHandler`] hears about the outcome exactly once, and
//!    the surface is released no matter how the resolution ended.
//!
//! Everything hangs off a [`Scanner`], an explicit service object with its
//! clock, scheduler, lookup and feedback sink injected; there is no global
//! state, so independent scanners (and deterministic tests) can coexist.

pub mod classify;
pub mod error;
mod event;
mod feedback;
mod handler;
mod item;
pub mod lookup;
mod options;
mod scanner;

pub use crate::classify::{Classification, ClassifierOptions, Decision};
pub use crate::event::{ScanEvent, SurfaceId};
pub use crate::feedback::{Feedback, FeedbackHandle, NoFeedback, TerminalBell};
pub use crate::handler::{FnHandler, HandlerHandle, ScanHandler, handler_fn};
pub use crate::item::ResolvedItem;
pub use crate::lookup::{Lookup, LookupHandle};
pub use crate::options::{LookupOptions, ScannerOptions};
pub use crate::scanner::{Scanner, ScannerBuilder};
