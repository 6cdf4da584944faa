//! Success feedback (a beep, a buzz).
//!
//! Purely cosmetic: a feedback sink that is missing, fails, or even panics
//! must never affect the outcome of a resolution.

use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

pub type FeedbackHandle = Arc<dyn Feedback>;

pub trait Feedback: Send + Sync {
    /// Signal a successful scan. Best-effort and non-blocking; implementations
    /// swallow their own failures.
    fn success(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeedback;

impl Feedback for NoFeedback {
    fn success(&self) {}
}

/// Rings the terminal bell (BEL on stderr).
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl Feedback for TerminalBell {
    fn success(&self) {
        let mut stderr = std::io::stderr().lock();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|()| stderr.flush()) {
            tracing::trace!(error = %e, "Terminal bell unavailable");
        }
    }
}

/// Fire `feedback`, containing any panic it throws.
pub(crate) fn emit_success(feedback: &dyn Feedback) {
    if catch_unwind(AssertUnwindSafe(|| feedback.success())).is_err() {
        tracing::warn!("Feedback sink panicked; ignoring");
    }
}
