//! Per-surface debouncing and the single-flight guard.
//!
//! Each attached surface has one [`SurfaceState`]:
//!
//! ```text
//! idle --(burst/debounce)--> pending --(timer fires)--> resolving --> idle
//!            ^                  |
//!            +---(new input)----+  (re-arms the timer)
//! ```
//!
//! Every input, terminal key, emission and reset bumps the surface's epoch.
//! A timer remembers the epoch it was armed at and does nothing if the epoch
//! has moved on, so a stale timer can never resolve an outdated value. While
//! a resolution is in flight (the surface holds an active claim) any further
//! emission on that surface is dropped. Each claim carries its own token, and
//! only the resolution holding the current one may release the surface.

use super::{Inner, Scanner};
use crate::classify::{Classification, Decision, classify};
use crate::error::{ErrorKind, Result};
use crate::event::{ScanEvent, SurfaceId, code_len};
use crate::handler::{HandlerHandle, ScanHandler};
use crate::item::ResolvedItem;
use exn::OptionExt;
use shelf_asyncutils::TimerHandle;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Duration;

pub(crate) struct SurfaceState {
    id: SurfaceId,
    handler: HandlerHandle,
    /// Distinguishes this attachment from earlier ones under the same name.
    generation: u64,
    epoch: u64,
    last_event: Option<ScanEvent>,
    pending: Option<TimerHandle>,
    /// Token of the in-flight resolution, if any.
    active_claim: Option<u64>,
    claims: u64,
}
impl SurfaceState {
    fn cancel_pending(&mut self) {
        if let Some(timer) = self.pending.take() {
            timer.cancel();
        }
    }

    /// Back to idle: no timer, no in-flight resolution, no typing history.
    pub(super) fn reset(&mut self) {
        self.cancel_pending();
        self.epoch += 1;
        self.active_claim = None;
        self.last_event = None;
    }

    /// Back to idle, but only on behalf of the claim that still owns the
    /// surface.
    pub(super) fn release(&mut self, token: u64) {
        if self.active_claim == Some(token) {
            self.reset();
        }
    }

    pub(super) fn generation(&self) -> u64 {
        self.generation
    }

    /// Mark the surface as resolving, unless it already is.
    fn claim(&mut self) -> Option<Claim> {
        if self.active_claim.is_some() {
            tracing::debug!(surface = %self.id, "Resolution already in flight; dropping emission");
            return None;
        }
        self.claims += 1;
        self.active_claim = Some(self.claims);
        self.epoch += 1;
        Some(Claim {
            surface: self.id.clone(),
            handler: self.handler.clone(),
            generation: self.generation,
            token: self.claims,
        })
    }
}

/// Permission to run one resolution on a surface.
pub(super) struct Claim {
    pub(super) surface: SurfaceId,
    pub(super) handler: HandlerHandle,
    pub(super) generation: u64,
    pub(super) token: u64,
}

impl Scanner {
    /// Register an input surface (a text field, a camera feed...) and the
    /// handler that hears about its resolutions.
    ///
    /// Attaching a name that is already attached replaces it: the old
    /// handler's pending timer is cancelled, and an in-flight resolution for
    /// it will no longer call back.
    pub fn attach(&self, surface: impl Into<SurfaceId>, handler: impl ScanHandler + 'static) -> SurfaceId {
        let id = surface.into();
        let generation = self.inner.attachments.fetch_add(1, Ordering::Relaxed) + 1;
        let state = SurfaceState {
            id: id.clone(),
            handler: Arc::new(handler),
            generation,
            epoch: 0,
            last_event: None,
            pending: None,
            active_claim: None,
            claims: 0,
        };
        if let Some(mut previous) = self.inner.surfaces().insert(id.clone(), state) {
            previous.cancel_pending();
        }
        tracing::debug!(surface = %id, "Scan surface attached");
        id
    }

    /// Forget a surface entirely (blur/unmount for good). Returns `false` if
    /// it wasn't attached.
    pub fn dispose(&self, surface: &str) -> bool {
        let removed = self.inner.surfaces().remove(surface);
        match removed {
            Some(mut state) => {
                state.cancel_pending();
                tracing::debug!(surface, "Scan surface disposed");
                true
            },
            None => false,
        }
    }

    /// Return a surface to idle: cancel its timer and release the in-flight
    /// guard. Called automatically once a resolution finishes; call it on blur
    /// too.
    pub fn reset(&self, surface: &str) -> Result<()> {
        let mut surfaces = self.inner.surfaces();
        let state = surfaces.get_mut(surface).ok_or_raise(|| ErrorKind::UnknownSurface(surface.to_string()))?;
        state.reset();
        Ok(())
    }

    /// Whether a resolution is currently in flight on `surface` (`None` if the
    /// surface isn't attached).
    pub fn is_in_progress(&self, surface: &str) -> Option<bool> {
        self.inner.surfaces().get(surface).map(|state| state.active_claim.is_some())
    }

    /// Feed the surface's current value. Classifies it and (re-)arms or
    /// cancels the surface's timer accordingly.
    pub fn on_input(&self, surface: &str, value: &str) -> Result<Classification> {
        let mut surfaces = self.inner.surfaces();
        let state = surfaces.get_mut(surface).ok_or_raise(|| ErrorKind::UnknownSurface(surface.to_string()))?;
        let event = ScanEvent::new(state.id.clone(), value, self.inner.clock.now());
        let classification = classify(&event, state.last_event.as_ref(), &self.inner.options.classifier);
        state.last_event = Some(event);
        state.epoch += 1;
        state.cancel_pending();
        if classification.decision != Decision::Ignore {
            let task = fire(
                Arc::downgrade(&self.inner),
                state.id.clone(),
                state.generation,
                state.epoch,
                value.to_string(),
            );
            state.pending = Some(self.inner.scheduler.schedule(classification.delay, Box::pin(task)));
        }
        tracing::trace!(surface, decision = ?classification.decision, delay_ms = classification.delay.as_millis() as u64, "Input classified");
        Ok(classification)
    }

    /// Enter (or another terminal key) on the surface: resolve the current
    /// value right away, provided it is at least `min_length` long and the
    /// surface isn't already resolving. Returns whether a resolution started.
    ///
    /// The resolution itself runs on the scheduler, so this never blocks.
    pub fn on_terminal_key(&self, surface: &str, value: &str) -> Result<bool> {
        let claim = {
            let mut surfaces = self.inner.surfaces();
            let state = surfaces.get_mut(surface).ok_or_raise(|| ErrorKind::UnknownSurface(surface.to_string()))?;
            state.cancel_pending();
            state.epoch += 1;
            state.last_event = Some(ScanEvent::new(state.id.clone(), value, self.inner.clock.now()));
            if code_len(value) < self.inner.options.classifier.min_length {
                tracing::debug!(surface, "Terminal key on a too-short value; ignoring");
                return Ok(false);
            }
            state.claim()
        };
        let Some(claim) = claim else {
            return Ok(false);
        };
        let inner = self.inner.clone();
        let code = value.to_string();
        // The surface is already claimed, so this timer is never cancelled.
        let _detached = self.inner.scheduler.schedule(
            Duration::ZERO,
            Box::pin(async move {
                let _ = inner.run_claimed(claim, &code).await;
            }),
        );
        Ok(true)
    }

    /// Resolve `code` on behalf of `surface`, honouring its single-flight
    /// guard, and wait for the outcome.
    ///
    /// Returns `None` when the emission was dropped because the surface is
    /// already resolving; the in-flight resolution keeps the surface. The
    /// surface's handler is called exactly as for interactive scans.
    pub async fn resolve_on(&self, surface: &str, code: &str) -> Option<Result<ResolvedItem>> {
        let claim = {
            let mut surfaces = self.inner.surfaces();
            let Some(state) = surfaces.get_mut(surface) else {
                return Some(Err(exn::Exn::from(ErrorKind::UnknownSurface(surface.to_string()))));
            };
            state.cancel_pending();
            state.claim()?
        };
        Some(self.inner.run_claimed(claim, code).await)
    }
}

/// Body of an armed debounce/burst timer.
async fn fire(inner: Weak<Inner>, surface: SurfaceId, generation: u64, epoch: u64, code: String) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let claim = {
        let mut surfaces = inner.surfaces();
        let Some(state) = surfaces.get_mut(&surface) else {
            return;
        };
        if state.generation != generation || state.epoch != epoch {
            tracing::trace!(%surface, "Stale timer fired; ignoring");
            return;
        }
        // Fired: forget the handle without cancelling ourselves.
        state.pending = None;
        state.claim()
    };
    if let Some(claim) = claim {
        let _ = inner.run_claimed(claim, &code).await;
    }
}
