//! Code resolution: cache, then lookup-with-retry, then cache again.

use super::surface::Claim;
use super::{Inner, Scanner};
use crate::error::{Error, ErrorKind, Result};
use crate::event::{SurfaceId, code_len};
use crate::feedback::emit_success;
use crate::handler::ScanHandler;
use crate::item::ResolvedItem;
use crate::lookup::{LookupError, LookupErrorKind, LookupResult};
use exn::OptionExt;
use serde_json::Value;
use shelf_asyncutils::Classify;
use std::sync::Arc;
use tracing::instrument;

/// Holds a surface's claim for the duration of a resolution.
///
/// [`release`](Self::release) hands the surface back once the outcome is
/// known; dropping an unreleased guard (panic, cancelled future) does the
/// same. Either way only the claim that still owns the surface releases it,
/// so a claim made after a mid-flight reset is left alone.
struct InFlight {
    inner: Arc<Inner>,
    surface: SurfaceId,
    generation: u64,
    token: u64,
    released: bool,
}
impl InFlight {
    /// Release the surface. Returns whether it is still the attachment this
    /// claim was made on, i.e. whether its handler should hear the outcome.
    fn release(&mut self) -> bool {
        self.released = true;
        let mut surfaces = self.inner.surfaces();
        match surfaces.get_mut(&self.surface) {
            Some(state) if state.generation() == self.generation => {
                state.release(self.token);
                true
            },
            _ => false,
        }
    }
}
impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.released {
            self.release();
        }
    }
}

fn deliver(handler: &dyn ScanHandler, code: &str, result: &Result<ResolvedItem>) {
    match result {
        Ok(item) => handler.on_success(item, code),
        Err(err) => handler.on_error(err, code),
    }
}

impl Inner {
    /// Run a resolution the surface has already been claimed for, release the
    /// surface, and report the outcome to its handler (if the surface is still
    /// around).
    pub(super) async fn run_claimed(self: &Arc<Self>, claim: Claim, code: &str) -> Result<ResolvedItem> {
        let mut in_flight = InFlight {
            inner: Arc::clone(self),
            surface: claim.surface.clone(),
            generation: claim.generation,
            token: claim.token,
            released: false,
        };
        let result = self.resolve_code(code).await;
        // Idle again before the handler runs, so it can scan straight away.
        if in_flight.release() {
            deliver(claim.handler.as_ref(), code, &result);
        } else {
            tracing::debug!(surface = %claim.surface, "Surface detached mid-resolution; dropping callbacks");
        }
        result
    }

    #[instrument(level = "debug", skip(self), fields(cached))]
    async fn resolve_code(&self, code: &str) -> Result<ResolvedItem> {
        let trimmed = code.trim();
        if code_len(trimmed) < self.options.classifier.min_length {
            exn::bail!(ErrorKind::ShortCode(code.to_string()));
        }
        if let Some(item) = self.cache.get(trimmed) {
            tracing::Span::current().record("cached", true);
            emit_success(self.feedback.as_ref());
            return Ok(item);
        }
        tracing::Span::current().record("cached", false);
        let payload = self
            .retry
            .execute(|| self.lookup_once(trimmed))
            .await
            .map_err(|err| self.lookup_failure(err, trimmed))?;
        let item = ResolvedItem::from_payload(payload, &self.options.lookup.identity_field)
            .ok_or_raise(|| ErrorKind::ItemNotFound(trimmed.to_string()))?;
        // Negative results are never cached; only a valid item gets this far.
        self.cache.put(trimmed, item.clone());
        tracing::info!(code = trimmed, id = item.id(), "Scan resolved");
        emit_success(self.feedback.as_ref());
        Ok(item)
    }

    async fn lookup_once(&self, code: &str) -> LookupResult<Value> {
        match tokio::time::timeout(self.options.lookup.timeout(), self.lookup.lookup(code)).await {
            Ok(result) => result,
            Err(_elapsed) => exn::bail!(LookupErrorKind::Timeout),
        }
    }

    fn lookup_failure(&self, err: LookupError, code: &str) -> Error {
        let kind = if matches!(&*err, LookupErrorKind::NotFound) {
            ErrorKind::ItemNotFound(code.to_string())
        } else if self.retry.is_retryable(&err) {
            tracing::warn!(code, error = %err.message(), "Lookup still failing after retries");
            ErrorKind::TransientLookup
        } else {
            tracing::error!(code, error = %err.message(), "Unexpected lookup failure");
            ErrorKind::Unexpected
        };
        err.raise(kind)
    }
}

impl Scanner {
    /// Resolve a code and return the outcome.
    ///
    /// Not tied to any surface, so there is no single-flight guard; use
    /// [`resolve_on`](Self::resolve_on) for that.
    pub async fn resolve(&self, code: &str) -> Result<ResolvedItem> {
        self.inner.resolve_code(code).await
    }

    /// Callback flavour of [`resolve`](Self::resolve): `handler` hears about
    /// the outcome exactly once, and the outcome is returned as well.
    pub async fn resolve_with(&self, code: &str, handler: &dyn ScanHandler) -> Result<ResolvedItem> {
        let result = self.inner.resolve_code(code).await;
        deliver(handler, code, &result);
        result
    }
}
