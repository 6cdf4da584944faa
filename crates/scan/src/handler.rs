use crate::error::Error;
use crate::item::ResolvedItem;
use std::sync::Arc;

pub type HandlerHandle = Arc<dyn ScanHandler>;

/// Receives the outcome of resolutions on a surface.
///
/// Exactly one of the two methods is called, exactly once, per resolution.
pub trait ScanHandler: Send + Sync {
    fn on_success(&self, item: &ResolvedItem, code: &str);
    fn on_error(&self, error: &Error, code: &str);
}

/// A [`ScanHandler`] made of two closures; see [`handler_fn`].
pub struct FnHandler<S, E> {
    on_success: S,
    on_error: E,
}
impl<S, E> ScanHandler for FnHandler<S, E>
where
    S: Fn(&ResolvedItem, &str) + Send + Sync,
    E: Fn(&Error, &str) + Send + Sync,
{
    fn on_success(&self, item: &ResolvedItem, code: &str) {
        (self.on_success)(item, code)
    }

    fn on_error(&self, error: &Error, code: &str) {
        (self.on_error)(error, code)
    }
}

/// Build a [`ScanHandler`] from a success and an error callback.
///
/// ```
/// use shelf_scan::handler_fn;
///
/// let handler = handler_fn(
///     |item, code| println!("{code} -> {}", item.id()),
///     |err, code| eprintln!("{code}: {:?}", err),
/// );
/// # let _ = handler;
/// ```
pub fn handler_fn<S, E>(on_success: S, on_error: E) -> FnHandler<S, E>
where
    S: Fn(&ResolvedItem, &str) + Send + Sync,
    E: Fn(&Error, &str) + Send + Sync,
{
    FnHandler { on_success, on_error }
}

impl<T: ScanHandler + ?Sized> ScanHandler for Arc<T> {
    fn on_success(&self, item: &ResolvedItem, code: &str) {
        (**self).on_success(item, code)
    }

    fn on_error(&self, error: &Error, code: &str) {
        (**self).on_error(error, code)
    }
}
