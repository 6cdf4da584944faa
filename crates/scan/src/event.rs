use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Name of one logical input source (a text field, a camera feed, stdin).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(Arc<str>);
impl SurfaceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for SurfaceId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}
impl From<String> for SurfaceId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}
impl Borrow<str> for SurfaceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A surface's value at one point in time.
///
/// Created whenever a surface's value changes or a terminal key is pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub surface: SurfaceId,
    pub raw_value: String,
    /// Clock reading when the value arrived.
    pub timestamp: Duration,
}
impl ScanEvent {
    pub fn new(surface: SurfaceId, raw_value: impl Into<String>, timestamp: Duration) -> Self {
        Self { surface, raw_value: raw_value.into(), timestamp }
    }

    /// Length in characters, not bytes.
    pub fn len(&self) -> usize {
        code_len(&self.raw_value)
    }

    pub fn is_empty(&self) -> bool {
        self.raw_value.is_empty()
    }
}

pub(crate) fn code_len(code: &str) -> usize {
    code.chars().count()
}
