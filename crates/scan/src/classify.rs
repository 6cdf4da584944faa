//! Scanner-burst vs. manual-entry classification.
//!
//! Hardware scanners "type" a whole code within a few milliseconds, while
//! people pause between keys. [`classify`] looks at the latest value of a
//! surface and the gap since the previous one, and decides how long to wait
//! before treating the value as a complete code.
//!
//! Rules, first match wins:
//! 1. Shorter than `min_length`: [`Decision::Ignore`].
//! 2. Longer than `max_length`: [`Decision::Ignore`] (a paste of unrelated
//!    text, most likely).
//! 3. Arrived less than `scanner_typing_speed_ms` after the previous value and
//!    longer than `burst_min_length`: [`Decision::Burst`], resolve almost
//!    immediately.
//! 4. Otherwise: [`Decision::Debounce`], wait `manual_input_delay_ms` for the
//!    typist to pause.

use crate::error::{ErrorKind, Result};
use crate::event::ScanEvent;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierOptions {
    /// Maximum gap between values for them to count as one scanner burst.
    pub scanner_typing_speed_ms: u64,
    pub min_length: usize,
    pub max_length: usize,
    /// Quiet period after manual typing before the value is resolved.
    pub manual_input_delay_ms: u64,
    /// A burst must be strictly longer than this.
    pub burst_min_length: usize,
    pub burst_delay_ms: u64,
}
impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            scanner_typing_speed_ms: 50,
            min_length: 3,
            max_length: 50,
            manual_input_delay_ms: 300,
            burst_min_length: 5,
            burst_delay_ms: 20,
        }
    }
}
impl ClassifierOptions {
    pub fn validate(&self) -> Result<()> {
        if self.min_length == 0 {
            exn::bail!(ErrorKind::Config("classifier.min_length must be at least 1".into()));
        }
        if self.min_length > self.max_length {
            exn::bail!(ErrorKind::Config(format!(
                "classifier.min_length ({}) exceeds classifier.max_length ({})",
                self.min_length, self.max_length
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Probably a hardware scanner; resolve after a token delay.
    Burst,
    /// Probably a person; wait for them to stop typing.
    Debounce,
    /// Not a code (yet).
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub decision: Decision,
    /// How long to wait before resolving. Zero for [`Decision::Ignore`].
    pub delay: Duration,
}
impl Classification {
    const IGNORE: Self = Self { decision: Decision::Ignore, delay: Duration::ZERO };
}

/// Classify `current` given the surface's `previous` event, if any.
///
/// Pure: the only notion of time is the timestamps carried by the events.
pub fn classify(current: &ScanEvent, previous: Option<&ScanEvent>, options: &ClassifierOptions) -> Classification {
    let len = current.len();
    if len < options.min_length || len > options.max_length {
        return Classification::IGNORE;
    }
    let typing_speed = Duration::from_millis(options.scanner_typing_speed_ms);
    if let Some(previous) = previous
        && current.timestamp.saturating_sub(previous.timestamp) < typing_speed
        && len > options.burst_min_length
    {
        return Classification {
            decision: Decision::Burst,
            delay: Duration::from_millis(options.burst_delay_ms),
        };
    }
    Classification {
        decision: Decision::Debounce,
        delay: Duration::from_millis(options.manual_input_delay_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SurfaceId;
    use rstest::rstest;

    fn event(value: &str, at_ms: u64) -> ScanEvent {
        ScanEvent::new(SurfaceId::from("sku"), value, Duration::from_millis(at_ms))
    }

    fn burst() -> Classification {
        Classification { decision: Decision::Burst, delay: Duration::from_millis(20) }
    }

    fn debounce() -> Classification {
        Classification { decision: Decision::Debounce, delay: Duration::from_millis(300) }
    }

    #[rstest]
    // Two values 10ms apart, lengths 8 then 12: scanner.
    #[case(event("12345678", 1000), Some(event("1234567", 990)), burst())]
    #[case(event("123456789012", 1010), Some(event("12345678", 1000)), burst())]
    // Fast, but too short to be trusted as a burst.
    #[case(event("12345", 1010), Some(event("1234", 1000)), debounce())]
    // Slow typing.
    #[case(event("SKU0099", 1350), Some(event("SKU009", 1000)), debounce())]
    // Exactly at the typing speed threshold is no longer a burst.
    #[case(event("SKU0099", 1050), Some(event("SKU009", 1000)), debounce())]
    // First value seen on the surface.
    #[case(event("SKU0099", 1000), None, debounce())]
    // Too short / too long.
    #[case(event("AB", 1000), None, Classification::IGNORE)]
    #[case(event("AB", 1005), Some(event("A", 1000)), Classification::IGNORE)]
    #[case(event(&"X".repeat(51), 1005), Some(event(&"X".repeat(50), 1000)), Classification::IGNORE)]
    // Boundaries are inclusive.
    #[case(event("ABC", 1000), None, debounce())]
    #[case(event(&"X".repeat(50), 1000), None, debounce())]
    fn test_classify(#[case] current: ScanEvent, #[case] previous: Option<ScanEvent>, #[case] expected: Classification) {
        assert_eq!(classify(&current, previous.as_ref(), &ClassifierOptions::default()), expected);
    }

    #[test]
    fn test_length_counts_characters() {
        // Six characters, twelve bytes.
        let current = event("ÄÖÜäöü", 1005);
        let previous = event("ÄÖÜäö", 1000);
        assert_eq!(classify(&current, Some(&previous), &ClassifierOptions::default()), burst());
    }

    #[test]
    fn test_custom_manual_delay() {
        let options = ClassifierOptions { manual_input_delay_ms: 750, ..Default::default() };
        let result = classify(&event("SKU0099", 0), None, &options);
        assert_eq!(result.decision, Decision::Debounce);
        assert_eq!(result.delay, Duration::from_millis(750));
    }

    #[rstest]
    #[case(ClassifierOptions { min_length: 0, ..Default::default() })]
    #[case(ClassifierOptions { min_length: 10, max_length: 9, ..Default::default() })]
    fn test_invalid_options(#[case] options: ClassifierOptions) {
        let err = options.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }
}
