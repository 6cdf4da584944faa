#![allow(dead_code)]

use shelf_asyncutils::{ManualClock, ManualScheduler};
use shelf_scan::error::{Error, ErrorKind};
use shelf_scan::lookup::MockLookup;
use shelf_scan::{Feedback, ResolvedItem, ScanHandler, Scanner, ScannerOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SURFACE: &str = "sku";

/// Records every callback it receives.
#[derive(Default)]
pub struct Recorder {
    successes: Mutex<Vec<(String, ResolvedItem)>>,
    errors: Mutex<Vec<(String, ErrorKind)>>,
}
impl Recorder {
    pub fn successes(&self) -> Vec<(String, ResolvedItem)> {
        self.successes.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<(String, ErrorKind)> {
        self.errors.lock().unwrap().clone()
    }
}
impl ScanHandler for Recorder {
    fn on_success(&self, item: &ResolvedItem, code: &str) {
        self.successes.lock().unwrap().push((code.to_string(), item.clone()));
    }

    fn on_error(&self, error: &Error, code: &str) {
        self.errors.lock().unwrap().push((code.to_string(), (**error).clone()));
    }
}

#[derive(Default)]
pub struct CountingFeedback(AtomicUsize);
impl CountingFeedback {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
impl Feedback for CountingFeedback {
    fn success(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A scanner on virtual time, with one surface ([`SURFACE`]) attached.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub scheduler: Arc<ManualScheduler>,
    pub lookup: Arc<MockLookup>,
    pub feedback: Arc<CountingFeedback>,
    pub recorder: Arc<Recorder>,
    pub scanner: Scanner,
}
impl Harness {
    pub fn new(lookup: MockLookup) -> Self {
        Self::with_options(lookup, ScannerOptions::default())
    }

    pub fn with_options(lookup: MockLookup, options: ScannerOptions) -> Self {
        let clock = Arc::new(ManualClock::default());
        let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
        let lookup = Arc::new(lookup);
        let feedback = Arc::new(CountingFeedback::default());
        let scanner = Scanner::builder(options, lookup.clone())
            .clock(clock.clone())
            .scheduler(scheduler.clone())
            .feedback(feedback.clone())
            .build()
            .unwrap();
        let recorder = Arc::new(Recorder::default());
        scanner.attach(SURFACE, recorder.clone());
        Self { clock, scheduler, lookup, feedback, recorder, scanner }
    }

    /// Let `ms` of virtual time pass, firing whatever falls due.
    pub async fn wait(&self, ms: u64) {
        self.scheduler.advance(Duration::from_millis(ms)).await;
    }
}
