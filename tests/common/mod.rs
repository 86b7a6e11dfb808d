#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use pixelart::progress::{ProgressSink, ProgressSnapshot};

pub use pixelart_test_utils::{init_tracing, sample_image, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// A progress sink that records every reported percentage.
pub fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<u8>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let sink: ProgressSink = Arc::new(move |snapshot: &ProgressSnapshot| {
        sink_seen.lock().unwrap().push(snapshot.percent);
    });
    (sink, seen)
}

pub fn strictly_increasing(values: &[u8]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}
