// src/progress.rs

//! Progress artifact polling.
//!
//! In file mode the worker rewrites a small JSON document as it advances:
//!
//! ```json
//! { "progress": 50, "message": "palette applied", "timestamp": 1718000000.5 }
//! ```
//!
//! [`ProgressMonitor`] polls that file alongside the worker and forwards each
//! increase to a [`ProgressSink`]. It is purely advisory: it never fails a
//! request, and it gives up early if progress stalls.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Limits;

/// Callback receiving progress updates. Called from a background task.
pub type ProgressSink = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// One observed state of the progress artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Completion percentage, clamped to 0-100.
    pub percent: u8,
    pub message: Option<String>,
    /// Seconds since the epoch, as written by the worker.
    pub timestamp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawProgress {
    progress: f64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    timestamp: Option<f64>,
}

impl ProgressSnapshot {
    pub fn new(percent: u8) -> Self {
        Self {
            percent: percent.min(100),
            message: None,
            timestamp: None,
        }
    }

    /// Parse artifact contents. Returns `None` for empty or malformed text;
    /// the worker may be in the middle of rewriting the file.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        match serde_json::from_str::<RawProgress>(text) {
            Ok(raw) => Some(Self {
                percent: raw.progress.clamp(0.0, 100.0) as u8,
                message: raw.message,
                timestamp: raw.timestamp,
            }),
            Err(e) => {
                debug!(error = %e, "ignoring malformed progress artifact");
                None
            }
        }
    }
}

/// Why [`ProgressMonitor::watch`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// The worker reported 100%.
    Completed,
    /// No increase for longer than the stall threshold.
    Stalled,
    DeadlineElapsed,
    Cancelled,
}

/// Polls a progress artifact until completion, stall, deadline or
/// cancellation.
#[derive(Debug, Clone, Copy)]
pub struct ProgressMonitor {
    poll_interval: Duration,
    stall_threshold: Duration,
}

impl ProgressMonitor {
    pub fn new(poll_interval: Duration, stall_threshold: Duration) -> Self {
        Self {
            poll_interval,
            stall_threshold,
        }
    }

    pub fn from_limits(limits: &Limits) -> Self {
        Self::new(limits.poll_interval, limits.stall_threshold)
    }

    /// Watch `path` until one of the [`MonitorExit`] conditions holds.
    ///
    /// The sink sees the first observed value and then every strict increase,
    /// each exactly once.
    pub async fn watch(
        &self,
        path: &Path,
        deadline: Instant,
        sink: Option<&ProgressSink>,
        cancel: &CancellationToken,
    ) -> MonitorExit {
        let mut last_reported: Option<u8> = None;
        let mut last_increase = Instant::now();

        loop {
            if cancel.is_cancelled() {
                return MonitorExit::Cancelled;
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(path = %path.display(), "progress monitor reached deadline");
                return MonitorExit::DeadlineElapsed;
            }

            if let Some(snapshot) = read_snapshot(path).await {
                let increased = last_reported.is_none_or(|p| snapshot.percent > p);

                if increased {
                    debug!(
                        percent = snapshot.percent,
                        message = snapshot.message.as_deref().unwrap_or(""),
                        "worker progress"
                    );
                    last_reported = Some(snapshot.percent);
                    last_increase = now;
                    if let Some(sink) = sink {
                        sink(&snapshot);
                    }
                }

                if snapshot.percent >= 100 {
                    return MonitorExit::Completed;
                }

                if !increased && now.duration_since(last_increase) >= self.stall_threshold {
                    info!(
                        percent = snapshot.percent,
                        stalled_for_ms = now.duration_since(last_increase).as_millis() as u64,
                        "worker progress stalled; no longer watching"
                    );
                    return MonitorExit::Stalled;
                }
            }

            let wake = (now + self.poll_interval).min(deadline);
            tokio::select! {
                _ = cancel.cancelled() => return MonitorExit::Cancelled,
                _ = sleep_until(wake) => {}
            }
        }
    }
}

async fn read_snapshot(path: &Path) -> Option<ProgressSnapshot> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => ProgressSnapshot::parse(&text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "progress artifact not readable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_artifact() {
        let snap =
            ProgressSnapshot::parse(r#"{"progress": 70, "message": "palette", "timestamp": 12.5}"#)
                .unwrap();
        assert_eq!(snap.percent, 70);
        assert_eq!(snap.message.as_deref(), Some("palette"));
        assert_eq!(snap.timestamp, Some(12.5));
    }

    #[test]
    fn clamps_out_of_range_values() {
        assert_eq!(ProgressSnapshot::parse(r#"{"progress": 140}"#).unwrap().percent, 100);
        assert_eq!(ProgressSnapshot::parse(r#"{"progress": -3}"#).unwrap().percent, 0);
    }

    #[test]
    fn malformed_or_partial_text_is_ignored() {
        assert!(ProgressSnapshot::parse("").is_none());
        assert!(ProgressSnapshot::parse(r#"{"progress": 5"#).is_none());
        assert!(ProgressSnapshot::parse(r#"{"message": "no progress field"}"#).is_none());
    }
}
