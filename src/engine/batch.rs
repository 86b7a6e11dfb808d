// src/engine/batch.rs

//! Sequential batch processing with aggregated progress.
//!
//! Items run one worker at a time. Overall progress for item `i` of `n` at
//! worker progress `p` is `(i * 100 + min(p, 99)) / n`, so 100 is reached only
//! once the last item has finished. Reports never go backwards.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use image::DynamicImage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec;
use crate::errors::PixelartError;
use crate::options::ProcessingOptions;
use crate::progress::{ProgressSink, ProgressSnapshot};
use crate::types::TransferMode;

use super::orchestrator::Orchestrator;
use super::result::ProcessingResult;

/// Callback receiving overall batch progress (0-100).
pub type BatchProgressSink = Arc<dyn Fn(u8) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
}

/// One file in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub source: PathBuf,
    pub output: PathBuf,
    pub status: BatchStatus,
}

impl BatchItem {
    /// Item writing to the default destination next to `source`.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let output = default_output_path(&source);
        Self::with_output(source, output)
    }

    pub fn with_output(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            status: BatchStatus::Pending,
        }
    }
}

/// `<stem>_pixelart<ext>` next to `source`; `.png` when there is no extension.
pub fn default_output_path(source: &Path) -> PathBuf {
    let mut name = OsString::from(source.file_stem().unwrap_or(source.as_os_str()));
    name.push("_pixelart.");
    name.push(source.extension().unwrap_or(OsStr::new("png")));
    source.with_file_name(name)
}

/// Progress notifications from [`Orchestrator::run_batch`].
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    ItemStarted { index: usize, source: PathBuf },
    /// Overall batch progress, non-decreasing.
    Progress(u8),
    ItemFinished { index: usize, status: BatchStatus },
    Finished(BatchSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Items never started because the batch was cancelled.
    pub pending: usize,
}

impl BatchSummary {
    fn from_items(items: &[BatchItem]) -> Self {
        let mut summary = BatchSummary {
            total: items.len(),
            ..Default::default()
        };
        for item in items {
            match item.status {
                BatchStatus::Completed => summary.completed += 1,
                BatchStatus::Failed(_) => summary.failed += 1,
                BatchStatus::Pending | BatchStatus::Running => summary.pending += 1,
            }
        }
        summary
    }
}

/// Aggregates per-item progress into monotonic overall progress.
#[derive(Clone)]
struct BatchProgress {
    total: usize,
    reported: Arc<AtomicU8>,
    emit: BatchProgressSink,
}

impl BatchProgress {
    fn new(total: usize, emit: BatchProgressSink) -> Self {
        Self {
            total,
            reported: Arc::new(AtomicU8::new(0)),
            emit,
        }
    }

    /// Overall value while item `index` is running at `percent`.
    fn running(&self, index: usize, percent: u8) -> u8 {
        let item = usize::from(percent.min(99));
        ((index * 100 + item) / self.total) as u8
    }

    /// Overall value once item `index` has finished.
    fn finished(&self, index: usize) -> u8 {
        (((index + 1) * 100) / self.total) as u8
    }

    /// Emit `value` if it is above everything reported so far.
    fn report(&self, value: u8) {
        let previous = self.reported.fetch_max(value, Ordering::AcqRel);
        if value > previous {
            (self.emit)(value);
        }
    }

    fn item_sink(&self, index: usize) -> ProgressSink {
        let tracker = self.clone();
        Arc::new(move |snapshot: &ProgressSnapshot| {
            tracker.report(tracker.running(index, snapshot.percent));
        })
    }
}

impl Orchestrator {
    /// Process files one after another, saving each output next to its source
    /// (or wherever the item says).
    ///
    /// Item statuses are updated in place. If `cancel` fires, the running item
    /// fails with the cancellation message and the rest stay `Pending`.
    pub async fn run_batch(
        &self,
        items: &mut [BatchItem],
        options: &ProcessingOptions,
        mode: TransferMode,
        events: Option<&mpsc::UnboundedSender<BatchEvent>>,
        cancel: &CancellationToken,
    ) -> BatchSummary {
        let send = |event: BatchEvent| {
            if let Some(tx) = events {
                let _ = tx.send(event);
            }
        };

        let total = items.len();
        info!(total, ?mode, "batch started");

        if total > 0 {
            let progress_tx = events.cloned();
            let tracker = BatchProgress::new(
                total,
                Arc::new(move |value: u8| {
                    if let Some(tx) = &progress_tx {
                        let _ = tx.send(BatchEvent::Progress(value));
                    }
                }),
            );

            for (index, item) in items.iter_mut().enumerate() {
                if cancel.is_cancelled() {
                    info!(index, remaining = total - index, "batch cancelled; leaving remaining items pending");
                    break;
                }

                item.status = BatchStatus::Running;
                send(BatchEvent::ItemStarted {
                    index,
                    source: item.source.clone(),
                });
                debug!(index, source = %item.source.display(), "batch item started");

                item.status = self
                    .process_file(item, options, mode, tracker.item_sink(index), cancel)
                    .await;

                match &item.status {
                    BatchStatus::Completed => {
                        info!(index, output = %item.output.display(), "batch item completed")
                    }
                    BatchStatus::Failed(msg) => {
                        warn!(index, source = %item.source.display(), error = %msg, "batch item failed")
                    }
                    BatchStatus::Pending | BatchStatus::Running => {}
                }

                send(BatchEvent::ItemFinished {
                    index,
                    status: item.status.clone(),
                });
                tracker.report(tracker.finished(index));
            }
        }

        let summary = BatchSummary::from_items(items);
        info!(
            total = summary.total,
            completed = summary.completed,
            failed = summary.failed,
            pending = summary.pending,
            "batch finished"
        );
        send(BatchEvent::Finished(summary));
        summary
    }

    async fn process_file(
        &self,
        item: &BatchItem,
        options: &ProcessingOptions,
        mode: TransferMode,
        sink: ProgressSink,
        cancel: &CancellationToken,
    ) -> BatchStatus {
        let image = match codec::load(&item.source).await {
            Ok(image) => image,
            Err(e) => return BatchStatus::Failed(e.to_string()),
        };

        match self.process(&image, options, mode, Some(sink), cancel).await {
            ProcessingResult::Success(processed) => {
                match codec::save(processed.image, &item.output).await {
                    Ok(()) => BatchStatus::Completed,
                    Err(e) => BatchStatus::Failed(e.to_string()),
                }
            }
            ProcessingResult::Failure(msg) => BatchStatus::Failed(msg),
        }
    }

    /// Process in-memory images one after another.
    ///
    /// Returns one result per input, in order. Inputs not started because of
    /// cancellation get a cancellation failure.
    pub async fn process_many(
        &self,
        images: &[DynamicImage],
        options: &ProcessingOptions,
        mode: TransferMode,
        progress: Option<BatchProgressSink>,
        cancel: &CancellationToken,
    ) -> Vec<ProcessingResult> {
        let total = images.len();
        let mut results = Vec::with_capacity(total);
        if total == 0 {
            return results;
        }

        let emit: BatchProgressSink = match progress {
            Some(sink) => sink,
            None => Arc::new(|_: u8| {}),
        };
        let tracker = BatchProgress::new(total, emit);

        for (index, image) in images.iter().enumerate() {
            if cancel.is_cancelled() {
                results.push(ProcessingResult::failure(PixelartError::Cancelled.to_string()));
                continue;
            }
            let result = self
                .process(image, options, mode, Some(tracker.item_sink(index)), cancel)
                .await;
            results.push(result);
            tracker.report(tracker.finished(index));
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording(total: usize) -> (BatchProgress, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let tracker = BatchProgress::new(
            total,
            Arc::new(move |v: u8| sink_seen.lock().unwrap().push(v)),
        );
        (tracker, seen)
    }

    #[test]
    fn default_output_keeps_extension() {
        assert_eq!(
            default_output_path(Path::new("/pics/cat.jpg")),
            PathBuf::from("/pics/cat_pixelart.jpg")
        );
        assert_eq!(
            default_output_path(Path::new("dog")),
            PathBuf::from("dog_pixelart.png")
        );
    }

    #[test]
    fn running_item_never_reaches_next_boundary() {
        let (tracker, _) = recording(4);
        assert_eq!(tracker.running(0, 0), 0);
        assert_eq!(tracker.running(0, 100), 24);
        assert_eq!(tracker.running(3, 100), 99);
        assert_eq!(tracker.finished(3), 100);
    }

    #[test]
    fn reports_are_strictly_increasing() {
        let (tracker, seen) = recording(2);
        tracker.report(tracker.running(0, 40));
        tracker.report(tracker.running(0, 30));
        tracker.report(tracker.finished(0));
        tracker.report(tracker.running(1, 0));
        tracker.report(tracker.running(1, 50));
        tracker.report(tracker.finished(1));

        assert_eq!(*seen.lock().unwrap(), vec![20, 50, 75, 100]);
    }

    #[test]
    fn summary_counts_statuses() {
        let mut items = vec![
            BatchItem::new("a.png"),
            BatchItem::new("b.png"),
            BatchItem::new("c.png"),
        ];
        items[0].status = BatchStatus::Completed;
        items[1].status = BatchStatus::Failed("boom".into());

        let summary = BatchSummary::from_items(&items);
        assert_eq!(
            summary,
            BatchSummary {
                total: 3,
                completed: 1,
                failed: 1,
                pending: 1
            }
        );
    }
}
