// src/engine/orchestrator.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant as StdInstant;

use image::DynamicImage;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::args::build_arguments;
use crate::config::{Config, Limits, WorkerConfig};
use crate::errors::{PixelartError, Result};
use crate::exec::streams::{settle, spawn_drain, spawn_stdin_writer, EXIT_GRACE};
use crate::exec::{exit_code, ProcessLauncher, StreamKind, WaitOutcome};
use crate::options::ProcessingOptions;
use crate::progress::{ProgressMonitor, ProgressSink};
use crate::types::TransferMode;

use super::result::ProcessingResult;
use super::transport::Transport;
use super::RequestState;

/// Message used when the worker exits cleanly without producing an image.
pub const NO_OUTPUT_MESSAGE: &str = "worker produced no output image";

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Runs pixel-art requests against the external worker.
///
/// Each call to [`process`](Orchestrator::process) is independent: requests
/// are namespaced by their scratch identifiers, so one orchestrator may be
/// shared across tasks.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    worker: WorkerConfig,
    limits: Limits,
    launcher: ProcessLauncher,
}

/// How the worker process ended, before its output is interpreted.
#[derive(Debug)]
enum WorkerOutcome {
    Exited {
        code: i32,
        success: bool,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    TimedOut,
    Cancelled,
}

/// Tracks and logs one request's state transitions.
#[derive(Debug)]
struct RequestTrace {
    id: u64,
    state: RequestState,
}

impl RequestTrace {
    fn new() -> Self {
        Self {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            state: RequestState::Created,
        }
    }

    fn advance(&mut self, next: RequestState) {
        debug!(request = self.id, from = %self.state, to = %next, "request state changed");
        self.state = next;
    }
}

impl Orchestrator {
    pub fn new(worker: WorkerConfig, limits: Limits) -> Self {
        let launcher = ProcessLauncher::new(worker.bare_runtime.clone());
        Self {
            worker,
            limits,
            launcher,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.worker.clone(), config.limits)
    }

    pub fn worker(&self) -> &WorkerConfig {
        &self.worker
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Convert `image` with the worker.
    ///
    /// Never returns an error: every failure, timeout or cancellation becomes
    /// [`ProcessingResult::Failure`]. `progress` only receives updates in file
    /// mode. Scratch files are gone by the time this returns.
    pub async fn process(
        &self,
        image: &DynamicImage,
        options: &ProcessingOptions,
        mode: TransferMode,
        progress: Option<ProgressSink>,
        cancel: &CancellationToken,
    ) -> ProcessingResult {
        let started = StdInstant::now();
        let mut trace = RequestTrace::new();

        info!(
            request = trace.id,
            ?mode,
            width = image.width(),
            height = image.height(),
            pixel_size = options.pixel_size,
            color_count = options.color_count,
            algorithm = %options.algorithm,
            "processing request"
        );

        let result = self
            .run(image, options, mode, progress, cancel, started, &mut trace)
            .await;

        match &result {
            ProcessingResult::Success(p) => info!(
                request = trace.id,
                elapsed_ms = p.processing_time.as_millis() as u64,
                width = p.image.width(),
                height = p.image.height(),
                "request succeeded"
            ),
            ProcessingResult::Failure(msg) => warn!(
                request = trace.id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %msg,
                "request failed"
            ),
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        image: &DynamicImage,
        options: &ProcessingOptions,
        mode: TransferMode,
        progress: Option<ProgressSink>,
        cancel: &CancellationToken,
        started: StdInstant,
        trace: &mut RequestTrace,
    ) -> ProcessingResult {
        let deadline = Instant::now() + self.limits.deadline;

        if cancel.is_cancelled() {
            trace.advance(RequestState::Cancelled);
            return ProcessingResult::failure(PixelartError::Cancelled.to_string());
        }

        let mut transport = match Transport::prepare(mode, &self.worker.scratch_dir, image).await {
            Ok(t) => t,
            Err(e) => {
                trace.advance(RequestState::Failed);
                return ProcessingResult::failure(e.to_string());
            }
        };
        trace.advance(RequestState::ResourcesAllocated);

        if cancel.is_cancelled() {
            trace.advance(RequestState::Cancelled);
            transport.release();
            trace.advance(RequestState::ResourcesReleased);
            return ProcessingResult::failure(PixelartError::Cancelled.to_string());
        }

        let outcome = self
            .execute(&mut transport, options, progress, cancel, deadline, trace)
            .await;

        let (terminal, result) = match outcome {
            Ok(outcome) => match self.interpret(outcome, &transport, started).await {
                Ok(pair) => pair,
                Err(e) => (RequestState::Failed, ProcessingResult::failure(e.to_string())),
            },
            Err(e) => (RequestState::Failed, ProcessingResult::failure(e.to_string())),
        };
        trace.advance(terminal);

        transport.release();
        trace.advance(RequestState::ResourcesReleased);

        result
    }

    /// Launch the worker and drive it to exit, deadline or cancellation.
    ///
    /// Every spawned sub-task has settled when this returns.
    async fn execute(
        &self,
        transport: &mut Transport,
        options: &ProcessingOptions,
        progress: Option<ProgressSink>,
        cancel: &CancellationToken,
        deadline: Instant,
        trace: &mut RequestTrace,
    ) -> Result<WorkerOutcome> {
        let args = build_arguments(options, transport.invocation());
        let request = self
            .worker
            .launch_request(self.worker.worker_script_path())
            .args(args)
            .pipe_stdin(transport.mode() == TransferMode::Pipe);

        debug!(
            request = trace.id,
            program = %request.program.display(),
            args = ?request.args,
            "launching worker"
        );
        let mut worker = self.launcher.launch(&request)?;
        trace.advance(RequestState::WorkerLaunched);

        let stdin_writer = match (worker.take_stdin(), transport.take_payload()) {
            (Some(stdin), Some(payload)) => Some(spawn_stdin_writer(stdin, payload)),
            _ => None,
        };
        let stdout = spawn_drain(worker.take_stdout(), StreamKind::Stdout);
        let stderr = spawn_drain(worker.take_stderr(), StreamKind::Stderr);

        // Stops the monitor on every path, including this future being dropped.
        let monitor_token = cancel.child_token();
        let _monitor_guard = monitor_token.clone().drop_guard();
        let monitor = transport.progress_path().map(|path| {
            let monitor = ProgressMonitor::from_limits(&self.limits);
            let token = monitor_token.clone();
            tokio::spawn(async move { monitor.watch(&path, deadline, progress.as_ref(), &token).await })
        });

        let waited = worker.wait_until(deadline, cancel).await;

        monitor_token.cancel();
        if let Some(handle) = monitor {
            match handle.await {
                Ok(exit) => debug!(request = trace.id, ?exit, "progress monitor stopped"),
                Err(e) => warn!(request = trace.id, error = %e, "progress monitor task failed"),
            }
        }

        let outcome = match waited {
            Ok(WaitOutcome::Exited(status)) => {
                let grace = (Instant::now() + EXIT_GRACE).min(deadline);
                let stdout = stdout.collect_until(grace).await;
                let stderr = stderr.collect_until(grace).await;
                Ok(WorkerOutcome::Exited {
                    code: exit_code(&status),
                    success: status.success(),
                    stdout,
                    stderr,
                })
            }
            Ok(WaitOutcome::DeadlineElapsed) => {
                stdout.abandon().await;
                stderr.abandon().await;
                Ok(WorkerOutcome::TimedOut)
            }
            Ok(WaitOutcome::Cancelled) => {
                stdout.abandon().await;
                stderr.abandon().await;
                Ok(WorkerOutcome::Cancelled)
            }
            Err(e) => {
                worker.terminate().await;
                stdout.abandon().await;
                stderr.abandon().await;
                Err(e)
            }
        };

        if let Some(writer) = stdin_writer {
            settle(writer).await;
        }

        outcome
    }

    /// Map the worker outcome to a result and the request's terminal state.
    async fn interpret(
        &self,
        outcome: WorkerOutcome,
        transport: &Transport,
        started: StdInstant,
    ) -> Result<(RequestState, ProcessingResult)> {
        match outcome {
            WorkerOutcome::TimedOut => Ok((
                RequestState::TimedOut,
                ProcessingResult::failure(format!(
                    "processing timed out after {}s",
                    self.limits.deadline.as_secs_f64()
                )),
            )),
            WorkerOutcome::Cancelled => Ok((
                RequestState::Cancelled,
                ProcessingResult::failure(PixelartError::Cancelled.to_string()),
            )),
            WorkerOutcome::Exited {
                code,
                success: true,
                stdout,
                stderr,
            } => {
                if !stderr.is_empty() {
                    debug!(
                        exit_code = code,
                        stderr = %String::from_utf8_lossy(&stderr).trim(),
                        "worker wrote to stderr"
                    );
                }
                match transport.collect_output(stdout).await? {
                    Some(image) => Ok((
                        RequestState::Succeeded,
                        ProcessingResult::success(image, started.elapsed()),
                    )),
                    None => Ok((
                        RequestState::Failed,
                        ProcessingResult::failure(no_output_message(&stderr)),
                    )),
                }
            }
            WorkerOutcome::Exited { code, stderr, .. } => Ok((
                RequestState::Failed,
                ProcessingResult::failure(failure_message(&stderr, code)),
            )),
        }
    }
}

/// Failure text for a clean exit without an image: trimmed stderr, or
/// [`NO_OUTPUT_MESSAGE`] when the worker wrote nothing there.
fn no_output_message(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        NO_OUTPUT_MESSAGE.to_string()
    } else {
        text.to_string()
    }
}

/// Trimmed stderr, or a generic message naming the exit code.
pub fn failure_message(stderr: &[u8], code: i32) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        format!("worker failed with exit code {code}")
    } else {
        text.to_string()
    }
}
