// src/exec/launcher.rs

//! Worker process launching.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::anyhow;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{PixelartError, Result};
use crate::exec::streams::{spawn_drain, StreamKind, EXIT_GRACE};

/// One worker invocation: program, arguments and where to run it.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
    /// Pipe stdin so the caller can stream a payload; otherwise stdin is null.
    pub pipe_stdin: bool,
}

impl LaunchRequest {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            pipe_stdin: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn pipe_stdin(mut self, pipe: bool) -> Self {
        self.pipe_stdin = pipe;
        self
    }
}

/// Starts workers, falling back to the bare runtime name (looked up on
/// `PATH`) when the configured executable is missing or fails to start.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    bare_runtime: String,
}

impl ProcessLauncher {
    pub fn new(bare_runtime: impl Into<String>) -> Self {
        Self {
            bare_runtime: bare_runtime.into(),
        }
    }

    pub fn bare_runtime(&self) -> &str {
        &self.bare_runtime
    }

    /// Start the worker described by `request`.
    ///
    /// - A configured program that doesn't exist (and isn't the bare name) is
    ///   replaced by the bare name up front.
    /// - If starting a non-bare program fails, the bare name is tried once.
    /// - Failure to start the bare name is fatal.
    pub fn launch(&self, request: &LaunchRequest) -> Result<WorkerHandle> {
        if let Some(dir) = &request.working_dir {
            if !dir.is_dir() {
                return Err(PixelartError::ConfigError(format!(
                    "worker working directory not found: {}",
                    dir.display()
                )));
            }
        }

        let bare = Path::new(&self.bare_runtime);
        let mut program = request.program.as_path();

        if program != bare && !program.exists() {
            warn!(
                configured = %program.display(),
                fallback = %self.bare_runtime,
                "configured worker executable not found; using bare runtime name"
            );
            program = bare;
        }

        match spawn(program, request) {
            Ok(handle) => Ok(handle),
            Err(err) if program != bare => {
                warn!(
                    program = %program.display(),
                    fallback = %self.bare_runtime,
                    error = %err,
                    "failed to start worker; retrying with bare runtime name"
                );
                spawn(bare, request).map_err(|source| PixelartError::Launch {
                    program: self.bare_runtime.clone(),
                    source,
                })
            }
            Err(source) => Err(PixelartError::Launch {
                program: program.display().to_string(),
                source,
            }),
        }
    }

    /// Run an auxiliary invocation to completion and capture its output.
    ///
    /// Used for short queries (`--version`, palette listing). The worker is
    /// killed if it hasn't exited after `timeout`.
    pub async fn capture(&self, request: &LaunchRequest, timeout: Duration) -> Result<CapturedOutput> {
        let mut worker = self.launch(request)?;
        let stdout = spawn_drain(worker.take_stdout(), StreamKind::Stdout);
        let stderr = spawn_drain(worker.take_stderr(), StreamKind::Stderr);

        let deadline = Instant::now() + timeout;
        match worker.wait_until(deadline, &CancellationToken::new()).await? {
            WaitOutcome::Exited(status) => {
                let grace = (Instant::now() + EXIT_GRACE).min(deadline);
                let stdout = stdout.collect_until(grace).await;
                let stderr = stderr.collect_until(grace).await;
                Ok(CapturedOutput {
                    exit_code: exit_code(&status),
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                })
            }
            WaitOutcome::DeadlineElapsed | WaitOutcome::Cancelled => {
                stdout.abandon().await;
                stderr.abandon().await;
                Err(PixelartError::Other(anyhow!(
                    "worker '{}' did not exit within {}s",
                    worker.program(),
                    timeout.as_secs_f64()
                )))
            }
        }
    }
}

fn spawn(program: &Path, request: &LaunchRequest) -> std::io::Result<WorkerHandle> {
    let mut cmd = Command::new(program);
    cmd.args(&request.args)
        .stdin(if request.pipe_stdin {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &request.working_dir {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn()?;
    info!(
        program = %program.display(),
        pid = ?child.id(),
        args = request.args.len(),
        "worker process started"
    );

    Ok(WorkerHandle {
        child,
        program: program.display().to_string(),
    })
}

/// How a bounded wait for the worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited(ExitStatus),
    /// The deadline passed first; the worker has been killed.
    DeadlineElapsed,
    /// Cancellation was requested first; the worker has been killed.
    Cancelled,
}

/// A running worker.
///
/// The child is spawned with `kill_on_drop`, so dropping the handle never
/// leaves an orphaned process behind.
#[derive(Debug)]
pub struct WorkerHandle {
    child: Child,
    program: String,
}

impl WorkerHandle {
    /// Program that was actually started (after any fallback).
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for the worker to exit, racing `deadline` and `cancel`.
    ///
    /// If the deadline or the cancellation wins, the worker is terminated
    /// before this returns.
    pub async fn wait_until(
        &mut self,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<WaitOutcome> {
        tokio::select! {
            status = self.child.wait() => {
                let status = status?;
                info!(
                    program = %self.program,
                    exit_code = exit_code(&status),
                    success = status.success(),
                    "worker process exited"
                );
                Ok(WaitOutcome::Exited(status))
            }

            _ = tokio::time::sleep_until(deadline) => {
                warn!(program = %self.program, "worker exceeded deadline; killing process");
                self.terminate().await;
                Ok(WaitOutcome::DeadlineElapsed)
            }

            _ = cancel.cancelled() => {
                info!(program = %self.program, "cancellation requested; killing worker process");
                self.terminate().await;
                Ok(WaitOutcome::Cancelled)
            }
        }
    }

    /// Forcefully kill the worker and reap it.
    pub async fn terminate(&mut self) {
        match self.child.kill().await {
            Ok(()) => debug!(program = %self.program, "worker process killed"),
            Err(e) => warn!(
                program = %self.program,
                error = %e,
                "failed to kill worker process"
            ),
        }
    }
}

/// Exit code, or -1 when the process was terminated by a signal.
pub fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Result of [`ProcessLauncher::capture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
