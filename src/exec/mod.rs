// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually starting worker processes using
//! `tokio::process::Command` and for consuming their standard streams.
//!
//! - [`launcher`] resolves the executable (with bare-name fallback), starts
//!   the worker and exposes a deadline/cancellation-aware wait.
//! - [`streams`] contains the background drains and line forwarders for
//!   stdout/stderr.

pub mod launcher;
pub mod streams;

pub use launcher::{
    exit_code, CapturedOutput, LaunchRequest, ProcessLauncher, WaitOutcome, WorkerHandle,
};
pub use streams::StreamKind;
