// src/engine/mod.rs

//! Request orchestration.
//!
//! One request runs through these states:
//!
//! ```text
//! Created -> ResourcesAllocated -> WorkerLaunched
//!         -> Succeeded | Failed | TimedOut | Cancelled
//!         -> ResourcesReleased
//! ```
//!
//! - [`orchestrator`] drives a single request end to end.
//! - [`transport`] hides the file/pipe data exchange behind one interface.
//! - [`batch`] runs many requests sequentially with aggregated progress.
//! - [`result`] is the public result contract.

use std::fmt;

pub mod batch;
pub mod orchestrator;
pub mod result;
pub mod transport;

pub use batch::{
    default_output_path, BatchEvent, BatchItem, BatchProgressSink, BatchStatus, BatchSummary,
};
pub use orchestrator::{failure_message, Orchestrator, NO_OUTPUT_MESSAGE};
pub use result::{ProcessedImage, ProcessingResult};
pub use transport::Transport;

/// Lifecycle state of one request, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Created,
    ResourcesAllocated,
    WorkerLaunched,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
    ResourcesReleased,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestState::Created => "created",
            RequestState::ResourcesAllocated => "resources-allocated",
            RequestState::WorkerLaunched => "worker-launched",
            RequestState::Succeeded => "succeeded",
            RequestState::Failed => "failed",
            RequestState::TimedOut => "timed-out",
            RequestState::Cancelled => "cancelled",
            RequestState::ResourcesReleased => "resources-released",
        };
        f.write_str(s)
    }
}
