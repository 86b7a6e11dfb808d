// src/engine/transport.rs

//! The two data-exchange strategies behind one interface.
//!
//! - File mode: the input PNG is written to a [`TempResourceSet`], the worker
//!   writes the output file and a progress artifact next to it.
//! - Pipe mode: the input PNG is streamed on stdin and the output PNG is read
//!   from stdout. No scratch files, no progress artifact.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::debug;

use crate::args::Invocation;
use crate::codec;
use crate::errors::{PixelartError, Result};
use crate::scratch::TempResourceSet;
use crate::types::TransferMode;

#[derive(Debug)]
pub enum Transport {
    File(TempResourceSet),
    Pipe {
        /// Encoded input, taken once by the stdin writer.
        payload: Option<Vec<u8>>,
    },
}

impl Transport {
    /// Allocate resources for `mode` and stage `image` as the worker input.
    ///
    /// On error, anything already allocated is released before returning.
    pub async fn prepare(
        mode: TransferMode,
        scratch_dir: &Path,
        image: &DynamicImage,
    ) -> Result<Self> {
        let payload = codec::encode_png(image.clone()).await?;

        match mode {
            TransferMode::File => {
                let files = TempResourceSet::create(scratch_dir)?;
                tokio::fs::write(files.input(), &payload).await?;
                debug!(
                    id = files.id(),
                    bytes = payload.len(),
                    path = %files.input().display(),
                    "staged worker input"
                );
                Ok(Transport::File(files))
            }
            TransferMode::Pipe => Ok(Transport::Pipe {
                payload: Some(payload),
            }),
        }
    }

    pub fn mode(&self) -> TransferMode {
        match self {
            Transport::File(_) => TransferMode::File,
            Transport::Pipe { .. } => TransferMode::Pipe,
        }
    }

    pub fn invocation(&self) -> Invocation<'_> {
        match self {
            Transport::File(files) => Invocation::File(files),
            Transport::Pipe { .. } => Invocation::Pipe,
        }
    }

    /// Progress artifact to watch, file mode only.
    pub fn progress_path(&self) -> Option<PathBuf> {
        match self {
            Transport::File(files) => Some(files.progress().to_path_buf()),
            Transport::Pipe { .. } => None,
        }
    }

    pub fn take_payload(&mut self) -> Option<Vec<u8>> {
        match self {
            Transport::File(_) => None,
            Transport::Pipe { payload } => payload.take(),
        }
    }

    /// Decode the worker's output after a successful exit.
    ///
    /// Returns `Ok(None)` when the worker produced nothing: no output file, or
    /// empty stdout in pipe mode.
    pub async fn collect_output(&self, stdout: Vec<u8>) -> Result<Option<DynamicImage>> {
        match self {
            Transport::File(files) => {
                let bytes = match tokio::fs::read(files.output()).await {
                    Ok(bytes) => bytes,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                    Err(e) => return Err(PixelartError::IoError(e)),
                };
                if bytes.is_empty() {
                    return Ok(None);
                }
                codec::decode(bytes).await.map(Some)
            }
            Transport::Pipe { .. } => {
                if stdout.is_empty() {
                    return Ok(None);
                }
                codec::decode(stdout).await.map(Some)
            }
        }
    }

    /// Release scratch files. Idempotent; a no-op in pipe mode.
    pub fn release(&mut self) {
        match self {
            Transport::File(files) => files.cleanup(),
            Transport::Pipe { payload } => *payload = None,
        }
    }
}
