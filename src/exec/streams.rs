// src/exec/streams.rs

//! Background readers for worker standard streams.
//!
//! Every stream we pipe from a worker must be consumed, otherwise a chatty
//! worker blocks on a full OS buffer and never exits. These helpers spawn one
//! Tokio task per stream and hand back its `JoinHandle`.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

/// Which stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// How long to keep reading a worker's streams after it has exited.
///
/// Descendants of the worker can hold the pipes open indefinitely.
pub const EXIT_GRACE: Duration = Duration::from_secs(2);

/// A background reader for one worker stream.
///
/// Bytes land in a shared buffer as they arrive, so whatever was read is
/// still available if the stream never reaches EOF.
#[derive(Debug)]
pub struct Drain {
    kind: StreamKind,
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

/// Read `reader` to EOF in the background.
///
/// Read errors end the drain early; whatever was read so far is kept.
pub fn spawn_drain<R>(reader: Option<R>, kind: StreamKind) -> Drain
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buf);

    let handle = tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return;
        };
        let mut chunk = vec![0u8; 8192];
        let mut total = 0usize;
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    total += n;
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]);
                }
                Err(e) => {
                    warn!(stream = ?kind, error = %e, read = total, "worker stream read failed");
                    break;
                }
            }
        }
        debug!(stream = ?kind, bytes = total, "worker stream drained");
    });

    Drain { kind, buf, handle }
}

impl Drain {
    /// Wait for EOF until `deadline`, then return everything read so far.
    pub async fn collect_until(mut self, deadline: Instant) -> Vec<u8> {
        match timeout_at(deadline, &mut self.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(stream = ?self.kind, error = %e, "worker stream drain task failed"),
            Err(_) => {
                warn!(
                    stream = ?self.kind,
                    "worker stream still open after exit; keeping partial output"
                );
                settle(self.handle).await;
            }
        }
        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *buf)
    }

    /// Stop reading and discard the stream.
    pub async fn abandon(self) {
        settle(self.handle).await;
    }
}

/// Forward `reader` line by line into `tx` as `(kind, line)` pairs, as the
/// lines arrive. Empty lines are skipped.
pub fn spawn_line_forwarder<R>(
    reader: Option<R>,
    kind: StreamKind,
    tx: mpsc::UnboundedSender<(StreamKind, String)>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(reader) = reader else {
            return;
        };
        let mut lines = BufReader::new(reader).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if tx.send((kind, line)).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(stream = ?kind, error = %e, "worker stream read failed");
                    break;
                }
            }
        }
        debug!(stream = ?kind, "line forwarder ended");
    })
}

/// Write `payload` to the worker's stdin in the background, then close it.
///
/// A worker that exits or closes stdin before reading everything is not an
/// error here; its exit status decides the outcome.
pub fn spawn_stdin_writer<W>(mut writer: W, payload: Vec<u8>) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let result = match writer.write_all(&payload).await {
            Ok(()) => writer.shutdown().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => debug!(bytes = payload.len(), "worker input written"),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("worker closed stdin before reading all input")
            }
            Err(e) => warn!(error = %e, "failed to write worker input"),
        }
    })
}

/// Abort a background task and wait until it has actually stopped.
pub async fn settle<T>(handle: JoinHandle<T>) {
    handle.abort();
    let _ = handle.await;
}
