// src/probe.rs

//! Worker environment checks and auxiliary queries.
//!
//! Everything here is a short-lived invocation of the same runtime the
//! orchestrator uses, so the bare-name fallback applies as well.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::engine::failure_message;
use crate::errors::Result;
use crate::exec::streams::spawn_line_forwarder;
use crate::exec::{LaunchRequest, ProcessLauncher, StreamKind, WaitOutcome};
use crate::types::{Algorithm, Rgb};

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Palette used when the worker can't be asked.
pub const FALLBACK_PALETTE: &str = "default";

#[derive(Debug, Clone)]
pub struct EnvironmentProbe {
    worker: WorkerConfig,
    launcher: ProcessLauncher,
    query_timeout: Duration,
}

impl EnvironmentProbe {
    pub fn new(worker: WorkerConfig) -> Self {
        let launcher = ProcessLauncher::new(worker.bare_runtime.clone());
        Self {
            worker,
            launcher,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Upper bound for `--version` and palette queries.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Whether `<runtime> --version` exits with code 0.
    pub async fn check_runtime(&self) -> bool {
        let request = self.worker.launch_request(None).arg("--version");
        match self.launcher.capture(&request, self.query_timeout).await {
            Ok(out) => {
                let version = if out.stdout.trim().is_empty() {
                    out.stderr.trim()
                } else {
                    out.stdout.trim()
                };
                info!(exit_code = out.exit_code, version, "runtime check finished");
                out.success()
            }
            Err(e) => {
                warn!(error = %e, "runtime check failed");
                false
            }
        }
    }

    /// Install the worker's declared dependencies with
    /// `<runtime> -m pip install -r <requirements>`.
    ///
    /// Output is pushed to `sink` line by line as it arrives; stderr lines are
    /// prefixed with `ERROR: `. Returns whether the installer exited with 0.
    pub async fn install_dependencies<F>(&self, mut sink: F) -> bool
    where
        F: FnMut(String),
    {
        let manifest = self.worker.requirements_path();
        if !manifest.is_file() {
            sink(format!("requirements file not found: {}", manifest.display()));
            return false;
        }
        let manifest = std::path::absolute(&manifest).unwrap_or(manifest);

        let request = self
            .worker
            .launch_request(None)
            .args(["-m", "pip", "install", "-r"])
            .arg(&manifest);

        let mut worker = match self.launcher.launch(&request) {
            Ok(w) => w,
            Err(e) => {
                sink(format!("failed to install dependencies: {e}"));
                return false;
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let stdout = spawn_line_forwarder(worker.take_stdout(), StreamKind::Stdout, tx.clone());
        let stderr = spawn_line_forwarder(worker.take_stderr(), StreamKind::Stderr, tx);

        while let Some((kind, line)) = rx.recv().await {
            match kind {
                StreamKind::Stdout => sink(line),
                StreamKind::Stderr => sink(format!("ERROR: {line}")),
            }
        }
        let _ = stdout.await;
        let _ = stderr.await;

        let deadline = Instant::now() + self.query_timeout;
        match worker.wait_until(deadline, &CancellationToken::new()).await {
            Ok(WaitOutcome::Exited(status)) => {
                info!(success = status.success(), "dependency installation finished");
                status.success()
            }
            Ok(_) => {
                sink("dependency installer did not exit".to_string());
                false
            }
            Err(e) => {
                sink(format!("failed to install dependencies: {e}"));
                false
            }
        }
    }

    /// Palette names and descriptions reported by `--list-palettes`.
    pub async fn list_palettes(&self) -> Result<BTreeMap<String, String>> {
        let stdout = self.query(["--list-palettes".to_string()]).await?;
        let palettes = serde_json::from_str(stdout.trim())
            .context("palette list is not a JSON object of name -> description")?;
        Ok(palettes)
    }

    /// Palette names, or just [`FALLBACK_PALETTE`] if the worker can't say.
    pub async fn available_palettes(&self) -> Vec<String> {
        match self.list_palettes().await {
            Ok(palettes) if !palettes.is_empty() => palettes.into_keys().collect(),
            Ok(_) => vec![FALLBACK_PALETTE.to_string()],
            Err(e) => {
                warn!(error = %e, "palette listing failed; using fallback");
                vec![FALLBACK_PALETTE.to_string()]
            }
        }
    }

    /// Up to `count` colors of palette `name`; black and white on any failure.
    pub async fn palette_colors(&self, name: &str, count: u32) -> Vec<Rgb> {
        match self.query_palette_colors(name, count).await {
            Ok(colors) if !colors.is_empty() => colors,
            Ok(_) => vec![Rgb::BLACK, Rgb::WHITE],
            Err(e) => {
                warn!(palette = name, error = %e, "palette color query failed; using fallback");
                vec![Rgb::BLACK, Rgb::WHITE]
            }
        }
    }

    async fn query_palette_colors(&self, name: &str, count: u32) -> Result<Vec<Rgb>> {
        let stdout = self
            .query([
                "--get-palette-colors".to_string(),
                name.to_string(),
                count.to_string(),
            ])
            .await?;
        let triples: Vec<[u8; 3]> = serde_json::from_str(stdout.trim())
            .context("palette colors are not a JSON array of [r, g, b]")?;
        Ok(triples.into_iter().map(|[r, g, b]| Rgb::new(r, g, b)).collect())
    }

    /// Algorithms the worker understands. Fixed, no worker call.
    pub fn available_algorithms(&self) -> &'static [Algorithm] {
        &Algorithm::ALL
    }

    /// Run the palette script with `args` and return its stdout.
    async fn query<I>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = String>,
    {
        let script: Option<PathBuf> = self.worker.palette_script_path();
        let request: LaunchRequest = self.worker.launch_request(script).args(args);
        debug!(args = ?request.args, "querying worker");

        let out = self.launcher.capture(&request, self.query_timeout).await?;
        if !out.success() {
            return Err(anyhow!(
                "worker query failed: {}",
                failure_message(out.stderr.as_bytes(), out.exit_code)
            )
            .into());
        }
        if out.stdout.trim().is_empty() {
            return Err(anyhow!("worker query produced no output").into());
        }
        Ok(out.stdout)
    }
}
