// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::exec::LaunchRequest;
use crate::options::ProcessingOptions;
use crate::types::TransferMode;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [worker]
/// runtime = "/usr/bin/python3"
/// scripts_dir = "PythonScripts"
///
/// [limits]
/// deadline = "5m"
/// stall_threshold = "30s"
///
/// [options]
/// pixel_size = 8
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub worker: RawWorkerSection,

    #[serde(default)]
    pub limits: RawLimitsSection,

    /// Default processing options; CLI flags override individual fields.
    #[serde(default)]
    pub options: ProcessingOptions,
}

/// `[worker]` section: where the worker lives and how to talk to it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkerSection {
    /// Configured executable. Falls back to `bare_runtime` if missing.
    #[serde(default = "default_runtime")]
    pub runtime: String,

    /// Name looked up on `PATH` when `runtime` can't be started.
    #[serde(default = "default_runtime")]
    pub bare_runtime: String,

    /// Directory holding the worker scripts; also the worker's working dir.
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    /// Script passed as first argument to `runtime`. Empty string means the
    /// runtime itself is the worker.
    #[serde(default = "default_worker_script")]
    pub worker_script: String,

    /// Script answering `--list-palettes` / `--get-palette-colors`.
    #[serde(default = "default_palette_script")]
    pub palette_script: String,

    /// Dependency manifest used by `install-deps`.
    #[serde(default = "default_requirements")]
    pub requirements: String,

    /// Scratch directory for per-request files. Defaults to
    /// `<system temp>/PixelArtGenerator`.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    #[serde(default)]
    pub transfer_mode: TransferMode,
}

fn default_runtime() -> String {
    "python".to_string()
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("PythonScripts")
}

fn default_worker_script() -> String {
    "pixelate.py".to_string()
}

fn default_palette_script() -> String {
    "palettes.py".to_string()
}

fn default_requirements() -> String {
    "requirements.txt".to_string()
}

impl Default for RawWorkerSection {
    fn default() -> Self {
        Self {
            runtime: default_runtime(),
            bare_runtime: default_runtime(),
            scripts_dir: default_scripts_dir(),
            worker_script: default_worker_script(),
            palette_script: default_palette_script(),
            requirements: default_requirements(),
            scratch_dir: None,
            transfer_mode: TransferMode::default(),
        }
    }
}

/// `[limits]` section, durations as strings like `"5m"`, `"30s"`, `"500ms"`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLimitsSection {
    #[serde(default = "default_deadline")]
    pub deadline: String,

    #[serde(default = "default_stall_threshold")]
    pub stall_threshold: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

fn default_deadline() -> String {
    "5m".to_string()
}

fn default_stall_threshold() -> String {
    "30s".to_string()
}

fn default_poll_interval() -> String {
    "500ms".to_string()
}

impl Default for RawLimitsSection {
    fn default() -> Self {
        Self {
            deadline: default_deadline(),
            stall_threshold: default_stall_threshold(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// Validated configuration. Construct via `TryFrom<RawConfigFile>` or
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub worker: WorkerConfig,
    pub limits: Limits,
    pub options: ProcessingOptions,
}

/// Resolved worker location and transport.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub runtime: PathBuf,
    pub bare_runtime: String,
    pub scripts_dir: PathBuf,
    pub worker_script: Option<PathBuf>,
    pub palette_script: Option<PathBuf>,
    pub requirements: PathBuf,
    pub scratch_dir: PathBuf,
    pub transfer_mode: TransferMode,
}

impl WorkerConfig {
    /// Full path of the pixelation script, if one is configured.
    pub fn worker_script_path(&self) -> Option<PathBuf> {
        self.worker_script.as_ref().map(|s| self.scripts_dir.join(s))
    }

    /// Full path of the palette script; falls back to the worker script.
    pub fn palette_script_path(&self) -> Option<PathBuf> {
        self.palette_script
            .as_ref()
            .map(|s| self.scripts_dir.join(s))
            .or_else(|| self.worker_script_path())
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.scripts_dir.join(&self.requirements)
    }

    /// `<runtime> [<script>]`, run inside `scripts_dir`.
    ///
    /// Relative paths are made absolute against the current directory so they
    /// stay valid once the worker's working directory changes. A runtime that
    /// is a single name is left alone for `PATH` lookup.
    pub fn launch_request(&self, script: Option<PathBuf>) -> LaunchRequest {
        let runtime = if self.runtime.components().count() > 1 {
            absolute(&self.runtime)
        } else {
            self.runtime.clone()
        };

        let mut request = LaunchRequest::new(runtime).working_dir(absolute(&self.scripts_dir));
        if let Some(script) = script {
            request = request.arg(absolute(&script));
        }
        request
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            runtime: PathBuf::from(default_runtime()),
            bare_runtime: default_runtime(),
            scripts_dir: default_scripts_dir(),
            worker_script: Some(PathBuf::from(default_worker_script())),
            palette_script: Some(PathBuf::from(default_palette_script())),
            requirements: PathBuf::from(default_requirements()),
            scratch_dir: default_scratch_dir(),
            transfer_mode: TransferMode::default(),
        }
    }
}

pub(crate) fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("PixelArtGenerator")
}

/// Time limits applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Watchdog deadline for one request, after which the worker is killed.
    pub deadline: Duration,
    /// How long progress may sit still before the monitor gives up watching.
    pub stall_threshold: Duration,
    /// Progress artifact poll interval.
    pub poll_interval: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(5 * 60),
            stall_threshold: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }
}
