#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use pixelart::config::{Limits, WorkerConfig};
use pixelart::options::ProcessingOptions;
use pixelart::types::{Algorithm, Rgb, TransferMode};

/// Builder for `WorkerConfig` to simplify test setup.
///
/// Starts from a shell-based worker: runtime and bare name are both `sh`.
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    pub fn new(scripts_dir: &Path, scratch_dir: &Path) -> Self {
        Self {
            config: WorkerConfig {
                runtime: PathBuf::from("sh"),
                bare_runtime: "sh".to_string(),
                scripts_dir: scripts_dir.to_path_buf(),
                worker_script: None,
                palette_script: None,
                requirements: PathBuf::from("requirements.txt"),
                scratch_dir: scratch_dir.to_path_buf(),
                transfer_mode: TransferMode::File,
            },
        }
    }

    pub fn runtime(mut self, runtime: impl Into<PathBuf>) -> Self {
        self.config.runtime = runtime.into();
        self
    }

    pub fn bare_runtime(mut self, name: &str) -> Self {
        self.config.bare_runtime = name.to_string();
        self
    }

    pub fn worker_script(mut self, name: &str) -> Self {
        self.config.worker_script = Some(PathBuf::from(name));
        self
    }

    pub fn palette_script(mut self, name: &str) -> Self {
        self.config.palette_script = Some(PathBuf::from(name));
        self
    }

    pub fn requirements(mut self, name: &str) -> Self {
        self.config.requirements = PathBuf::from(name);
        self
    }

    pub fn transfer_mode(mut self, mode: TransferMode) -> Self {
        self.config.transfer_mode = mode;
        self
    }

    pub fn build(self) -> WorkerConfig {
        self.config
    }
}

/// Limits scaled down for tests.
pub fn fast_limits(deadline: Duration) -> Limits {
    Limits {
        deadline,
        stall_threshold: Duration::from_secs(2),
        poll_interval: Duration::from_millis(25),
    }
}

/// Builder for `ProcessingOptions`.
pub struct OptionsBuilder {
    options: ProcessingOptions,
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: ProcessingOptions::default(),
        }
    }

    pub fn pixel_size(mut self, v: u32) -> Self {
        self.options.pixel_size = v;
        self
    }

    pub fn color_count(mut self, v: u32) -> Self {
        self.options.color_count = v;
        self
    }

    pub fn palette(mut self, name: &str) -> Self {
        self.options.palette = name.to_string();
        self
    }

    pub fn algorithm(mut self, algo: Algorithm) -> Self {
        self.options.algorithm = algo;
        self
    }

    pub fn dithering(mut self, strength: f64) -> Self {
        self.options.dithering = true;
        self.options.dither_strength = strength;
        self
    }

    pub fn edge_outline(mut self, thickness: u32, color: Rgb) -> Self {
        self.options.edge_outline = true;
        self.options.edge_outline_thickness = thickness;
        self.options.edge_outline_color = color;
        self
    }

    pub fn show_grid(mut self) -> Self {
        self.options.show_grid = true;
        self
    }

    pub fn cartoon_effect(mut self) -> Self {
        self.options.cartoon_effect = true;
        self
    }

    pub fn build(self) -> ProcessingOptions {
        self.options
    }
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
