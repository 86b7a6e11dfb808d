// src/config/mod.rs

//! Configuration loading.
//!
//! - [`model`] holds the raw TOML shape and the validated [`Config`].
//! - [`validate`] turns a raw file into a [`Config`] (durations, paths).
//! - [`loader`] reads files from disk.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    Config, Limits, RawConfigFile, RawLimitsSection, RawWorkerSection, WorkerConfig,
};
pub use validate::parse_duration;
