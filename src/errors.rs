// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PixelartError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The worker could not be started, even after the bare-name fallback.
    #[error("failed to start worker '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("image codec error: {0}")]
    Codec(String),

    #[error("processing cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<image::ImageError> for PixelartError {
    fn from(err: image::ImageError) -> Self {
        PixelartError::Codec(err.to_string())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PixelartError>;
