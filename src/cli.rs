// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::options::ProcessingOptions;
use crate::types::{Algorithm, Rgb};

/// Command-line arguments for `pixelart`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pixelart",
    version,
    about = "Convert images to pixel art using an external worker process.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `pixelart.toml` in the current working directory, if present.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIXELART_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Convert one image.
    Process {
        input: PathBuf,

        /// Output file. Default: `<stem>_pixelart<ext>` next to the input.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Exchange image data over stdin/stdout instead of scratch files.
        #[arg(long)]
        pipe: bool,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Convert several images, one after another.
    Batch {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(long)]
        pipe: bool,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Check that the worker runtime starts.
    Check,

    /// Install the worker's dependencies from its requirements file.
    InstallDeps,

    /// List the palettes the worker knows.
    Palettes,

    /// Print the colors of one palette.
    PaletteColors {
        name: String,

        #[arg(long, default_value_t = 256, value_name = "N")]
        count: u32,
    },
}

/// Per-run overrides of the configured processing options.
///
/// Toggles can only switch a feature on; turn it off in the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct OptionArgs {
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub pixel_size: Option<u32>,

    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub color_count: Option<u32>,

    #[arg(long, value_name = "NAME")]
    pub palette: Option<String>,

    /// basic, average, median, adaptive, vector, smooth or slic.
    #[arg(long, value_name = "NAME")]
    pub algorithm: Option<Algorithm>,

    #[arg(long)]
    pub dithering: bool,

    #[arg(long, value_name = "F")]
    pub dither_strength: Option<f64>,

    #[arg(long, value_name = "F")]
    pub edge_smoothing: Option<f64>,

    #[arg(long, value_name = "F")]
    pub contrast: Option<f64>,

    #[arg(long, value_name = "F")]
    pub brightness: Option<f64>,

    #[arg(long, value_name = "F")]
    pub saturation: Option<f64>,

    #[arg(long)]
    pub cartoon_effect: bool,

    #[arg(long)]
    pub show_grid: bool,

    #[arg(long)]
    pub edge_outline: bool,

    #[arg(long, value_name = "N")]
    pub edge_outline_thickness: Option<u32>,

    #[arg(long, value_name = "R,G,B")]
    pub edge_outline_color: Option<Rgb>,
}

impl OptionArgs {
    /// `base` with every given flag applied on top.
    pub fn apply(&self, base: &ProcessingOptions) -> ProcessingOptions {
        let mut opts = base.clone();

        if let Some(v) = self.pixel_size {
            opts.pixel_size = v;
        }
        if let Some(v) = self.color_count {
            opts.color_count = v;
        }
        if let Some(v) = &self.palette {
            opts.palette = v.clone();
        }
        if let Some(v) = self.algorithm {
            opts.algorithm = v;
        }
        if let Some(v) = self.dither_strength {
            opts.dither_strength = v;
        }
        if let Some(v) = self.edge_smoothing {
            opts.edge_smoothing = v;
        }
        if let Some(v) = self.contrast {
            opts.contrast = v;
        }
        if let Some(v) = self.brightness {
            opts.brightness = v;
        }
        if let Some(v) = self.saturation {
            opts.saturation = v;
        }
        if let Some(v) = self.edge_outline_thickness {
            opts.edge_outline_thickness = v;
        }
        if let Some(v) = self.edge_outline_color {
            opts.edge_outline_color = v;
        }

        opts.dithering |= self.dithering;
        opts.cartoon_effect |= self.cartoon_effect;
        opts.show_grid |= self.show_grid;
        opts.edge_outline |= self.edge_outline;

        opts
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_defaults() {
        let args = CliArgs::try_parse_from([
            "pixelart",
            "process",
            "cat.png",
            "--pixel-size",
            "8",
            "--algorithm",
            "median",
            "--dithering",
            "--edge-outline-color",
            "10,20,30",
        ])
        .unwrap();

        let Command::Process { input, options, .. } = args.command else {
            panic!("expected process subcommand");
        };
        assert_eq!(input, PathBuf::from("cat.png"));

        let base = ProcessingOptions {
            color_count: 12,
            ..Default::default()
        };
        let merged = options.apply(&base);
        assert_eq!(merged.pixel_size, 8);
        assert_eq!(merged.color_count, 12);
        assert_eq!(merged.algorithm, Algorithm::Median);
        assert!(merged.dithering);
        assert_eq!(merged.edge_outline_color, Rgb::new(10, 20, 30));
    }

    #[test]
    fn zero_pixel_size_is_rejected() {
        assert!(CliArgs::try_parse_from(["pixelart", "process", "a.png", "--pixel-size", "0"]).is_err());
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let args =
            CliArgs::try_parse_from(["pixelart", "palettes", "--config", "x.toml", "--log-level", "debug"])
                .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(matches!(args.command, Command::Palettes));
    }
}
