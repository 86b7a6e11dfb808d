// src/args.rs

//! Worker command-line construction.
//!
//! This is a pure mapping from [`ProcessingOptions`] to argument tokens; it
//! never touches the filesystem. Booleans become presence flags (absence means
//! false), fractional values are rendered with two decimals and the outline
//! color is a single `r,g,b` token.

use std::path::Path;

use crate::options::ProcessingOptions;
use crate::scratch::TempResourceSet;

/// Which transport the arguments are for.
#[derive(Debug, Clone, Copy)]
pub enum Invocation<'a> {
    /// Exchange through scratch files: paths are passed on the command line.
    File(&'a TempResourceSet),
    /// Exchange over stdin/stdout: no paths, `--pipe-mode` marker instead.
    Pipe,
}

pub const PIPE_MODE_FLAG: &str = "--pipe-mode";

/// Build the worker argument list for `options`.
pub fn build_arguments(options: &ProcessingOptions, invocation: Invocation<'_>) -> Vec<String> {
    let mut args = Vec::with_capacity(32);

    match invocation {
        Invocation::File(files) => {
            args.push(path_token(files.input()));
            push_pair(&mut args, "--output", path_token(files.output()));
        }
        Invocation::Pipe => args.push(PIPE_MODE_FLAG.to_string()),
    }

    push_pair(&mut args, "--pixel-size", options.pixel_size.to_string());
    push_pair(&mut args, "--color-count", options.color_count.to_string());
    push_pair(&mut args, "--palette", options.palette.clone());
    push_pair(&mut args, "--algorithm", options.algorithm.as_str().to_string());
    push_flag(&mut args, "--dithering", options.dithering);
    push_pair(&mut args, "--edge-smoothing", fixed2(options.edge_smoothing));
    push_pair(&mut args, "--contrast", fixed2(options.contrast));
    push_pair(&mut args, "--brightness", fixed2(options.brightness));
    push_pair(&mut args, "--saturation", fixed2(options.saturation));
    if options.dithering {
        push_pair(&mut args, "--dither-strength", fixed2(options.dither_strength));
    }
    push_flag(&mut args, "--cartoon-effect", options.cartoon_effect);

    if let Invocation::File(files) = invocation {
        push_pair(&mut args, "--progress-file", path_token(files.progress()));
    }

    push_flag(&mut args, "--show-grid", options.show_grid);
    if options.edge_outline {
        args.push("--edge-outline".to_string());
        push_pair(
            &mut args,
            "--edge-outline-thickness",
            options.edge_outline_thickness.to_string(),
        );
        push_pair(
            &mut args,
            "--edge-outline-color",
            options.edge_outline_color.to_string(),
        );
    }

    args
}

fn push_pair(args: &mut Vec<String>, flag: &str, value: String) {
    args.push(flag.to_string());
    args.push(value);
}

fn push_flag(args: &mut Vec<String>, flag: &str, enabled: bool) {
    if enabled {
        args.push(flag.to_string());
    }
}

fn fixed2(value: f64) -> String {
    format!("{value:.2}")
}

fn path_token(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractional_values_use_two_decimals() {
        assert_eq!(fixed2(1.0), "1.00");
        assert_eq!(fixed2(0.126), "0.13");
        assert_eq!(fixed2(1.999), "2.00");
    }

    #[test]
    fn dither_strength_follows_dithering() {
        let mut opts = ProcessingOptions::default();
        let args = build_arguments(&opts, Invocation::Pipe);
        assert!(!args.iter().any(|a| a == "--dither-strength"));

        opts.dithering = true;
        opts.dither_strength = 0.35;
        let args = build_arguments(&opts, Invocation::Pipe);
        let idx = args.iter().position(|a| a == "--dither-strength").unwrap();
        assert_eq!(args[idx + 1], "0.35");
    }
}
