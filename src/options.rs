// src/options.rs

//! Processing options forwarded to the worker.

use serde::Deserialize;

use crate::types::{Algorithm, Rgb};

/// Everything the worker needs to know about one transformation.
///
/// Values are validated by whoever builds the options (CLI, config file, UI);
/// the orchestrator forwards them verbatim and never clamps. `Clone` is a deep
/// copy, so a batch can hand each request its own snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    /// Edge length of one output "pixel" block.
    pub pixel_size: u32,
    /// Target number of colors after quantisation.
    pub color_count: u32,
    pub palette: String,
    pub algorithm: Algorithm,
    pub dithering: bool,
    /// Only meaningful when `dithering` is set (0.0 - 1.0).
    pub dither_strength: f64,
    pub edge_smoothing: f64,
    pub contrast: f64,
    pub brightness: f64,
    pub saturation: f64,
    pub cartoon_effect: bool,
    pub show_grid: bool,
    pub edge_outline: bool,
    pub edge_outline_thickness: u32,
    pub edge_outline_color: Rgb,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            pixel_size: 16,
            color_count: 32,
            palette: "default".to_string(),
            algorithm: Algorithm::Basic,
            dithering: false,
            dither_strength: 0.1,
            edge_smoothing: 0.5,
            contrast: 1.0,
            brightness: 1.0,
            saturation: 1.0,
            cartoon_effect: false,
            show_grid: false,
            edge_outline: false,
            edge_outline_thickness: 1,
            edge_outline_color: Rgb::BLACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let opts: ProcessingOptions = toml::from_str(
            r#"
pixel_size = 8
algorithm = "median"
edge_outline_color = { r = 10, g = 20, b = 30 }
"#,
        )
        .unwrap();

        assert_eq!(opts.pixel_size, 8);
        assert_eq!(opts.algorithm, Algorithm::Median);
        assert_eq!(opts.edge_outline_color, Rgb::new(10, 20, 30));
        assert_eq!(opts.color_count, 32);
        assert_eq!(opts.palette, "default");
        assert!(!opts.dithering);
    }

    #[test]
    fn clone_is_independent() {
        let original = ProcessingOptions::default();
        let mut copy = original.clone();
        copy.palette.push_str("-gameboy");
        copy.pixel_size = 4;

        assert_eq!(original.palette, "default");
        assert_eq!(original.pixel_size, 16);
    }
}
