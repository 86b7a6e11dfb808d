use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How image bytes travel between us and the worker.
///
/// - `File`: the input is written to a scratch file, the worker writes its
///   result and a progress artifact next to it (default behaviour).
/// - `Pipe`: PNG bytes go over the worker's stdin and come back on stdout.
///   There is no progress channel in this mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    File,
    Pipe,
}

impl FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(TransferMode::File),
            "pipe" => Ok(TransferMode::Pipe),
            other => Err(format!(
                "invalid transfer_mode: {other} (expected \"file\" or \"pipe\")"
            )),
        }
    }
}

/// Pixelation algorithms understood by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Basic,
    Average,
    Median,
    Adaptive,
    Vector,
    Smooth,
    Slic,
}

impl Algorithm {
    pub const ALL: [Algorithm; 7] = [
        Algorithm::Basic,
        Algorithm::Average,
        Algorithm::Median,
        Algorithm::Adaptive,
        Algorithm::Vector,
        Algorithm::Smooth,
        Algorithm::Slic,
    ];

    /// Identifier passed to the worker's `--algorithm` flag.
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Basic => "basic",
            Algorithm::Average => "average",
            Algorithm::Median => "median",
            Algorithm::Adaptive => "adaptive",
            Algorithm::Vector => "vector",
            Algorithm::Smooth => "smooth",
            Algorithm::Slic => "slic",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Algorithm::ALL
            .into_iter()
            .find(|a| a.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = Algorithm::ALL.iter().map(|a| a.as_str()).collect();
                format!("unknown algorithm: {wanted} (expected one of {})", known.join(", "))
            })
    }
}

/// An 8-bit RGB triple, rendered as `r,g,b` on the worker command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [r, g, b] = parts.as_slice() else {
            return Err(format!("invalid color '{s}': expected r,g,b"));
        };
        let channel = |v: &str| {
            v.parse::<u8>()
                .map_err(|e| format!("invalid color channel '{v}' in '{s}': {e}"))
        };
        Ok(Rgb::new(channel(*r)?, channel(*g)?, channel(*b)?))
    }
}
