// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use crate::config::model::{
    default_scratch_dir, Config, Limits, RawConfigFile, RawLimitsSection, RawWorkerSection,
    WorkerConfig,
};
use crate::errors::{PixelartError, Result};

impl TryFrom<RawConfigFile> for Config {
    type Error = PixelartError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_options(&raw)?;
        let limits = validate_limits(&raw.limits)?;
        let RawConfigFile {
            worker, options, ..
        } = raw;
        Ok(Config {
            worker: validate_worker(worker)?,
            limits,
            options,
        })
    }
}

fn validate_worker(raw: RawWorkerSection) -> Result<WorkerConfig> {
    if raw.runtime.trim().is_empty() {
        return Err(PixelartError::ConfigError(
            "[worker].runtime must not be empty".to_string(),
        ));
    }

    let bare = raw.bare_runtime.trim();
    if bare.is_empty() || bare.contains('/') || bare.contains('\\') {
        return Err(PixelartError::ConfigError(format!(
            "[worker].bare_runtime must be a plain executable name (got '{}')",
            raw.bare_runtime
        )));
    }

    if raw.requirements.trim().is_empty() {
        return Err(PixelartError::ConfigError(
            "[worker].requirements must not be empty".to_string(),
        ));
    }

    Ok(WorkerConfig {
        runtime: PathBuf::from(raw.runtime.trim()),
        bare_runtime: bare.to_string(),
        scripts_dir: raw.scripts_dir,
        worker_script: non_empty_path(&raw.worker_script),
        palette_script: non_empty_path(&raw.palette_script),
        requirements: PathBuf::from(raw.requirements.trim()),
        scratch_dir: raw.scratch_dir.unwrap_or_else(default_scratch_dir),
        transfer_mode: raw.transfer_mode,
    })
}

fn non_empty_path(s: &str) -> Option<PathBuf> {
    let s = s.trim();
    (!s.is_empty()).then(|| PathBuf::from(s))
}

fn validate_limits(raw: &RawLimitsSection) -> Result<Limits> {
    let deadline = positive_duration("deadline", &raw.deadline)?;
    let stall_threshold = positive_duration("stall_threshold", &raw.stall_threshold)?;
    let poll_interval = positive_duration("poll_interval", &raw.poll_interval)?;

    if poll_interval >= deadline {
        return Err(PixelartError::ConfigError(format!(
            "[limits].poll_interval ({}) must be shorter than [limits].deadline ({})",
            raw.poll_interval, raw.deadline
        )));
    }

    Ok(Limits {
        deadline,
        stall_threshold,
        poll_interval,
    })
}

fn positive_duration(key: &str, value: &str) -> Result<Duration> {
    let dur = parse_duration(value)
        .map_err(|e| PixelartError::ConfigError(format!("[limits].{key}: {e}")))?;
    if dur.is_zero() {
        return Err(PixelartError::ConfigError(format!(
            "[limits].{key} must be greater than zero (got '{value}')"
        )));
    }
    Ok(dur)
}

fn validate_options(cfg: &RawConfigFile) -> Result<()> {
    // Numeric ranges belong to the worker; we only reject values it can
    // never accept.
    if cfg.options.pixel_size == 0 {
        return Err(PixelartError::ConfigError(
            "[options].pixel_size must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.options.color_count == 0 {
        return Err(PixelartError::ConfigError(
            "[options].color_count must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"5m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration(" 30s "), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10d").is_err());
    }

    #[test]
    fn default_raw_config_is_valid() {
        let cfg = Config::try_from(RawConfigFile::default()).unwrap();
        assert_eq!(cfg.limits, Limits::default());
        assert_eq!(cfg.worker.runtime, PathBuf::from("python"));
        assert_eq!(
            cfg.worker.worker_script_path(),
            Some(PathBuf::from("PythonScripts/pixelate.py"))
        );
    }

    #[test]
    fn every_section_survives_validation() {
        let mut raw = RawConfigFile::default();
        raw.worker.bare_runtime = "python3".to_string();
        raw.limits.deadline = "90s".to_string();
        raw.options.pixel_size = 4;

        let cfg = Config::try_from(raw).unwrap();
        assert_eq!(cfg.worker.bare_runtime, "python3");
        assert_eq!(cfg.limits.deadline, Duration::from_secs(90));
        assert_eq!(cfg.options.pixel_size, 4);
    }

    #[test]
    fn empty_script_means_runtime_is_the_worker() {
        let mut raw = RawConfigFile::default();
        raw.worker.worker_script = String::new();
        raw.worker.palette_script = "  ".to_string();

        let cfg = Config::try_from(raw).unwrap();
        assert_eq!(cfg.worker.worker_script_path(), None);
        assert_eq!(cfg.worker.palette_script_path(), None);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut raw = RawConfigFile::default();
        raw.limits.stall_threshold = "0s".to_string();

        match Config::try_from(raw) {
            Err(PixelartError::ConfigError(msg)) => assert!(msg.contains("stall_threshold")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }
}
