// tests/config_loading.rs

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;

use pixelart::config::{load_and_validate, load_or_default, Config};
use pixelart::errors::PixelartError;
use pixelart::types::{Algorithm, Rgb, TransferMode};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_full_config_is_validated() {
    let file = write_config(
        r#"
[worker]
runtime = "/opt/venv/bin/python3"
bare_runtime = "python3"
scripts_dir = "workers"
worker_script = "pixelate.py"
scratch_dir = "/tmp/pixelart-scratch"
transfer_mode = "pipe"

[limits]
deadline = "2m"
stall_threshold = "45s"
poll_interval = "250ms"

[options]
pixel_size = 4
algorithm = "slic"
dithering = true
edge_outline_color = { r = 255, g = 0, b = 0 }
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.worker.runtime, PathBuf::from("/opt/venv/bin/python3"));
    assert_eq!(cfg.worker.bare_runtime, "python3");
    assert_eq!(cfg.worker.transfer_mode, TransferMode::Pipe);
    assert_eq!(cfg.worker.scratch_dir, PathBuf::from("/tmp/pixelart-scratch"));
    assert_eq!(
        cfg.worker.worker_script_path(),
        Some(PathBuf::from("workers/pixelate.py"))
    );

    assert_eq!(cfg.limits.deadline, Duration::from_secs(120));
    assert_eq!(cfg.limits.stall_threshold, Duration::from_secs(45));
    assert_eq!(cfg.limits.poll_interval, Duration::from_millis(250));

    assert_eq!(cfg.options.pixel_size, 4);
    assert_eq!(cfg.options.algorithm, Algorithm::Slic);
    assert!(cfg.options.dithering);
    assert_eq!(cfg.options.edge_outline_color, Rgb::new(255, 0, 0));
    assert_eq!(cfg.options.color_count, 32);
}

#[test]
fn test_empty_file_gives_defaults() {
    let file = write_config("");
    let cfg = load_and_validate(file.path()).unwrap();
    let defaults = Config::default();

    assert_eq!(cfg.limits, defaults.limits);
    assert_eq!(cfg.options, defaults.options);
    assert_eq!(cfg.worker.transfer_mode, TransferMode::File);
    assert_eq!(cfg.limits.deadline, Duration::from_secs(300));
}

#[test]
fn test_invalid_duration_returns_config_error() {
    let file = write_config(
        r#"
[limits]
deadline = "soon"
"#,
    );

    match load_and_validate(file.path()) {
        Err(PixelartError::ConfigError(msg)) => assert!(msg.contains("deadline"), "{msg}"),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_bare_runtime_with_path_is_rejected() {
    let file = write_config(
        r#"
[worker]
bare_runtime = "/usr/bin/python3"
"#,
    );

    match load_and_validate(file.path()) {
        Err(PixelartError::ConfigError(msg)) => assert!(msg.contains("bare_runtime"), "{msg}"),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_transfer_mode_is_a_toml_error() {
    let file = write_config(
        r#"
[worker]
transfer_mode = "carrier-pigeon"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(PixelartError::TomlError(_))
    ));
}

#[test]
fn test_explicit_missing_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    assert!(matches!(
        load_or_default(Some(&missing)),
        Err(PixelartError::IoError(_))
    ));
}
