#![cfg(unix)]

mod common;

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use pixelart::config::Limits;
use pixelart::engine::{Orchestrator, ProcessingResult, NO_OUTPUT_MESSAGE};
use pixelart::types::TransferMode;
use pixelart_test_utils::builders::{fast_limits, OptionsBuilder};
use pixelart_test_utils::fake_worker::{
    process_alive, FakeWorker, PIPE_ECHO, PIPE_EMPTY, PIPE_EMPTY_WITH_STDERR, PIPE_FAIL,
    PIPE_GARBAGE,
};

use crate::common::{init_tracing, recording_sink, sample_image, TestResult};

async fn run_pipe(fake: &FakeWorker, limits: Limits, width: u32, height: u32) -> ProcessingResult {
    let orchestrator = Orchestrator::new(fake.config("pixelate.sh"), limits);
    orchestrator
        .process(
            &sample_image(width, height),
            &OptionsBuilder::new().build(),
            TransferMode::Pipe,
            None,
            &CancellationToken::new(),
        )
        .await
}

#[tokio::test]
async fn echo_worker_round_trips_pixels() -> TestResult {
    init_tracing();
    let fake = FakeWorker::new();
    fake.script("pixelate.sh", PIPE_ECHO);

    let input = sample_image(64, 48);
    let orchestrator = Orchestrator::new(fake.config("pixelate.sh"), Limits::default());
    let (sink, seen) = recording_sink();

    let result = orchestrator
        .process(
            &input,
            &OptionsBuilder::new().build(),
            TransferMode::Pipe,
            Some(sink),
            &CancellationToken::new(),
        )
        .await;

    let ProcessingResult::Success(processed) = &result else {
        panic!("expected success, got {result:?}");
    };
    assert_eq!(processed.image.to_rgb8(), input.to_rgb8());
    assert!(processed.processing_time > Duration::ZERO);
    // No progress channel in pipe mode.
    assert!(seen.lock().unwrap().is_empty());
    // Nothing touches the scratch directory either.
    assert!(fake.scratch_entries().is_empty());
    Ok(())
}

#[tokio::test]
async fn payload_larger_than_pipe_buffer_does_not_deadlock() -> TestResult {
    let fake = FakeWorker::new();
    fake.script("pixelate.sh", PIPE_ECHO);

    let result = run_pipe(&fake, fast_limits(Duration::from_secs(20)), 1024, 1024).await;

    let image = result.image().expect("large image should round-trip");
    assert_eq!((image.width(), image.height()), (1024, 1024));
    Ok(())
}

#[tokio::test]
async fn stderr_is_reported_on_failure() -> TestResult {
    let fake = FakeWorker::new();
    fake.script("pixelate.sh", PIPE_FAIL);

    let result = run_pipe(&fake, Limits::default(), 16, 16).await;
    assert_eq!(result.error_message(), Some("pipe broke"));
    Ok(())
}

#[tokio::test]
async fn empty_stdout_is_a_failure() -> TestResult {
    let fake = FakeWorker::new();
    fake.script("pixelate.sh", PIPE_EMPTY);

    let result = run_pipe(&fake, Limits::default(), 16, 16).await;
    assert_eq!(result.error_message(), Some(NO_OUTPUT_MESSAGE));
    Ok(())
}

#[tokio::test]
async fn empty_stdout_reports_stderr() -> TestResult {
    let fake = FakeWorker::new();
    fake.script("pixelate.sh", PIPE_EMPTY_WITH_STDERR);

    let result = run_pipe(&fake, Limits::default(), 16, 16).await;
    assert_eq!(result.error_message(), Some("unsupported color mode"));
    Ok(())
}

#[tokio::test]
async fn undecodable_output_is_a_failure() -> TestResult {
    let fake = FakeWorker::new();
    fake.script("pixelate.sh", PIPE_GARBAGE);

    let result = run_pipe(&fake, Limits::default(), 16, 16).await;
    let msg = result.error_message().expect("expected failure");
    assert!(msg.contains("image codec error"), "{msg}");
    Ok(())
}

#[tokio::test]
async fn hung_pipe_worker_times_out() -> TestResult {
    let fake = FakeWorker::new();
    let pid_file = fake.root().join("worker.pid");
    fake.hanging_worker("pixelate.sh", &pid_file);

    let started = Instant::now();
    let result = run_pipe(&fake, fast_limits(Duration::from_millis(500)), 16, 16).await;

    assert_eq!(result.error_message(), Some("processing timed out after 0.5s"));
    assert!(started.elapsed() < Duration::from_secs(5));

    let pid: u32 = std::fs::read_to_string(&pid_file)?.trim().parse()?;
    assert!(!process_alive(pid));
    Ok(())
}
