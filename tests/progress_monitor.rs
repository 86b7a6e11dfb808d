mod common;

use std::path::Path;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use pixelart::progress::{MonitorExit, ProgressMonitor};

use crate::common::{init_tracing, recording_sink, strictly_increasing, with_timeout, TestResult};

async fn write_progress(path: &Path, percent: u8) -> std::io::Result<()> {
    tokio::fs::write(path, format!(r#"{{"progress": {percent}, "message": "step"}}"#)).await
}

#[tokio::test]
async fn reports_each_increase_once_and_stops_at_100() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("p.json");

    let monitor = ProgressMonitor::new(Duration::from_millis(20), Duration::from_secs(5));
    let (sink, seen) = recording_sink();
    let cancel = CancellationToken::new();
    let deadline = Instant::now() + Duration::from_secs(5);

    let watch_path = path.clone();
    let watcher = tokio::spawn(async move {
        monitor
            .watch(&watch_path, deadline, Some(&sink), &cancel)
            .await
    });

    for percent in [10, 10, 40, 40, 100] {
        write_progress(&path, percent).await?;
        sleep(Duration::from_millis(120)).await;
    }

    let exit = watcher.await?;
    assert_eq!(exit, MonitorExit::Completed);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, vec![10, 40, 100]);
    Ok(())
}

#[tokio::test]
async fn stops_early_when_progress_stalls() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("p.json");
    write_progress(&path, 50).await?;

    let monitor = ProgressMonitor::new(Duration::from_millis(20), Duration::from_millis(200));
    let (sink, seen) = recording_sink();
    let started = Instant::now();

    let exit = monitor
        .watch(
            &path,
            Instant::now() + Duration::from_secs(10),
            Some(&sink),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(exit, MonitorExit::Stalled);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(*seen.lock().unwrap(), vec![50]);
    Ok(())
}

#[tokio::test]
async fn missing_artifact_runs_until_deadline() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("never-written.json");

    let monitor = ProgressMonitor::new(Duration::from_millis(20), Duration::from_millis(50));
    let (sink, seen) = recording_sink();

    let exit = monitor
        .watch(
            &path,
            Instant::now() + Duration::from_millis(300),
            Some(&sink),
            &CancellationToken::new(),
        )
        .await;

    // No observation means no stall either.
    assert_eq!(exit, MonitorExit::DeadlineElapsed);
    assert!(seen.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_content_is_skipped() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("p.json");
    tokio::fs::write(&path, "{\"progress\": ").await?;

    let monitor = ProgressMonitor::new(Duration::from_millis(20), Duration::from_secs(5));
    let (sink, seen) = recording_sink();
    let cancel = CancellationToken::new();

    let watch_path = path.clone();
    let watcher = tokio::spawn(async move {
        monitor
            .watch(
                &watch_path,
                Instant::now() + Duration::from_secs(5),
                Some(&sink),
                &cancel,
            )
            .await
    });

    sleep(Duration::from_millis(150)).await;
    tokio::fs::write(&path, "not json at all").await?;
    sleep(Duration::from_millis(150)).await;
    write_progress(&path, 100).await?;

    assert_eq!(watcher.await?, MonitorExit::Completed);
    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, vec![100]);
    Ok(())
}

#[tokio::test]
async fn cancellation_stops_the_monitor() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("p.json");
    write_progress(&path, 5).await?;

    let monitor = ProgressMonitor::new(Duration::from_millis(20), Duration::from_secs(30));
    let (sink, seen) = recording_sink();
    let cancel = CancellationToken::new();

    let token = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(150)).await;
        token.cancel();
    });

    let started = Instant::now();
    let exit = monitor
        .watch(&path, Instant::now() + Duration::from_secs(30), Some(&sink), &cancel)
        .await;

    assert_eq!(exit, MonitorExit::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(strictly_increasing(&seen.lock().unwrap()));
    Ok(())
}

#[tokio::test]
async fn works_without_a_sink() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("p.json");
    write_progress(&path, 100).await?;

    let monitor = ProgressMonitor::new(Duration::from_millis(20), Duration::from_secs(1));
    let exit = with_timeout(monitor.watch(
        &path,
        Instant::now() + Duration::from_secs(2),
        None,
        &CancellationToken::new(),
    ))
    .await;
    assert_eq!(exit, MonitorExit::Completed);
    Ok(())
}
