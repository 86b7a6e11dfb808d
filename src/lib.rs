// src/lib.rs

pub mod args;
pub mod cli;
pub mod codec;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod options;
pub mod probe;
pub mod progress;
pub mod scratch;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::{CliArgs, Command, OptionArgs};
use crate::config::{load_or_default, Config};
use crate::engine::{
    default_output_path, BatchEvent, BatchItem, BatchStatus, Orchestrator, ProcessingResult,
};
use crate::probe::{EnvironmentProbe, FALLBACK_PALETTE};
use crate::progress::{ProgressSink, ProgressSnapshot};
use crate::types::TransferMode;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the orchestrator or environment probe for the chosen subcommand
/// - Ctrl-C handling (cancels the running request or batch)
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(args.config.as_deref()).context("failed to load configuration")?;
    debug!(?cfg, "configuration loaded");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            cancel.cancel();
        });
    }

    match args.command {
        Command::Process {
            input,
            output,
            pipe,
            options,
        } => run_process(&cfg, input, output, pipe, &options, &cancel).await,
        Command::Batch {
            inputs,
            pipe,
            options,
        } => run_batch(&cfg, inputs, pipe, &options, &cancel).await,
        Command::Check => run_check(&cfg).await,
        Command::InstallDeps => run_install_deps(&cfg).await,
        Command::Palettes => run_palettes(&cfg).await,
        Command::PaletteColors { name, count } => run_palette_colors(&cfg, &name, count).await,
    }
}

fn transfer_mode(cfg: &Config, pipe: bool) -> TransferMode {
    if pipe {
        TransferMode::Pipe
    } else {
        cfg.worker.transfer_mode
    }
}

async fn run_process(
    cfg: &Config,
    input: PathBuf,
    output: Option<PathBuf>,
    pipe: bool,
    overrides: &OptionArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let options = overrides.apply(&cfg.options);
    let mode = transfer_mode(cfg, pipe);
    let output = output.unwrap_or_else(|| default_output_path(&input));

    let image = codec::load(&input)
        .await
        .with_context(|| format!("failed to read input image {}", input.display()))?;

    let sink: ProgressSink = Arc::new(|snapshot: &ProgressSnapshot| {
        match snapshot.message.as_deref() {
            Some(msg) if !msg.is_empty() => eprintln!("{:>3}% {msg}", snapshot.percent),
            _ => eprintln!("{:>3}%", snapshot.percent),
        }
    });

    let orchestrator = Orchestrator::from_config(cfg);
    match orchestrator
        .process(&image, &options, mode, Some(sink), cancel)
        .await
    {
        ProcessingResult::Success(processed) => {
            codec::save(processed.image, &output)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "{} ({:.2}s)",
                output.display(),
                processed.processing_time.as_secs_f64()
            );
            Ok(())
        }
        ProcessingResult::Failure(msg) => Err(anyhow!("processing failed: {msg}")),
    }
}

async fn run_batch(
    cfg: &Config,
    inputs: Vec<PathBuf>,
    pipe: bool,
    overrides: &OptionArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let options = overrides.apply(&cfg.options);
    let mode = transfer_mode(cfg, pipe);
    let mut items: Vec<BatchItem> = inputs.into_iter().map(BatchItem::new).collect();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                BatchEvent::ItemStarted { index, source } => {
                    eprintln!("[{}] {}", index + 1, source.display())
                }
                BatchEvent::Progress(overall) => eprintln!("{overall:>3}%"),
                BatchEvent::ItemFinished { .. } | BatchEvent::Finished(_) => {}
            }
        }
    });

    let orchestrator = Orchestrator::from_config(cfg);
    let summary = orchestrator
        .run_batch(&mut items, &options, mode, Some(&tx), cancel)
        .await;
    drop(tx);
    if let Err(e) = printer.await {
        warn!(error = %e, "batch progress printer failed");
    }

    for item in &items {
        match &item.status {
            BatchStatus::Completed => println!("ok      {}", item.output.display()),
            BatchStatus::Failed(msg) => println!("failed  {}: {msg}", item.source.display()),
            BatchStatus::Pending | BatchStatus::Running => {
                println!("skipped {}", item.source.display())
            }
        }
    }

    if summary.failed > 0 || summary.pending > 0 {
        bail!(
            "{} of {} images failed, {} not processed",
            summary.failed,
            summary.total,
            summary.pending
        );
    }
    Ok(())
}

async fn run_check(cfg: &Config) -> Result<()> {
    let probe = EnvironmentProbe::new(cfg.worker.clone());
    if probe.check_runtime().await {
        println!("runtime available: {}", cfg.worker.runtime.display());
        Ok(())
    } else {
        bail!("runtime not available: {}", cfg.worker.runtime.display())
    }
}

async fn run_install_deps(cfg: &Config) -> Result<()> {
    let probe = EnvironmentProbe::new(cfg.worker.clone());
    if probe.install_dependencies(|line| println!("{line}")).await {
        Ok(())
    } else {
        bail!("dependency installation failed")
    }
}

async fn run_palettes(cfg: &Config) -> Result<()> {
    let probe = EnvironmentProbe::new(cfg.worker.clone());
    match probe.list_palettes().await {
        Ok(palettes) => {
            for (name, description) in palettes {
                println!("{name}\t{description}");
            }
        }
        Err(e) => {
            warn!(error = %e, "palette listing failed; showing fallback");
            println!("{FALLBACK_PALETTE}");
        }
    }
    Ok(())
}

async fn run_palette_colors(cfg: &Config, name: &str, count: u32) -> Result<()> {
    let probe = EnvironmentProbe::new(cfg.worker.clone());
    for color in probe.palette_colors(name, count).await {
        println!("{color}");
    }
    Ok(())
}
