use crate::host::PluginHost;
use crate::message::TypedBatch;
use crate::pipeline::parser::{build_host, initial_batch, load_pipeline, validate_pipeline, StageDef};
use crate::util::{batch_summary, create_run_dir, timestamp, write_artifact};
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use serde_json::json;
use tracing::{info, warn};
use chrono::Utc;

/// What a finished run left behind
#[derive(Debug)]
pub struct RunSummary {
    pub run_dir: PathBuf,
    pub ticks_completed: u64,
    pub ticks_failed: u64,
}

/// Public entry used by main.rs
pub async fn run_pipeline(path: &Path) -> anyhow::Result<RunSummary> {
    run_pipeline_in(path, Path::new(".tickpipe")).await
}

/// Run with artifacts under `base/runs/<uuid>/`
pub async fn run_pipeline_in(path: &Path, base: &Path) -> anyhow::Result<RunSummary> {
    let pipeline = load_pipeline(path)?;
    validate_pipeline(&pipeline)?;

    info!("Starting pipeline: {:?}", pipeline.name);

    let run_dir = create_run_dir(base)?;
    let meta_file = run_dir.join("pipeline.yaml");
    std::fs::write(&meta_file, serde_yaml::to_string(&pipeline)?)?;

    let host = build_host(&pipeline)?;
    let input = initial_batch(&pipeline, &host)?;
    let opts = TickOptions {
        ticks: pipeline.ticks(),
        interval: Duration::from_millis(pipeline.interval_ms.unwrap_or(0)),
        stop_on_fail: pipeline.stop_on_fail(),
    };

    // graceful shutdown notify
    let shutdown_notify = Arc::new(Notify::new());
    {
        let shutdown_notify = shutdown_notify.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            eprintln!("Received Ctrl+C, stopping after the current tick");
            shutdown_notify.notify_one();
        });
    }

    let (ticks_completed, ticks_failed) =
        drive_ticks(&host, &pipeline.stages, &input, &opts, &run_dir, &shutdown_notify).await?;

    info!("Pipeline finished");
    Ok(RunSummary { run_dir, ticks_completed, ticks_failed })
}

pub struct TickOptions {
    pub ticks: u64,
    pub interval: Duration,
    pub stop_on_fail: bool,
}

/// Tick loop; returns (completed, failed). A notification on `shutdown`
/// ends the loop before the next tick, including during the interval sleep.
pub async fn drive_ticks(
    host: &PluginHost,
    stages: &[StageDef],
    input: &TypedBatch,
    opts: &TickOptions,
    run_dir: &Path,
    shutdown: &Notify,
) -> anyhow::Result<(u64, u64)> {
    let ticks = opts.ticks;
    let mut completed = 0u64;
    let mut failed = 0u64;

    for tick in 1..=ticks {
        if shutdown.notified().now_or_never().is_some() {
            eprintln!("Shutdown requested; no further ticks.");
            break;
        }

        match run_tick(host, stages, input.clone()) {
            Ok(output) => {
                let meta = json!({
                    "tick": tick,
                    "timestamp": Utc::now().to_rfc3339(),
                    "output": batch_summary(&output),
                });
                let name = format!("tick_{}_{}.json", tick, timestamp());
                write_artifact(run_dir, &name, &serde_json::to_string_pretty(&meta)?)?;
                info!("Tick {}/{}: {} message(s) of {}", tick, ticks, output.messages.len(), output.content_type);
                completed += 1;
            }
            Err(e) => {
                if opts.stop_on_fail {
                    return Err(e.context(format!("tick {} failed; aborting (stop_on_fail=true)", tick)));
                }
                warn!("Tick {} failed: {:#}", tick, e);
                failed += 1;
            }
        }

        if tick < ticks && !opts.interval.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(opts.interval) => {}
                _ = shutdown.notified() => {
                    eprintln!("Shutdown requested; no further ticks.");
                    break;
                }
            }
        }
    }

    Ok((completed, failed))
}

/// Feed one batch through every stage in order
fn run_tick(host: &PluginHost, stages: &[StageDef], input: TypedBatch) -> anyhow::Result<TypedBatch> {
    let mut batch = input;
    for stage in stages {
        batch = host.invoke(&stage.name, batch)?;
    }
    Ok(batch)
}

/// Validate-only helper for main.rs
pub fn validate_pipeline_file(path: &Path) -> anyhow::Result<()> {
    let pipeline = load_pipeline(path)?;
    validate_pipeline(&pipeline)?;
    println!("Pipeline '{}' validated", pipeline.name.clone().unwrap_or_else(|| "<unnamed>".to_string()));
    Ok(())
}
