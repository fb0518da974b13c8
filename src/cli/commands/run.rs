//! Run and scan commands - drive the pipeline

use crate::cli::commands::WatchArgs;
use crate::cli::output::{colors, format_duration};
use crate::cli::OutputFormat;
use crate::core::config::Config;
use crate::core::pipeline::orchestrator::cancel_on_signal;
use crate::core::pipeline::{RunMode, RunSummary};
use crate::core::services::Services;
use clap::Args;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Arguments for the run and scan commands
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub watch: WatchArgs,

    /// Number of concurrent workers (overrides [workers].count)
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// On shutdown, stop after in-flight files instead of draining the queue
    #[arg(long)]
    pub no_drain: bool,

    /// Milliseconds without writes before a newly created file is ingested
    /// (overrides [watch].settle_ms)
    #[arg(long, value_name = "MS")]
    pub settle_ms: Option<u64>,
}

impl RunArgs {
    pub fn apply(&self, config: &mut Config) {
        self.watch.apply(config);
        if let Some(workers) = self.workers {
            config.workers.count = workers;
        }
        if self.no_drain {
            config.workers.drain_on_shutdown = false;
        }
        if let Some(settle_ms) = self.settle_ms {
            config.watch.settle_ms = settle_ms;
        }
    }
}

/// Execute the run command (watch until Ctrl-C / SIGTERM)
pub async fn execute_run(
    _args: RunArgs,
    services: &Arc<Services>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    if format == OutputFormat::Human {
        eprintln!(
            "Watching {} with {} workers (Ctrl-C to stop)...",
            colors::file_path(&services.config.watch.path.display().to_string()),
            colors::number(&services.config.workers.count.to_string())
        );
    }
    execute(RunMode::Watch, services, format).await
}

/// Execute the scan command (backlog only)
pub async fn execute_scan(
    _args: RunArgs,
    services: &Arc<Services>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    if format == OutputFormat::Human {
        eprintln!(
            "Scanning {}...",
            colors::file_path(&services.config.watch.path.display().to_string())
        );
    }
    execute(RunMode::Backlog, services, format).await
}

async fn execute(
    mode: RunMode,
    services: &Arc<Services>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = CancellationToken::new();
    let signals = cancel_on_signal(shutdown.clone());

    let result = services.orchestrator().run(mode, shutdown.clone()).await;

    // Release the signal listener whatever the outcome
    shutdown.cancel();
    signals.await?;

    let summary = result?;
    print_summary(&summary, format)?;
    Ok(())
}

fn print_summary(
    summary: &RunSummary,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Human => {
            let stats = &summary.stats;
            println!(
                "{} {} files ({} records) in {}",
                colors::success("Processed"),
                colors::number(&stats.succeeded.to_string()),
                colors::number(&stats.records_loaded.to_string()),
                format_duration(summary.elapsed_ms as f64 / 1000.0)
            );
            println!(
                "  {} skipped, {} failed (extract {}, transform {}, load {})",
                stats.skipped,
                stats.failed(),
                stats.extract_failed,
                stats.transform_failed,
                stats.load_failed
            );
            println!(
                "  {} from backlog, {} from watcher, {} files in index",
                summary.backlog_enqueued, summary.watch_enqueued, summary.index_entries
            );
            if stats.failed() > 0 {
                println!(
                    "  {}",
                    colors::dim("Failed files stay unprocessed and are retried on the next scan")
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
    }
    Ok(())
}
