//! Status command - index statistics and backlog size

use crate::cli::commands::WatchArgs;
use crate::cli::output::{colors, format_bytes};
use crate::cli::OutputFormat;
use crate::core::index::IndexStats;
use crate::core::services::Services;
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub watch: WatchArgs,
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub watch_path: String,
    pub watch_path_exists: bool,
    pub output_dir: String,
    pub pipeline: String,
    pub snapshot_file: Option<String>,
    pub snapshot_bytes: Option<u64>,
    pub pending: Option<usize>,
    pub index: IndexStats,
}

/// Execute the status command
pub async fn execute(
    _args: StatusArgs,
    services: &Arc<Services>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = &services.config;
    let watch_path_exists = config.watch.path.is_dir();

    let pending = if watch_path_exists {
        Some(services.pending(None)?.len())
    } else {
        None
    };

    let snapshot_file = services.index.snapshot_file();
    let response = StatusResponse {
        watch_path: config.watch.path.display().to_string(),
        watch_path_exists,
        output_dir: config.load.output_dir.display().to_string(),
        pipeline: services.stages.describe(),
        snapshot_file: snapshot_file.map(|p| p.display().to_string()),
        snapshot_bytes: snapshot_file
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len()),
        pending,
        index: services.index.stats(),
    };

    match format {
        OutputFormat::Human => print_human(&response),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
    }

    Ok(())
}

fn print_human(response: &StatusResponse) {
    println!("{}", colors::label("Watch"));
    println!("  path:     {}", colors::file_path(&response.watch_path));
    match response.pending {
        Some(n) => println!("  pending:  {}", colors::number(&n.to_string())),
        None => println!("  pending:  {}", colors::warning("directory not found")),
    }
    println!("  pipeline: {}", colors::stage(&response.pipeline));
    println!("  output:   {}", colors::file_path(&response.output_dir));

    let index = &response.index;
    println!("{}", colors::label("Index"));
    println!(
        "  snapshot: {} ({})",
        response.snapshot_file.as_deref().unwrap_or("in-memory"),
        response
            .snapshot_bytes
            .map(format_bytes)
            .unwrap_or_else(|| "not written yet".to_string())
    );
    println!(
        "  entries:  {}",
        colors::number(&index.entries.to_string())
    );
    println!(
        "  bloom:    {} bits, {} hashes, sized for {} ({:.2}% full)",
        index.bloom_bits,
        index.bloom_hashes,
        index.bloom_capacity,
        index.bloom_fill_ratio * 100.0
    );
}
