//! Pending command - list unprocessed files

use crate::cli::commands::WatchArgs;
use crate::cli::output::colors;
use crate::cli::OutputFormat;
use crate::core::services::Services;
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

/// Arguments for the pending command
#[derive(Args, Debug)]
pub struct PendingArgs {
    #[command(flatten)]
    pub watch: WatchArgs,

    /// Show at most this many files
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub watch_path: String,
    pub count: usize,
    pub files: Vec<String>,
}

/// Execute the pending command
pub async fn execute(
    args: PendingArgs,
    services: &Arc<Services>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = &services.config.watch.path;
    if !root.is_dir() {
        return Err(format!(
            "Watch path '{}' is not a directory. Set [watch].path or pass --path.",
            root.display()
        )
        .into());
    }

    let files: Vec<String> = services
        .pending(args.limit)?
        .iter()
        .map(|p| p.display().to_string())
        .collect();

    let response = PendingResponse {
        watch_path: root.display().to_string(),
        count: files.len(),
        files,
    };

    match format {
        OutputFormat::Human => {
            if response.files.is_empty() {
                println!("{}", colors::success("Nothing pending"));
            } else {
                for file in &response.files {
                    println!("{}", colors::file_path(file));
                }
                eprintln!(
                    "{} pending file(s)",
                    colors::number(&response.count.to_string())
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
