//! Forget command - redrive a file by removing it from the index

use crate::cli::output::{colors, print_warning};
use crate::cli::OutputFormat;
use crate::core::services::Services;
use crate::core::types::ingest_key;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the forget command
#[derive(Args, Debug)]
pub struct ForgetArgs {
    /// File to remove from the processed index
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ForgetResponse {
    pub path: String,
    pub removed: bool,
}

/// Execute the forget command
pub async fn execute(
    args: ForgetArgs,
    services: &Arc<Services>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let key = ingest_key(&args.file);
    let removed = services.index.forget(&key)?;

    let response = ForgetResponse {
        path: key.display().to_string(),
        removed,
    };

    match format {
        OutputFormat::Human => {
            if removed {
                println!(
                    "{} {} (processed again on the next scan)",
                    colors::success("Forgot"),
                    colors::file_path(&response.path)
                );
            } else {
                print_warning(&format!("{} is not in the index", response.path));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
