//! Config command - show current configuration

use crate::cli::output::colors;
use crate::cli::OutputFormat;
use crate::core::config::Config;
use crate::core::services::Services;
use crate::core::xdg::XdgDirs;
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Also show resolved XDG directories
    #[arg(long, short = 'a')]
    pub all: bool,
}

/// Configuration response
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dirs: Option<DirsResponse>,
    pub config: Config,
}

#[derive(Debug, Serialize)]
pub struct DirsResponse {
    pub config_file: String,
    pub data_dir: String,
    pub state_dir: String,
    pub logs_dir: String,
}

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    services: &Arc<Services>,
    xdg: &XdgDirs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let dirs = args.all.then(|| DirsResponse {
        config_file: xdg.config_file().display().to_string(),
        data_dir: xdg.data_dir.display().to_string(),
        state_dir: xdg.state_dir.display().to_string(),
        logs_dir: xdg.logs_dir().display().to_string(),
    });

    let response = ConfigResponse {
        dirs,
        config: (*services.config).clone(),
    };

    match format {
        OutputFormat::Human => {
            if let Some(dirs) = &response.dirs {
                println!("{}", colors::label("# Directories"));
                println!("# config file: {}", dirs.config_file);
                println!("# data dir:    {}", dirs.data_dir);
                println!("# state dir:   {}", dirs.state_dir);
                println!("# logs dir:    {}", dirs.logs_dir);
                println!();
            }
            print!("{}", toml::to_string_pretty(&response.config)?);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
