//! CLI command implementations
//!
//! Each command module handles argument parsing and execution for a
//! specific CLI command.

pub mod completions;
pub mod config;
pub mod forget;
pub mod pending;
pub mod run;
pub mod status;

use crate::core::config::Config;
use clap::Args;
use std::path::PathBuf;

// Re-export argument types for use in mod.rs
pub use completions::CompletionsArgs;
pub use config::ConfigArgs;
pub use forget::ForgetArgs;
pub use pending::PendingArgs;
pub use run::RunArgs;
pub use status::StatusArgs;

/// Watch directory overrides shared by several commands
#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
    /// Directory to ingest from (overrides [watch].path)
    #[arg(long, short = 'p')]
    pub path: Option<PathBuf>,

    /// Include subdirectories
    #[arg(long, short = 'r')]
    pub recursive: bool,
}

impl WatchArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.path {
            config.watch.path = path.clone();
        }
        if self.recursive {
            config.watch.recursive = true;
        }
    }
}
