//! CLI adapter for csvpipe
//!
//! Thin clap layer over `core/`: parses arguments, applies command-line
//! overrides on top of the loaded configuration, sets up logging and
//! dispatches to one command module.
//!
//! ```text
//! +------------------+      +------------------+
//! |      cli/        | ---> |      core/       |
//! | (clap adapter)   |      |  (domain logic)  |
//! +------------------+      +------------------+
//! ```

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::core::config::Config;

/// csvpipe - exactly-once CSV ingestion from a watched directory
///
/// New CSV files are extracted, cleaned and loaded once; a durable
/// index remembers which files are done across restarts.
#[derive(Parser, Debug)]
#[command(name = "csvpipe")]
#[command(version)]
#[command(about = "Watched-directory CSV ingestion pipeline", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process the backlog, then watch for new files until stopped
    ///
    /// A file moved into the directory is picked up immediately. A file
    /// written in place is picked up once it has gone --settle-ms without
    /// writes, so producers that pause mid-write should write to a
    /// temporary name (or outside the directory) and rename it in.
    Run(commands::RunArgs),

    /// Process files already in the directory once and exit
    Scan(commands::RunArgs),

    /// Show index statistics and pending file count
    Status(commands::StatusArgs),

    /// List matching files that have not been processed yet
    Pending(commands::PendingArgs),

    /// Remove a file from the index so it is processed again
    Forget(commands::ForgetArgs),

    /// Show current configuration
    #[command(name = "show-config")]
    ShowConfig(commands::ConfigArgs),

    /// Generate shell completion scripts
    ///
    /// Output completion script to stdout. To install:
    ///
    ///   bash:  csvpipe completions bash > ~/.local/share/bash-completion/completions/csvpipe
    ///   zsh:   csvpipe completions zsh > ~/.zfunc/_csvpipe
    ///   fish:  csvpipe completions fish > ~/.config/fish/completions/csvpipe.fish
    Completions(commands::CompletionsArgs),
}

impl Commands {
    /// Apply command-line overrides to the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        match self {
            Commands::Run(args) | Commands::Scan(args) => args.apply(config),
            Commands::Status(args) => args.watch.apply(config),
            Commands::Pending(args) => args.watch.apply(config),
            Commands::Forget(_) | Commands::ShowConfig(_) | Commands::Completions(_) => {}
        }
    }
}

/// Run the CLI with the provided arguments
pub async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    use crate::core::logging::init_logging;
    use crate::core::services::Services;
    use crate::core::xdg::{migrate_legacy_paths, XdgDirs};
    use std::sync::Arc;

    // Handle completions command early (doesn't need services)
    if let Commands::Completions(args) = cli.command {
        return commands::completions::execute(args);
    }

    // Initialize XDG directories
    let xdg = XdgDirs::new();
    xdg.ensure_dirs_exist()?;

    // Run migration from legacy paths (if needed)
    if let Err(e) = migrate_legacy_paths(&xdg) {
        output::print_warning(&format!("Migration issue: {e}"));
    }

    // Load configuration, then let flags win
    let mut config = Config::load_with_xdg(&xdg)?;
    cli.command.apply_overrides(&mut config);
    config.validate()?;

    // Held until exit so buffered file logs are written
    let _log_guard = init_logging(&config.logging, &xdg)?;
    xdg.log_paths();
    config.log_config();

    // Create services
    let services = Arc::new(Services::new(config, &xdg));

    // Execute command
    match cli.command {
        Commands::Run(args) => commands::run::execute_run(args, &services, cli.format).await,
        Commands::Scan(args) => commands::run::execute_scan(args, &services, cli.format).await,
        Commands::Status(args) => commands::status::execute(args, &services, cli.format).await,
        Commands::Pending(args) => commands::pending::execute(args, &services, cli.format).await,
        Commands::Forget(args) => commands::forget::execute(args, &services, cli.format).await,
        Commands::ShowConfig(args) => {
            commands::config::execute(args, &services, &xdg, cli.format).await
        }
        Commands::Completions(_) => unreachable!(), // Handled above
    }
}
