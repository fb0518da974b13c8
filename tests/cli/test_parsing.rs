//! Argument parsing and config override tests

use clap::Parser;
use csvpipe::cli::{Cli, Commands, OutputFormat};
use csvpipe::core::config::Config;
use std::path::PathBuf;

#[test]
fn test_run_flags_override_config() {
    let cli = Cli::parse_from([
        "csvpipe", "run", "--path", "/srv/drop", "--recursive", "--workers", "2", "--no-drain",
    ]);
    let mut config = Config::default();
    cli.command.apply_overrides(&mut config);

    assert_eq!(config.watch.path, PathBuf::from("/srv/drop"));
    assert!(config.watch.recursive);
    assert_eq!(config.workers.count, 2);
    assert!(!config.workers.drain_on_shutdown);
}

#[test]
fn test_settle_flag_overrides_config() {
    let cli = Cli::parse_from(["csvpipe", "run", "--settle-ms", "0"]);
    let mut config = Config::default();
    assert_eq!(config.watch.settle_ms, 500);

    cli.command.apply_overrides(&mut config);
    assert_eq!(config.watch.settle_ms, 0);
}

#[test]
fn test_format_flag_is_global() {
    let cli = Cli::parse_from(["csvpipe", "pending", "--limit", "5", "--format", "json"]);
    assert_eq!(cli.format, OutputFormat::Json);
    match cli.command {
        Commands::Pending(args) => assert_eq!(args.limit, Some(5)),
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn test_forget_takes_positional_file() {
    let cli = Cli::parse_from(["csvpipe", "forget", "data/orders.csv"]);
    let mut config = Config::default();
    cli.command.apply_overrides(&mut config);

    assert_eq!(config.watch.path, PathBuf::from("./data"));
    match cli.command {
        Commands::Forget(args) => assert_eq!(args.file, PathBuf::from("data/orders.csv")),
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn test_unknown_subcommand_rejected() {
    assert!(Cli::try_parse_from(["csvpipe", "index-repository"]).is_err());
}
