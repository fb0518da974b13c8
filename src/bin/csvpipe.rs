//! csvpipe - watched-directory CSV ingestion
//!
//! Every CSV file that lands in the watch directory is extracted, cleaned
//! and written out as JSON lines exactly once. Processed files are
//! remembered in a durable index so restarts only pick up new work.
//!
//! # Examples
//!
//! ```bash
//! # Process the backlog, then keep watching
//! csvpipe run --path /srv/drop --workers 4
//!
//! # One-shot catch-up, JSON summary for scripts
//! csvpipe scan --path /srv/drop --format json
//!
//! # What would the next scan pick up?
//! csvpipe pending --limit 20
//!
//! # Reprocess a file
//! csvpipe forget /srv/drop/orders.csv
//! ```

use clap::Parser;
use csvpipe::cli::output::print_error;
use csvpipe::cli::{run, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}
