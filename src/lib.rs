//! csvpipe - Watched-directory CSV ingestion
//!
//! Files dropped into a directory are pushed through an
//! extract -> transform -> load pipeline exactly once. A Bloom filter
//! backed by a durable snapshot remembers which files are done, so
//! restarts and duplicate filesystem events never reprocess a file.
//!
//! # Architecture
//!
//! - **core**: Domain logic
//!   - config, error, logging, types, xdg
//!   - index (Bloom filter, snapshot, dedup index)
//!   - ingest (walker, watcher, bounded queue)
//!   - pipeline (stages, workers, orchestrator)
//!   - services (unified service container)
//!
//! - **cli**: Command-line adapter (depends on core)

// Core domain logic
pub mod core;

// Command-line adapter
pub mod cli;

// Re-export commonly used types for convenience
pub use core::config::Config;
pub use core::error::{PipeError, Result};
pub use core::index::DedupIndex;
pub use core::pipeline::{Orchestrator, RunMode, RunSummary};
pub use core::services::Services;
pub use core::types::*;
