//! Core domain logic (CLI-agnostic)
//!
//! # Architecture
//!
//! - **config**: Configuration loading (TOML + environment)
//! - **error**: Error types and Result alias
//! - **logging**: tracing subscriber setup
//! - **types**: Domain data structures
//! - **xdg**: XDG directory handling
//! - **index**: Bloom filter + durable processed-file set
//! - **ingest**: Backlog walker, directory watcher, work queue
//! - **pipeline**: Stages, workers and the orchestrator
//! - **services**: Unified service container

pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod services;
pub mod types;
pub mod xdg;

// Re-export key types for convenience
pub use config::Config;
pub use error::{PipeError, Result};
pub use services::Services;
