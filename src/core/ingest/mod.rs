//! Ingestion front end.
//!
//! Everything that produces work for the pipeline: the backlog walker,
//! the live directory watcher and the bounded queue between them and
//! the worker pool.

pub mod queue;
pub mod walker;
pub mod watcher;

pub use queue::WorkQueue;
pub use walker::FileWalker;
pub use watcher::{Arrival, DirectoryWatcher};
