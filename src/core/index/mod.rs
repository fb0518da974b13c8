//! Processed-file dedup index.
//!
//! - **bloom**: in-memory negative pre-filter
//! - **snapshot**: durable exact set (JSON, atomic overwrite)
//! - **dedup**: the shared index combining both

pub mod bloom;
pub mod dedup;
pub mod snapshot;

pub use bloom::BloomFilter;
pub use dedup::{Claim, DedupIndex, IndexStats};
pub use snapshot::SnapshotStore;
