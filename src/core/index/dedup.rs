//! Processed-file dedup index.
//!
//! Two sets answer "has this file been handled": a Bloom filter that
//! can only say "definitely not" or "maybe", and the exact set that
//! settles every "maybe". The exact set is the source of truth and is
//! flushed to a [`SnapshotStore`] on every new mark.
//!
//! Locking: lookups share a read lock; marks, forgets and flushes are
//! serialized by a single writer mutex and hold the read lock while
//! the snapshot is written, so lookups keep flowing during a flush.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::core::config::IndexConfig;
use crate::core::error::Result;
use crate::core::index::bloom::BloomFilter;
use crate::core::index::snapshot::SnapshotStore;
use crate::core::ingest::walker::FileWalker;
use crate::core::types::ingest_key;

struct IndexState {
    bloom: BloomFilter,
    exact: HashSet<PathBuf>,
    /// Item count the Bloom filter was sized for
    capacity: usize,
}

/// Point-in-time index statistics
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub entries: usize,
    pub bloom_bits: u64,
    pub bloom_hashes: u32,
    pub bloom_capacity: usize,
    pub bloom_fill_ratio: f64,
    pub false_positive_hits: u64,
    pub snapshot_file: Option<PathBuf>,
}

/// Shared dedup index
///
/// Keys are canonical paths as produced by [`ingest_key`].
pub struct DedupIndex {
    state: RwLock<IndexState>,
    writer: Mutex<()>,
    in_flight: Mutex<HashSet<PathBuf>>,
    store: Option<SnapshotStore>,
    expected_items: usize,
    false_positive_rate: f64,
    false_positive_hits: AtomicU64,
}

/// Exclusive in-flight ownership of a path
///
/// Released on drop.
#[must_use = "the claim is released as soon as it is dropped"]
pub struct Claim<'a> {
    index: &'a DedupIndex,
    path: PathBuf,
}

impl Claim<'_> {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.index.in_flight().remove(&self.path);
    }
}

impl DedupIndex {
    /// Open the index backed by `snapshot_file`
    ///
    /// A missing or unreadable snapshot yields an empty index; the
    /// failure is logged, never returned.
    pub fn open(
        snapshot_file: impl Into<PathBuf>,
        expected_items: usize,
        false_positive_rate: f64,
    ) -> Self {
        let store = SnapshotStore::new(snapshot_file);
        let exact = match store.load() {
            Ok(paths) => {
                tracing::info!(
                    entries = paths.len(),
                    "Loaded file index from {:?}",
                    store.path()
                );
                paths
            }
            Err(e) => {
                tracing::warn!("{}; starting with an empty index", e);
                HashSet::new()
            }
        };

        Self::with_entries(Some(store), exact, expected_items, false_positive_rate)
    }

    /// Open using the `[index]` config section
    pub fn from_config(config: &IndexConfig) -> Self {
        Self::open(
            &config.snapshot_file,
            config.expected_items,
            config.false_positive_rate,
        )
    }

    /// In-memory index without a durable store
    pub fn ephemeral(expected_items: usize, false_positive_rate: f64) -> Self {
        Self::with_entries(None, HashSet::new(), expected_items, false_positive_rate)
    }

    fn with_entries(
        store: Option<SnapshotStore>,
        exact: HashSet<PathBuf>,
        expected_items: usize,
        false_positive_rate: f64,
    ) -> Self {
        let state = build_state(exact, expected_items, false_positive_rate);
        Self {
            state: RwLock::new(state),
            writer: Mutex::new(()),
            in_flight: Mutex::new(HashSet::new()),
            store,
            expected_items,
            false_positive_rate,
            false_positive_hits: AtomicU64::new(0),
        }
    }

    /// Whether `path` completed processing
    ///
    /// A Bloom miss is authoritative and skips the exact set.
    pub fn is_processed(&self, path: &Path) -> bool {
        let state = self.read();
        if !state.bloom.might_contain(path) {
            return false;
        }

        let present = state.exact.contains(path);
        if !present {
            self.false_positive_hits.fetch_add(1, Ordering::Relaxed);
        }
        present
    }

    /// Exact-set membership, bypassing the Bloom filter
    pub fn contains_exact(&self, path: &Path) -> bool {
        self.read().exact.contains(path)
    }

    /// Record `path` as processed and flush the snapshot
    ///
    /// Returns `Ok(false)` when the path was already marked; nothing is
    /// written in that case. On a save error the mark stays in memory
    /// and the error is returned for the caller to report.
    pub fn mark_processed(&self, path: &Path) -> Result<bool> {
        let _writer = self.writer();
        {
            let mut state = self.write();
            if !state.exact.insert(path.to_path_buf()) {
                return Ok(false);
            }
            state.bloom.insert(path);

            if state.exact.len() > state.capacity {
                let exact = std::mem::take(&mut state.exact);
                *state = build_state(exact, self.expected_items, self.false_positive_rate);
                tracing::debug!(
                    capacity = state.capacity,
                    "Resized Bloom filter after exceeding capacity"
                );
            }
        }

        self.save_locked()?;
        Ok(true)
    }

    /// Remove `path` so a later scan picks it up again
    ///
    /// Rebuilds the Bloom filter, which cannot delete.
    pub fn forget(&self, path: &Path) -> Result<bool> {
        let _writer = self.writer();
        {
            let mut state = self.write();
            if !state.exact.remove(path) {
                return Ok(false);
            }
            let exact = std::mem::take(&mut state.exact);
            *state = build_state(exact, self.expected_items, self.false_positive_rate);
        }

        self.save_locked()?;
        Ok(true)
    }

    /// Write the exact set to the snapshot file
    pub fn flush(&self) -> Result<()> {
        let _writer = self.writer();
        self.save_locked()
    }

    /// Claim `path` for processing
    ///
    /// `None` if another worker holds it or it was marked meanwhile.
    pub fn claim(&self, path: &Path) -> Option<Claim<'_>> {
        let mut in_flight = self.in_flight();
        if in_flight.contains(path) || self.contains_exact(path) {
            return None;
        }
        in_flight.insert(path.to_path_buf());

        Some(Claim {
            index: self,
            path: path.to_path_buf(),
        })
    }

    /// Number of paths currently claimed
    pub fn in_flight_count(&self) -> usize {
        self.in_flight().len()
    }

    /// Unprocessed matching files under `root`, lazily and in
    /// traversal order
    pub fn scan_backlog<'a>(
        &'a self,
        root: &'a Path,
        walker: &'a FileWalker,
    ) -> impl Iterator<Item = PathBuf> + 'a {
        walker
            .walk(root)
            .map(|path| ingest_key(&path))
            .filter(move |path| !self.is_processed(path))
    }

    pub fn len(&self) -> usize {
        self.read().exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted copy of the exact set
    pub fn entries(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.read().exact.iter().cloned().collect();
        paths.sort();
        paths
    }

    pub fn snapshot_file(&self) -> Option<&Path> {
        self.store.as_ref().map(|s| s.path())
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.read();
        IndexStats {
            entries: state.exact.len(),
            bloom_bits: state.bloom.num_bits(),
            bloom_hashes: state.bloom.num_hashes(),
            bloom_capacity: state.capacity,
            bloom_fill_ratio: state.bloom.fill_ratio(),
            false_positive_hits: self.false_positive_hits.load(Ordering::Relaxed),
            snapshot_file: self.snapshot_file().map(Path::to_path_buf),
        }
    }

    /// Caller holds the writer mutex
    fn save_locked(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let state = self.read();
        store.save(&state.exact)
    }

    // Poisoning only means another thread panicked mid-update; the sets
    // stay structurally valid, so keep serving.
    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn in_flight(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn build_state(
    exact: HashSet<PathBuf>,
    expected_items: usize,
    false_positive_rate: f64,
) -> IndexState {
    let capacity = expected_items.max(exact.len().saturating_mul(2));
    let mut bloom = BloomFilter::with_rate(capacity, false_positive_rate);
    for path in &exact {
        bloom.insert(path.as_path());
    }
    IndexState {
        bloom,
        exact,
        capacity,
    }
}
