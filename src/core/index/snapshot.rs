//! Durable snapshot of processed paths.
//!
//! The snapshot is a single JSON document holding the full exact set.
//! Saves overwrite it atomically: write a sibling temp file, fsync,
//! rename over the target.

use crate::core::error::{PipeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk snapshot document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    /// Canonical paths, sorted for stable diffs
    pub paths: Vec<PathBuf>,
}

/// File-backed snapshot store
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full exact set
    ///
    /// A missing file is an empty set, not an error.
    pub fn load(&self) -> Result<HashSet<PathBuf>> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }

        let file = File::open(&self.path)
            .map_err(|e| PipeError::IndexLoad(format!("{}: {e}", self.path.display())))?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PipeError::IndexLoad(format!("{}: {e}", self.path.display())))?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(PipeError::IndexLoad(format!(
                "{}: snapshot version {} is newer than supported v{}",
                self.path.display(),
                snapshot.version,
                SNAPSHOT_VERSION
            )));
        }

        Ok(snapshot.paths.into_iter().collect())
    }

    /// Overwrite the snapshot with `paths`
    pub fn save<'a>(&self, paths: impl IntoIterator<Item = &'a PathBuf>) -> Result<()> {
        let mut sorted: Vec<PathBuf> = paths.into_iter().cloned().collect();
        sorted.sort();

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            paths: sorted,
        };

        self.write_atomic(&snapshot)
            .map_err(|e| PipeError::IndexSave(format!("{}: {e}", self.path.display())))
    }

    fn write_atomic(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.temp_path();
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, snapshot)?;
            writer.flush()?;
            writer
                .into_inner()
                .map_err(|e| PipeError::IoError(e.into_error()))?
                .sync_all()?;
        }

        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "file_index.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
