//! Core data types for the csvpipe ingestion service.
//!
//! This module defines the data structures that flow through the
//! pipeline: the tabular dataset handed between stages, per-file
//! outcomes, stage timings, and the structured events emitted to
//! observability sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Pipeline stage identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extract => write!(f, "extract"),
            Stage::Transform => write!(f, "transform"),
            Stage::Load => write!(f, "load"),
        }
    }
}

/// Tabular dataset passed between pipeline stages
///
/// Values are kept as strings; typing is the loader's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// File the rows were extracted from
    pub source: PathBuf,

    /// Column names from the header row
    pub headers: Vec<String>,

    /// Data rows, each with exactly `headers.len()` fields
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(source: impl Into<PathBuf>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            source: source.into(),
            headers,
            rows,
        }
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by header name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Outcome of one pipeline run for one file
///
/// Only `Success` is ever recorded in the dedup index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum PipelineResult {
    Success(usize),
    ExtractFailed(String),
    TransformFailed(String),
    LoadFailed(String),
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Success(_))
    }

    /// Build the failure variant for a stage
    pub fn failed(stage: Stage, message: impl Into<String>) -> Self {
        let message = message.into();
        match stage {
            Stage::Extract => PipelineResult::ExtractFailed(message),
            Stage::Transform => PipelineResult::TransformFailed(message),
            Stage::Load => PipelineResult::LoadFailed(message),
        }
    }

    /// Stage that failed, `None` on success
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            PipelineResult::Success(_) => None,
            PipelineResult::ExtractFailed(_) => Some(Stage::Extract),
            PipelineResult::TransformFailed(_) => Some(Stage::Transform),
            PipelineResult::LoadFailed(_) => Some(Stage::Load),
        }
    }
}

/// Wall-clock time spent in each stage for one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub extract_ms: u64,
    pub transform_ms: u64,
    pub load_ms: u64,
    pub total_ms: u64,
}

/// Kind of a pipeline event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Started,
    Extracted,
    Transformed,
    Loaded,
    Failed,
    Skipped,
    Completed,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Started => "started",
            EventKind::Extracted => "extracted",
            EventKind::Transformed => "transformed",
            EventKind::Loaded => "loaded",
            EventKind::Failed => "failed",
            EventKind::Skipped => "skipped",
            EventKind::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Structured event delivered to observability sinks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub event: EventKind,
    pub path: PathBuf,
    pub worker: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timings: Option<StageTimings>,
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    pub fn new(event: EventKind, path: &Path, worker: usize, duration_ms: u64) -> Self {
        Self {
            event,
            path: path.to_path_buf(),
            worker,
            duration_ms,
            record_count: None,
            stage: None,
            error: None,
            timings: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_records(mut self, count: usize) -> Self {
        self.record_count = Some(count);
        self
    }

    pub fn with_failure(mut self, stage: Stage, error: impl Into<String>) -> Self {
        self.stage = Some(stage);
        self.error = Some(error.into());
        self
    }

    pub fn with_timings(mut self, timings: StageTimings) -> Self {
        self.timings = Some(timings);
        self
    }
}

/// Resolve the dedup identity of a path
///
/// Canonicalizes when the file exists; otherwise falls back to the
/// absolute form so paths of already-removed files still map to a
/// stable key.
pub fn ingest_key(path: &Path) -> PathBuf {
    match path.canonicalize() {
        Ok(canonical) => canonical,
        Err(_) => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}
