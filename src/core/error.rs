//! Error types and error handling for the csvpipe ingestion service.
//!
//! This module defines the error taxonomy used throughout the
//! pipeline. Setup errors are fatal and stop the orchestrator;
//! index errors degrade gracefully; stage errors are contained
//! inside the worker loop and only abandon the current file.

use thiserror::Error;

use crate::core::types::Stage;

/// Result type alias for csvpipe operations
pub type Result<T> = std::result::Result<T, PipeError>;

/// Main error type for the csvpipe service
#[derive(Error, Debug)]
pub enum PipeError {
    #[error("Failed to load file index: {0}")]
    IndexLoad(String),

    #[error("Failed to save file index: {0}")]
    IndexSave(String),

    #[error("Cannot watch directory: {0}")]
    WatchSetup(String),

    #[error("Extract failed: {0}")]
    Extract(String),

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Load failed: {0}")]
    Load(String),

    #[error("Work queue is closed")]
    QueueClosed,

    #[error("Event sink error: {0}")]
    Sink(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl PipeError {
    /// Get user-friendly error message
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Errors that must stop the orchestrator with a non-zero exit
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipeError::WatchSetup(_) | PipeError::ConfigError(_))
    }

    /// Per-file stage failures; the worker abandons the file and continues
    pub fn is_stage_failure(&self) -> bool {
        self.stage().is_some()
    }

    /// Pipeline stage this error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipeError::Extract(_) => Some(Stage::Extract),
            PipeError::Transform(_) => Some(Stage::Transform),
            PipeError::Load(_) => Some(Stage::Load),
            _ => None,
        }
    }
}
