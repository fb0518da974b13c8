//! Observability sinks for pipeline events.
//!
//! Sinks only observe. A failing sink is logged by the caller and the
//! file's outcome is unaffected.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::core::error::{PipeError, Result};
use crate::core::types::{EventKind, PipelineEvent};

/// Consumer of structured pipeline events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent) -> Result<()>;

    /// Push buffered events to their destination
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Logs every event through `tracing`
///
/// Terminal outcomes log at info/warn, intermediate stages at debug.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, e: &PipelineEvent) -> Result<()> {
        let path = e.path.display();
        match e.event {
            EventKind::Completed => tracing::info!(
                worker = e.worker,
                records = e.record_count.unwrap_or(0),
                duration_ms = e.duration_ms,
                extract_ms = e.timings.map(|t| t.extract_ms),
                transform_ms = e.timings.map(|t| t.transform_ms),
                load_ms = e.timings.map(|t| t.load_ms),
                "Processed {}",
                path
            ),
            EventKind::Failed => tracing::warn!(
                worker = e.worker,
                stage = ?e.stage,
                duration_ms = e.duration_ms,
                error = e.error.as_deref().unwrap_or(""),
                "Abandoned {}",
                path
            ),
            EventKind::Skipped => {
                tracing::debug!(worker = e.worker, "Skipped already processed {}", path)
            }
            kind => tracing::debug!(
                worker = e.worker,
                duration_ms = e.duration_ms,
                records = e.record_count,
                "{} {}",
                kind,
                path
            ),
        }
        Ok(())
    }
}

/// Appends events as JSON lines to a file
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonLinesSink {
    fn emit(&self, event: &PipelineEvent) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| PipeError::Sink("event writer poisoned".to_string()))?;
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
        // Terminal events are the ones operators tail for
        if matches!(event.event, EventKind::Completed | EventKind::Failed) {
            writer.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| PipeError::Sink("event writer poisoned".to_string()))?;
        writer.flush()?;
        Ok(())
    }
}

/// Delivers each event to several sinks
///
/// Every sink sees every event; the first error is returned after all
/// have been tried.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &PipelineEvent) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn flush(&self) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
