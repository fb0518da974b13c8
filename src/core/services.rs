//! Unified service container for csvpipe
//!
//! Builds the shared index, default stages and event sinks from
//! configuration. Every CLI command goes through this struct.

use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::index::DedupIndex;
use crate::core::ingest::FileWalker;
use crate::core::pipeline::{
    CleaningTransformer, CsvExtractor, EventSink, FanoutSink, JsonLinesLoader, JsonLinesSink,
    Orchestrator, PipelineStages, TracingSink,
};
use crate::core::types::ingest_key;
use crate::core::xdg::XdgDirs;
use std::path::PathBuf;
use std::sync::Arc;

/// Unified services container
#[derive(Clone)]
pub struct Services {
    /// Processed-file index shared by all workers
    pub index: Arc<DedupIndex>,

    /// Extract/transform/load collaborators
    pub stages: PipelineStages,

    /// Event fan-out (tracing + optional JSON-lines file)
    pub sink: Arc<dyn EventSink>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl Services {
    /// Create services from configuration
    ///
    /// An event log that cannot be opened is reported and skipped; it
    /// never prevents the pipeline from starting.
    pub fn new(config: Config, xdg: &XdgDirs) -> Self {
        let index = Arc::new(DedupIndex::from_config(&config.index));

        let stages = PipelineStages::new(
            Arc::new(CsvExtractor::new()),
            Arc::new(CleaningTransformer::new(config.transform.clone())),
            Arc::new(
                JsonLinesLoader::new(config.load.output_dir.clone())
                    .with_source_root(ingest_key(&config.watch.path)),
            ),
        );

        let mut sink = FanoutSink::new().with(Arc::new(TracingSink));
        if config.events.file {
            let events_file = xdg.events_file();
            match JsonLinesSink::open(&events_file) {
                Ok(file_sink) => sink = sink.with(Arc::new(file_sink)),
                Err(e) => tracing::warn!("Cannot open event log {:?}: {}", events_file, e),
            }
        }

        Self {
            index,
            stages,
            sink: Arc::new(sink),
            config: Arc::new(config),
        }
    }

    /// Walker for the configured watch patterns
    pub fn walker(&self) -> Result<FileWalker> {
        FileWalker::from_config(&self.config.watch)
    }

    /// Orchestrator wired to the shared index, stages and sinks
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            (*self.config).clone(),
            Arc::clone(&self.index),
            self.stages.clone(),
            Arc::clone(&self.sink),
        )
    }

    /// Unprocessed files under the watch path, up to `limit`
    pub fn pending(&self, limit: Option<usize>) -> Result<Vec<PathBuf>> {
        let walker = self.walker()?;
        let root = &self.config.watch.path;
        let pending = self.index.scan_backlog(root, &walker);

        Ok(match limit {
            Some(limit) => pending.take(limit).collect(),
            None => pending.collect(),
        })
    }
}
