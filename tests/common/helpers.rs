// Test helper functions and stub pipeline stages

use async_trait::async_trait;
use csvpipe::core::config::Config;
use csvpipe::core::error::{PipeError, Result};
use csvpipe::core::index::DedupIndex;
use csvpipe::core::pipeline::{
    CsvExtractor, EventSink, Extractor, Loader, Orchestrator, PassthroughTransformer, PipelineStages,
    RunMode, RunSummary, Transformer,
};
use csvpipe::core::services::Services;
use csvpipe::core::types::{Dataset, EventKind, PipelineEvent};
use csvpipe::core::xdg::XdgDirs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::fixtures::DropDir;

/// Config pointing every path into `drop`
#[allow(dead_code)]
pub fn test_config(drop: &DropDir) -> Config {
    let mut config = Config::default();
    config.watch.path = drop.input();
    config.index.snapshot_file = drop.index_file();
    config.load.output_dir = drop.output();
    config.workers.count = 4;
    config.workers.stage_timeout_secs = 10;
    config
}

/// Services over `drop` with the default CSV stages
#[allow(dead_code)]
pub fn create_test_services(drop: &DropDir) -> Arc<Services> {
    Arc::new(Services::new(test_config(drop), &XdgDirs::new()))
}

/// Loader that records what it was asked to load
#[allow(dead_code)]
#[derive(Default)]
pub struct CountingLoader {
    calls: AtomicUsize,
    sources: Mutex<Vec<PathBuf>>,
    delay: Option<Duration>,
}

#[allow(dead_code)]
impl CountingLoader {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sources(&self) -> Vec<PathBuf> {
        let mut sources = self.sources.lock().unwrap().clone();
        sources.sort();
        sources
    }
}

#[async_trait]
impl Loader for CountingLoader {
    fn name(&self) -> &str {
        "counting"
    }

    async fn load(&self, data: &Dataset) -> Result<usize> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sources.lock().unwrap().push(data.source.clone());
        Ok(data.len())
    }
}

/// Extractor that never touches the filesystem
#[allow(dead_code)]
pub struct StubExtractor;

#[async_trait]
impl Extractor for StubExtractor {
    fn name(&self) -> &str {
        "stub"
    }

    async fn extract(&self, path: &Path) -> Result<Dataset> {
        Ok(Dataset::new(
            path,
            vec!["id".to_string()],
            vec![vec!["1".to_string()]],
        ))
    }
}

/// Transformer that always rejects its input
#[allow(dead_code)]
pub struct FailingTransformer;

#[async_trait]
impl Transformer for FailingTransformer {
    fn name(&self) -> &str {
        "failing"
    }

    async fn transform(&self, _data: Dataset) -> Result<Dataset> {
        Err(PipeError::Transform("column 'amount' is not numeric".to_string()))
    }
}

/// Sink that keeps every event in memory
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().iter().map(|e| e.event).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &PipelineEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// CSV extractor, passthrough transform and the given loader
#[allow(dead_code)]
pub fn counting_stages(loader: Arc<CountingLoader>) -> PipelineStages {
    PipelineStages::new(
        Arc::new(CsvExtractor::new()),
        Arc::new(PassthroughTransformer),
        loader,
    )
}

/// Stub extractor, passthrough transform and the given loader
#[allow(dead_code)]
pub fn stub_stages(loader: Arc<CountingLoader>) -> PipelineStages {
    PipelineStages::new(Arc::new(StubExtractor), Arc::new(PassthroughTransformer), loader)
}

/// Run one backlog pass over `config.watch.path`
#[allow(dead_code)]
pub async fn run_backlog(
    config: Config,
    index: Arc<DedupIndex>,
    stages: PipelineStages,
    sink: Arc<dyn EventSink>,
) -> RunSummary {
    Orchestrator::new(config, index, stages, sink)
        .run(RunMode::Backlog, CancellationToken::new())
        .await
        .expect("backlog run failed")
}
