//! Worker pool driving extract -> transform -> load.
//!
//! Every worker runs the same loop: dequeue a path, skip it if the
//! index already has it or another worker holds it, run the three
//! stages in order, and mark the path processed only after a
//! successful load. A stage failure abandons the file unmarked so a
//! later scan yields it again.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::error::Result;
use crate::core::index::DedupIndex;
use crate::core::ingest::WorkQueue;
use crate::core::pipeline::sink::EventSink;
use crate::core::pipeline::stages::PipelineStages;
use crate::core::types::{ingest_key, EventKind, PipelineEvent, PipelineResult, Stage, StageTimings};

/// Pipeline counters shared by all workers
#[derive(Debug, Default)]
pub struct PipelineStats {
    dequeued: AtomicU64,
    succeeded: AtomicU64,
    skipped: AtomicU64,
    extract_failed: AtomicU64,
    transform_failed: AtomicU64,
    load_failed: AtomicU64,
    records_loaded: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub dequeued: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub extract_failed: u64,
    pub transform_failed: u64,
    pub load_failed: u64,
    pub records_loaded: u64,
}

impl StatsSnapshot {
    pub fn failed(&self) -> u64 {
        self.extract_failed + self.transform_failed + self.load_failed
    }
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dequeued: self.dequeued.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            extract_failed: self.extract_failed.load(Ordering::Relaxed),
            transform_failed: self.transform_failed.load(Ordering::Relaxed),
            load_failed: self.load_failed.load(Ordering::Relaxed),
            records_loaded: self.records_loaded.load(Ordering::Relaxed),
        }
    }

    fn record_failure(&self, stage: Stage) {
        let counter = match stage {
            Stage::Extract => &self.extract_failed,
            Stage::Transform => &self.transform_failed,
            Stage::Load => &self.load_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Runs the pipeline for one file at a time
///
/// Shared by all workers; per-file state lives on the stack of
/// [`PipelineDriver::process`].
pub struct PipelineDriver {
    stages: PipelineStages,
    index: Arc<DedupIndex>,
    sink: Arc<dyn EventSink>,
    stats: Arc<PipelineStats>,
    stage_timeout: Duration,
}

impl PipelineDriver {
    pub fn new(
        stages: PipelineStages,
        index: Arc<DedupIndex>,
        sink: Arc<dyn EventSink>,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            stages,
            index,
            sink,
            stats: Arc::new(PipelineStats::new()),
            stage_timeout,
        }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    pub fn index(&self) -> &Arc<DedupIndex> {
        &self.index
    }

    /// Process one dequeued path
    ///
    /// Returns `None` when the path was skipped as already processed
    /// or in flight elsewhere.
    pub async fn process(&self, worker: usize, path: PathBuf) -> Option<PipelineResult> {
        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        let key = ingest_key(&path);

        if self.index.is_processed(&key) {
            return self.skip(worker, &key);
        }
        let Some(claim) = self.index.claim(&key) else {
            return self.skip(worker, &key);
        };

        let result = self.run(worker, claim.path()).await;
        drop(claim);
        Some(result)
    }

    async fn run(&self, worker: usize, path: &Path) -> PipelineResult {
        let started = Instant::now();
        let mut timings = StageTimings::default();
        self.emit(PipelineEvent::new(EventKind::Started, path, worker, 0));

        let t = Instant::now();
        let data = match self
            .stage(Stage::Extract, self.stages.extractor.extract(path))
            .await
        {
            Ok(data) => data,
            Err(msg) => return self.fail(worker, path, Stage::Extract, msg, started),
        };
        timings.extract_ms = elapsed_ms(t);
        self.emit(
            PipelineEvent::new(EventKind::Extracted, path, worker, timings.extract_ms)
                .with_records(data.len()),
        );

        let t = Instant::now();
        let data = match self
            .stage(Stage::Transform, self.stages.transformer.transform(data))
            .await
        {
            Ok(data) => data,
            Err(msg) => return self.fail(worker, path, Stage::Transform, msg, started),
        };
        timings.transform_ms = elapsed_ms(t);
        self.emit(
            PipelineEvent::new(EventKind::Transformed, path, worker, timings.transform_ms)
                .with_records(data.len()),
        );

        let t = Instant::now();
        let records = match self.stage(Stage::Load, self.stages.loader.load(&data)).await {
            Ok(records) => records,
            Err(msg) => return self.fail(worker, path, Stage::Load, msg, started),
        };
        timings.load_ms = elapsed_ms(t);
        self.emit(
            PipelineEvent::new(EventKind::Loaded, path, worker, timings.load_ms)
                .with_records(records),
        );

        self.mark(path).await;

        timings.total_ms = elapsed_ms(started);
        self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
        self.stats
            .records_loaded
            .fetch_add(records as u64, Ordering::Relaxed);
        self.emit(
            PipelineEvent::new(EventKind::Completed, path, worker, timings.total_ms)
                .with_records(records)
                .with_timings(timings),
        );

        PipelineResult::Success(records)
    }

    /// Run one stage under the stage timeout
    async fn stage<T>(
        &self,
        stage: Stage,
        fut: impl Future<Output = Result<T>>,
    ) -> std::result::Result<T, String> {
        match tokio::time::timeout(self.stage_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "{stage} timed out after {}s",
                self.stage_timeout.as_secs_f64()
            )),
        }
    }

    /// Flush the mark on the blocking pool and wait for it
    ///
    /// The task is never cancelled, so a started flush always completes.
    async fn mark(&self, path: &Path) {
        let index = Arc::clone(&self.index);
        let key = path.to_path_buf();

        match tokio::task::spawn_blocking(move || index.mark_processed(&key)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!("{}; mark for {:?} kept in memory only", e, path);
            }
            Err(e) => tracing::error!("Mark task for {:?} failed: {}", path, e),
        }
    }

    fn fail(
        &self,
        worker: usize,
        path: &Path,
        stage: Stage,
        msg: String,
        started: Instant,
    ) -> PipelineResult {
        self.stats.record_failure(stage);
        self.emit(
            PipelineEvent::new(EventKind::Failed, path, worker, elapsed_ms(started))
                .with_failure(stage, msg.clone()),
        );
        PipelineResult::failed(stage, msg)
    }

    fn skip(&self, worker: usize, path: &Path) -> Option<PipelineResult> {
        self.stats.skipped.fetch_add(1, Ordering::Relaxed);
        self.emit(PipelineEvent::new(EventKind::Skipped, path, worker, 0));
        None
    }

    fn emit(&self, event: PipelineEvent) {
        if let Err(e) = self.sink.emit(&event) {
            tracing::warn!("Event sink error: {}", e);
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Fixed-size set of workers consuming one queue
pub struct WorkerPool {
    workers: JoinSet<()>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` workers
    ///
    /// Workers exit when the queue is closed and empty, or when `stop`
    /// is cancelled (after finishing their current file).
    pub fn spawn(
        size: usize,
        driver: Arc<PipelineDriver>,
        queue: Arc<WorkQueue>,
        stop: CancellationToken,
    ) -> Self {
        let mut workers = JoinSet::new();
        for id in 0..size {
            workers.spawn(worker_loop(
                id,
                Arc::clone(&driver),
                Arc::clone(&queue),
                stop.clone(),
            ));
        }
        tracing::info!("Started {} workers", size);

        Self { workers, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Wait for every worker to exit
    pub async fn join(mut self) {
        while let Some(res) = self.workers.join_next().await {
            if let Err(e) = res {
                tracing::error!("Worker task failed: {}", e);
            }
        }
    }
}

async fn worker_loop(
    id: usize,
    driver: Arc<PipelineDriver>,
    queue: Arc<WorkQueue>,
    stop: CancellationToken,
) {
    loop {
        let path = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            item = queue.dequeue() => match item {
                Some(path) => path,
                None => break,
            },
        };

        driver.process(id, path).await;
    }
    tracing::debug!(worker = id, "Worker exiting");
}
