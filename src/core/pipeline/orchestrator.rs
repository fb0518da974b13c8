//! Pipeline lifecycle.
//!
//! Startup order: index (already open) -> queue -> worker pool ->
//! watcher -> backlog scan. Workers come first so a backlog larger than
//! the queue cannot deadlock the scan; the watcher starts before the
//! scan so no file can slip in between the two. Files seen by both are
//! absorbed by the index.
//!
//! Shutdown runs in reverse: stop the watcher, cancel the scan, close
//! the queue, let workers drain (or stop after their current file),
//! join them and flush the index.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::config::Config;
use crate::core::error::{PipeError, Result};
use crate::core::index::DedupIndex;
use crate::core::ingest::{DirectoryWatcher, FileWalker, WorkQueue};
use crate::core::pipeline::sink::EventSink;
use crate::core::pipeline::stages::PipelineStages;
use crate::core::pipeline::worker::{PipelineDriver, StatsSnapshot, WorkerPool};

/// How long the orchestrator keeps running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Backlog scan plus live watching until shutdown is requested
    Watch,
    /// Backlog scan only; exits once every found file is handled
    Backlog,
}

/// Outcome of one orchestrator run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: RunMode,
    pub watch_path: PathBuf,
    pub backlog_enqueued: u64,
    pub watch_enqueued: u64,
    pub stats: StatsSnapshot,
    pub index_entries: usize,
    /// Shutdown was requested before the run finished on its own
    pub interrupted: bool,
    pub elapsed_ms: u64,
}

/// Owns the queue, watcher and pool for one run
pub struct Orchestrator {
    config: Config,
    index: Arc<DedupIndex>,
    stages: PipelineStages,
    sink: Arc<dyn EventSink>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        index: Arc<DedupIndex>,
        stages: PipelineStages,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            index,
            stages,
            sink,
        }
    }

    pub fn index(&self) -> &Arc<DedupIndex> {
        &self.index
    }

    /// Run until `shutdown` fires (watch mode) or the backlog is done
    ///
    /// Fails only on startup: an inaccessible watch directory, invalid
    /// patterns or a watcher that cannot subscribe.
    pub async fn run(&self, mode: RunMode, shutdown: CancellationToken) -> Result<RunSummary> {
        let started = Instant::now();
        let root = self.watch_root()?;
        let walker = FileWalker::from_config(&self.config.watch)?;
        let workers = &self.config.workers;

        tracing::info!(
            ?mode,
            workers = workers.count,
            stages = %self.stages.describe(),
            "Starting pipeline on {:?}",
            root
        );

        let queue = Arc::new(WorkQueue::new(workers.queue_capacity));
        let driver = Arc::new(PipelineDriver::new(
            self.stages.clone(),
            Arc::clone(&self.index),
            Arc::clone(&self.sink),
            Duration::from_secs(workers.stage_timeout_secs),
        ));
        let stop = CancellationToken::new();
        let pool = WorkerPool::spawn(
            workers.count,
            Arc::clone(&driver),
            Arc::clone(&queue),
            stop.clone(),
        );

        let watcher = match mode {
            RunMode::Watch => {
                let settle = Duration::from_millis(self.config.watch.settle_ms);
                match DirectoryWatcher::start(&root, walker.clone(), Arc::clone(&queue), settle) {
                    Ok(watcher) => Some(watcher),
                    Err(e) => {
                        queue.close();
                        pool.join().await;
                        return Err(e);
                    }
                }
            }
            RunMode::Backlog => None,
        };

        let scan_cancel = shutdown.child_token();
        let mut scanner = Some(spawn_backlog_scan(
            Arc::clone(&self.index),
            root.clone(),
            walker,
            Arc::clone(&queue),
            scan_cancel.clone(),
        ));
        let mut backlog_enqueued = 0;

        let interrupted = match mode {
            RunMode::Watch => {
                shutdown.cancelled().await;
                true
            }
            RunMode::Backlog => {
                let finished = match scanner.as_mut() {
                    Some(handle) => tokio::select! {
                        _ = shutdown.cancelled() => None,
                        res = handle => Some(scan_count(res)),
                    },
                    None => None,
                };
                match finished {
                    Some(count) => {
                        backlog_enqueued = count;
                        scanner = None;
                        false
                    }
                    None => true,
                }
            }
        };
        tracing::info!(interrupted, "Shutting down pipeline");

        // Reverse order of startup
        let watch_enqueued = match watcher {
            Some(watcher) => {
                let forwarded = watcher.forwarded();
                watcher.stop().await;
                forwarded
            }
            None => 0,
        };

        scan_cancel.cancel();
        if interrupted && !workers.drain_on_shutdown {
            tracing::info!(pending = queue.len(), "Stopping workers without draining");
            stop.cancel();
        }
        queue.close();

        if let Some(handle) = scanner {
            backlog_enqueued = scan_count(handle.await);
        }
        pool.join().await;

        if let Err(e) = self.index.flush() {
            tracing::warn!("{}", e);
        }
        if let Err(e) = self.sink.flush() {
            tracing::warn!("Event sink flush failed: {}", e);
        }

        let stats = driver.stats().snapshot();
        let summary = RunSummary {
            mode,
            watch_path: root,
            backlog_enqueued,
            watch_enqueued,
            stats,
            index_entries: self.index.len(),
            interrupted,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            succeeded = stats.succeeded,
            failed = stats.failed(),
            skipped = stats.skipped,
            records = stats.records_loaded,
            elapsed_ms = summary.elapsed_ms,
            "Pipeline stopped"
        );
        Ok(summary)
    }

    fn watch_root(&self) -> Result<PathBuf> {
        let path = &self.config.watch.path;
        if !path.is_dir() {
            return Err(PipeError::WatchSetup(format!(
                "{} is not an accessible directory",
                path.display()
            )));
        }
        path.canonicalize()
            .map_err(|e| PipeError::WatchSetup(format!("{}: {e}", path.display())))
    }
}

/// Walk the backlog on the blocking pool, feeding the queue
fn spawn_backlog_scan(
    index: Arc<DedupIndex>,
    root: PathBuf,
    walker: FileWalker,
    queue: Arc<WorkQueue>,
    cancel: CancellationToken,
) -> JoinHandle<u64> {
    let handle = tokio::runtime::Handle::current();
    tokio::task::spawn_blocking(move || {
        let mut enqueued = 0;
        for path in index.scan_backlog(&root, &walker) {
            if cancel.is_cancelled() {
                break;
            }
            if queue.blocking_enqueue(&handle, path).is_err() {
                break;
            }
            enqueued += 1;
        }
        tracing::info!(enqueued, "Backlog scan of {:?} finished", root);
        enqueued
    })
}

fn scan_count(res: std::result::Result<u64, tokio::task::JoinError>) -> u64 {
    res.unwrap_or_else(|e| {
        tracing::error!("Backlog scan task failed: {}", e);
        0
    })
}

/// Resolves on Ctrl-C or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Cancel `token` when a termination signal arrives
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_signal() => token.cancel(),
            _ = token.cancelled() => {}
        }
    })
}
