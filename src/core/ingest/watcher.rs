//! Directory watcher feeding the work queue.
//!
//! The notify callback runs on the backend's own thread and must never
//! block, so it only pushes raw events into an unbounded channel. A
//! forwarding task filters them and awaits the bounded queue; queue
//! back-pressure therefore lands on that task.
//!
//! A file moved into the tree is complete on arrival and is forwarded
//! at once. A file created in place may still be written to, so it is
//! held until no write event has touched it for the settle window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::error::{PipeError, Result};
use crate::core::ingest::queue::WorkQueue;
use crate::core::ingest::walker::FileWalker;
use crate::core::types::ingest_key;

/// How a path showed up in the watched tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Created in place; the writer may not be done yet
    Created,
    /// Renamed or moved in, complete on arrival
    MovedIn,
}

/// Running watcher over one root directory
pub struct DirectoryWatcher {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    cancel: CancellationToken,
    forwarder: Option<JoinHandle<()>>,
    forwarded: Arc<AtomicU64>,
}

impl DirectoryWatcher {
    /// Subscribe to `root` and start forwarding matching new files
    ///
    /// Files created in place are forwarded once `settle` has passed
    /// without further writes; a zero `settle` forwards them at once.
    /// Must be called inside a tokio runtime. Fails with `WatchSetup`
    /// if `root` is not an accessible directory.
    pub fn start(
        root: &Path,
        walker: FileWalker,
        queue: Arc<WorkQueue>,
        settle: Duration,
    ) -> Result<Self> {
        if !root.is_dir() {
            return Err(PipeError::WatchSetup(format!(
                "{} is not an accessible directory",
                root.display()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means we are shutting down
            let _ = tx.send(res);
        })
        .map_err(|e| PipeError::WatchSetup(format!("{}: {e}", root.display())))?;

        let mode = if walker.is_recursive() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(root, mode)
            .map_err(|e| PipeError::WatchSetup(format!("{}: {e}", root.display())))?;

        let cancel = CancellationToken::new();
        let forwarded = Arc::new(AtomicU64::new(0));
        let forwarder = Forwarder {
            root: root.to_path_buf(),
            walker,
            queue,
            settle,
            settling: HashMap::new(),
            forwarded: Arc::clone(&forwarded),
        };
        let forwarder = tokio::spawn(forwarder.run(rx, cancel.clone()));

        tracing::info!(
            recursive = ?mode,
            settle_ms = settle.as_millis() as u64,
            "Watching {:?}",
            root
        );

        Ok(Self {
            root: root.to_path_buf(),
            watcher: Some(watcher),
            cancel,
            forwarder: Some(forwarder),
            forwarded,
        })
    }

    /// Paths handed to the queue so far
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Unsubscribe and wait for the forwarding task to finish
    ///
    /// Files still inside their settle window are dropped; the next
    /// backlog scan picks them up.
    pub async fn stop(mut self) {
        // Dropping the handle unsubscribes and closes the event channel
        self.watcher.take();
        self.cancel.cancel();
        if let Some(forwarder) = self.forwarder.take() {
            if let Err(e) = forwarder.await {
                tracing::warn!("Watcher forwarder ended abnormally: {}", e);
            }
        }
        tracing::info!(forwarded = self.forwarded(), "Stopped watching {:?}", self.root);
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Filters raw events and feeds accepted paths to the queue
struct Forwarder {
    root: PathBuf,
    walker: FileWalker,
    queue: Arc<WorkQueue>,
    settle: Duration,
    /// Created files waiting out the settle window, by deadline
    settling: HashMap<PathBuf, Instant>,
    forwarded: Arc<AtomicU64>,
}

impl Forwarder {
    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
        cancel: CancellationToken,
    ) {
        loop {
            let next_due = self.settling.values().min().copied();
            let res = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep_until_due(next_due) => {
                    if self.release_settled(&cancel).await.is_err() {
                        break;
                    }
                    continue;
                }
                res = rx.recv() => match res {
                    Some(res) => res,
                    None => break,
                },
            };

            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("Watch error: {}", e);
                    continue;
                }
            };

            if self.handle(&event, &cancel).await.is_err() {
                break;
            }
        }

        if !self.settling.is_empty() {
            tracing::debug!(
                count = self.settling.len(),
                "Dropping files still settling; the next scan picks them up"
            );
        }
    }

    async fn handle(&mut self, event: &Event, cancel: &CancellationToken) -> Result<()> {
        if let Some((arrival, paths)) = arrived_paths(event) {
            for path in paths {
                match arrival {
                    Arrival::MovedIn => {
                        self.settling.remove(path);
                        self.forward(path, cancel).await?;
                    }
                    Arrival::Created if self.settle.is_zero() => {
                        self.forward(path, cancel).await?;
                    }
                    Arrival::Created => {
                        if self.walker.accepts(&self.root, path) {
                            tracing::trace!("Settling {:?}", path);
                            self.settling.insert(path.clone(), Instant::now() + self.settle);
                        }
                    }
                }
            }
            return Ok(());
        }

        match event.kind {
            EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
                let deadline = Instant::now() + self.settle;
                for path in &event.paths {
                    if let Some(due) = self.settling.get_mut(path) {
                        *due = deadline;
                    }
                }
            }
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                for path in &event.paths {
                    self.settling.remove(path);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Forward every settling file whose window has passed
    async fn release_settled(&mut self, cancel: &CancellationToken) -> Result<()> {
        let now = Instant::now();
        let due: Vec<PathBuf> = self
            .settling
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();

        for path in due {
            self.settling.remove(&path);
            self.forward(&path, cancel).await?;
        }
        Ok(())
    }

    async fn forward(&self, path: &Path, cancel: &CancellationToken) -> Result<()> {
        if !path.is_file() || !self.walker.accepts(&self.root, path) {
            return Ok(());
        }

        let key = ingest_key(path);
        tracing::debug!("New file {:?}", key);
        tokio::select! {
            _ = cancel.cancelled() => Err(PipeError::QueueClosed),
            sent = self.queue.enqueue(key) => {
                sent?;
                self.forwarded.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }
}

async fn sleep_until_due(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Paths that appeared in the directory because of `event`
pub fn arrived_paths(event: &Event) -> Option<(Arrival, &[PathBuf])> {
    match event.kind {
        EventKind::Create(_) => Some((Arrival::Created, event.paths.as_slice())),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            Some((Arrival::MovedIn, event.paths.as_slice()))
        }
        // Rename within the watched tree: [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            Some((Arrival::MovedIn, event.paths.get(1..).unwrap_or(&[])))
        }
        _ => None,
    }
}
