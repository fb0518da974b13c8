//! Bounded multi-producer, multi-consumer work queue of file paths.
//!
//! Producers wait when the queue is full. Consumers share one receiver
//! behind an async mutex, so every item is delivered to exactly one
//! worker. Closing the queue rejects new items; consumers keep
//! receiving what is already buffered and then get `None`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::core::error::{PipeError, Result};

pub struct WorkQueue {
    tx: mpsc::Sender<PathBuf>,
    rx: Mutex<mpsc::Receiver<PathBuf>>,
    closed: CancellationToken,
    enqueued: AtomicU64,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            closed: CancellationToken::new(),
            enqueued: AtomicU64::new(0),
        }
    }

    /// Add a path, waiting for space if the queue is full
    pub async fn enqueue(&self, path: PathBuf) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(PipeError::QueueClosed);
        }

        tokio::select! {
            sent = self.tx.send(path) => sent.map_err(|_| PipeError::QueueClosed)?,
            _ = self.closed.cancelled() => return Err(PipeError::QueueClosed),
        }
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Enqueue from a thread outside the runtime (e.g. `spawn_blocking`)
    ///
    /// Unblocks with `QueueClosed` if the queue closes while full.
    pub fn blocking_enqueue(
        &self,
        handle: &tokio::runtime::Handle,
        path: PathBuf,
    ) -> Result<()> {
        handle.block_on(self.enqueue(path))
    }

    /// Next path, or `None` once the queue is closed and empty
    pub async fn dequeue(&self) -> Option<PathBuf> {
        let mut rx = self.rx.lock().await;
        if self.closed.is_cancelled() {
            return rx.try_recv().ok();
        }

        tokio::select! {
            biased;
            item = rx.recv() => item,
            _ = self.closed.cancelled() => rx.try_recv().ok(),
        }
    }

    /// Stop accepting items and wake idle consumers
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Items currently buffered
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Total items accepted since creation
    pub fn total_enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }
}
