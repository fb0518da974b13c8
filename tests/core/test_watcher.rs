//! Live watching: filesystem events reach the queue and the pipeline.

use csvpipe::core::index::DedupIndex;
use csvpipe::core::ingest::{DirectoryWatcher, FileWalker, WorkQueue};
use csvpipe::core::pipeline::{Orchestrator, RunMode};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

use crate::common::fixtures::ORDERS_CSV;
use crate::common::{counting_stages, test_config, CountingLoader, DropDir, RecordingSink};

const EVENT_WAIT: Duration = Duration::from_secs(10);
const SETTLE: Duration = Duration::from_millis(200);

/// Stage a file outside the watched dir, then move it in atomically
fn drop_in(spool: &DropDir, name: &str) -> std::path::PathBuf {
    let staging = spool.dir.path().join("staging");
    fs::create_dir_all(&staging).unwrap();
    let staged = staging.join(name);
    fs::write(&staged, ORDERS_CSV).unwrap();
    let target = spool.input().join(name);
    fs::rename(&staged, &target).unwrap();
    target
}

async fn wait_until_processed(index: &DedupIndex, path: &Path) -> bool {
    let deadline = Instant::now() + EVENT_WAIT;
    while Instant::now() < deadline {
        if index.is_processed(path) {
            return true;
        }
        sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test]
async fn test_created_csv_is_enqueued() {
    let spool = DropDir::new();
    let queue = Arc::new(WorkQueue::new(8));
    let walker = FileWalker::new(vec!["*.csv".to_string()], vec![], false).unwrap();
    let watcher =
        DirectoryWatcher::start(&spool.input(), walker, Arc::clone(&queue), SETTLE).unwrap();

    spool.write("notes.txt", "ignored");
    let csv = drop_in(&spool, "orders.csv");

    let got = timeout(EVENT_WAIT, queue.dequeue())
        .await
        .expect("no event within timeout");
    assert_eq!(got, Some(csv));

    watcher.stop().await;
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_watcher_and_scan_skip_hidden_directories() {
    let spool = DropDir::new();
    fs::create_dir_all(spool.input().join(".staging")).unwrap();
    let queue = Arc::new(WorkQueue::new(8));
    let walker = FileWalker::new(vec!["*.csv".to_string()], vec![], true).unwrap();
    let watcher =
        DirectoryWatcher::start(&spool.input(), walker.clone(), Arc::clone(&queue), SETTLE)
            .unwrap();

    let hidden = spool.write(".staging/partial.csv", ORDERS_CSV);
    let csv = drop_in(&spool, "orders.csv");

    let got = timeout(EVENT_WAIT, queue.dequeue())
        .await
        .expect("no event within timeout");
    assert_eq!(got, Some(csv.clone()));

    // Outlive the settle window the hidden file would have needed
    sleep(SETTLE * 3).await;
    watcher.stop().await;
    assert!(queue.is_empty());

    let scanned = walker.collect_files(&spool.input());
    assert_eq!(scanned, vec![csv]);
    assert!(!walker.accepts(&spool.input(), &hidden));
}

#[tokio::test]
async fn test_watch_on_missing_dir_fails() {
    let spool = DropDir::new();
    let queue = Arc::new(WorkQueue::new(8));
    let walker = FileWalker::new(vec![], vec![], false).unwrap();

    let res = DirectoryWatcher::start(&spool.dir.path().join("missing"), walker, queue, SETTLE);
    assert!(res.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_watch_mode_handles_backlog_and_new_files() {
    let spool = DropDir::new();
    let old = spool.write_csv("old.csv");

    let index = Arc::new(DedupIndex::open(spool.index_file(), 100, 0.01));
    let loader = Arc::new(CountingLoader::default());
    let orchestrator = Orchestrator::new(
        test_config(&spool),
        Arc::clone(&index),
        counting_stages(Arc::clone(&loader)),
        Arc::new(RecordingSink::default()),
    );
    let shutdown = CancellationToken::new();

    let driver = async {
        assert!(wait_until_processed(&index, &old).await, "backlog not processed");
        let new = drop_in(&spool, "new.csv");
        assert!(wait_until_processed(&index, &new).await, "new file not processed");
        shutdown.cancel();
    };
    let (summary, ()) = tokio::join!(orchestrator.run(RunMode::Watch, shutdown.clone()), driver);
    let summary = summary.unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.backlog_enqueued, 1);
    assert!(summary.watch_enqueued >= 1);
    assert_eq!(summary.stats.succeeded, 2);
    assert_eq!(loader.calls(), 2);
    assert_eq!(DedupIndex::open(spool.index_file(), 100, 0.01).len(), 2);
}
