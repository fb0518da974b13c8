//! Dedup index guarantees: idempotence, durability, no false negatives
//! and exactly-once marking under contention.

use csvpipe::core::index::snapshot::{Snapshot, SNAPSHOT_VERSION};
use csvpipe::core::index::DedupIndex;
use csvpipe::core::ingest::FileWalker;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::DropDir;

fn csv_walker() -> FileWalker {
    FileWalker::new(vec!["*.csv".to_string()], vec![], false).unwrap()
}

#[test]
fn test_marking_twice_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let index = DedupIndex::open(temp.path().join("idx.json"), 100, 0.01);
    let path = PathBuf::from("/data/orders.csv");

    assert!(index.mark_processed(&path).unwrap());
    assert!(!index.mark_processed(&path).unwrap());

    assert_eq!(index.len(), 1);
    assert!(index.is_processed(&path));
}

#[test]
fn test_marks_survive_restart() {
    let temp = TempDir::new().unwrap();
    let snapshot = temp.path().join("idx.json");
    let paths: Vec<PathBuf> = (0..25)
        .map(|i| PathBuf::from(format!("/data/batch_{i:03}.csv")))
        .collect();

    {
        let index = DedupIndex::open(&snapshot, 100, 0.01);
        for path in &paths {
            index.mark_processed(path).unwrap();
        }
    }

    let reopened = DedupIndex::open(&snapshot, 100, 0.01);
    assert_eq!(reopened.len(), paths.len());
    for path in &paths {
        assert!(reopened.is_processed(path), "lost {path:?}");
    }
    assert!(!reopened.is_processed(&PathBuf::from("/data/batch_999.csv")));
}

#[test]
fn test_snapshot_document_is_sorted_json() {
    let temp = TempDir::new().unwrap();
    let snapshot = temp.path().join("idx.json");
    let index = DedupIndex::open(&snapshot, 100, 0.01);

    for name in ["/d/c.csv", "/d/a.csv", "/d/b.csv"] {
        index.mark_processed(&PathBuf::from(name)).unwrap();
    }

    let doc: Snapshot = serde_json::from_slice(&std::fs::read(&snapshot).unwrap()).unwrap();
    assert_eq!(doc.version, SNAPSHOT_VERSION);
    assert_eq!(
        doc.paths,
        vec![
            PathBuf::from("/d/a.csv"),
            PathBuf::from("/d/b.csv"),
            PathBuf::from("/d/c.csv"),
        ]
    );
    assert!(!temp.path().join("idx.json.tmp").exists());
}

#[test]
fn test_corrupt_snapshot_starts_empty() {
    let temp = TempDir::new().unwrap();
    let snapshot = temp.path().join("idx.json");
    std::fs::write(&snapshot, "{ not json").unwrap();

    let index = DedupIndex::open(&snapshot, 100, 0.01);
    assert!(index.is_empty());

    // Still usable, and the next save replaces the broken file
    index.mark_processed(&PathBuf::from("/d/a.csv")).unwrap();
    assert_eq!(DedupIndex::open(&snapshot, 100, 0.01).len(), 1);
}

#[test]
fn test_no_false_negatives_past_expected_size() {
    // Sized for 100 but given 5000: the filter must grow, never forget
    let index = DedupIndex::ephemeral(100, 0.01);
    let paths: Vec<PathBuf> = (0..5000)
        .map(|i| PathBuf::from(format!("/spool/{}/{i}.csv", i % 17)))
        .collect();

    for path in &paths {
        index.mark_processed(path).unwrap();
    }
    for path in &paths {
        assert!(index.is_processed(path), "false negative for {path:?}");
    }
    assert!(index.stats().bloom_capacity >= 5000);
}

#[test]
fn test_concurrent_marks_record_each_path_once() {
    let index = Arc::new(DedupIndex::ephemeral(1000, 0.001));
    let paths: Arc<Vec<PathBuf>> = Arc::new(
        (0..1000)
            .map(|i| PathBuf::from(format!("/in/file_{i:04}.csv")))
            .collect(),
    );
    let newly_marked = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..10)
        .map(|worker| {
            let index = Arc::clone(&index);
            let paths = Arc::clone(&paths);
            let newly_marked = Arc::clone(&newly_marked);
            std::thread::spawn(move || {
                // Each thread walks the set from a different offset
                for i in 0..paths.len() {
                    let path = &paths[(i + worker * 100) % paths.len()];
                    if index.mark_processed(path).unwrap() {
                        newly_marked.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.len(), 1000);
    assert_eq!(newly_marked.load(Ordering::SeqCst), 1000);
}

#[test]
fn test_claim_is_exclusive_until_dropped() {
    let index = DedupIndex::ephemeral(10, 0.01);
    let path = PathBuf::from("/in/a.csv");

    let claim = index.claim(&path).expect("first claim");
    assert!(index.claim(&path).is_none());
    assert_eq!(index.in_flight_count(), 1);

    drop(claim);
    assert_eq!(index.in_flight_count(), 0);
    assert!(index.claim(&path).is_some());
}

#[test]
fn test_backlog_skips_processed_and_unmatched() {
    let spool = DropDir::new();
    let a = spool.write_csv("a.csv");
    let b = spool.write_csv("b.csv");
    spool.write("c.txt", "not a csv");

    let index = DedupIndex::ephemeral(10, 0.01);
    index.mark_processed(&a).unwrap();

    let walker = csv_walker();
    let pending: Vec<PathBuf> = index.scan_backlog(&spool.input(), &walker).collect();
    assert_eq!(pending, vec![b]);
}

#[test]
fn test_forget_makes_file_pending_again() {
    let spool = DropDir::new();
    let a = spool.write_csv("a.csv");
    let index = DedupIndex::open(spool.index_file(), 10, 0.01);
    index.mark_processed(&a).unwrap();

    assert!(index.forget(&a).unwrap());
    assert!(!index.forget(&a).unwrap());
    assert!(!index.is_processed(&a));

    let walker = csv_walker();
    assert_eq!(index.scan_backlog(&spool.input(), &walker).count(), 1);
    assert!(DedupIndex::open(spool.index_file(), 10, 0.01).is_empty());
}
