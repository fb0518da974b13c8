//! Backlog runs through the orchestrator with real and stub stages.

use csvpipe::core::error::PipeError;
use csvpipe::core::index::DedupIndex;
use csvpipe::core::pipeline::{
    CleaningTransformer, CsvExtractor, JsonLinesLoader, Orchestrator, PipelineStages, RunMode,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::common::{
    counting_stages, run_backlog, test_config, CountingLoader, DropDir, RecordingSink,
};

fn real_stages(spool: &DropDir) -> PipelineStages {
    let config = test_config(spool);
    PipelineStages::new(
        Arc::new(CsvExtractor::new()),
        Arc::new(CleaningTransformer::new(config.transform)),
        Arc::new(JsonLinesLoader::new(spool.output()).with_source_root(spool.input())),
    )
}

#[tokio::test]
async fn test_backlog_processes_only_unprocessed_csv() {
    let spool = DropDir::new();
    let a = spool.write_csv("a.csv");
    let b = spool.write_csv("b.csv");
    spool.write("c.txt", "ignored");

    let index = Arc::new(DedupIndex::open(spool.index_file(), 100, 0.01));
    index.mark_processed(&a).unwrap();
    let loader = Arc::new(CountingLoader::default());

    let summary = run_backlog(
        test_config(&spool),
        Arc::clone(&index),
        counting_stages(Arc::clone(&loader)),
        Arc::new(RecordingSink::default()),
    )
    .await;

    assert_eq!(loader.sources(), vec![b.clone()]);
    assert_eq!(summary.backlog_enqueued, 1);
    assert_eq!(summary.stats.succeeded, 1);
    assert_eq!(summary.index_entries, 2);
    assert!(!summary.interrupted);
    assert!(index.is_processed(&b));
}

#[tokio::test]
async fn test_end_to_end_writes_jsonl() {
    let spool = DropDir::new();
    spool.write_csv("orders.csv");
    spool.write("customers.csv", "id,name\n1, Ada \n,\n2,Grace\n");

    let index = Arc::new(DedupIndex::open(spool.index_file(), 100, 0.01));
    let summary = run_backlog(
        test_config(&spool),
        index,
        real_stages(&spool),
        Arc::new(RecordingSink::default()),
    )
    .await;

    assert_eq!(summary.stats.succeeded, 2);
    assert_eq!(summary.stats.failed(), 0);

    let orders = spool.loaded_lines("orders.csv");
    assert_eq!(orders.len(), 3);
    let first: serde_json::Value = serde_json::from_str(&orders[0]).unwrap();
    assert_eq!(first["order_id"], "1001");
    assert_eq!(first["status"], "paid");

    // Whitespace trimmed, empty row dropped
    let customers = spool.loaded_lines("customers.csv");
    assert_eq!(customers.len(), 2);
    let ada: serde_json::Value = serde_json::from_str(&customers[0]).unwrap();
    assert_eq!(ada["name"], "Ada");
}

#[tokio::test]
async fn test_same_file_name_in_subdirectories_loads_both() {
    let spool = DropDir::new();
    spool.write("east/orders.csv", "id,region\n1,east\n2,east\n");
    spool.write("west/orders.csv", "id,region\n3,west\n");

    let mut config = test_config(&spool);
    config.watch.recursive = true;
    config.workers.count = 4;

    let summary = run_backlog(
        config,
        Arc::new(DedupIndex::open(spool.index_file(), 100, 0.01)),
        real_stages(&spool),
        Arc::new(RecordingSink::default()),
    )
    .await;

    assert_eq!(summary.stats.succeeded, 2);
    assert_eq!(summary.stats.load_failed, 0);
    assert_eq!(summary.stats.records_loaded, 3);

    let east = spool.loaded_lines("east/orders.csv");
    let west = spool.loaded_lines("west/orders.csv");
    assert_eq!(east.len(), 2);
    assert_eq!(west.len(), 1);
    let row: serde_json::Value = serde_json::from_str(&west[0]).unwrap();
    assert_eq!(row["region"], "west");
}

#[tokio::test]
async fn test_restart_does_not_reprocess() {
    let spool = DropDir::new();
    for name in ["a.csv", "b.csv", "c.csv"] {
        spool.write_csv(name);
    }

    let first = Arc::new(CountingLoader::default());
    run_backlog(
        test_config(&spool),
        Arc::new(DedupIndex::open(spool.index_file(), 100, 0.01)),
        counting_stages(Arc::clone(&first)),
        Arc::new(RecordingSink::default()),
    )
    .await;
    assert_eq!(first.calls(), 3);

    // New index instance, same snapshot: nothing left to do
    spool.write_csv("d.csv");
    let second = Arc::new(CountingLoader::default());
    let summary = run_backlog(
        test_config(&spool),
        Arc::new(DedupIndex::open(spool.index_file(), 100, 0.01)),
        counting_stages(Arc::clone(&second)),
        Arc::new(RecordingSink::default()),
    )
    .await;

    assert_eq!(second.calls(), 1);
    assert_eq!(summary.backlog_enqueued, 1);
    assert_eq!(summary.index_entries, 4);
}

#[tokio::test]
async fn test_failed_file_retried_on_next_run() {
    let spool = DropDir::new();
    let bad = spool.write("bad.csv", "id,name\n1,a,extra\n");
    spool.write_csv("good.csv");
    let index = Arc::new(DedupIndex::open(spool.index_file(), 100, 0.01));

    let summary = run_backlog(
        test_config(&spool),
        Arc::clone(&index),
        real_stages(&spool),
        Arc::new(RecordingSink::default()),
    )
    .await;
    assert_eq!(summary.stats.succeeded, 1);
    assert_eq!(summary.stats.extract_failed, 1);
    assert!(!index.is_processed(&bad));

    // Fixed upstream, picked up by the next pass
    spool.write("bad.csv", "id,name\n1,a\n");
    let summary = run_backlog(
        test_config(&spool),
        Arc::clone(&index),
        real_stages(&spool),
        Arc::new(RecordingSink::default()),
    )
    .await;
    assert_eq!(summary.backlog_enqueued, 1);
    assert_eq!(summary.stats.succeeded, 1);
    assert!(index.is_processed(&bad));
}

#[tokio::test]
async fn test_missing_watch_dir_is_fatal() {
    let spool = DropDir::new();
    let mut config = test_config(&spool);
    config.watch.path = spool.dir.path().join("nope");

    let orchestrator = Orchestrator::new(
        config,
        Arc::new(DedupIndex::ephemeral(10, 0.01)),
        counting_stages(Arc::new(CountingLoader::default())),
        Arc::new(RecordingSink::default()),
    );
    let err = orchestrator
        .run(RunMode::Backlog, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PipeError::WatchSetup(_)));
}
