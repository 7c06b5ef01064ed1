//! End-to-end rebuild scenarios through the facade and a running worker.
//!
//! Validates:
//! - Per-category counting with failing items
//! - Idempotent reruns in `existing` mode
//! - Monotonic progress events
//! - Bounded item concurrency
//! - Per-item timeouts
//! - Rescan of items created mid-run
//! - Enumeration failure after partial progress

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use quire_core::{ItemCategory, JobOutput, JobSnapshot, JobStatus, RebuildMode, RebuildRequest};
use quire_jobs::mock::{MockContentStore, MockEmbedder, MockPodcastGenerator, MockSourceIngestor};
use quire_jobs::{
    AggregatorConfig, CommandFacade, ItemEnumerator, ItemTimeouts, MemoryJobRegistry, Providers,
    WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle,
};

struct Engine {
    handle: WorkerHandle,
    facade: CommandFacade,
}

fn aggregator_config() -> AggregatorConfig {
    AggregatorConfig::default()
        .with_item_concurrency(4)
        .with_flush_every(2)
        .with_flush_interval(Duration::from_millis(20))
}

fn start_engine(
    store: Arc<MockContentStore>,
    embedder: Arc<MockEmbedder>,
    aggregator: AggregatorConfig,
    timeouts: ItemTimeouts,
) -> Engine {
    let registry = Arc::new(MemoryJobRegistry::new());
    let providers = Providers {
        store: store.clone(),
        embedder,
        podcast: Arc::new(MockPodcastGenerator::new()),
        ingestor: Arc::new(MockSourceIngestor::new()),
    };
    let handle = WorkerBuilder::new(registry.clone())
        .with_config(WorkerConfig::default().with_poll_interval(50))
        .with_notify(registry.job_notify())
        .with_providers(providers, aggregator, timeouts)
        .build()
        .start();
    let facade =
        CommandFacade::new(registry, handle.backend()).with_enumerator(ItemEnumerator::new(store));
    Engine { handle, facade }
}

/// Poll until the job reaches a terminal status.
async fn wait_for_terminal(facade: &CommandFacade, job_id: &str) -> JobSnapshot {
    for _ in 0..500 {
        let snapshot = facade.get_status(job_id).await.unwrap();
        if snapshot.status.is_terminal() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish", job_id);
}

async fn wait_for_calls(embedder: &MockEmbedder, n: usize) {
    for _ in 0..500 {
        if embedder.calls() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("embedder never reached {} calls", n);
}

#[tokio::test]
async fn test_rebuild_sources_with_failures() {
    let store = Arc::new(MockContentStore::new());
    store.seed(ItemCategory::Source, 10, true).await;
    store.seed(ItemCategory::Note, 4, true).await;
    let embedder =
        Arc::new(MockEmbedder::new().with_failing(["source:2", "source:5", "source:9"]));
    let engine = start_engine(
        store,
        embedder,
        aggregator_config(),
        ItemTimeouts::default(),
    );

    let request = RebuildRequest::new(RebuildMode::All)
        .with_notes(false)
        .with_insights(false);
    let submission = engine.facade.submit_rebuild(request).await.unwrap();
    assert_eq!(submission.estimated_items, Some(10));

    let snapshot = wait_for_terminal(&engine.facade, &submission.job_id.to_string()).await;
    assert_eq!(snapshot.status, JobStatus::Completed);

    let progress = snapshot.progress.unwrap();
    assert_eq!(progress.processed, 10);
    assert_eq!(progress.total, 10);
    assert_eq!(progress.percentage, 100.0);

    let stats = snapshot.stats.unwrap();
    assert_eq!(stats.sources, 7);
    assert_eq!(stats.notes, 0);
    assert_eq!(stats.failed, 3);

    match snapshot.result {
        Some(JobOutput::Rebuild(summary)) => {
            let mut failed: Vec<String> = summary.failures.into_iter().map(|f| f.item_id).collect();
            failed.sort();
            assert_eq!(failed, vec!["source:2", "source:5", "source:9"]);
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(snapshot.error_message.is_none());

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_existing_mode_rerun_is_idempotent() {
    let store = Arc::new(MockContentStore::new());
    store.seed(ItemCategory::Source, 3, true).await;
    store.seed(ItemCategory::Note, 3, true).await;
    store.seed(ItemCategory::Insight, 2, false).await;
    let embedder = Arc::new(
        MockEmbedder::new()
            .with_up_to_date(["source:1", "note:2"])
            .with_failing(["note:3"]),
    );
    let engine = start_engine(
        store,
        embedder,
        aggregator_config(),
        ItemTimeouts::default(),
    );

    let mut runs = Vec::new();
    for _ in 0..2 {
        let submission = engine
            .facade
            .submit_rebuild(RebuildRequest::new(RebuildMode::Existing))
            .await
            .unwrap();
        let snapshot = wait_for_terminal(&engine.facade, &submission.job_id.to_string()).await;
        assert_eq!(snapshot.status, JobStatus::Completed);
        runs.push((snapshot.progress.unwrap().processed, snapshot.stats.unwrap()));
    }

    assert_eq!(runs[0], runs[1]);
    let (processed, stats) = runs[0];
    // Insights without embeddings are not part of an existing-mode rebuild.
    // Items the provider considers current are still re-embedded.
    assert_eq!(processed, 6);
    assert_eq!(stats.sources, 3);
    assert_eq!(stats.notes, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.insights, 0);
    assert_eq!(stats.accounted(), processed);

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_completed_rebuild_accounts_for_every_item() {
    for mode in [RebuildMode::Existing, RebuildMode::All] {
        let store = Arc::new(MockContentStore::new());
        store.seed(ItemCategory::Source, 4, true).await;
        store.seed(ItemCategory::Note, 3, false).await;
        store.seed(ItemCategory::Insight, 2, true).await;
        let embedder = Arc::new(
            MockEmbedder::new()
                .with_up_to_date(["source:1", "source:2", "source:3", "source:4", "insight:1"])
                .with_failing(["insight:2"]),
        );
        let engine = start_engine(
            store,
            embedder,
            aggregator_config(),
            ItemTimeouts::default(),
        );

        let submission = engine
            .facade
            .submit_rebuild(RebuildRequest::new(mode))
            .await
            .unwrap();
        let snapshot = wait_for_terminal(&engine.facade, &submission.job_id.to_string()).await;
        assert_eq!(snapshot.status, JobStatus::Completed);

        let progress = snapshot.progress.unwrap();
        let stats = snapshot.stats.unwrap();
        assert_eq!(stats.accounted(), progress.processed, "mode {:?}", mode);
        assert_eq!(stats.sources, 4);
        assert_eq!(stats.failed, 1);
        let expected = match mode {
            RebuildMode::Existing => 6,
            RebuildMode::All => 9,
        };
        assert_eq!(progress.processed, expected);

        engine.handle.shutdown().await.unwrap();
    }
}

#[tokio::test]
async fn test_progress_events_are_monotonic() {
    let store = Arc::new(MockContentStore::new());
    store.seed(ItemCategory::Note, 12, true).await;
    let embedder = Arc::new(MockEmbedder::new().with_latency(Duration::from_millis(5)));
    let engine = start_engine(
        store,
        embedder,
        aggregator_config(),
        ItemTimeouts::default(),
    );
    let mut events = engine.handle.events();

    let submission = engine
        .facade
        .submit_rebuild(RebuildRequest::new(RebuildMode::All))
        .await
        .unwrap();
    wait_for_terminal(&engine.facade, &submission.job_id.to_string()).await;
    engine.handle.shutdown().await.unwrap();

    let mut last = (0u64, 0u64);
    let mut seen = 0;
    while let Ok(event) = events.try_recv() {
        if let WorkerEvent::JobProgress {
            job_id,
            processed,
            total,
        } = event
        {
            assert_eq!(job_id, submission.job_id);
            assert!(processed <= total);
            assert!(processed >= last.0);
            assert!(total >= last.1);
            last = (processed, total);
            seen += 1;
        }
    }
    assert!(seen >= 2);
    assert_eq!(last, (12, 12));
}

#[tokio::test]
async fn test_item_concurrency_is_bounded() {
    let store = Arc::new(MockContentStore::new());
    store.seed(ItemCategory::Source, 10, true).await;
    let gate = Arc::new(Semaphore::new(0));
    let embedder = Arc::new(MockEmbedder::new().with_gate(gate.clone()));
    let engine = start_engine(
        store,
        embedder.clone(),
        aggregator_config().with_item_concurrency(3),
        ItemTimeouts::default(),
    );

    let submission = engine
        .facade
        .submit_rebuild(RebuildRequest::new(RebuildMode::All))
        .await
        .unwrap();
    wait_for_calls(&embedder, 3).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(embedder.calls(), 3);

    gate.add_permits(100);
    let snapshot = wait_for_terminal(&engine.facade, &submission.job_id.to_string()).await;
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(embedder.calls(), 10);

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_slow_items_time_out_without_failing_job() {
    let store = Arc::new(MockContentStore::new());
    store.seed(ItemCategory::Insight, 3, true).await;
    let embedder = Arc::new(MockEmbedder::new().with_latency(Duration::from_secs(5)));
    let engine = start_engine(
        store,
        embedder,
        aggregator_config(),
        ItemTimeouts::default().with_embed(Duration::from_millis(30)),
    );

    let submission = engine
        .facade
        .submit_rebuild(RebuildRequest::new(RebuildMode::All))
        .await
        .unwrap();
    let snapshot = wait_for_terminal(&engine.facade, &submission.job_id.to_string()).await;

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.stats.unwrap().failed, 3);
    match snapshot.result {
        Some(JobOutput::Rebuild(summary)) => {
            assert!(summary.failures.iter().all(|f| f.reason == "timeout"));
        }
        other => panic!("unexpected result {:?}", other),
    }

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_items_created_mid_run_are_picked_up() {
    let store = Arc::new(MockContentStore::new());
    store.seed(ItemCategory::Source, 2, true).await;
    let gate = Arc::new(Semaphore::new(0));
    let embedder = Arc::new(MockEmbedder::new().with_gate(gate.clone()));
    let engine = start_engine(
        store.clone(),
        embedder.clone(),
        aggregator_config(),
        ItemTimeouts::default(),
    );

    let submission = engine
        .facade
        .submit_rebuild(RebuildRequest::new(RebuildMode::All))
        .await
        .unwrap();
    wait_for_calls(&embedder, 2).await;
    store.seed(ItemCategory::Source, 1, true).await;
    gate.add_permits(100);

    let snapshot = wait_for_terminal(&engine.facade, &submission.job_id.to_string()).await;
    assert_eq!(snapshot.status, JobStatus::Completed);
    let progress = snapshot.progress.unwrap();
    assert_eq!(progress.processed, 3);
    assert_eq!(progress.total, 3);
    assert_eq!(snapshot.stats.unwrap().sources, 3);

    engine.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_enumeration_failure_keeps_partial_progress() {
    let store = Arc::new(MockContentStore::new());
    store.seed(ItemCategory::Source, 2, true).await;
    let gate = Arc::new(Semaphore::new(0));
    let embedder = Arc::new(MockEmbedder::new().with_gate(gate.clone()));
    let engine = start_engine(
        store.clone(),
        embedder.clone(),
        aggregator_config(),
        ItemTimeouts::default(),
    );

    let submission = engine
        .facade
        .submit_rebuild(RebuildRequest::new(RebuildMode::All))
        .await
        .unwrap();
    wait_for_calls(&embedder, 2).await;
    // The end-of-run rescan now fails.
    store.set_fail_listing(true);
    gate.add_permits(100);

    let snapshot = wait_for_terminal(&engine.facade, &submission.job_id.to_string()).await;
    assert_eq!(snapshot.status, JobStatus::Failed);
    assert!(snapshot.error_message.unwrap().contains("listing"));
    let progress = snapshot.progress.unwrap();
    assert_eq!(progress.processed, 2);
    assert_eq!(progress.total, 2);

    engine.handle.shutdown().await.unwrap();
}
