use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use quire_core::{ContentStore, EmbeddingProvider, JobArgs, JobKind, JobOutput};

use crate::aggregator::{AggregateStatus, JobAggregator};
use crate::config::{AggregatorConfig, ItemTimeouts};
use crate::enumerator::ItemEnumerator;
use crate::handler::{mismatched_args, JobContext, JobHandler, JobResult};
use crate::processor::EmbeddingProcessor;

/// Re-embeds every selected source, note and insight.
pub struct RebuildEmbeddingsHandler {
    enumerator: ItemEnumerator,
    provider: Arc<dyn EmbeddingProvider>,
    config: AggregatorConfig,
    timeouts: ItemTimeouts,
}

impl RebuildEmbeddingsHandler {
    pub fn new(
        store: Arc<dyn ContentStore>,
        provider: Arc<dyn EmbeddingProvider>,
        config: AggregatorConfig,
        timeouts: ItemTimeouts,
    ) -> Self {
        Self {
            enumerator: ItemEnumerator::new(store),
            provider,
            config,
            timeouts,
        }
    }
}

#[async_trait]
impl JobHandler for RebuildEmbeddingsHandler {
    fn job_kind(&self) -> JobKind {
        JobKind::RebuildEmbeddings
    }

    #[instrument(
        skip(self, ctx),
        fields(subsystem = "jobs", component = "rebuild_embeddings", op = "execute", job_id = %ctx.job_id())
    )]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        let request = match ctx.args() {
            JobArgs::RebuildEmbeddings(request) => request.clone(),
            other => return mismatched_args(self.job_kind(), other),
        };

        let processor = Arc::new(EmbeddingProcessor::new(self.provider.clone(), true));
        let aggregator = JobAggregator::new(processor, self.config.clone(), self.timeouts.embed);

        match aggregator.run(&ctx, &self.enumerator, &request).await {
            Ok(report) => {
                let summary = report.summary();
                info!(
                    mode = ?request.mode,
                    processed = summary.processed,
                    failed = summary.stats.failed,
                    "Rebuild finished"
                );
                let output = Some(JobOutput::Rebuild(summary));
                match report.status {
                    AggregateStatus::Completed => JobResult::Success(output),
                    AggregateStatus::Cancelled => JobResult::Cancelled(output),
                }
            }
            Err(e) => {
                warn!(error = %e, "Rebuild aborted");
                JobResult::Failed(format!("rebuild failed: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::running_context;
    use crate::mock::{MockContentStore, MockEmbedder};
    use crate::registry::MemoryJobRegistry;
    use quire_core::{ItemCategory, JobRegistry, RebuildMode, RebuildRequest};
    use std::time::Duration;

    fn handler(store: Arc<MockContentStore>, embedder: Arc<MockEmbedder>) -> RebuildEmbeddingsHandler {
        RebuildEmbeddingsHandler::new(
            store,
            embedder,
            AggregatorConfig::default()
                .with_item_concurrency(3)
                .with_flush_interval(Duration::from_millis(10)),
            ItemTimeouts::default(),
        )
    }

    #[tokio::test]
    async fn test_rebuild_summary() {
        let store = Arc::new(MockContentStore::new());
        store.seed(ItemCategory::Source, 5, true).await;
        store.seed(ItemCategory::Insight, 2, true).await;
        let embedder = Arc::new(MockEmbedder::new().with_failing(["source:4"]));
        let registry = Arc::new(MemoryJobRegistry::new());
        let ctx = running_context(
            &registry,
            JobArgs::RebuildEmbeddings(RebuildRequest::new(RebuildMode::All)),
        )
        .await;

        match handler(store, embedder).execute(ctx).await {
            JobResult::Success(Some(JobOutput::Rebuild(summary))) => {
                assert_eq!(summary.processed, 7);
                assert_eq!(summary.total, 7);
                assert_eq!(summary.stats.sources, 4);
                assert_eq!(summary.stats.insights, 2);
                assert_eq!(summary.stats.failed, 1);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_existing_mode_reembeds_current_items() {
        let store = Arc::new(MockContentStore::new());
        store.seed(ItemCategory::Source, 4, true).await;
        store.seed(ItemCategory::Note, 2, false).await;
        let embedder = Arc::new(
            MockEmbedder::new().with_up_to_date(["source:1", "source:2", "source:3", "source:4"]),
        );
        let registry = Arc::new(MemoryJobRegistry::new());
        let ctx = running_context(
            &registry,
            JobArgs::RebuildEmbeddings(RebuildRequest::new(RebuildMode::Existing)),
        )
        .await;

        match handler(store, embedder.clone()).execute(ctx).await {
            JobResult::Success(Some(JobOutput::Rebuild(summary))) => {
                assert_eq!(summary.processed, 4);
                assert_eq!(summary.stats.sources, 4);
                assert_eq!(summary.stats.notes, 0);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(embedder.calls(), 4);
    }

    #[tokio::test]
    async fn test_store_failure_fails_job() {
        let store = Arc::new(MockContentStore::new());
        store.set_fail_listing(true);
        let registry = Arc::new(MemoryJobRegistry::new());
        let ctx = running_context(
            &registry,
            JobArgs::RebuildEmbeddings(RebuildRequest::new(RebuildMode::Existing)),
        )
        .await;

        let result = handler(store, Arc::new(MockEmbedder::new()))
            .execute(ctx)
            .await;
        assert!(matches!(result, JobResult::Failed(msg) if msg.contains("listing")));
    }

    #[tokio::test]
    async fn test_cancelled_rebuild_keeps_partial_summary() {
        let store = Arc::new(MockContentStore::new());
        store.seed(ItemCategory::Note, 3, true).await;
        let registry = Arc::new(MemoryJobRegistry::new());
        let ctx = running_context(
            &registry,
            JobArgs::RebuildEmbeddings(RebuildRequest::new(RebuildMode::All)),
        )
        .await;
        registry.request_cancel(ctx.job_id()).await.unwrap();

        match handler(store, Arc::new(MockEmbedder::new())).execute(ctx).await {
            JobResult::Cancelled(Some(JobOutput::Rebuild(summary))) => {
                assert_eq!(summary.processed, 0);
                assert_eq!(summary.total, 3);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
