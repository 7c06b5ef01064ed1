use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use quire_core::{
    ContentStore, EmbedItemSummary, EmbedStatus, EmbeddingProvider, ItemRef, JobArgs, JobKind,
    JobOutput,
};

use crate::aggregator::{AggregateStatus, JobAggregator};
use crate::config::{AggregatorConfig, ItemTimeouts};
use crate::enumerator::Enumeration;
use crate::handler::{mismatched_args, JobContext, JobHandler, JobResult};
use crate::processor::EmbeddingProcessor;

/// Embeds one named item. Always regenerates.
pub struct EmbedSingleItemHandler {
    store: Arc<dyn ContentStore>,
    provider: Arc<dyn EmbeddingProvider>,
    config: AggregatorConfig,
    timeouts: ItemTimeouts,
}

impl EmbedSingleItemHandler {
    pub fn new(
        store: Arc<dyn ContentStore>,
        provider: Arc<dyn EmbeddingProvider>,
        config: AggregatorConfig,
        timeouts: ItemTimeouts,
    ) -> Self {
        Self {
            store,
            provider,
            config: config.with_rescan(false),
            timeouts,
        }
    }
}

#[async_trait]
impl JobHandler for EmbedSingleItemHandler {
    fn job_kind(&self) -> JobKind {
        JobKind::EmbedSingleItem
    }

    #[instrument(
        skip(self, ctx),
        fields(subsystem = "jobs", component = "embed_single_item", op = "execute", job_id = %ctx.job_id())
    )]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        let args = match ctx.args() {
            JobArgs::EmbedSingleItem(args) => args.clone(),
            other => return mismatched_args(self.job_kind(), other),
        };
        let item = ItemRef::new(args.item_id, args.item_type);
        debug!(
            item_id = %item.id,
            category = %item.category,
            async_processing = args.async_processing,
            "Embedding single item"
        );

        match self.store.get_item(&item).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return JobResult::Failed(format!("{} {} not found", item.category, item.id))
            }
            Err(e) => return JobResult::Failed(e.to_string()),
        }

        let processor = Arc::new(EmbeddingProcessor::new(self.provider.clone(), true));
        let aggregator = JobAggregator::new(processor, self.config.clone(), self.timeouts.embed);
        let report = match aggregator
            .run_enumeration(&ctx, Enumeration::single(item.clone()))
            .await
        {
            Ok(report) => report,
            Err(e) => return JobResult::Failed(e.to_string()),
        };

        if report.status == AggregateStatus::Cancelled {
            return JobResult::Cancelled(None);
        }
        if report.stats.failed > 0 {
            let reason = report
                .failures
                .first()
                .map(|f| f.reason.clone())
                .unwrap_or_else(|| "embedding failed".to_string());
            return JobResult::Failed(reason);
        }

        let outcome = if report.skipped > 0 {
            EmbedStatus::AlreadyUpToDate
        } else {
            EmbedStatus::Embedded
        };
        JobResult::Success(Some(JobOutput::EmbedItem(EmbedItemSummary {
            item_id: item.id,
            category: item.category,
            outcome,
        })))
    }
}
