use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use quire_core::{
    EmbeddingProvider, ItemCategory, ItemRef, JobArgs, JobKind, JobOutput, SourceIngestor,
};

use crate::handler::{mismatched_args, JobContext, JobHandler, JobResult};
use crate::handlers::{finish_single_call, run_single_call};

/// Ingests a new source and, unless told otherwise, embeds it.
pub struct ProcessSourceHandler {
    ingestor: Arc<dyn SourceIngestor>,
    embedder: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl ProcessSourceHandler {
    pub fn new(
        ingestor: Arc<dyn SourceIngestor>,
        embedder: Arc<dyn EmbeddingProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            ingestor,
            embedder,
            timeout,
        }
    }
}

#[async_trait]
impl JobHandler for ProcessSourceHandler {
    fn job_kind(&self) -> JobKind {
        JobKind::ProcessSource
    }

    #[instrument(
        skip(self, ctx),
        fields(subsystem = "jobs", component = "process_source", op = "execute", job_id = %ctx.job_id())
    )]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        let args = match ctx.args() {
            JobArgs::ProcessSource(args) => args.clone(),
            other => return mismatched_args(self.job_kind(), other),
        };

        let work = async {
            let mut processed = self.ingestor.ingest(&args).await?;
            if args.embed {
                let item = ItemRef::new(processed.source_id.clone(), ItemCategory::Source);
                self.embedder.embed(&item, true).await?;
                processed.embedded = true;
            }
            Ok::<_, quire_core::Error>(processed)
        };

        match run_single_call(&ctx, self.timeout, work).await {
            Ok(processed) => {
                debug!(
                    source_id = %processed.source_id,
                    chunks = processed.chunks,
                    embedded = processed.embedded,
                    "Source processed"
                );
                finish_single_call(&ctx, JobOutput::SourceProcessed(processed)).await
            }
            Err(result) => result,
        }
    }
}
