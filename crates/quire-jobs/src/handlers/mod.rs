//! Handlers for the supported job kinds.

mod embed;
mod podcast;
mod rebuild;
mod source;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use quire_core::{
    ContentStore, EmbeddingProvider, JobOutput, PodcastGenerator, ProgressDelta, Result,
    SourceIngestor,
};

use crate::handler::{JobContext, JobResult};

pub use embed::EmbedSingleItemHandler;
pub use podcast::GeneratePodcastEpisodeHandler;
pub use rebuild::RebuildEmbeddingsHandler;
pub use source::ProcessSourceHandler;

/// Collaborators the handlers call into.
#[derive(Clone)]
pub struct Providers {
    pub store: Arc<dyn ContentStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub podcast: Arc<dyn PodcastGenerator>,
    pub ingestor: Arc<dyn SourceIngestor>,
}

/// Run a job that consists of one provider call.
///
/// The call counts as a single unit of progress. A cancellation observed
/// before the call starts short-circuits to `Cancelled`; once started the call
/// runs to completion or until `limit` expires; see [`finish_single_call`].
pub(crate) async fn run_single_call<T, F>(
    ctx: &JobContext,
    limit: Duration,
    call: F,
) -> std::result::Result<T, JobResult>
where
    F: Future<Output = Result<T>>,
{
    if ctx.refresh_cancel().await {
        return Err(JobResult::Cancelled(None));
    }
    if let Err(e) = ctx.record_progress(&ProgressDelta::grow_total(1)).await {
        return Err(JobResult::Failed(format!("progress update failed: {}", e)));
    }

    let outcome = match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(JobResult::Failed(e.to_string())),
        Err(_) => Err(JobResult::Failed(format!(
            "timeout after {}s",
            limit.as_secs()
        ))),
    };

    let done = ProgressDelta {
        processed: 1,
        ..ProgressDelta::default()
    };
    if let Err(e) = ctx.record_progress(&done).await {
        warn!(
            subsystem = "jobs",
            component = "handler",
            job_id = %ctx.job_id(),
            error = %e,
            "Failed to record final progress"
        );
    }
    outcome
}

/// Terminal result for a single call that produced `output`.
///
/// A cancel accepted while the call was in flight still ends the job
/// `Cancelled`, keeping the output.
pub(crate) async fn finish_single_call(ctx: &JobContext, output: JobOutput) -> JobResult {
    if ctx.refresh_cancel().await {
        JobResult::Cancelled(Some(output))
    } else {
        JobResult::Success(Some(output))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use quire_core::{JobArgs, JobRegistry};

    use crate::handler::JobContext;
    use crate::registry::MemoryJobRegistry;

    /// Create and claim a job, returning its context.
    pub async fn running_context(registry: &Arc<MemoryJobRegistry>, args: JobArgs) -> JobContext {
        let kind = args.kind();
        registry.create(args).await.unwrap();
        let job = registry.claim_next(&[kind]).await.unwrap().unwrap();
        JobContext::new(job, registry.clone())
    }
}
