//! Core traits for quire abstractions.
//!
//! These traits define the seams between the job machinery and its
//! collaborators: where job records live, where content comes from, and the
//! providers that do the actual work per kind.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// JOB REGISTRY
// =============================================================================

/// Authoritative store of job records.
///
/// Every write is atomic per job. Status changes are compare-and-set against
/// the state machine, so a concurrent writer can never move a job out of a
/// terminal state.
#[async_trait]
pub trait JobRegistry: Send + Sync {
    /// Persist a new queued job.
    async fn create(&self, args: JobArgs) -> Result<Job>;

    /// Atomically move the oldest queued job of one of `kinds` to running.
    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<Job>>;

    /// Add `delta` to progress and stats of a running job.
    async fn update_progress(&self, job_id: Uuid, delta: &ProgressDelta) -> Result<()>;

    /// Move a job to `to`, failing with `InvalidTransition` on a bad edge.
    async fn transition(&self, job_id: Uuid, to: JobStatus, detail: TransitionDetail)
        -> Result<Job>;

    /// Fetch one job.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// Jobs matching `filter`, newest first. `limit` is already resolved.
    async fn list(&self, filter: &JobFilter, limit: i64) -> Result<Vec<Job>>;

    /// Cancel a queued job outright, or flag a running one.
    async fn request_cancel(&self, job_id: Uuid) -> Result<CancelOutcome>;

    /// Whether cancellation was requested for `job_id`.
    async fn cancel_requested(&self, job_id: Uuid) -> Result<bool>;
}

// =============================================================================
// CONTENT AND PROVIDERS
// =============================================================================

/// Read access to the content corpus.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Items of one category. With `embedded_only`, only items that already
    /// carry embedding state.
    async fn list_items(
        &self,
        category: ItemCategory,
        embedded_only: bool,
    ) -> Result<Vec<ContentItem>>;

    /// Look up a single item.
    async fn get_item(&self, item: &ItemRef) -> Result<Option<ContentItem>>;
}

/// Embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Regenerate embeddings for one item.
    ///
    /// Without `force`, an item whose embedding is current may be reported as
    /// [`EmbedStatus::AlreadyUpToDate`].
    async fn embed(&self, item: &ItemRef, force: bool) -> Result<EmbedStatus>;
}

/// Podcast generation backend (transcript + audio).
#[async_trait]
pub trait PodcastGenerator: Send + Sync {
    async fn generate(&self, args: &PodcastEpisodeArgs) -> Result<EpisodeArtifact>;
}

/// New-source ingestion backend.
#[async_trait]
pub trait SourceIngestor: Send + Sync {
    async fn ingest(&self, args: &ProcessSourceArgs) -> Result<SourceProcessed>;
}
