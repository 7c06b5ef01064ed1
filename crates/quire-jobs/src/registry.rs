//! In-process job registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock};
use tracing::debug;
use uuid::Uuid;

use quire_core::{
    CancelOutcome, Error, Job, JobArgs, JobFilter, JobKind, JobRegistry, JobStatus,
    ProgressDelta, Result, TransitionDetail,
};

/// Memory-backed [`JobRegistry`].
///
/// Construct one at startup and share it by `Arc`. Every write takes the
/// write lock for the duration of a single field update; readers take the
/// read lock just long enough to clone a snapshot, so a status poll never
/// waits on item processing.
pub struct MemoryJobRegistry {
    jobs: RwLock<HashMap<Uuid, Job>>,
    notify: Arc<Notify>,
}

impl Default for MemoryJobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJobRegistry {
    pub fn new() -> Self {
        Self::with_notify(Arc::new(Notify::new()))
    }

    pub fn with_notify(notify: Arc<Notify>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            notify,
        }
    }

    /// Handle signalled on every `create`.
    pub fn job_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobRegistry for MemoryJobRegistry {
    async fn create(&self, args: JobArgs) -> Result<Job> {
        let job = Job::new(args);
        self.jobs.write().await.insert(job.id, job.clone());
        self.notify.notify_one();
        debug!(
            subsystem = "jobs",
            component = "registry",
            op = "create",
            job_id = %job.id,
            job_kind = %job.kind,
            "Job queued"
        );
        Ok(job)
    }

    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<Job>> {
        let mut jobs = self.jobs.write().await;
        let next = jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued && kinds.contains(&j.kind))
            .min_by_key(|j| (j.created_at, j.id))
            .map(|j| j.id);

        let Some(job_id) = next else {
            return Ok(None);
        };
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::Internal(format!("claimed job {} vanished", job_id)))?;
        job.transition(JobStatus::Running, TransitionDetail::none())?;
        Ok(Some(job.clone()))
    }

    async fn update_progress(&self, job_id: Uuid, delta: &ProgressDelta) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;
        job.apply_delta(delta)
    }

    async fn transition(
        &self,
        job_id: Uuid,
        to: JobStatus,
        detail: TransitionDetail,
    ) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;
        job.transition(to, detail)?;
        Ok(job.clone())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(&job_id).cloned())
    }

    async fn list(&self, filter: &JobFilter, limit: i64) -> Result<Vec<Job>> {
        let mut matched: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| filter.matches(j))
            .cloned()
            .collect();
        matched.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        matched.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(matched)
    }

    async fn request_cancel(&self, job_id: Uuid) -> Result<CancelOutcome> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;

        let outcome = match job.status {
            JobStatus::Queued => {
                job.cancel_requested = true;
                job.transition(JobStatus::Cancelled, TransitionDetail::none())?;
                CancelOutcome::CancelledQueued
            }
            JobStatus::Running => {
                job.cancel_requested = true;
                job.updated_at = chrono::Utc::now();
                CancelOutcome::Signalled
            }
            _ => CancelOutcome::AlreadyTerminal,
        };
        Ok(outcome)
    }

    async fn cancel_requested(&self, job_id: Uuid) -> Result<bool> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .map(|j| j.cancel_requested)
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{
        ItemCategory, ItemOutcome, ItemRef, PodcastEpisodeArgs, RebuildMode, RebuildRequest,
    };

    fn rebuild_args() -> JobArgs {
        JobArgs::RebuildEmbeddings(RebuildRequest::new(RebuildMode::All))
    }

    fn podcast_args() -> JobArgs {
        JobArgs::GeneratePodcastEpisode(PodcastEpisodeArgs {
            episode_config_id: "deep_dive".to_string(),
            source_text: "text".to_string(),
            episode_name: "Ep".to_string(),
            instructions: None,
        })
    }

    #[tokio::test]
    async fn test_create_is_queued() {
        let registry = MemoryJobRegistry::new();
        let job = registry.create(rebuild_args()).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get(job.id).await.unwrap().unwrap(), job);
    }

    #[tokio::test]
    async fn test_claim_oldest_of_requested_kind() {
        let registry = MemoryJobRegistry::new();
        let podcast = registry.create(podcast_args()).await.unwrap();
        let first = registry.create(rebuild_args()).await.unwrap();
        let _second = registry.create(rebuild_args()).await.unwrap();

        let claimed = registry
            .claim_next(&[JobKind::RebuildEmbeddings])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert!(claimed.started_at.is_some());

        let still_queued = registry.get(podcast.id).await.unwrap().unwrap();
        assert_eq!(still_queued.status, JobStatus::Queued);
        assert!(registry.claim_next(&[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_progress_requires_running() {
        let registry = MemoryJobRegistry::new();
        let job = registry.create(rebuild_args()).await.unwrap();
        assert!(registry
            .update_progress(job.id, &ProgressDelta::grow_total(3))
            .await
            .is_err());

        registry
            .claim_next(&[JobKind::RebuildEmbeddings])
            .await
            .unwrap();
        registry
            .update_progress(job.id, &ProgressDelta::grow_total(3))
            .await
            .unwrap();

        let mut delta = ProgressDelta::default();
        delta.record(&ItemOutcome::success(ItemRef::new(
            "note:1",
            ItemCategory::Note,
        )));
        registry.update_progress(job.id, &delta).await.unwrap();

        let job = registry.get(job.id).await.unwrap().unwrap();
        assert_eq!(job.progress.processed, 1);
        assert_eq!(job.progress.total, 3);
        assert_eq!(job.stats.notes, 1);
    }

    #[tokio::test]
    async fn test_update_progress_unknown_job() {
        let registry = MemoryJobRegistry::new();
        let err = registry
            .update_progress(Uuid::now_v7(), &ProgressDelta::grow_total(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_transition_rejects_terminal_exit() {
        let registry = MemoryJobRegistry::new();
        let job = registry.create(rebuild_args()).await.unwrap();
        registry
            .claim_next(&[JobKind::RebuildEmbeddings])
            .await
            .unwrap();
        registry
            .transition(job.id, JobStatus::Completed, TransitionDetail::none())
            .await
            .unwrap();

        let err = registry
            .transition(job.id, JobStatus::Failed, TransitionDetail::with_error("late"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        let job = registry.get(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn test_request_cancel_by_state() {
        let registry = MemoryJobRegistry::new();

        let queued = registry.create(podcast_args()).await.unwrap();
        assert_eq!(
            registry.request_cancel(queued.id).await.unwrap(),
            CancelOutcome::CancelledQueued
        );
        let queued = registry.get(queued.id).await.unwrap().unwrap();
        assert_eq!(queued.status, JobStatus::Cancelled);
        assert!(queued.completed_at.is_some());

        let running = registry.create(rebuild_args()).await.unwrap();
        registry
            .claim_next(&[JobKind::RebuildEmbeddings])
            .await
            .unwrap();
        assert_eq!(
            registry.request_cancel(running.id).await.unwrap(),
            CancelOutcome::Signalled
        );
        assert!(registry.cancel_requested(running.id).await.unwrap());
        assert_eq!(
            registry.get(running.id).await.unwrap().unwrap().status,
            JobStatus::Running
        );

        registry
            .transition(running.id, JobStatus::Cancelled, TransitionDetail::none())
            .await
            .unwrap();
        assert_eq!(
            registry.request_cancel(running.id).await.unwrap(),
            CancelOutcome::AlreadyTerminal
        );
    }

    #[tokio::test]
    async fn test_list_newest_first_with_limit() {
        let registry = MemoryJobRegistry::new();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(registry.create(rebuild_args()).await.unwrap().id);
        }
        registry.create(podcast_args()).await.unwrap();

        let listed = registry
            .list(&JobFilter::new().with_kind(JobKind::RebuildEmbeddings), 3)
            .await
            .unwrap();
        let listed: Vec<Uuid> = listed.iter().map(|j| j.id).collect();
        assert_eq!(listed, vec![ids[4], ids[3], ids[2]]);
    }

    #[tokio::test]
    async fn test_create_wakes_waiter() {
        let registry = Arc::new(MemoryJobRegistry::new());
        let notify = registry.job_notify();
        registry.create(rebuild_args()).await.unwrap();
        // The stored permit completes immediately.
        tokio::time::timeout(std::time::Duration::from_millis(100), notify.notified())
            .await
            .unwrap();
    }
}
