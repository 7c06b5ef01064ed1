//! Read side: job snapshots for callers.

use std::sync::Arc;

use tracing::debug;

use quire_core::{
    effective_list_limit, parse_job_id, Error, Job, JobFilter, JobRegistry, JobSnapshot,
    JobStatus, ProgressView, Result,
};

/// Builds [`JobSnapshot`]s from the registry. Never blocks on running jobs.
#[derive(Clone)]
pub struct StatusService {
    registry: Arc<dyn JobRegistry>,
}

impl StatusService {
    pub fn new(registry: Arc<dyn JobRegistry>) -> Self {
        Self { registry }
    }

    /// Snapshot of one job. Unknown or malformed ids are `NotFound`.
    pub async fn get(&self, job_id: &str) -> Result<JobSnapshot> {
        let id = parse_job_id(job_id)?;
        let job = self
            .registry
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;
        Ok(Self::snapshot(&job))
    }

    /// Newest first. A non-positive limit means the default page size.
    pub async fn list(&self, filter: &JobFilter, limit: i64) -> Result<Vec<JobSnapshot>> {
        let limit = effective_list_limit(limit);
        let jobs = self.registry.list(filter, limit).await?;
        debug!(
            subsystem = "jobs",
            component = "status",
            op = "list",
            limit,
            returned = jobs.len(),
            "Listed jobs"
        );
        Ok(jobs.iter().map(Self::snapshot).collect())
    }

    pub fn snapshot(job: &Job) -> JobSnapshot {
        // A completed job with nothing to do reads as done.
        let percentage = if job.status == JobStatus::Completed && job.progress.total == 0 {
            100.0
        } else {
            job.progress.percentage()
        };

        JobSnapshot {
            job_id: job.id.to_string(),
            job_kind: job.kind,
            status: job.status,
            progress: Some(ProgressView {
                processed: job.progress.processed,
                total: job.progress.total,
                percentage,
            }),
            stats: job.kind.tracks_items().then_some(job.stats),
            created_at: job.created_at,
            updated_at: job.updated_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            result: job.result.clone(),
            error_message: job.error_message.clone(),
        }
    }
}
