//! Job handler contract and per-run context.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use quire_core::{Job, JobArgs, JobKind, JobOutput, JobRegistry, Progress, ProgressDelta, Result};

use crate::cancel::CancelFlag;

/// Progress callback type for job handlers.
pub type ProgressCallback = Box<dyn Fn(Progress) + Send + Sync>;

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed, as claimed.
    pub job: Job,
    registry: Arc<dyn JobRegistry>,
    cancel: CancelFlag,
    progress: Mutex<Progress>,
    progress_callback: Option<ProgressCallback>,
}

impl JobContext {
    pub fn new(job: Job, registry: Arc<dyn JobRegistry>) -> Self {
        let progress = job.progress;
        Self {
            job,
            registry,
            cancel: CancelFlag::new(),
            progress: Mutex::new(progress),
            progress_callback: None,
        }
    }

    /// Share a cancellation flag with whoever may cancel this run.
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = flag;
        self
    }

    /// Set the progress callback.
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    pub fn job_id(&self) -> Uuid {
        self.job.id
    }

    pub fn kind(&self) -> JobKind {
        self.job.kind
    }

    pub fn args(&self) -> &JobArgs {
        &self.job.args
    }

    pub fn registry(&self) -> Arc<dyn JobRegistry> {
        self.registry.clone()
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// In-process cancellation check (lock-free).
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Re-read the durable cancel flag from the registry, raising the local
    /// flag when set. Picks up cancellations issued by another process.
    pub async fn refresh_cancel(&self) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }
        match self.registry.cancel_requested(self.job.id).await {
            Ok(true) => {
                self.cancel.cancel();
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "context",
                    op = "refresh_cancel",
                    job_id = %self.job.id,
                    error = %e,
                    "Failed to read cancel flag"
                );
                false
            }
        }
    }

    /// Commit `delta` to the registry and report the resulting progress.
    pub async fn record_progress(&self, delta: &ProgressDelta) -> Result<Progress> {
        self.registry.update_progress(self.job.id, delta).await?;
        let progress = {
            let mut progress = self
                .progress
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            progress.processed += delta.processed;
            progress.total += delta.total;
            *progress
        };
        self.report_progress(progress);
        Ok(progress)
    }

    /// Committed progress as seen by this run.
    pub fn progress(&self) -> Progress {
        *self
            .progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Report progress to the callback.
    pub fn report_progress(&self, progress: Progress) {
        if let Some(ref callback) = self.progress_callback {
            callback(progress);
        }
    }
}

/// Result of job execution. The worker turns it into the terminal transition.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    /// Job completed with optional result data.
    Success(Option<JobOutput>),
    /// Job failed with an error message.
    Failed(String),
    /// Job stopped on request, with whatever partial result it produced.
    Cancelled(Option<JobOutput>),
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job kind this handler processes.
    fn job_kind(&self) -> JobKind;

    /// Execute the job. The job is already Running.
    async fn execute(&self, ctx: JobContext) -> JobResult;

    fn can_handle(&self, kind: JobKind) -> bool {
        self.job_kind() == kind
    }
}

/// Failure for a job whose arguments belong to another kind.
pub(crate) fn mismatched_args(expected: JobKind, args: &JobArgs) -> JobResult {
    JobResult::Failed(format!(
        "handler for {} received arguments for {}",
        expected,
        args.kind()
    ))
}
