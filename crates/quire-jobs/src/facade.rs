//! Submission and control surface.
//!
//! Every operation validates first, then talks to the registry. Nothing here
//! waits for job execution.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use quire_core::{
    parse_job_id, Error, JobArgs, JobFilter, JobKind, JobRegistry, JobSnapshot, RebuildRequest, Result,
};

use crate::enumerator::ItemEnumerator;
use crate::status::StatusService;
use crate::worker::BackendState;

/// Accepted rebuild submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildSubmission {
    pub job_id: Uuid,
    /// Item count at submission time. Informational; the job enumerates again
    /// when it starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_items: Option<u64>,
}

/// Front door for submitting, inspecting and cancelling jobs.
#[derive(Clone)]
pub struct CommandFacade {
    registry: Arc<dyn JobRegistry>,
    status: StatusService,
    backend: BackendState,
    enumerator: Option<ItemEnumerator>,
}

impl CommandFacade {
    pub fn new(registry: Arc<dyn JobRegistry>, backend: BackendState) -> Self {
        Self {
            status: StatusService::new(registry.clone()),
            registry,
            backend,
            enumerator: None,
        }
    }

    /// Enables item estimates on rebuild submissions.
    pub fn with_enumerator(mut self, enumerator: ItemEnumerator) -> Self {
        self.enumerator = Some(enumerator);
        self
    }

    /// Queue a job and return its id without waiting for it to run.
    #[instrument(skip(self, args), fields(subsystem = "jobs", component = "facade", op = "submit", job_kind = %args.kind()))]
    pub async fn submit(&self, args: JobArgs) -> Result<Uuid> {
        let kind = args.kind();
        let job_id = self
            .enqueue(args)
            .await
            .inspect_err(|e| log_rejection(kind.as_str(), e))?;
        info!(job_id = %job_id, "Job submitted");
        Ok(job_id)
    }

    /// Submit from an untyped `(kind, payload)` pair.
    pub async fn submit_raw(&self, kind: &str, payload: JsonValue) -> Result<Uuid> {
        let args = self
            .parse_raw(kind, payload)
            .inspect_err(|e| log_rejection(kind, e))?;
        self.submit(args).await
    }

    fn parse_raw(&self, kind: &str, payload: JsonValue) -> Result<JobArgs> {
        let parsed: JobKind = kind.parse()?;
        if !self.backend.handles(parsed) {
            return Err(Error::UnknownJobKind(parsed.to_string()));
        }
        JobArgs::from_raw(kind, payload)
    }

    async fn enqueue(&self, args: JobArgs) -> Result<Uuid> {
        let kind = args.kind();
        if !self.backend.handles(kind) {
            return Err(Error::UnknownJobKind(kind.to_string()));
        }
        args.validate()?;
        if !self.backend.is_accepting() {
            return Err(Error::BackendUnavailable(
                "job worker is not running".to_string(),
            ));
        }

        let job = self.registry.create(args).await.map_err(|e| match e {
            Error::Database(db) => Error::BackendUnavailable(format!("job registry: {}", db)),
            other => other,
        })?;
        self.backend.wake();
        Ok(job.id)
    }

    /// Queue a rebuild, attaching an item estimate when one is available.
    pub async fn submit_rebuild(&self, request: RebuildRequest) -> Result<RebuildSubmission> {
        let job_id = self
            .submit(JobArgs::RebuildEmbeddings(request.clone()))
            .await?;

        let estimated_items = match &self.enumerator {
            Some(enumerator) => match enumerator.estimate(&request).await {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(
                        subsystem = "jobs",
                        component = "facade",
                        job_id = %job_id,
                        error = %e,
                        "Rebuild estimate unavailable"
                    );
                    None
                }
            },
            None => None,
        };

        Ok(RebuildSubmission {
            job_id,
            estimated_items,
        })
    }

    pub async fn get_status(&self, job_id: &str) -> Result<JobSnapshot> {
        self.status.get(job_id).await
    }

    pub async fn list(&self, filter: &JobFilter, limit: i64) -> Result<Vec<JobSnapshot>> {
        self.status.list(filter, limit).await
    }

    /// Request cancellation. Returns false once the job is already terminal.
    ///
    /// A queued job is cancelled outright. A running job is flagged and stops
    /// at its next dispatch boundary.
    pub async fn cancel(&self, job_id: &str) -> Result<bool> {
        let id = parse_job_id(job_id)?;
        let outcome = self.registry.request_cancel(id).await?;
        let local = self.backend.signals().signal(id).await;
        debug!(
            subsystem = "jobs",
            component = "facade",
            op = "cancel",
            job_id = %id,
            outcome = ?outcome,
            local,
            "Cancellation requested"
        );
        Ok(outcome.accepted())
    }
}

/// Validation rejections log at debug, everything else at warn.
fn log_rejection(kind: &str, err: &Error) {
    if err.is_validation() {
        debug!(
            subsystem = "jobs",
            component = "facade",
            job_kind = kind,
            error = %err,
            "Submission rejected"
        );
    } else {
        warn!(
            subsystem = "jobs",
            component = "facade",
            job_kind = kind,
            error = %err,
            "Submission failed"
        );
    }
}
