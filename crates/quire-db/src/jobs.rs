//! Job registry implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use tracing::{debug, warn};
use uuid::Uuid;

use quire_core::{
    new_v7, CancelOutcome, Error, Job, JobArgs, JobFilter, JobKind, JobOutput, JobRegistry,
    JobStatus, Progress, ProgressDelta, Result, Stats, TransitionDetail,
};

const JOB_COLUMNS: &str = "id, kind, status, args, result, error_message, processed, total, \
     stat_sources, stat_notes, stat_insights, stat_failed, cancel_requested, \
     created_at, updated_at, started_at, completed_at";

/// PostgreSQL implementation of [`JobRegistry`].
///
/// Every write is a single conditional statement, so readers only ever see
/// committed rows and concurrent writers cannot violate the state machine.
pub struct PgJobRegistry {
    pool: Pool<Postgres>,
    /// Wakes the worker when a job is created.
    notify: Arc<Notify>,
}

impl PgJobRegistry {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Create a registry sharing an existing notify handle.
    pub fn with_notify(pool: Pool<Postgres>, notify: Arc<Notify>) -> Self {
        Self { pool, notify }
    }

    /// Handle signalled on every successful `create`.
    pub fn job_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    fn to_db_count(value: u64) -> Result<i64> {
        i64::try_from(value).map_err(|_| Error::Internal(format!("counter overflow: {}", value)))
    }

    fn from_db_count(value: i64) -> u64 {
        u64::try_from(value).unwrap_or(0)
    }

    fn parse_job_row(row: sqlx::postgres::PgRow) -> Result<Job> {
        let kind: String = row.get("kind");
        let status: String = row.get("status");
        let args: JsonValue = row.get("args");
        let result: Option<JsonValue> = row.get("result");

        let args: JobArgs = serde_json::from_value(args)?;
        let result: Option<JobOutput> = result.map(serde_json::from_value).transpose()?;

        Ok(Job {
            id: row.get("id"),
            kind: kind.parse::<JobKind>()?,
            status: status.parse::<JobStatus>()?,
            args,
            result,
            error_message: row.get("error_message"),
            progress: Progress {
                processed: Self::from_db_count(row.get("processed")),
                total: Self::from_db_count(row.get("total")),
            },
            stats: Stats {
                sources: Self::from_db_count(row.get("stat_sources")),
                notes: Self::from_db_count(row.get("stat_notes")),
                insights: Self::from_db_count(row.get("stat_insights")),
                failed: Self::from_db_count(row.get("stat_failed")),
            },
            cancel_requested: row.get("cancel_requested"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        })
    }

    async fn current_status(&self, job_id: Uuid) -> Result<Option<JobStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM job_registry WHERE id = $1")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;
        status.map(|s| s.parse::<JobStatus>()).transpose()
    }
}

#[async_trait]
impl JobRegistry for PgJobRegistry {
    async fn create(&self, args: JobArgs) -> Result<Job> {
        let job_id = new_v7();
        let now = Utc::now();
        let kind = args.kind();
        let args_json = serde_json::to_value(&args)?;

        let row = sqlx::query(&format!(
            "INSERT INTO job_registry (id, kind, status, args, created_at, updated_at)
             VALUES ($1, $2, 'queued', $3, $4, $4)
             RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .bind(kind.as_str())
        .bind(&args_json)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.notify.notify_one();
        Self::parse_job_row(row)
    }

    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<Job>> {
        if kinds.is_empty() {
            return Ok(None);
        }
        let now = Utc::now();
        let kind_strings: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();

        // SKIP LOCKED lets several workers claim concurrently without blocking.
        let row = sqlx::query(&format!(
            "UPDATE job_registry
             SET status = 'running', started_at = $1, updated_at = $1
             WHERE id = (
                 SELECT id FROM job_registry
                 WHERE status = 'queued' AND kind = ANY($2)
                 ORDER BY created_at ASC, id ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(now)
        .bind(&kind_strings)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn update_progress(&self, job_id: Uuid, delta: &ProgressDelta) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }
        let processed = Self::to_db_count(delta.processed)?;
        let total = Self::to_db_count(delta.total)?;

        let result = sqlx::query(
            "UPDATE job_registry
             SET processed = processed + $2,
                 total = total + $3,
                 stat_sources = stat_sources + $4,
                 stat_notes = stat_notes + $5,
                 stat_insights = stat_insights + $6,
                 stat_failed = stat_failed + $7,
                 updated_at = $8
             WHERE id = $1
               AND status = 'running'
               AND processed + $2 <= total + $3",
        )
        .bind(job_id)
        .bind(processed)
        .bind(total)
        .bind(Self::to_db_count(delta.stats.sources)?)
        .bind(Self::to_db_count(delta.stats.notes)?)
        .bind(Self::to_db_count(delta.stats.insights)?)
        .bind(Self::to_db_count(delta.stats.failed)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.current_status(job_id).await? {
            None => Err(Error::NotFound(format!("job {}", job_id))),
            Some(status) => {
                warn!(
                    subsystem = "db",
                    component = "registry",
                    op = "update_progress",
                    job_id = %job_id,
                    status = %status,
                    "Rejected progress delta"
                );
                Err(Error::Job(format!(
                    "progress update rejected for job {} in state {}",
                    job_id, status
                )))
            }
        }
    }

    async fn transition(
        &self,
        job_id: Uuid,
        to: JobStatus,
        detail: TransitionDetail,
    ) -> Result<Job> {
        let allowed: Vec<String> = JobStatus::predecessors(to)
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let error_message = match to {
            JobStatus::Failed => Some(detail.failure_message()),
            _ => detail.error_message.clone(),
        };
        let result = detail
            .result
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let row = sqlx::query(&format!(
            "UPDATE job_registry
             SET status = $2,
                 updated_at = $3,
                 started_at = CASE WHEN $2 = 'running' THEN $3 ELSE started_at END,
                 completed_at = CASE WHEN $2 IN ('completed', 'failed', 'cancelled')
                                     THEN $3 ELSE completed_at END,
                 result = COALESCE($4, result),
                 error_message = COALESCE($5, error_message)
             WHERE id = $1 AND status = ANY($6)
             RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(&result)
        .bind(&error_message)
        .bind(&allowed)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some(row) = row {
            debug!(
                subsystem = "db",
                component = "registry",
                op = "transition",
                job_id = %job_id,
                to = %to,
                "Job transitioned"
            );
            return Self::parse_job_row(row);
        }

        match self.current_status(job_id).await? {
            None => Err(Error::NotFound(format!("job {}", job_id))),
            Some(from) => Err(Error::InvalidTransition { job_id, from, to }),
        }
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM job_registry WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn list(&self, filter: &JobFilter, limit: i64) -> Result<Vec<Job>> {
        let mut conditions = Vec::new();
        let mut param_idx = 1;

        if filter.kind.is_some() {
            conditions.push(format!("kind = ${}", param_idx));
            param_idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("status = ${}", param_idx));
            param_idx += 1;
        }
        if filter.created_after.is_some() {
            conditions.push(format!("created_at > ${}", param_idx));
            param_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {} FROM job_registry
             {}
             ORDER BY created_at DESC, id DESC
             LIMIT ${}",
            JOB_COLUMNS, where_clause, param_idx
        );

        let mut q = sqlx::query(&query);
        if let Some(kind) = filter.kind {
            q = q.bind(kind.as_str());
        }
        if let Some(status) = filter.status {
            q = q.bind(status.as_str());
        }
        if let Some(ts) = filter.created_after {
            q = q.bind(ts);
        }
        q = q.bind(limit);

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        rows.into_iter().map(Self::parse_job_row).collect()
    }

    async fn request_cancel(&self, job_id: Uuid) -> Result<CancelOutcome> {
        let now = Utc::now();

        let cancelled: Option<Uuid> = sqlx::query_scalar(
            "UPDATE job_registry
             SET status = 'cancelled', cancel_requested = TRUE,
                 updated_at = $2, completed_at = $2
             WHERE id = $1 AND status = 'queued'
             RETURNING id",
        )
        .bind(job_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        if cancelled.is_some() {
            return Ok(CancelOutcome::CancelledQueued);
        }

        // Catches a job claimed between the two statements as well.
        let signalled: Option<Uuid> = sqlx::query_scalar(
            "UPDATE job_registry
             SET cancel_requested = TRUE, updated_at = $2
             WHERE id = $1 AND status = 'running'
             RETURNING id",
        )
        .bind(job_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        if signalled.is_some() {
            return Ok(CancelOutcome::Signalled);
        }

        match self.current_status(job_id).await? {
            None => Err(Error::NotFound(format!("job {}", job_id))),
            Some(_) => Ok(CancelOutcome::AlreadyTerminal),
        }
    }

    async fn cancel_requested(&self, job_id: Uuid) -> Result<bool> {
        let flag: Option<bool> =
            sqlx::query_scalar("SELECT cancel_requested FROM job_registry WHERE id = $1")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;
        flag.ok_or_else(|| Error::NotFound(format!("job {}", job_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_count_conversions() {
        assert_eq!(PgJobRegistry::to_db_count(42).unwrap(), 42);
        assert!(PgJobRegistry::to_db_count(u64::MAX).is_err());
        assert_eq!(PgJobRegistry::from_db_count(7), 7);
        assert_eq!(PgJobRegistry::from_db_count(-1), 0);
    }

    #[test]
    fn test_job_columns_cover_job_fields() {
        for column in [
            "id",
            "kind",
            "status",
            "args",
            "result",
            "error_message",
            "processed",
            "total",
            "stat_failed",
            "cancel_requested",
            "started_at",
            "completed_at",
        ] {
            assert!(JOB_COLUMNS.contains(column), "missing column {}", column);
        }
    }

    #[test]
    fn test_status_strings_match_schema() {
        let schema = include_str!("../../../migrations/20260301000000_job_registry.sql");
        for status in JobStatus::ALL {
            assert!(schema.contains(&format!("'{}'", status.as_str())));
        }
    }
}
