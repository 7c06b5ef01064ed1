//! Integration tests for the PostgreSQL job registry.
//!
//! These need a reachable PostgreSQL (see `DATABASE_URL`) and are ignored by
//! default. Run with `cargo test -p quire-db -- --ignored`.

use chrono::Utc;

use quire_db::test_fixtures::TestDatabase;
use quire_db::{
    CancelOutcome, Error, ItemCategory, ItemOutcome, ItemRef, JobArgs, JobFilter, JobKind,
    JobRegistry, JobStatus, PodcastEpisodeArgs, ProgressDelta, RebuildMode, RebuildRequest,
    TransitionDetail,
};

fn rebuild_args() -> JobArgs {
    JobArgs::RebuildEmbeddings(RebuildRequest::new(RebuildMode::All))
}

fn podcast_args() -> JobArgs {
    JobArgs::GeneratePodcastEpisode(PodcastEpisodeArgs {
        episode_config_id: "tech_discussion".to_string(),
        source_text: "Notebook content".to_string(),
        episode_name: "Episode 1".to_string(),
        instructions: None,
    })
}

fn success_delta(n: usize) -> ProgressDelta {
    let mut delta = ProgressDelta::default();
    for i in 0..n {
        delta.record(&ItemOutcome::success(ItemRef::new(
            format!("source:{}", i),
            ItemCategory::Source,
        )));
    }
    delta
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_create_and_get_roundtrip() {
    let db = TestDatabase::new().await;

    let job = db.jobs.create(rebuild_args()).await.unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.kind, JobKind::RebuildEmbeddings);

    let fetched = db.jobs.get(job.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, job.id);
    assert_eq!(fetched.args, rebuild_args());
    assert_eq!(fetched.progress.total, 0);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_claim_respects_kinds_and_order() {
    let db = TestDatabase::new().await;

    let first = db.jobs.create(rebuild_args()).await.unwrap();
    let _podcast = db.jobs.create(podcast_args()).await.unwrap();
    let second = db.jobs.create(rebuild_args()).await.unwrap();

    let claimed = db
        .jobs
        .claim_next(&[JobKind::RebuildEmbeddings])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, first.id);
    assert_eq!(claimed.status, JobStatus::Running);
    assert!(claimed.started_at.is_some());

    let claimed = db
        .jobs
        .claim_next(&[JobKind::RebuildEmbeddings])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, second.id);

    assert!(db
        .jobs
        .claim_next(&[JobKind::RebuildEmbeddings])
        .await
        .unwrap()
        .is_none());
    assert!(db.jobs.claim_next(&[]).await.unwrap().is_none());

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_progress_deltas_accumulate() {
    let db = TestDatabase::new().await;

    let job = db.jobs.create(rebuild_args()).await.unwrap();
    db.jobs
        .claim_next(&[JobKind::RebuildEmbeddings])
        .await
        .unwrap();

    db.jobs
        .update_progress(job.id, &ProgressDelta::grow_total(5))
        .await
        .unwrap();
    db.jobs
        .update_progress(job.id, &success_delta(3))
        .await
        .unwrap();

    let job = db.jobs.get(job.id).await.unwrap().unwrap();
    assert_eq!(job.progress.processed, 3);
    assert_eq!(job.progress.total, 5);
    assert_eq!(job.stats.sources, 3);

    // Would push processed past total.
    let err = db
        .jobs
        .update_progress(job.id, &success_delta(3))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Job(_)));

    let job = db.jobs.get(job.id).await.unwrap().unwrap();
    assert_eq!(job.progress.processed, 3);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_progress_rejected_for_queued_job() {
    let db = TestDatabase::new().await;

    let job = db.jobs.create(rebuild_args()).await.unwrap();
    let err = db
        .jobs
        .update_progress(job.id, &ProgressDelta::grow_total(1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Job(_)));

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_terminal_state_is_final() {
    let db = TestDatabase::new().await;

    let job = db.jobs.create(rebuild_args()).await.unwrap();
    db.jobs
        .claim_next(&[JobKind::RebuildEmbeddings])
        .await
        .unwrap();
    let failed = db
        .jobs
        .transition(job.id, JobStatus::Failed, TransitionDetail::with_error("store down"))
        .await
        .unwrap();
    assert_eq!(failed.error_message.as_deref(), Some("store down"));
    assert!(failed.completed_at.is_some());

    let err = db
        .jobs
        .transition(job.id, JobStatus::Completed, TransitionDetail::none())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidTransition {
            from: JobStatus::Failed,
            to: JobStatus::Completed,
            ..
        }
    ));

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_cancel_outcomes() {
    let db = TestDatabase::new().await;

    let queued = db.jobs.create(podcast_args()).await.unwrap();
    assert_eq!(
        db.jobs.request_cancel(queued.id).await.unwrap(),
        CancelOutcome::CancelledQueued
    );
    let queued = db.jobs.get(queued.id).await.unwrap().unwrap();
    assert_eq!(queued.status, JobStatus::Cancelled);

    let running = db.jobs.create(rebuild_args()).await.unwrap();
    db.jobs
        .claim_next(&[JobKind::RebuildEmbeddings])
        .await
        .unwrap();
    assert_eq!(
        db.jobs.request_cancel(running.id).await.unwrap(),
        CancelOutcome::Signalled
    );
    assert!(db.jobs.cancel_requested(running.id).await.unwrap());

    db.jobs
        .transition(running.id, JobStatus::Cancelled, TransitionDetail::none())
        .await
        .unwrap();
    assert_eq!(
        db.jobs.request_cancel(running.id).await.unwrap(),
        CancelOutcome::AlreadyTerminal
    );

    let err = db
        .jobs
        .request_cancel(uuid::Uuid::now_v7())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_list_filters_and_order() {
    let db = TestDatabase::new().await;

    let before = Utc::now();
    let a = db.jobs.create(rebuild_args()).await.unwrap();
    let b = db.jobs.create(podcast_args()).await.unwrap();
    let c = db.jobs.create(rebuild_args()).await.unwrap();

    let all = db.jobs.list(&JobFilter::new(), 50).await.unwrap();
    let ids: Vec<_> = all.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![c.id, b.id, a.id]);

    let rebuilds = db
        .jobs
        .list(&JobFilter::new().with_kind(JobKind::RebuildEmbeddings), 50)
        .await
        .unwrap();
    assert_eq!(rebuilds.len(), 2);

    let none = db
        .jobs
        .list(
            &JobFilter::new()
                .with_kind(JobKind::GeneratePodcastEpisode)
                .with_status(JobStatus::Running),
            50,
        )
        .await
        .unwrap();
    assert!(none.is_empty());

    let recent = db
        .jobs
        .list(&JobFilter::new().with_created_after(before), 2)
        .await
        .unwrap();
    assert_eq!(recent.len(), 2);

    db.cleanup().await;
}
