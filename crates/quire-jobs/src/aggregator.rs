//! Fans one job out over its items and folds the outcomes into the registry.
//!
//! A run dispatches items in enumeration order onto a bounded pool of tasks,
//! folds every outcome into a pending [`ProgressDelta`], and commits that
//! delta in one registry write every `flush_every` outcomes or
//! `flush_interval`, whichever comes first. A crash therefore loses at most
//! the outcomes since the last flush, never a half-applied delta.
//!
//! Cancellation is checked before every dispatch. Once observed, no new item
//! starts; in-flight items finish (or time out) and are still counted.
//!
//! When every enumerated item has finished, a bulk run rescans once and
//! appends items created in the meantime, growing `total` accordingly.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, instrument, trace, warn};

use quire_core::{
    ItemFailure, ItemOutcome, ItemRef, ItemResult, Progress, ProgressDelta, RebuildRequest,
    RebuildSummary, Result, Stats,
};

use crate::config::AggregatorConfig;
use crate::enumerator::{Enumeration, ItemEnumerator};
use crate::handler::JobContext;
use crate::processor::ItemProcessor;

/// Failure reason recorded when an item exceeds its time limit.
pub const ITEM_TIMEOUT: &str = "timeout";

/// Failure reason recorded when a processor panics.
pub const ITEM_PANICKED: &str = "processor panicked";

/// Failure reason recorded when an item task is aborted before finishing.
pub const ITEM_ABORTED: &str = "task aborted";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateStatus {
    Completed,
    Cancelled,
}

/// Final tally of one aggregator run.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateReport {
    pub status: AggregateStatus,
    pub progress: Progress,
    pub stats: Stats,
    pub skipped: u64,
    /// Bounded sample of failed items, in completion order.
    pub failures: Vec<ItemFailure>,
    pub duration_ms: u64,
}

impl AggregateReport {
    pub fn summary(&self) -> RebuildSummary {
        RebuildSummary {
            processed: self.progress.processed,
            total: self.progress.total,
            stats: self.stats,
            duration_ms: self.duration_ms,
            failures: self.failures.clone(),
        }
    }
}

/// Accumulates outcomes between flushes.
struct ProgressTracker {
    pending: ProgressDelta,
    since_flush: usize,
    flush_every: usize,
    flush_interval: Duration,
    last_flush: Instant,
    stats: Stats,
    skipped: u64,
    failures: Vec<ItemFailure>,
    failure_cap: usize,
}

impl ProgressTracker {
    fn new(config: &AggregatorConfig) -> Self {
        Self {
            pending: ProgressDelta::default(),
            since_flush: 0,
            flush_every: config.flush_every.max(1),
            flush_interval: config.flush_interval,
            last_flush: Instant::now(),
            stats: Stats::default(),
            skipped: 0,
            failures: Vec::new(),
            failure_cap: config.failure_sample_max,
        }
    }

    fn grow_total(&mut self, n: u64) {
        self.pending.total += n;
    }

    fn record(&mut self, outcome: &ItemOutcome) {
        self.pending.record(outcome);
        self.since_flush += 1;
        match &outcome.result {
            ItemResult::Success => self.stats.record_success(outcome.item.category),
            ItemResult::SkippedAlreadyUpToDate => self.skipped += 1,
            ItemResult::Failed(reason) => {
                self.stats.failed += 1;
                if self.failures.len() < self.failure_cap {
                    self.failures.push(ItemFailure {
                        item_id: outcome.item.id.clone(),
                        category: outcome.item.category,
                        reason: reason.clone(),
                    });
                }
            }
        }
    }

    fn deadline(&self) -> Instant {
        self.last_flush + self.flush_interval
    }

    fn due(&self) -> bool {
        self.since_flush >= self.flush_every || Instant::now() >= self.deadline()
    }

    /// Commit the pending delta. An empty delta only resets the timer.
    async fn flush(&mut self, ctx: &JobContext) -> Result<()> {
        if !self.pending.is_empty() {
            let progress = ctx.record_progress(&self.pending).await?;
            trace!(
                subsystem = "jobs",
                component = "aggregator",
                op = "flush",
                job_id = %ctx.job_id(),
                processed = progress.processed,
                total = progress.total,
                "Progress flushed"
            );
            self.pending = ProgressDelta::default();
        }
        self.since_flush = 0;
        self.last_flush = Instant::now();
        Ok(())
    }
}

/// Runs items of one job through an [`ItemProcessor`].
pub struct JobAggregator {
    processor: Arc<dyn ItemProcessor>,
    config: AggregatorConfig,
    item_timeout: Duration,
}

impl JobAggregator {
    pub fn new(
        processor: Arc<dyn ItemProcessor>,
        config: AggregatorConfig,
        item_timeout: Duration,
    ) -> Self {
        Self {
            processor,
            config,
            item_timeout,
        }
    }

    /// Enumerate `request` and process every item, rescanning once at the end
    /// when enabled.
    pub async fn run(
        &self,
        ctx: &JobContext,
        enumerator: &ItemEnumerator,
        request: &RebuildRequest,
    ) -> Result<AggregateReport> {
        let enumeration = enumerator.enumerate(request).await?;
        let rescan = self.config.rescan.then_some((enumerator, request));
        self.drive(ctx, enumeration, rescan).await
    }

    /// Process a precomputed enumeration without rescanning.
    pub async fn run_enumeration(
        &self,
        ctx: &JobContext,
        enumeration: Enumeration,
    ) -> Result<AggregateReport> {
        self.drive(ctx, enumeration, None).await
    }

    #[instrument(
        skip_all,
        fields(
            subsystem = "jobs",
            component = "aggregator",
            op = "run",
            job_id = %ctx.job_id(),
            job_kind = %ctx.kind(),
        )
    )]
    async fn drive(
        &self,
        ctx: &JobContext,
        enumeration: Enumeration,
        mut rescan: Option<(&ItemEnumerator, &RebuildRequest)>,
    ) -> Result<AggregateReport> {
        let start = Instant::now();
        let concurrency = self.config.item_concurrency.max(1);
        let mut tracker = ProgressTracker::new(&self.config);

        let mut seen: HashSet<ItemRef> = match rescan {
            Some(_) => enumeration.items().iter().cloned().collect(),
            None => HashSet::new(),
        };

        info!(
            items = enumeration.len(),
            concurrency, "Starting item run"
        );

        tracker.grow_total(enumeration.len() as u64);
        tracker.flush(ctx).await?;
        ctx.refresh_cancel().await;

        let mut items: BoxStream<'static, ItemRef> = enumeration.into_stream();
        let mut tasks: JoinSet<ItemOutcome> = JoinSet::new();
        let mut in_flight: HashMap<task::Id, ItemRef> = HashMap::new();
        let mut exhausted = false;
        let mut cancelled = false;

        loop {
            while !exhausted && !cancelled && tasks.len() < concurrency {
                if ctx.is_cancelled() {
                    cancelled = true;
                    debug!(in_flight = tasks.len(), "Cancellation observed, draining");
                    break;
                }
                match items.next().await {
                    Some(item) => {
                        let id = self.dispatch(&mut tasks, item.clone());
                        in_flight.insert(id, item);
                    }
                    None => exhausted = true,
                }
            }

            if tasks.is_empty() {
                // Rescan only once everything enumerated so far has finished.
                let pending_rescan = if exhausted && !cancelled && !ctx.is_cancelled() {
                    rescan.take()
                } else {
                    None
                };
                let Some((enumerator, request)) = pending_rescan else {
                    break;
                };
                let extra = match enumerator.rescan(request, &seen).await {
                    Ok(extra) => extra,
                    Err(e) => {
                        if let Err(flush_err) = tracker.flush(ctx).await {
                            warn!(error = %flush_err, "Flush after rescan failure failed");
                        }
                        return Err(e);
                    }
                };
                if extra.is_empty() {
                    break;
                }
                debug!(new_items = extra.len(), "Rescan appended items");
                tracker.grow_total(extra.len() as u64);
                seen.extend(extra.items().iter().cloned());
                items = extra.into_stream();
                exhausted = false;
                continue;
            }

            tokio::select! {
                joined = tasks.join_next_with_id() => {
                    if let Some(outcome) = joined.and_then(|j| settle(j, &mut in_flight)) {
                        if let Some(reason) = outcome.failure_reason() {
                            warn!(
                                item_id = %outcome.item.id,
                                category = %outcome.item.category,
                                error = %reason,
                                "Item failed"
                            );
                        }
                        tracker.record(&outcome);
                    }
                }
                _ = sleep_until(tracker.deadline()) => {}
            }

            if tracker.due() {
                tracker.flush(ctx).await?;
                ctx.refresh_cancel().await;
            }
        }

        tracker.flush(ctx).await?;

        let status = if cancelled || ctx.is_cancelled() {
            AggregateStatus::Cancelled
        } else {
            AggregateStatus::Completed
        };
        let report = AggregateReport {
            status,
            progress: ctx.progress(),
            stats: tracker.stats,
            skipped: tracker.skipped,
            failures: tracker.failures,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            status = ?report.status,
            processed = report.progress.processed,
            total = report.progress.total,
            failed = report.stats.failed,
            skipped = report.skipped,
            duration_ms = report.duration_ms,
            "Item run finished"
        );
        Ok(report)
    }

    fn dispatch(&self, tasks: &mut JoinSet<ItemOutcome>, item: ItemRef) -> task::Id {
        let processor = self.processor.clone();
        let limit = self.item_timeout;
        trace!(item_id = %item.id, category = %item.category, "Dispatching item");

        tasks.spawn(async move {
            let call = AssertUnwindSafe(processor.process(&item)).catch_unwind();
            match tokio::time::timeout(limit, call).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => ItemOutcome::failed(item, ITEM_PANICKED),
                Err(_) => ItemOutcome::failed(item, ITEM_TIMEOUT),
            }
        })
        .id()
    }
}

/// Resolve a joined item task to its outcome. A task that died outside the
/// processor guard still counts as a failed item.
fn settle(
    joined: std::result::Result<(task::Id, ItemOutcome), JoinError>,
    in_flight: &mut HashMap<task::Id, ItemRef>,
) -> Option<ItemOutcome> {
    match joined {
        Ok((id, outcome)) => {
            in_flight.remove(&id);
            Some(outcome)
        }
        Err(e) => {
            let Some(item) = in_flight.remove(&e.id()) else {
                error!(error = %e, "Untracked item task failed");
                return None;
            };
            error!(item_id = %item.id, error = %e, "Item task aborted");
            let reason = if e.is_panic() {
                ITEM_PANICKED
            } else {
                ITEM_ABORTED
            };
            Some(ItemOutcome::failed(item, reason))
        }
    }
}
