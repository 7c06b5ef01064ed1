//! Core data models for quire jobs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};
use crate::uuid_utils::new_v7;

// =============================================================================
// JOB STATUS
// =============================================================================

/// Status of a job in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether `self -> next` is an edge of the job state machine.
    ///
    /// ```text
    /// queued ──► running ──► completed
    ///    │          ├──────► failed
    ///    │          └──────► cancelled
    ///    └─────────────────► cancelled
    /// ```
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Cancelled)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Cancelled)
        )
    }

    /// States from which `target` may be entered.
    pub fn predecessors(target: JobStatus) -> &'static [JobStatus] {
        match target {
            JobStatus::Queued => &[],
            JobStatus::Running => &[JobStatus::Queued],
            JobStatus::Completed | JobStatus::Failed => &[JobStatus::Running],
            JobStatus::Cancelled => &[JobStatus::Queued, JobStatus::Running],
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::InvalidArguments(format!("unknown job status: {}", s)))
    }
}

// =============================================================================
// CONTENT ITEMS
// =============================================================================

/// Category of a content item subject to per-item processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Source,
    Note,
    Insight,
}

impl ItemCategory {
    /// Enumeration order for bulk jobs.
    pub const ALL: [ItemCategory; 3] = [
        ItemCategory::Source,
        ItemCategory::Note,
        ItemCategory::Insight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Source => "source",
            ItemCategory::Note => "note",
            ItemCategory::Insight => "insight",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ItemCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidArguments(format!("unknown item type: {}", s)))
    }
}

/// Reference to one content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: String,
    pub category: ItemCategory,
}

impl ItemRef {
    pub fn new(id: impl Into<String>, category: ItemCategory) -> Self {
        Self {
            id: id.into(),
            category,
        }
    }
}

/// Content item as reported by the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub category: ItemCategory,
    pub created_at: DateTime<Utc>,
    /// Whether the item already carries embedding state.
    pub has_embedding: bool,
}

impl ContentItem {
    pub fn item_ref(&self) -> ItemRef {
        ItemRef::new(self.id.clone(), self.category)
    }
}

/// Result of processing one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum ItemResult {
    Success,
    SkippedAlreadyUpToDate,
    Failed(String),
}

/// Per-item outcome folded into job stats. Never persisted individually.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub item: ItemRef,
    pub result: ItemResult,
}

impl ItemOutcome {
    pub fn success(item: ItemRef) -> Self {
        Self {
            item,
            result: ItemResult::Success,
        }
    }

    pub fn skipped(item: ItemRef) -> Self {
        Self {
            item,
            result: ItemResult::SkippedAlreadyUpToDate,
        }
    }

    pub fn failed(item: ItemRef, reason: impl Into<String>) -> Self {
        Self {
            item,
            result: ItemResult::Failed(reason.into()),
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.result {
            ItemResult::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

// =============================================================================
// JOB KINDS AND ARGUMENTS
// =============================================================================

/// Closed set of job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Embed one source, note, or insight
    EmbedSingleItem,
    /// Re-embed a selection of the corpus
    RebuildEmbeddings,
    /// Generate a podcast episode (transcript + audio)
    GeneratePodcastEpisode,
    /// Ingest a newly added source
    ProcessSource,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::EmbedSingleItem,
        JobKind::RebuildEmbeddings,
        JobKind::GeneratePodcastEpisode,
        JobKind::ProcessSource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::EmbedSingleItem => "embed_single_item",
            JobKind::RebuildEmbeddings => "rebuild_embeddings",
            JobKind::GeneratePodcastEpisode => "generate_podcast_episode",
            JobKind::ProcessSource => "process_source",
        }
    }

    /// Kinds that fan out over content items and report category stats.
    pub fn tracks_items(&self) -> bool {
        matches!(self, JobKind::EmbedSingleItem | JobKind::RebuildEmbeddings)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnknownJobKind(s.to_string()))
    }
}

fn default_true() -> bool {
    true
}

/// Arguments for `embed_single_item`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedItemArgs {
    pub item_id: String,
    pub item_type: ItemCategory,
    /// Recorded for the caller; submission is always non-blocking.
    #[serde(default)]
    pub async_processing: bool,
}

/// Which items a rebuild revisits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildMode {
    /// Only items that already carry an embedding
    Existing,
    /// Every item in the included categories
    All,
}

/// Arguments for `rebuild_embeddings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildRequest {
    pub mode: RebuildMode,
    #[serde(default = "default_true")]
    pub include_sources: bool,
    #[serde(default = "default_true")]
    pub include_notes: bool,
    #[serde(default = "default_true")]
    pub include_insights: bool,
}

impl RebuildRequest {
    /// Request covering every category.
    pub fn new(mode: RebuildMode) -> Self {
        Self {
            mode,
            include_sources: true,
            include_notes: true,
            include_insights: true,
        }
    }

    pub fn with_sources(mut self, include: bool) -> Self {
        self.include_sources = include;
        self
    }

    pub fn with_notes(mut self, include: bool) -> Self {
        self.include_notes = include;
        self
    }

    pub fn with_insights(mut self, include: bool) -> Self {
        self.include_insights = include;
        self
    }

    pub fn includes(&self, category: ItemCategory) -> bool {
        match category {
            ItemCategory::Source => self.include_sources,
            ItemCategory::Note => self.include_notes,
            ItemCategory::Insight => self.include_insights,
        }
    }

    /// Selected categories in enumeration order.
    pub fn categories(&self) -> Vec<ItemCategory> {
        ItemCategory::ALL
            .into_iter()
            .filter(|c| self.includes(*c))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.categories().is_empty() {
            return Err(Error::InvalidArguments(
                "rebuild must include at least one of sources, notes, insights".to_string(),
            ));
        }
        Ok(())
    }
}

/// Arguments for `generate_podcast_episode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodcastEpisodeArgs {
    pub episode_config_id: String,
    pub source_text: String,
    pub episode_name: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Arguments for `process_source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSourceArgs {
    pub source_id: String,
    #[serde(default)]
    pub notebook_ids: Vec<String>,
    #[serde(default)]
    pub transformations: Vec<String>,
    /// Embed the source once ingested.
    #[serde(default = "default_true")]
    pub embed: bool,
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArguments(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Typed arguments, one variant per job kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "args", rename_all = "snake_case")]
pub enum JobArgs {
    EmbedSingleItem(EmbedItemArgs),
    RebuildEmbeddings(RebuildRequest),
    GeneratePodcastEpisode(PodcastEpisodeArgs),
    ProcessSource(ProcessSourceArgs),
}

impl JobArgs {
    pub fn kind(&self) -> JobKind {
        match self {
            JobArgs::EmbedSingleItem(_) => JobKind::EmbedSingleItem,
            JobArgs::RebuildEmbeddings(_) => JobKind::RebuildEmbeddings,
            JobArgs::GeneratePodcastEpisode(_) => JobKind::GeneratePodcastEpisode,
            JobArgs::ProcessSource(_) => JobKind::ProcessSource,
        }
    }

    /// Semantic validation beyond what deserialization checks.
    pub fn validate(&self) -> Result<()> {
        match self {
            JobArgs::EmbedSingleItem(args) => require("item_id", &args.item_id),
            JobArgs::RebuildEmbeddings(request) => request.validate(),
            JobArgs::GeneratePodcastEpisode(args) => {
                require("episode_config_id", &args.episode_config_id)?;
                require("episode_name", &args.episode_name)?;
                require("source_text", &args.source_text)
            }
            JobArgs::ProcessSource(args) => require("source_id", &args.source_id),
        }
    }

    /// Build typed arguments from an untyped `(kind, payload)` pair.
    ///
    /// Unknown kinds yield `UnknownJobKind`; payloads that do not match the
    /// kind's schema or fail validation yield `InvalidArguments`.
    pub fn from_raw(kind: &str, payload: JsonValue) -> Result<Self> {
        let kind: JobKind = kind.parse()?;
        let invalid = |e: serde_json::Error| Error::InvalidArguments(e.to_string());
        let args = match kind {
            JobKind::EmbedSingleItem => {
                JobArgs::EmbedSingleItem(serde_json::from_value(payload).map_err(invalid)?)
            }
            JobKind::RebuildEmbeddings => {
                JobArgs::RebuildEmbeddings(serde_json::from_value(payload).map_err(invalid)?)
            }
            JobKind::GeneratePodcastEpisode => {
                JobArgs::GeneratePodcastEpisode(serde_json::from_value(payload).map_err(invalid)?)
            }
            JobKind::ProcessSource => {
                JobArgs::ProcessSource(serde_json::from_value(payload).map_err(invalid)?)
            }
        };
        args.validate()?;
        Ok(args)
    }
}

// =============================================================================
// PROGRESS AND STATS
// =============================================================================

/// Item progress of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub processed: u64,
    pub total: u64,
}

impl Progress {
    /// Percentage in `[0, 100]`, rounded to two decimals. Zero when total is zero.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let pct = (self.processed as f64 / self.total as f64 * 100.0).clamp(0.0, 100.0);
        (pct * 100.0).round() / 100.0
    }
}

/// Per-category counters plus failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub sources: u64,
    pub notes: u64,
    pub insights: u64,
    pub failed: u64,
}

impl Stats {
    /// Sum of every counter, failures included.
    pub fn accounted(&self) -> u64 {
        self.sources + self.notes + self.insights + self.failed
    }

    pub fn record_success(&mut self, category: ItemCategory) {
        match category {
            ItemCategory::Source => self.sources += 1,
            ItemCategory::Note => self.notes += 1,
            ItemCategory::Insight => self.insights += 1,
        }
    }

    pub fn add(&mut self, other: &Stats) {
        self.sources += other.sources;
        self.notes += other.notes;
        self.insights += other.insights;
        self.failed += other.failed;
    }
}

/// Incremental progress write. Applied atomically by the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressDelta {
    pub processed: u64,
    pub total: u64,
    pub stats: Stats,
}

impl ProgressDelta {
    /// Delta that only raises `total`.
    pub fn grow_total(n: u64) -> Self {
        Self {
            total: n,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold one outcome into the delta.
    pub fn record(&mut self, outcome: &ItemOutcome) {
        self.processed += 1;
        match &outcome.result {
            ItemResult::Success => self.stats.record_success(outcome.item.category),
            ItemResult::Failed(_) => self.stats.failed += 1,
            ItemResult::SkippedAlreadyUpToDate => {}
        }
    }

    pub fn merge(&mut self, other: &ProgressDelta) {
        self.processed += other.processed;
        self.total += other.total;
        self.stats.add(&other.stats);
    }
}

// =============================================================================
// JOB OUTPUTS
// =============================================================================

/// One failed item kept in a rebuild summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_id: String,
    pub category: ItemCategory,
    pub reason: String,
}

/// Result of a rebuild run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildSummary {
    pub processed: u64,
    pub total: u64,
    pub stats: Stats,
    pub duration_ms: u64,
    /// Bounded sample of failed items.
    #[serde(default)]
    pub failures: Vec<ItemFailure>,
}

/// What a provider did with one embedding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedStatus {
    Embedded,
    AlreadyUpToDate,
}

/// Result of a single-item embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedItemSummary {
    pub item_id: String,
    pub category: ItemCategory,
    pub outcome: EmbedStatus,
}

/// Artifact produced by podcast generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeArtifact {
    pub episode_id: String,
    pub episode_name: String,
    pub audio_path: String,
    #[serde(default)]
    pub transcript_path: Option<String>,
}

/// Result of processing a new source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProcessed {
    pub source_id: String,
    pub chunks: u64,
    pub insights_created: u64,
    pub embedded: bool,
}

/// Typed per-kind job result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobOutput {
    Rebuild(RebuildSummary),
    EmbedItem(EmbedItemSummary),
    PodcastEpisode(EpisodeArtifact),
    SourceProcessed(SourceProcessed),
}

// =============================================================================
// JOB
// =============================================================================

/// Detail attached to a status transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionDetail {
    pub result: Option<JobOutput>,
    pub error_message: Option<String>,
}

impl TransitionDetail {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_result(result: Option<JobOutput>) -> Self {
        Self {
            result,
            error_message: None,
        }
    }

    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error_message: Some(message.into()),
        }
    }

    /// Error message to store for a Failed job; never empty.
    pub fn failure_message(&self) -> String {
        match self.error_message.as_deref().map(str::trim) {
            Some(msg) if !msg.is_empty() => msg.to_string(),
            _ => "job failed without an error message".to_string(),
        }
    }
}

/// A job tracked by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub args: JobArgs,
    pub result: Option<JobOutput>,
    pub error_message: Option<String>,
    pub progress: Progress,
    pub stats: Stats,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// New queued job with a fresh UUIDv7 id.
    pub fn new(args: JobArgs) -> Self {
        let now = Utc::now();
        Self {
            id: new_v7(),
            kind: args.kind(),
            status: JobStatus::Queued,
            args,
            result: None,
            error_message: None,
            progress: Progress::default(),
            stats: Stats::default(),
            cancel_requested: false,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Move to `to`, enforcing the state machine.
    pub fn transition(&mut self, to: JobStatus, detail: TransitionDetail) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                job_id: self.id,
                from: self.status,
                to,
            });
        }
        let now = Utc::now();
        match to {
            JobStatus::Running => self.started_at = Some(now),
            JobStatus::Completed => {
                self.result = detail.result;
                self.completed_at = Some(now);
            }
            JobStatus::Failed => {
                self.error_message = Some(detail.failure_message());
                self.result = detail.result;
                self.completed_at = Some(now);
            }
            JobStatus::Cancelled => {
                self.error_message = detail.error_message;
                self.result = detail.result;
                self.completed_at = Some(now);
            }
            JobStatus::Queued => {}
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Apply a progress delta, keeping `processed <= total`.
    pub fn apply_delta(&mut self, delta: &ProgressDelta) -> Result<()> {
        if self.status != JobStatus::Running {
            return Err(Error::Job(format!(
                "progress update for job {} in state {}",
                self.id, self.status
            )));
        }
        let processed = self.progress.processed + delta.processed;
        let total = self.progress.total + delta.total;
        if processed > total {
            return Err(Error::Job(format!(
                "progress update for job {} would exceed total ({} > {})",
                self.id, processed, total
            )));
        }
        self.progress = Progress { processed, total };
        self.stats.add(&delta.stats);
        self.updated_at = Utc::now();
        Ok(())
    }
}

// =============================================================================
// LISTING
// =============================================================================

/// Listing filter. Every populated field must match (AND).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
    pub kind: Option<JobKind>,
    pub status: Option<JobStatus>,
    pub created_after: Option<DateTime<Utc>>,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: JobKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_created_after(mut self, ts: DateTime<Utc>) -> Self {
        self.created_after = Some(ts);
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        self.kind.map_or(true, |k| job.kind == k)
            && self.status.map_or(true, |s| job.status == s)
            && self.created_after.map_or(true, |ts| job.created_at > ts)
    }
}

/// Resolve a caller-supplied listing limit: `<= 0` means default, anything
/// above [`defaults::MAX_LIST_LIMIT`] is clamped.
pub fn effective_list_limit(limit: i64) -> i64 {
    if limit <= 0 {
        defaults::LIST_LIMIT
    } else {
        limit.min(defaults::MAX_LIST_LIMIT)
    }
}

/// Outcome of a cancellation request at the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Job had not started; it is now Cancelled.
    CancelledQueued,
    /// Job is running; the cancel flag is set for the aggregator to observe.
    Signalled,
    /// Job already reached a terminal state.
    AlreadyTerminal,
}

impl CancelOutcome {
    pub fn accepted(&self) -> bool {
        !matches!(self, CancelOutcome::AlreadyTerminal)
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Progress as exposed to callers, percentage computed on read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressView {
    pub processed: u64,
    pub total: u64,
    pub percentage: f64,
}

/// Point-in-time view of a job returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub job_kind: JobKind,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
