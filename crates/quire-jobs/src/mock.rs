//! Deterministic in-memory collaborators.
//!
//! Used by the test suites and the `quire-sim` binary. Behavior is driven
//! entirely by item ids configured up front, so repeated runs produce the
//! same outcomes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{RwLock, Semaphore};

use quire_core::{
    new_v7, ContentItem, ContentStore, EmbedStatus, EmbeddingProvider, EpisodeArtifact, Error,
    ItemCategory, ItemRef, PodcastEpisodeArgs, PodcastGenerator, ProcessSourceArgs, Result,
    SourceIngestor, SourceProcessed,
};

fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_767_225_600, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[derive(Default)]
struct StoreState {
    items: Vec<ContentItem>,
    next_index: HashMap<ItemCategory, u64>,
}

/// Content store holding items in memory.
///
/// Seeded ids read `"<category>:<n>"` with `n` continuing per category;
/// `created_at` increases by one second per seeded item across categories.
pub struct MockContentStore {
    state: RwLock<StoreState>,
    clock: AtomicI64,
    fail_listing: AtomicBool,
}

impl Default for MockContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockContentStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            clock: AtomicI64::new(0),
            fail_listing: AtomicBool::new(false),
        }
    }

    /// Append `count` items of `category`. Returns their references.
    pub async fn seed(&self, category: ItemCategory, count: u64, embedded: bool) -> Vec<ItemRef> {
        let mut state = self.state.write().await;
        let mut refs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let index = state.next_index.entry(category).or_insert(0);
            *index += 1;
            let id = format!("{}:{}", category, index);
            let tick = self.clock.fetch_add(1, Ordering::SeqCst);
            let item = ContentItem {
                id,
                category,
                created_at: epoch() + chrono::Duration::seconds(tick),
                has_embedding: embedded,
            };
            refs.push(item.item_ref());
            state.items.push(item);
        }
        refs
    }

    /// Insert an item verbatim. Duplicates are kept.
    pub async fn add_item(&self, item: ContentItem) {
        self.state.write().await.items.push(item);
    }

    /// Make every listing fail with a store error.
    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.items.is_empty()
    }
}

#[async_trait]
impl ContentStore for MockContentStore {
    async fn list_items(
        &self,
        category: ItemCategory,
        embedded_only: bool,
    ) -> Result<Vec<ContentItem>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::Store(format!("listing {} failed", category)));
        }
        Ok(self
            .state
            .read()
            .await
            .items
            .iter()
            .filter(|i| i.category == category && (!embedded_only || i.has_embedding))
            .cloned()
            .collect())
    }

    async fn get_item(&self, item: &ItemRef) -> Result<Option<ContentItem>> {
        Ok(self
            .state
            .read()
            .await
            .items
            .iter()
            .find(|i| i.id == item.id && i.category == item.category)
            .cloned())
    }
}

fn id_set<I, S>(ids: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ids.into_iter().map(Into::into).collect()
}

/// Embedding provider with scripted per-item behavior.
#[derive(Default)]
pub struct MockEmbedder {
    failing: HashSet<String>,
    up_to_date: HashSet<String>,
    panicking: HashSet<String>,
    latency: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items whose embedding call returns a provider error.
    pub fn with_failing<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(id_set(ids));
        self
    }

    /// Items reported as already current unless the call is forced.
    pub fn with_up_to_date<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.up_to_date.extend(id_set(ids));
        self
    }

    /// Items whose embedding call panics.
    pub fn with_panicking<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.panicking.extend(id_set(ids));
        self
    }

    /// Delay every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every call waits for a permit on `gate` before doing anything else.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Number of calls started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, item: &ItemRef, force: bool) -> Result<EmbedStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            // A closed gate lets everything through.
            let _permit = gate.acquire().await.ok();
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.panicking.contains(&item.id) {
            panic!("embedding backend crashed on {}", item.id);
        }
        if self.failing.contains(&item.id) {
            return Err(Error::Provider(format!("embedding rejected {}", item.id)));
        }
        if !force && self.up_to_date.contains(&item.id) {
            return Ok(EmbedStatus::AlreadyUpToDate);
        }
        Ok(EmbedStatus::Embedded)
    }
}

fn slugify(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    slug.split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Podcast generator that writes nothing and returns predictable paths.
#[derive(Default)]
pub struct MockPodcastGenerator {
    latency: Option<Duration>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MockPodcastGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail every generation with `message`.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PodcastGenerator for MockPodcastGenerator {
    async fn generate(&self, args: &PodcastEpisodeArgs) -> Result<EpisodeArtifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(message) = &self.failure {
            return Err(Error::Provider(message.clone()));
        }
        let dir = format!("/data/podcasts/episodes/{}", slugify(&args.episode_name));
        Ok(EpisodeArtifact {
            episode_id: new_v7().to_string(),
            episode_name: args.episode_name.clone(),
            audio_path: format!("{}/audio.mp3", dir),
            transcript_path: Some(format!("{}/transcript.json", dir)),
        })
    }
}

/// Source ingestor reporting a fixed chunk count.
pub struct MockSourceIngestor {
    chunks: u64,
    failing: HashSet<String>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl Default for MockSourceIngestor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSourceIngestor {
    pub fn new() -> Self {
        Self {
            chunks: 4,
            failing: HashSet::new(),
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_chunks(mut self, chunks: u64) -> Self {
        self.chunks = chunks;
        self
    }

    /// Sources whose ingestion fails.
    pub fn with_failing<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(id_set(ids));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceIngestor for MockSourceIngestor {
    async fn ingest(&self, args: &ProcessSourceArgs) -> Result<SourceProcessed> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.contains(&args.source_id) {
            return Err(Error::Provider(format!(
                "could not extract content from {}",
                args.source_id
            )));
        }
        Ok(SourceProcessed {
            source_id: args.source_id.clone(),
            chunks: self.chunks,
            insights_created: args.transformations.len() as u64,
            embedded: false,
        })
    }
}
