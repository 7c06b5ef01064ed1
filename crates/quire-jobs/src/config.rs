//! Runtime configuration for item aggregation.

use std::time::Duration;

use quire_core::defaults;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Tuning for one aggregator run.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Maximum items processed concurrently within one job.
    pub item_concurrency: usize,
    /// Flush progress after this many outcomes.
    pub flush_every: usize,
    /// Flush progress at least this often.
    pub flush_interval: Duration,
    /// Maximum failed items kept in the run summary.
    pub failure_sample_max: usize,
    /// Rescan once at the end of enumeration for items created mid-run.
    pub rescan: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            item_concurrency: defaults::item_concurrency_for(parallelism),
            flush_every: defaults::PROGRESS_FLUSH_EVERY,
            flush_interval: Duration::from_millis(defaults::PROGRESS_FLUSH_INTERVAL_MS),
            failure_sample_max: defaults::FAILURE_SAMPLE_MAX,
            rescan: true,
        }
    }
}

impl AggregatorConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `QUIRE_ITEM_CONCURRENCY` | 2 x cores, in [2, 16] | Item pool size per job |
    /// | `QUIRE_PROGRESS_FLUSH_EVERY` | `10` | Outcomes per progress flush |
    /// | `QUIRE_PROGRESS_FLUSH_INTERVAL_MS` | `1000` | Max time between flushes |
    /// | `QUIRE_RESCAN` | `true` | Pick up items created during a run |
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_parse::<usize>("QUIRE_ITEM_CONCURRENCY") {
            config.item_concurrency = n.max(1);
        }
        if let Some(n) = env_parse::<usize>("QUIRE_PROGRESS_FLUSH_EVERY") {
            config.flush_every = n.max(1);
        }
        if let Some(ms) = env_parse::<u64>("QUIRE_PROGRESS_FLUSH_INTERVAL_MS") {
            config.flush_interval = Duration::from_millis(ms.max(1));
        }
        if let Ok(v) = std::env::var("QUIRE_RESCAN") {
            config.rescan = v != "false" && v != "0";
        }
        config
    }

    pub fn with_item_concurrency(mut self, n: usize) -> Self {
        self.item_concurrency = n.max(1);
        self
    }

    pub fn with_flush_every(mut self, n: usize) -> Self {
        self.flush_every = n.max(1);
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_failure_sample_max(mut self, n: usize) -> Self {
        self.failure_sample_max = n;
        self
    }

    pub fn with_rescan(mut self, rescan: bool) -> Self {
        self.rescan = rescan;
        self
    }
}

/// Per-call time limits, per job kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTimeouts {
    /// One embedding call.
    pub embed: Duration,
    /// One podcast episode generation.
    pub podcast: Duration,
    /// One source ingestion.
    pub source: Duration,
}

impl Default for ItemTimeouts {
    fn default() -> Self {
        Self {
            embed: Duration::from_secs(defaults::EMBED_TIMEOUT_SECS),
            podcast: Duration::from_secs(defaults::PODCAST_TIMEOUT_SECS),
            source: Duration::from_secs(defaults::SOURCE_TIMEOUT_SECS),
        }
    }
}

impl ItemTimeouts {
    /// Read `QUIRE_EMBED_TIMEOUT_SECS`, `QUIRE_PODCAST_TIMEOUT_SECS` and
    /// `QUIRE_SOURCE_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Self {
        let mut timeouts = Self::default();
        if let Some(secs) = env_parse::<u64>("QUIRE_EMBED_TIMEOUT_SECS") {
            timeouts.embed = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("QUIRE_PODCAST_TIMEOUT_SECS") {
            timeouts.podcast = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("QUIRE_SOURCE_TIMEOUT_SECS") {
            timeouts.source = Duration::from_secs(secs);
        }
        timeouts
    }

    pub fn with_embed(mut self, timeout: Duration) -> Self {
        self.embed = timeout;
        self
    }

    pub fn with_podcast(mut self, timeout: Duration) -> Self {
        self.podcast = timeout;
        self
    }

    pub fn with_source(mut self, timeout: Duration) -> Self {
        self.source = timeout;
        self
    }
}
