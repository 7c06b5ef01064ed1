//! Centralized default constants for quire.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// LISTING
// =============================================================================

/// Default page size when a caller passes `limit = 0`.
pub const LIST_LIMIT: i64 = 50;

/// Upper bound for a single job listing. Larger limits are clamped.
pub const MAX_LIST_LIMIT: i64 = 1000;

// =============================================================================
// WORKER
// =============================================================================

/// Safety-net poll interval in milliseconds.
///
/// Submissions wake the worker directly; polling only covers jobs queued by
/// another process sharing the same registry.
pub const JOB_POLL_INTERVAL_MS: u64 = 5_000;

/// Default maximum concurrent jobs per worker.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Worker event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// AGGREGATOR
// =============================================================================

/// Lower bound for the per-job item pool.
pub const ITEM_CONCURRENCY_MIN: usize = 2;

/// Upper bound for the per-job item pool.
pub const ITEM_CONCURRENCY_MAX: usize = 16;

/// Pool size multiplier applied to available parallelism.
pub const ITEM_CONCURRENCY_FACTOR: usize = 2;

/// Flush progress to the registry after this many outcomes.
pub const PROGRESS_FLUSH_EVERY: usize = 10;

/// Flush progress to the registry at least this often (milliseconds).
pub const PROGRESS_FLUSH_INTERVAL_MS: u64 = 1_000;

/// Maximum failed items kept as a sample in a rebuild summary.
pub const FAILURE_SAMPLE_MAX: usize = 20;

// =============================================================================
// TIMEOUTS
// =============================================================================

/// Per-item timeout for embedding calls in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Timeout for one podcast episode generation in seconds (audio synthesis is slow).
pub const PODCAST_TIMEOUT_SECS: u64 = 1_800;

/// Timeout for processing one new source in seconds.
pub const SOURCE_TIMEOUT_SECS: u64 = 300;

/// Compute the default item pool size for a given parallelism.
pub fn item_concurrency_for(parallelism: usize) -> usize {
    (parallelism * ITEM_CONCURRENCY_FACTOR).clamp(ITEM_CONCURRENCY_MIN, ITEM_CONCURRENCY_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_limits_ordering() {
        assert!(LIST_LIMIT > 0);
        assert!(LIST_LIMIT <= MAX_LIST_LIMIT);
    }

    #[test]
    fn test_item_concurrency_clamped() {
        assert_eq!(item_concurrency_for(0), ITEM_CONCURRENCY_MIN);
        assert_eq!(item_concurrency_for(1), 2);
        assert_eq!(item_concurrency_for(4), 8);
        assert_eq!(item_concurrency_for(64), ITEM_CONCURRENCY_MAX);
    }

    #[test]
    fn test_timeouts_nonzero() {
        assert!(EMBED_TIMEOUT_SECS > 0);
        assert!(PODCAST_TIMEOUT_SECS > EMBED_TIMEOUT_SECS);
        assert!(SOURCE_TIMEOUT_SECS > 0);
    }
}
