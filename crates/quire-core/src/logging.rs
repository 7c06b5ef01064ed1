//! Structured logging field names for quire.
//!
//! All crates use these constants for consistent structured logging fields so
//! log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Contract violation or lost write, requires operator attention |
//! | WARN  | Job failed, item failed or timed out |
//! | INFO  | Lifecycle events (worker start/stop, job start/finish) |
//! | DEBUG | Decision points, flushes, configuration choices |
//! | TRACE | Per-item dispatch and outcome |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "jobs", "db"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "worker", "aggregator", "enumerator", "registry", "facade"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "submit", "claim_next", "flush", "transition"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job kind enum variant.
pub const JOB_KIND: &str = "job_kind";

/// Content item identifier.
pub const ITEM_ID: &str = "item_id";

/// Content item category.
pub const CATEGORY: &str = "category";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Items processed so far.
pub const PROCESSED: &str = "processed";

/// Items expected in total.
pub const TOTAL: &str = "total";

/// Items that failed.
pub const FAILED: &str = "failed";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
