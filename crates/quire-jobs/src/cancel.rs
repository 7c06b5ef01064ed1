//! Cooperative cancellation signals for running jobs.
//!
//! The registry's `cancel_requested` column is the durable record; the flags
//! here are the in-process fast path the aggregator checks before every
//! dispatch without touching the registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Cancellation flag shared between the worker, the facade, and a job run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the flag (hot path, lock-free).
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Flags for every job currently executing in this process.
#[derive(Debug, Clone, Default)]
pub struct CancelSignals {
    flags: Arc<RwLock<HashMap<Uuid, CancelFlag>>>,
}

impl CancelSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or return the existing) flag for a job about to run.
    pub async fn register(&self, job_id: Uuid) -> CancelFlag {
        let mut flags = self.flags.write().await;
        flags.entry(job_id).or_default().clone()
    }

    /// Raise the flag for `job_id`. Returns false when the job is not running
    /// in this process.
    pub async fn signal(&self, job_id: Uuid) -> bool {
        match self.flags.read().await.get(&job_id) {
            Some(flag) => {
                flag.cancel();
                debug!(
                    subsystem = "jobs",
                    component = "cancel",
                    job_id = %job_id,
                    "Cancellation signalled"
                );
                true
            }
            None => false,
        }
    }

    /// Drop the flag once the job has finished.
    pub async fn release(&self, job_id: Uuid) {
        self.flags.write().await.remove(&job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_starts_clear() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
    }

    #[tokio::test]
    async fn test_signal_reaches_registered_flag() {
        let signals = CancelSignals::new();
        let job_id = Uuid::now_v7();
        let flag = signals.register(job_id).await;

        assert!(signals.signal(job_id).await);
        assert!(flag.is_cancelled());
    }

    #[tokio::test]
    async fn test_signal_unknown_job() {
        let signals = CancelSignals::new();
        assert!(!signals.signal(Uuid::now_v7()).await);
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let signals = CancelSignals::new();
        let job_id = Uuid::now_v7();
        let a = signals.register(job_id).await;
        let b = signals.register(job_id).await;
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[tokio::test]
    async fn test_release_removes_flag() {
        let signals = CancelSignals::new();
        let job_id = Uuid::now_v7();
        signals.register(job_id).await;
        signals.release(job_id).await;
        assert!(!signals.signal(job_id).await);
    }
}
