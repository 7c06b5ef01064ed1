//! # quire-jobs
//!
//! Background job engine for quire.
//!
//! This crate provides:
//! - A command facade that queues jobs and returns immediately
//! - A worker that claims queued jobs and runs them concurrently
//! - An aggregator that fans bulk jobs out over items with bounded concurrency
//! - Durable progress, stats and cooperative cancellation through the registry
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quire_jobs::{CommandFacade, MemoryJobRegistry, WorkerBuilder, WorkerConfig};
//! use quire_core::{RebuildMode, RebuildRequest};
//!
//! let registry = Arc::new(MemoryJobRegistry::new());
//! let handle = WorkerBuilder::new(registry.clone())
//!     .with_config(WorkerConfig::from_env())
//!     .with_notify(registry.job_notify())
//!     .with_providers(providers, AggregatorConfig::from_env(), ItemTimeouts::from_env())
//!     .build()
//!     .start();
//!
//! let facade = CommandFacade::new(registry, handle.backend());
//! let submission = facade
//!     .submit_rebuild(RebuildRequest::new(RebuildMode::Existing))
//!     .await?;
//! let snapshot = facade.get_status(&submission.job_id.to_string()).await?;
//!
//! handle.shutdown().await?;
//! ```

pub mod aggregator;
pub mod cancel;
pub mod config;
pub mod enumerator;
pub mod facade;
pub mod handler;
pub mod handlers;
pub mod mock;
pub mod processor;
pub mod registry;
pub mod status;
pub mod worker;

// Re-export core types
pub use quire_core::*;

pub use aggregator::{AggregateReport, AggregateStatus, JobAggregator};
pub use cancel::{CancelFlag, CancelSignals};
pub use config::{AggregatorConfig, ItemTimeouts};
pub use enumerator::{Enumeration, ItemEnumerator};
pub use facade::{CommandFacade, RebuildSubmission};
pub use handler::{JobContext, JobHandler, JobResult};
pub use handlers::{
    EmbedSingleItemHandler, GeneratePodcastEpisodeHandler, ProcessSourceHandler, Providers,
    RebuildEmbeddingsHandler,
};
pub use processor::{EmbeddingProcessor, ItemProcessor};
pub use registry::MemoryJobRegistry;
pub use status::StatusService;
pub use worker::{BackendState, JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};

/// Default polling interval for job processing (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = quire_core::defaults::JOB_POLL_INTERVAL_MS;
