//! Job worker: claims queued jobs and runs them through their handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, Mutex, Notify};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use quire_core::{Error, Job, JobKind, JobRegistry, JobStatus, Result, TransitionDetail};

use crate::cancel::CancelSignals;
use crate::config::{AggregatorConfig, ItemTimeouts};
use crate::handler::{JobContext, JobHandler, JobResult};
use crate::handlers::{
    EmbedSingleItemHandler, GeneratePodcastEpisodeHandler, ProcessSourceHandler, Providers,
    RebuildEmbeddingsHandler,
};
use crate::DEFAULT_POLL_INTERVAL_MS;

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent jobs.
    pub max_concurrent_jobs: usize,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_concurrent_jobs: quire_core::defaults::JOB_MAX_CONCURRENT,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `QUIRE_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `QUIRE_MAX_CONCURRENT_JOBS` | `4` | Max concurrent jobs |
    /// | `QUIRE_POLL_INTERVAL_MS` | `5000` | Safety-net poll when no wake-up arrives |
    pub fn from_env() -> Self {
        let enabled = std::env::var("QUIRE_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("QUIRE_MAX_CONCURRENT_JOBS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(quire_core::defaults::JOB_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("QUIRE_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);

        Self {
            poll_interval_ms,
            max_concurrent_jobs,
            enabled,
        }
    }

    /// Create a new config with custom poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set maximum concurrent jobs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the job worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A job was started.
    JobStarted { job_id: Uuid, kind: JobKind },
    /// Job progress was committed.
    JobProgress {
        job_id: Uuid,
        processed: u64,
        total: u64,
    },
    /// A job completed successfully.
    JobCompleted { job_id: Uuid, kind: JobKind },
    /// A job failed.
    JobFailed {
        job_id: Uuid,
        kind: JobKind,
        error: String,
    },
    /// A job stopped on request.
    JobCancelled { job_id: Uuid, kind: JobKind },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// What the submission side needs to know about the execution backend.
#[derive(Clone)]
pub struct BackendState {
    accepting: Arc<AtomicBool>,
    kinds: Arc<Vec<JobKind>>,
    signals: CancelSignals,
    notify: Arc<Notify>,
}

impl BackendState {
    fn new(kinds: Vec<JobKind>, signals: CancelSignals, notify: Arc<Notify>) -> Self {
        Self {
            accepting: Arc::new(AtomicBool::new(false)),
            kinds: Arc::new(kinds),
            signals,
            notify,
        }
    }

    /// True while a started worker is running and not shutting down.
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// True when a handler is registered for `kind`.
    pub fn handles(&self, kind: JobKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn kinds(&self) -> &[JobKind] {
        &self.kinds
    }

    pub fn signals(&self) -> &CancelSignals {
        &self.signals
    }

    /// Wake the worker loop without waiting for the next poll.
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    state: BackendState,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerHandle {
    /// Stop accepting work, let running jobs finish, and wait for the worker
    /// loop to exit. Queued jobs stay queued.
    pub async fn shutdown(&self) -> Result<()> {
        self.state.set_accepting(false);
        let join = self.join.lock().await.take();
        let Some(join) = join else {
            return Ok(());
        };
        // A disabled worker has already exited and dropped its receiver.
        let _ = self.shutdown_tx.send(()).await;
        join.await
            .map_err(|e| Error::Internal(format!("worker task failed: {}", e)))
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }

    pub fn backend(&self) -> BackendState {
        self.state.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.join
            .lock()
            .await
            .as_ref()
            .map(|j| !j.is_finished())
            .unwrap_or(false)
    }
}

/// Job worker that processes jobs from the registry.
pub struct JobWorker {
    registry: Arc<dyn JobRegistry>,
    config: WorkerConfig,
    handlers: Arc<HashMap<JobKind, Arc<dyn JobHandler>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
    state: BackendState,
}

impl JobWorker {
    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();
        let state = self.state.clone();

        if self.config.enabled {
            state.set_accepting(true);
        }

        let join = tokio::spawn(async move {
            self.run(shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
            state,
            join: Mutex::new(Some(join)),
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    pub fn backend(&self) -> BackendState {
        self.state.clone()
    }

    /// Claim jobs while below `max_concurrent_jobs`, then wait for a slot, a
    /// submission wake-up, or the poll interval.
    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "worker"))]
    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Job worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent_jobs,
            kinds = ?self.state.kinds(),
            "Job worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let max_concurrent = self.config.max_concurrent_jobs.max(1);
        let mut tasks = JoinSet::new();

        loop {
            while tasks.len() < max_concurrent {
                match self.claim_job().await {
                    Some(job) => {
                        let worker = self.clone_refs();
                        tasks.spawn(worker.execute_job(job));
                    }
                    None => break,
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(in_flight = tasks.len(), "Job worker received shutdown signal");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = ?e, "Job task panicked");
                    }
                }
                _ = self.state.notify.notified() => {
                    debug!("Woken by submission");
                }
                _ = sleep(poll_interval) => {}
            }
        }

        self.state.set_accepting(false);
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = ?e, "Job task panicked");
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Job worker stopped");
    }

    /// Claim the next available job without processing it.
    async fn claim_job(&self) -> Option<Job> {
        match self.registry.claim_next(self.state.kinds()).await {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "Failed to claim job");
                None
            }
        }
    }

    /// Clone references needed for spawned job tasks.
    fn clone_refs(&self) -> JobWorkerRef {
        JobWorkerRef {
            registry: self.registry.clone(),
            handlers: self.handlers.clone(),
            event_tx: self.event_tx.clone(),
            signals: self.state.signals.clone(),
        }
    }
}

/// Lightweight reference bundle for executing a single job in a spawned task.
struct JobWorkerRef {
    registry: Arc<dyn JobRegistry>,
    handlers: Arc<HashMap<JobKind, Arc<dyn JobHandler>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
    signals: CancelSignals,
}

impl JobWorkerRef {
    /// Execute a single claimed job and record its terminal state.
    async fn execute_job(self, job: Job) {
        let start = Instant::now();
        let job_id = job.id;
        let kind = job.kind;

        info!(
            subsystem = "jobs",
            component = "worker",
            op = "execute",
            job_id = %job_id,
            job_kind = %kind,
            "Processing job"
        );
        let _ = self.event_tx.send(WorkerEvent::JobStarted { job_id, kind });

        let flag = self.signals.register(job_id).await;
        if job.cancel_requested {
            flag.cancel();
        }

        let result = match self.handlers.get(&kind).cloned() {
            Some(handler) => {
                let event_tx = self.event_tx.clone();
                let ctx = JobContext::new(job, self.registry.clone())
                    .with_cancel_flag(flag)
                    .with_progress_callback(move |progress| {
                        let _ = event_tx.send(WorkerEvent::JobProgress {
                            job_id,
                            processed: progress.processed,
                            total: progress.total,
                        });
                    });

                match tokio::spawn(async move { handler.execute(ctx).await }).await {
                    Ok(result) => result,
                    Err(e) if e.is_panic() => {
                        error!(job_id = %job_id, job_kind = %kind, "Job handler panicked");
                        JobResult::Failed("handler panicked".to_string())
                    }
                    Err(e) => JobResult::Failed(format!("handler task aborted: {}", e)),
                }
            }
            None => {
                warn!(job_kind = %kind, "No handler registered for job kind");
                JobResult::Failed(format!("no handler registered for {}", kind))
            }
        };

        self.signals.release(job_id).await;
        self.finish(job_id, kind, result, start).await;
    }

    async fn finish(&self, job_id: Uuid, kind: JobKind, result: JobResult, start: Instant) {
        let (status, detail) = match result {
            JobResult::Success(output) => (JobStatus::Completed, TransitionDetail::with_result(output)),
            JobResult::Failed(message) => (JobStatus::Failed, TransitionDetail::with_error(message)),
            JobResult::Cancelled(output) => {
                (JobStatus::Cancelled, TransitionDetail::with_result(output))
            }
        };
        let error_message = detail.failure_message();
        let duration_ms = start.elapsed().as_millis() as u64;

        match self.registry.transition(job_id, status, detail).await {
            Ok(_) => match status {
                JobStatus::Completed => {
                    info!(job_id = %job_id, job_kind = %kind, duration_ms, "Job completed successfully");
                    let _ = self.event_tx.send(WorkerEvent::JobCompleted { job_id, kind });
                }
                JobStatus::Cancelled => {
                    info!(job_id = %job_id, job_kind = %kind, duration_ms, "Job cancelled");
                    let _ = self.event_tx.send(WorkerEvent::JobCancelled { job_id, kind });
                }
                _ => {
                    warn!(
                        job_id = %job_id,
                        job_kind = %kind,
                        error = %error_message,
                        duration_ms,
                        "Job failed"
                    );
                    let _ = self.event_tx.send(WorkerEvent::JobFailed {
                        job_id,
                        kind,
                        error: error_message,
                    });
                }
            },
            Err(e @ Error::InvalidTransition { .. }) => {
                error!(job_id = %job_id, job_kind = %kind, error = %e, "Terminal transition rejected");
            }
            Err(e) => {
                error!(job_id = %job_id, job_kind = %kind, error = %e, "Failed to record terminal state");
            }
        }
    }
}

/// Builder for creating a job worker with handlers.
pub struct WorkerBuilder {
    registry: Arc<dyn JobRegistry>,
    config: WorkerConfig,
    handlers: Vec<Arc<dyn JobHandler>>,
    notify: Arc<Notify>,
    signals: CancelSignals,
}

impl WorkerBuilder {
    /// Create a new worker builder.
    pub fn new(registry: Arc<dyn JobRegistry>) -> Self {
        Self {
            registry,
            config: WorkerConfig::default(),
            handlers: Vec::new(),
            notify: Arc::new(Notify::new()),
            signals: CancelSignals::new(),
        }
    }

    /// Set the worker configuration.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a handler. A later handler for the same kind replaces an earlier one.
    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Register the handlers for every supported kind.
    pub fn with_providers(
        self,
        providers: Providers,
        aggregator: AggregatorConfig,
        timeouts: ItemTimeouts,
    ) -> Self {
        self.with_handler(RebuildEmbeddingsHandler::new(
            providers.store.clone(),
            providers.embedder.clone(),
            aggregator.clone(),
            timeouts.clone(),
        ))
        .with_handler(EmbedSingleItemHandler::new(
            providers.store,
            providers.embedder.clone(),
            aggregator,
            timeouts.clone(),
        ))
        .with_handler(GeneratePodcastEpisodeHandler::new(
            providers.podcast,
            timeouts.podcast,
        ))
        .with_handler(ProcessSourceHandler::new(
            providers.ingestor,
            providers.embedder,
            timeouts.source,
        ))
    }

    /// Share the registry's wake-up handle so new jobs start immediately.
    pub fn with_notify(mut self, notify: Arc<Notify>) -> Self {
        self.notify = notify;
        self
    }

    pub fn with_signals(mut self, signals: CancelSignals) -> Self {
        self.signals = signals;
        self
    }

    /// Build and return the worker.
    pub fn build(self) -> JobWorker {
        let mut handlers: HashMap<JobKind, Arc<dyn JobHandler>> = HashMap::new();
        for handler in self.handlers {
            let kind = handler.job_kind();
            debug!(subsystem = "jobs", component = "worker", job_kind = %kind, "Registered job handler");
            handlers.insert(kind, handler);
        }

        let mut kinds: Vec<JobKind> = handlers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());

        let (event_tx, _) = broadcast::channel(quire_core::defaults::EVENT_BUS_CAPACITY);
        JobWorker {
            registry: self.registry,
            config: self.config,
            handlers: Arc::new(handlers),
            event_tx,
            state: BackendState::new(kinds, self.signals, self.notify),
        }
    }
}
