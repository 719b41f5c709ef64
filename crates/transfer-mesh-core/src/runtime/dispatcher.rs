// crates/transfer-mesh-core/src/runtime/dispatcher.rs
// ============================================================================
// Module: Transfer Mesh Job Dispatcher
// Description: Bounded FIFO queue feeding a fixed pool of worker tasks.
// Purpose: Admit transfer jobs without blocking and report load periodically.
// Dependencies: crate::{core, interfaces, runtime}, tokio, tracing
// ============================================================================

//! ## Overview
//! The dispatcher owns one bounded `tokio::sync::mpsc` queue of capacity `Q`
//! and `W` worker tasks that share its receiver. [`Dispatcher::submit`] never
//! blocks: it fails with [`SubmitError::Busy`] when the queue is full and with
//! [`SubmitError::ShuttingDown`] once shutdown has begun. Workers hand each
//! job to a [`TransferHandler`] exactly once; retries live in the handler.
//! Each job runs in its own task, so a panicking handler fails that job and
//! leaves the worker in the pool.
//!
//! A ticker task emits a [`DispatcherSnapshot`] to the metrics sink every
//! interval. [`Dispatcher::shutdown`] closes the queue, lets workers drain
//! queued and in-flight jobs, then emits a final snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::core::DispatcherSnapshot;
use crate::core::JobId;
use crate::core::JobRecord;
use crate::core::JobState;
use crate::core::TransferRequest;
use crate::core::unix_millis;
use crate::interfaces::MetricsSink;
use crate::runtime::executor::TransferHandler;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Dispatcher sizing and reporting configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Worker count `W`.
    pub workers: usize,
    /// Queue capacity `Q`; values below 1 are raised to 1.
    pub queue_size: usize,
    /// Snapshot interval `T`.
    pub metrics_interval: Duration,
    /// Terminal job records retained for queries.
    pub job_history: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_size: 64,
            metrics_interval: Duration::from_secs(600),
            job_history: 1024,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Submission errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Queue is at capacity.
    #[error("dispatcher queue is full")]
    Busy,
    /// Shutdown has begun.
    #[error("dispatcher is shutting down")]
    ShuttingDown,
    /// Request cannot be dispatched.
    #[error("invalid transfer request: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Job Table
// ============================================================================

/// Job records with bounded terminal history.
#[derive(Debug, Default)]
struct JobTable {
    /// Records by id.
    records: BTreeMap<JobId, JobRecord>,
    /// Terminal job ids, oldest first.
    finished: VecDeque<JobId>,
    /// Maximum retained terminal records.
    history: usize,
}

impl JobTable {
    /// Marks a job as running.
    fn start(&mut self, id: JobId) {
        if let Some(record) = self.records.get_mut(&id) {
            record.state = JobState::Running;
            record.started_at_ms = Some(unix_millis());
        }
    }

    /// Applies a terminal update and evicts the oldest terminal records.
    fn finish(&mut self, id: JobId, update: impl FnOnce(&mut JobRecord)) {
        if let Some(record) = self.records.get_mut(&id) {
            update(record);
            record.finished_at_ms = Some(unix_millis());
            self.finished.push_back(id);
        }
        while self.finished.len() > self.history {
            if let Some(oldest) = self.finished.pop_front() {
                self.records.remove(&oldest);
            }
        }
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Queued unit of work.
struct QueuedJob {
    /// Job identifier.
    id: JobId,
    /// Request to execute.
    request: TransferRequest,
}

/// State shared by the dispatcher handle and its tasks.
struct Shared {
    /// Configuration snapshot.
    config: DispatcherConfig,
    /// Queue producer; `None` once shutdown begins.
    sender: Mutex<Option<mpsc::Sender<QueuedJob>>>,
    /// Admission flag.
    accepting: AtomicBool,
    /// Last assigned job id.
    next_id: AtomicU64,
    /// Jobs waiting in the queue.
    queued: AtomicUsize,
    /// Workers executing a job.
    active: AtomicUsize,
    /// Jobs admitted.
    submitted: AtomicU64,
    /// Jobs rejected as busy.
    rejected: AtomicU64,
    /// Jobs that succeeded.
    completed: AtomicU64,
    /// Jobs that failed.
    failed: AtomicU64,
    /// Job records.
    jobs: Mutex<JobTable>,
    /// Strategy executed per job.
    handler: Arc<dyn TransferHandler>,
    /// Snapshot destination.
    sink: Arc<dyn MetricsSink>,
}

impl Shared {
    /// Locks the job table, recovering from poisoning.
    fn jobs(&self) -> MutexGuard<'_, JobTable> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builds a load snapshot.
    fn snapshot(&self) -> DispatcherSnapshot {
        DispatcherSnapshot {
            timestamp_ms: unix_millis(),
            queue_depth: self.queued.load(Ordering::SeqCst),
            queue_capacity: self.config.queue_size,
            workers: self.config.workers,
            active_workers: self.active.load(Ordering::SeqCst),
            submitted: self.submitted.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    /// Emits a snapshot; sink failures are logged only.
    fn emit(&self) -> DispatcherSnapshot {
        let snapshot = self.snapshot();
        if let Err(err) = self.sink.record(&snapshot) {
            warn!(error = %err, "failed to record dispatcher snapshot");
        }
        snapshot
    }

    /// Runs one job through the handler and records the outcome.
    async fn run(&self, job: QueuedJob) {
        self.queued.fetch_sub(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        self.jobs().start(job.id);
        info!(job = %job.id, request = %job.request, "job started");

        let handler = Arc::clone(&self.handler);
        let request = job.request.clone();
        let outcome = tokio::spawn(async move { handler.execute(&request).await }).await;
        match outcome {
            Ok(Ok(report)) => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                info!(
                    job = %job.id,
                    files = report.files,
                    skipped = report.skipped,
                    bytes = report.bytes,
                    "job succeeded"
                );
                self.jobs().finish(job.id, |record| {
                    record.state = JobState::Succeeded;
                    record.attempts = report.attempts;
                    record.files = report.files;
                    record.skipped = report.skipped;
                    record.bytes = report.bytes;
                });
            }
            Ok(Err(failure)) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                warn!(job = %job.id, error = %failure, "job failed");
                self.jobs().finish(job.id, |record| {
                    record.state = JobState::Failed;
                    record.attempts = failure.attempts;
                    record.files = failure.partial.files;
                    record.skipped = failure.partial.skipped;
                    record.bytes = failure.partial.bytes;
                    record.error = Some(failure.to_string());
                });
            }
            Err(aborted) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                error!(job = %job.id, error = %aborted, "job handler aborted");
                self.jobs().finish(job.id, |record| {
                    record.state = JobState::Failed;
                    record.error = Some(format!("job handler aborted: {aborted}"));
                });
            }
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bounded job dispatcher.
pub struct Dispatcher {
    /// Shared state.
    shared: Arc<Shared>,
    /// Queue consumer shared by workers; kept here so a pool of zero
    /// workers still holds queued jobs.
    _receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedJob>>>,
    /// Worker task handles.
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Metrics ticker handle.
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Starts workers and the metrics ticker on the current tokio runtime.
    #[must_use]
    pub fn start(
        config: DispatcherConfig,
        handler: Arc<dyn TransferHandler>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        let config = DispatcherConfig {
            queue_size: config.queue_size.max(1),
            ..config
        };
        let (sender, receiver) = mpsc::channel(config.queue_size);
        let shared = Arc::new(Shared {
            config,
            sender: Mutex::new(Some(sender)),
            accepting: AtomicBool::new(true),
            next_id: AtomicU64::new(0),
            queued: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            submitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            jobs: Mutex::new(JobTable {
                history: config.job_history,
                ..JobTable::default()
            }),
            handler,
            sink,
        });

        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let workers = (0..config.workers)
            .map(|worker| {
                let shared = Arc::clone(&shared);
                let receiver = Arc::clone(&receiver);
                tokio::spawn(async move {
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(job) = next else {
                            break;
                        };
                        shared.run(job).await;
                    }
                    info!(worker, "dispatcher worker stopped");
                })
            })
            .collect();

        let ticker_shared = Arc::clone(&shared);
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(ticker_shared.config.metrics_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                ticker_shared.emit();
            }
        });

        info!(
            workers = config.workers,
            queue_size = config.queue_size,
            "dispatcher started"
        );
        Self {
            shared,
            _receiver: receiver,
            workers: Mutex::new(workers),
            ticker: Mutex::new(Some(ticker)),
        }
    }

    /// Admits a request without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Busy`] when the queue is full,
    /// [`SubmitError::ShuttingDown`] after shutdown begins, and
    /// [`SubmitError::Invalid`] for requests that cannot be dispatched.
    pub fn submit(&self, request: TransferRequest) -> Result<JobId, SubmitError> {
        if !self.shared.accepting.load(Ordering::SeqCst) {
            return Err(SubmitError::ShuttingDown);
        }
        request.validate_for_dispatch().map_err(SubmitError::Invalid)?;

        let id = JobId::new(self.shared.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.shared.jobs().records.insert(id, JobRecord::queued(id, request.clone()));
        self.shared.queued.fetch_add(1, Ordering::SeqCst);

        let sent = {
            let sender = self.shared.sender.lock().unwrap_or_else(PoisonError::into_inner);
            sender.as_ref().map(|sender| sender.try_send(QueuedJob { id, request }))
        };
        let err = match sent {
            Some(Ok(())) => {
                self.shared.submitted.fetch_add(1, Ordering::SeqCst);
                return Ok(id);
            }
            Some(Err(TrySendError::Full(_))) => {
                self.shared.rejected.fetch_add(1, Ordering::SeqCst);
                SubmitError::Busy
            }
            Some(Err(TrySendError::Closed(_))) | None => SubmitError::ShuttingDown,
        };
        self.shared.queued.fetch_sub(1, Ordering::SeqCst);
        self.shared.jobs().records.remove(&id);
        Err(err)
    }

    /// Returns the record of job `id`, if still retained.
    #[must_use]
    pub fn job(&self, id: JobId) -> Option<JobRecord> {
        self.shared.jobs().records.get(&id).cloned()
    }

    /// Returns all retained job records in id order.
    #[must_use]
    pub fn jobs(&self) -> Vec<JobRecord> {
        self.shared.jobs().records.values().cloned().collect()
    }

    /// Returns the current load snapshot without emitting it.
    #[must_use]
    pub fn snapshot(&self) -> DispatcherSnapshot {
        self.shared.snapshot()
    }

    /// Returns true while submissions are accepted.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.shared.accepting.load(Ordering::SeqCst)
    }

    /// Stops admission, drains queued and running jobs, and emits a final
    /// snapshot.
    pub async fn shutdown(&self) -> DispatcherSnapshot {
        self.shared.accepting.store(false, Ordering::SeqCst);
        drop(self.shared.sender.lock().unwrap_or_else(PoisonError::into_inner).take());
        info!("dispatcher draining");

        let workers =
            std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in workers {
            if let Err(err) = handle.await {
                warn!(error = %err, "dispatcher worker ended abnormally");
            }
        }
        if let Some(ticker) = self.ticker.lock().unwrap_or_else(PoisonError::into_inner).take() {
            ticker.abort();
        }
        let snapshot = self.shared.emit();
        info!(
            completed = snapshot.completed,
            failed = snapshot.failed,
            "dispatcher stopped"
        );
        snapshot
    }
}
