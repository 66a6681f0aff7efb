//! Named job queues with per-binding concurrency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, Notify, Semaphore};
use warble_core::JobId;

use crate::error::{HandlerError, QueueError, Result};
use crate::job::{payload_digest, Job, JobRecord, Payload};
use crate::lifecycle::{self, JobState};
use crate::metrics::{MetricsSnapshot, QueueMetrics};

/// Handler invoked by the queue runtime for one job name.
#[async_trait]
pub trait JobHandler<P: Payload>: Send + Sync {
    /// Processes one payload.
    ///
    /// Must be idempotent: delivery is at-least-once, and operator
    /// resubmission replays the identical payload.
    ///
    /// # Errors
    ///
    /// Returning an error marks the job failed; the runtime logs it and
    /// never retries on its own.
    async fn run(&self, payload: P) -> std::result::Result<(), HandlerError>;
}

/// Tuning knobs for a queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Seconds a single handler invocation may run before it is failed.
    pub handler_timeout_seconds: u64,
}

impl QueueConfig {
    const DEFAULT_HANDLER_TIMEOUT_SECONDS: u64 = 30;

    /// Handler timeout as a [`Duration`].
    #[must_use]
    pub const fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_seconds)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            handler_timeout_seconds: Self::DEFAULT_HANDLER_TIMEOUT_SECONDS,
        }
    }
}

struct Binding<P> {
    sender: mpsc::UnboundedSender<Job<P>>,
}

struct Ledger<P> {
    records: Mutex<HashMap<JobId, JobRecord<P>>>,
    pending: AtomicUsize,
    idle: Notify,
}

impl<P: Payload> Ledger<P> {
    fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    fn insert_queued(&self, job: &Job<P>) {
        let record = JobRecord {
            job_id: job.job_id,
            job_name: job.job_name,
            payload: job.payload.clone(),
            payload_digest: payload_digest(&job.payload),
            state: JobState::Queued,
            attempts: job.attempt,
            enqueued_at: job.enqueued_at,
            started_at: None,
            finished_at: None,
            error: None,
        };
        self.records.lock().insert(job.job_id, record);
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn remove(&self, job_id: JobId) {
        if self.records.lock().remove(&job_id).is_some() {
            self.settle();
        }
    }

    fn transition(&self, job_id: JobId, to: JobState, error: Option<String>) {
        let mut records = self.records.lock();
        let Some(record) = records.get_mut(&job_id) else {
            return;
        };
        if !lifecycle::is_valid_transition(record.state, to) {
            tracing::warn!(
                job_id = %job_id,
                from = %record.state,
                to = %to,
                "Ignoring invalid job transition"
            );
            return;
        }
        record.state = to;
        match to {
            JobState::Active => record.started_at = Some(Utc::now()),
            JobState::Completed | JobState::Failed => {
                record.finished_at = Some(Utc::now());
                record.error = error;
            }
            JobState::Queued => {}
        }
    }

    fn settle(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn await_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct QueueInner<P: Payload> {
    name: String,
    config: QueueConfig,
    closed: AtomicBool,
    bindings: RwLock<HashMap<&'static str, Binding<P>>>,
    ledger: Ledger<P>,
    metrics: QueueMetrics,
}

/// A named queue dispatching typed payloads to bound handlers.
///
/// Cloning is cheap; every clone refers to the same queue.
pub struct JobQueue<P: Payload> {
    inner: Arc<QueueInner<P>>,
}

impl<P: Payload> Clone for JobQueue<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Payload> JobQueue<P> {
    /// Creates a queue with default configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, QueueConfig::default())
    }

    /// Creates a queue with explicit configuration.
    #[must_use]
    pub fn with_config(name: impl Into<String>, config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                name: name.into(),
                config,
                closed: AtomicBool::new(false),
                bindings: RwLock::new(HashMap::new()),
                ledger: Ledger::new(),
                metrics: QueueMetrics::default(),
            }),
        }
    }

    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Binds `handler` to `job_name` with the given concurrency limit and
    /// spawns the binding's dispatcher task.
    ///
    /// Dispatch follows enqueue order within the binding; at most
    /// `concurrency` invocations of this handler run at once.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::AlreadyRegistered`] if the job name is bound.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn register(
        &self,
        job_name: &'static str,
        concurrency: usize,
        handler: Arc<dyn JobHandler<P>>,
    ) -> Result<()> {
        let mut bindings = self.inner.bindings.write();
        if bindings.contains_key(job_name) {
            return Err(QueueError::AlreadyRegistered {
                queue: self.inner.name.clone(),
                job_name,
            });
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        bindings.insert(job_name, Binding { sender });
        drop(bindings);

        tokio::spawn(dispatch_loop(
            Arc::clone(&self.inner),
            job_name,
            concurrency.max(1),
            handler,
            receiver,
        ));
        tracing::debug!(
            queue = %self.inner.name,
            job_name,
            concurrency,
            "Registered job handler"
        );
        Ok(())
    }

    /// Accepts a payload for dispatch and returns its job id.
    ///
    /// Never waits on handler execution.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoHandler`] when the payload's job name has
    /// no binding, or [`QueueError::ShutDown`] after [`Self::shutdown`].
    pub fn enqueue(&self, payload: P) -> Result<JobId> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(QueueError::ShutDown {
                queue: self.inner.name.clone(),
            });
        }

        let job_name = payload.job_name();
        let job = Job {
            job_id: JobId::generate(),
            job_name,
            payload,
            enqueued_at: Utc::now(),
            attempt: 1,
        };
        let job_id = job.job_id;

        let bindings = self.inner.bindings.read();
        let Some(binding) = bindings.get(job_name) else {
            return Err(QueueError::NoHandler {
                queue: self.inner.name.clone(),
                job_name,
            });
        };

        self.inner.ledger.insert_queued(&job);
        if binding.sender.send(job).is_err() {
            self.inner.ledger.remove(job_id);
            return Err(QueueError::ShutDown {
                queue: self.inner.name.clone(),
            });
        }
        self.inner.metrics.record_enqueued();
        tracing::debug!(queue = %self.inner.name, job_name, job_id = %job_id, "Enqueued job");
        Ok(job_id)
    }

    /// Returns the ledger record for a job.
    #[must_use]
    pub fn job(&self, job_id: &JobId) -> Option<JobRecord<P>> {
        self.inner.ledger.records.lock().get(job_id).cloned()
    }

    /// Records of every failed job, oldest enqueue first.
    #[must_use]
    pub fn failed_jobs(&self) -> Vec<JobRecord<P>> {
        let records = self.inner.ledger.records.lock();
        let mut failed: Vec<JobRecord<P>> = records
            .values()
            .filter(|record| record.state == JobState::Failed)
            .cloned()
            .collect();
        drop(records);
        failed.sort_by(|a, b| a.enqueued_at.cmp(&b.enqueued_at));
        failed
    }

    /// Re-queues a failed job with its original payload.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::JobNotFound`] for an unknown id,
    /// [`QueueError::InvalidTransition`] when the job is not failed, and
    /// [`QueueError::NoHandler`] or [`QueueError::ShutDown`] when the
    /// binding is gone.
    pub fn resubmit(&self, job_id: &JobId) -> Result<JobId> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(QueueError::ShutDown {
                queue: self.inner.name.clone(),
            });
        }

        let (payload, job_name, attempts, enqueued_at) = {
            let records = self.inner.ledger.records.lock();
            let record = records
                .get(job_id)
                .ok_or(QueueError::JobNotFound(*job_id))?;
            lifecycle::validate_transition(record.job_id, record.state, JobState::Queued)?;
            (
                record.payload.clone(),
                record.job_name,
                record.attempts,
                record.enqueued_at,
            )
        };

        let bindings = self.inner.bindings.read();
        let Some(binding) = bindings.get(job_name) else {
            return Err(QueueError::NoHandler {
                queue: self.inner.name.clone(),
                job_name,
            });
        };

        let job = Job {
            job_id: *job_id,
            job_name,
            payload,
            enqueued_at,
            attempt: attempts + 1,
        };
        self.inner.ledger.insert_queued(&job);
        if binding.sender.send(job).is_err() {
            self.inner.ledger.remove(*job_id);
            return Err(QueueError::ShutDown {
                queue: self.inner.name.clone(),
            });
        }
        self.inner.metrics.record_resubmitted();
        tracing::info!(
            queue = %self.inner.name,
            job_name,
            job_id = %job_id,
            attempt = attempts + 1,
            "Resubmitted failed job"
        );
        Ok(*job_id)
    }

    /// Metrics snapshot for this queue.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Number of accepted jobs not yet terminal.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.ledger.pending.load(Ordering::SeqCst)
    }

    /// Resolves once every accepted job has reached a terminal state.
    pub async fn await_idle(&self) {
        self.inner.ledger.await_idle().await;
    }

    /// Stops accepting work; dispatchers drain what was accepted and exit.
    ///
    /// In-flight handlers run to completion. Subsequent `enqueue` and
    /// `resubmit` calls fail with [`QueueError::ShutDown`].
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.bindings.write().clear();
        tracing::debug!(queue = %self.inner.name, "Queue shut down");
    }
}

async fn dispatch_loop<P: Payload>(
    inner: Arc<QueueInner<P>>,
    job_name: &'static str,
    concurrency: usize,
    handler: Arc<dyn JobHandler<P>>,
    mut receiver: mpsc::UnboundedReceiver<Job<P>>,
) {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    while let Some(job) = receiver.recv().await {
        // Claim the slot before spawning so dispatch order is enqueue
        // order and at most `concurrency` invocations run at once.
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        inner.ledger.transition(job.job_id, JobState::Active, None);

        let handler = Arc::clone(&handler);
        let inner = Arc::clone(&inner);
        tokio::spawn(async move {
            let _permit = permit;
            run_job(&inner, job_name, handler.as_ref(), job).await;
        });
    }
    tracing::debug!(queue = %inner.name, job_name, "Dispatcher stopped");
}

async fn run_job<P: Payload>(
    inner: &QueueInner<P>,
    job_name: &'static str,
    handler: &dyn JobHandler<P>,
    job: Job<P>,
) {
    let timeout = inner.config.handler_timeout();
    let job_id = job.job_id;
    let digest = payload_digest(&job.payload);

    match tokio::time::timeout(timeout, handler.run(job.payload)).await {
        Ok(Ok(())) => {
            inner.ledger.transition(job_id, JobState::Completed, None);
            inner.ledger.settle();
            inner.metrics.record_completed();
            tracing::debug!(queue = %inner.name, job_name, job_id = %job_id, "Job completed");
        }
        Ok(Err(error)) => {
            tracing::error!(
                queue = %inner.name,
                job_name,
                job_id = %job_id,
                payload_digest = %digest,
                error = %error,
                "Job failed"
            );
            inner
                .ledger
                .transition(job_id, JobState::Failed, Some(error.to_string()));
            inner.ledger.settle();
            inner.metrics.record_failed();
        }
        Err(_elapsed) => {
            let error = format!("handler timed out after {}s", timeout.as_secs());
            tracing::error!(
                queue = %inner.name,
                job_name,
                job_id = %job_id,
                payload_digest = %digest,
                error = %error,
                "Job failed"
            );
            inner.ledger.transition(job_id, JobState::Failed, Some(error));
            inner.ledger.settle();
            inner.metrics.record_timed_out();
            inner.metrics.record_failed();
        }
    }
}
