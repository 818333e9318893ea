//! Priority job queue with a fixed worker pool.

use crate::handler::TaskHandler;
use crate::metrics::JobMetrics;
use chrono::Utc;
use lantern_core::{
    CancelOutcome, JobPriority, JobRequest, JobStatus, ProcessingJob, ServerConfiguration,
    TaskCategory,
};
use lantern_error::{JobError, JobErrorKind, JobResult};
use lantern_interface::{InferenceDriver, JobStore};
use lantern_models::{ModelDescriptor, ModelRegistry, ModelSelector};
use lantern_usage::UsageRecorder;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Worker count and waiting room of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobQueueConfig {
    /// Jobs processed at once
    pub workers: usize,
    /// Jobs allowed to wait while every worker is busy
    pub queue_size: usize,
}

impl JobQueueConfig {
    /// Size the queue after a server configuration's pool.
    pub fn from_server(config: &ServerConfiguration) -> Self {
        Self {
            workers: config.max_concurrent_requests.max(1),
            queue_size: config.request_queue_size,
        }
    }

    /// Outstanding jobs admitted at once.
    pub fn capacity(&self) -> usize {
        self.workers + self.queue_size
    }
}

/// Point-in-time counters of a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Worker tasks
    pub workers: usize,
    /// Outstanding jobs admitted at once
    pub capacity: usize,
    /// Jobs waiting for a worker
    pub pending: usize,
    /// Jobs being processed
    pub processing: usize,
    /// Jobs admitted since start
    pub submitted: u64,
    /// Submissions rejected since start
    pub rejected: u64,
    /// Jobs completed since start
    pub completed: u64,
    /// Jobs failed since start
    pub failed: u64,
    /// Jobs cancelled since start
    pub cancelled: u64,
}

#[derive(Debug, PartialEq, Eq)]
struct Queued {
    priority: JobPriority,
    seq: u64,
    id: Uuid,
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

struct LiveJob {
    job: ProcessingJob,
    done: watch::Sender<Option<ProcessingJob>>,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

struct Inner {
    config: JobQueueConfig,
    driver: Arc<dyn InferenceDriver>,
    selector: Arc<ModelSelector>,
    store: Arc<dyn JobStore>,
    usage: UsageRecorder,
    heap: Mutex<BinaryHeap<Queued>>,
    ready: Semaphore,
    live: Mutex<HashMap<Uuid, LiveJob>>,
    outstanding: AtomicUsize,
    processing: AtomicUsize,
    seq: AtomicU64,
    shut_down: AtomicBool,
    counters: Counters,
    metrics: JobMetrics,
}

/// Accepts jobs and runs them on a fixed pool of workers.
///
/// Admission is bounded: once `workers + queue_size` jobs are outstanding
/// (waiting or processing), [`submit`](Self::submit) fails immediately
/// with [`JobErrorKind::QueueSaturated`].
pub struct JobQueue {
    inner: Arc<Inner>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("config", &self.inner.config)
            .field("server", &self.inner.driver.config_name())
            .finish_non_exhaustive()
    }
}

impl JobQueue {
    /// Spawn `config.workers` workers on the current runtime.
    pub fn start(
        config: JobQueueConfig,
        driver: Arc<dyn InferenceDriver>,
        selector: Arc<ModelSelector>,
        store: Arc<dyn JobStore>,
        usage: UsageRecorder,
    ) -> Self {
        let inner = Arc::new(Inner {
            config,
            driver,
            selector,
            store,
            usage,
            heap: Mutex::new(BinaryHeap::new()),
            ready: Semaphore::new(0),
            live: Mutex::new(HashMap::new()),
            outstanding: AtomicUsize::new(0),
            processing: AtomicUsize::new(0),
            seq: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
            counters: Counters::default(),
            metrics: JobMetrics::default(),
        });

        let workers = (0..config.workers)
            .map(|worker| {
                let inner = inner.clone();
                tokio::spawn(async move { inner.work(worker).await })
            })
            .collect();

        info!(
            server = %inner.driver.config_name(),
            workers = config.workers,
            queue_size = config.queue_size,
            "Started job queue"
        );

        Self {
            inner,
            workers: tokio::sync::Mutex::new(workers),
        }
    }

    /// Queue sizing.
    pub fn config(&self) -> JobQueueConfig {
        self.inner.config
    }

    /// Registry whose metrics finished jobs update.
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        self.inner.selector.registry()
    }

    /// Admit a job and return its id.
    ///
    /// # Errors
    ///
    /// [`JobErrorKind::QueueSaturated`] when the queue is full,
    /// [`JobErrorKind::ShutDown`] after shutdown, or a store failure.
    #[instrument(skip(self, request), fields(task = %request.task_category(), priority = %request.priority()))]
    pub async fn submit(&self, request: JobRequest) -> JobResult<Uuid> {
        let inner = &self.inner;
        let category = request.task_category().to_string();
        if inner.shut_down.load(Ordering::SeqCst) {
            inner.metrics.record_rejected(&category, "shutdown");
            return Err(JobError::new(JobErrorKind::ShutDown));
        }

        let capacity = inner.config.capacity();
        if inner
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < capacity).then_some(n + 1)
            })
            .is_err()
        {
            inner.counters.rejected.fetch_add(1, Ordering::Relaxed);
            inner.metrics.record_rejected(&category, "saturated");
            warn!(capacity, "Job queue saturated, rejecting submission");
            return Err(JobError::new(JobErrorKind::QueueSaturated { capacity }));
        }

        let job = ProcessingJob::from_request(request);
        let id = *job.id();
        if let Err(e) = inner.store.insert(&job).await {
            inner.outstanding.fetch_sub(1, Ordering::SeqCst);
            return Err(e);
        }

        let priority = *job.priority();
        let (done, _) = watch::channel(None);
        inner
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, LiveJob { job, done });
        inner
            .heap
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Queued {
                priority,
                seq: inner.seq.fetch_add(1, Ordering::SeqCst),
                id,
            });
        inner.ready.add_permits(1);

        inner.counters.submitted.fetch_add(1, Ordering::Relaxed);
        inner.metrics.record_submitted(&category);
        debug!(%id, "Job submitted");
        Ok(id)
    }

    /// Wait until job `id` reaches a terminal state.
    pub async fn wait(&self, id: Uuid) -> JobResult<ProcessingJob> {
        let receiver = {
            let live = self.inner.live.lock().unwrap_or_else(PoisonError::into_inner);
            live.get(&id).map(|entry| entry.done.subscribe())
        };

        let Some(mut receiver) = receiver else {
            return self.require(id).await;
        };
        loop {
            if let Some(job) = receiver.borrow_and_update().clone() {
                return Ok(job);
            }
            if receiver.changed().await.is_err() {
                return match receiver.borrow().clone() {
                    Some(job) => Ok(job),
                    None => self.require(id).await,
                };
            }
        }
    }

    /// Submit a job and wait for its terminal state.
    pub async fn submit_and_wait(&self, request: JobRequest) -> JobResult<ProcessingJob> {
        let id = self.submit(request).await?;
        self.wait(id).await
    }

    /// Current record of job `id`.
    pub async fn get(&self, id: Uuid) -> JobResult<Option<ProcessingJob>> {
        let live = self
            .inner
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|entry| entry.job.clone());
        match live {
            Some(job) => Ok(Some(job)),
            None => self.inner.store.get(id).await,
        }
    }

    async fn require(&self, id: Uuid) -> JobResult<ProcessingJob> {
        self.get(id)
            .await?
            .ok_or_else(|| JobError::new(JobErrorKind::NotFound(id.to_string())))
    }

    /// Status of job `id`.
    pub async fn status(&self, id: Uuid) -> JobResult<JobStatus> {
        Ok(*self.require(id).await?.status())
    }

    /// Stored jobs, optionally filtered by status, oldest first.
    pub async fn list(&self, status: Option<JobStatus>) -> JobResult<Vec<ProcessingJob>> {
        self.inner.store.list(status).await
    }

    /// Cancel job `id`.
    ///
    /// Pending jobs become cancelled. For a processing job the request is
    /// only recorded; the inference call runs to completion.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> JobResult<CancelOutcome> {
        let cancelled = {
            let mut live = self.inner.live.lock().unwrap_or_else(PoisonError::into_inner);
            match live.get_mut(&id) {
                Some(entry) => match entry.job.cancel(Utc::now()) {
                    CancelOutcome::Cancelled => Some(entry.job.clone()),
                    outcome => return Ok(outcome),
                },
                None => None,
            }
        };

        match cancelled {
            Some(job) => {
                self.inner.finish_cancelled(job).await;
                Ok(CancelOutcome::Cancelled)
            }
            None => {
                let job = self.require(id).await?;
                Ok(CancelOutcome::AlreadyFinished(*job.status()))
            }
        }
    }

    /// Queue counters.
    pub fn stats(&self) -> QueueStats {
        let inner = &self.inner;
        let outstanding = inner.outstanding.load(Ordering::SeqCst);
        let processing = inner.processing.load(Ordering::SeqCst);
        QueueStats {
            workers: inner.config.workers,
            capacity: inner.config.capacity(),
            pending: outstanding.saturating_sub(processing),
            processing,
            submitted: inner.counters.submitted.load(Ordering::Relaxed),
            rejected: inner.counters.rejected.load(Ordering::Relaxed),
            completed: inner.counters.completed.load(Ordering::Relaxed),
            failed: inner.counters.failed.load(Ordering::Relaxed),
            cancelled: inner.counters.cancelled.load(Ordering::Relaxed),
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Stop accepting jobs, cancel the ones still waiting, and wait for
    /// workers to finish their current job. Idempotent.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        if !inner.shut_down.swap(true, Ordering::SeqCst) {
            info!(server = %inner.driver.config_name(), "Shutting down job queue");
        }
        inner.ready.close();

        let waiting: Vec<Uuid> = inner
            .heap
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|queued| queued.id)
            .collect();
        for id in waiting {
            if let Err(e) = self.cancel(id).await {
                warn!(%id, error = %e, "Could not cancel waiting job during shutdown");
            }
        }

        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Job worker panicked");
            }
        }
        debug!("Job queue stopped");
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        self.inner.shut_down.store(true, Ordering::SeqCst);
        self.inner.ready.close();
    }
}

enum Claim {
    Started(ProcessingJob, Arc<ModelDescriptor>),
    Unroutable(ProcessingJob),
    Skipped,
}

impl Inner {
    async fn work(self: Arc<Self>, worker: usize) {
        debug!(worker, "Job worker started");
        loop {
            match self.ready.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => break,
            }
            let next = self
                .heap
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop();
            if let Some(queued) = next {
                self.process(worker, queued.id).await;
            }
        }
        debug!(worker, "Job worker stopped");
    }

    fn live_status(&self, id: Uuid) -> Option<(TaskCategory, JobStatus)> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|entry| (*entry.job.task_category(), *entry.job.status()))
    }

    #[instrument(skip(self), fields(server = %self.driver.config_name()))]
    async fn process(&self, worker: usize, id: Uuid) {
        let Some((category, JobStatus::Pending)) = self.live_status(id) else {
            debug!("Job no longer pending, skipping");
            return;
        };

        let selected = self.selector.select_best_model(category).await;
        let claim = {
            let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
            match live.get_mut(&id) {
                Some(entry) if *entry.job.status() == JobStatus::Pending => match &selected {
                    Some(model) => match entry.job.start(model.name().clone(), Utc::now()) {
                        Ok(()) => Claim::Started(entry.job.clone(), model.clone()),
                        Err(e) => {
                            error!(error = %e, "Could not start job");
                            Claim::Skipped
                        }
                    },
                    None => {
                        let reason = JobErrorKind::NoModelAvailable(category.to_string()).to_string();
                        match entry.job.fail(reason, Utc::now()) {
                            Ok(()) => Claim::Unroutable(entry.job.clone()),
                            Err(e) => {
                                error!(error = %e, "Could not fail job");
                                Claim::Skipped
                            }
                        }
                    }
                },
                _ => Claim::Skipped,
            }
        };

        let (job, model) = match claim {
            Claim::Started(job, model) => (job, model),
            Claim::Unroutable(job) => {
                warn!(%category, "No available model, job failed");
                self.finish(job, None).await;
                return;
            }
            Claim::Skipped => return,
        };

        self.processing.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.store.update(&job).await {
            warn!(error = %e, "Could not persist job start");
        }
        info!(model = %model.name(), task = %category, "Job processing");

        let handler = TaskHandler::for_category(category);
        let outcome = handler.run(self.driver.as_ref(), &model, &job).await;

        // The terminal state is written in place: the entry stays visible to
        // `wait`, `get` and `cancel` until the store holds the same record.
        let finished = {
            let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
            live.get_mut(&id).and_then(|entry| {
                let now = Utc::now();
                let transition = match &outcome {
                    Ok(output) => entry.job.complete(output.output.clone(), output.token_count, now),
                    Err(e) => entry.job.fail(e.kind.to_string(), now),
                };
                match transition {
                    Ok(()) => Some(entry.job.clone()),
                    Err(e) => {
                        error!(error = %e, "Could not finish job");
                        None
                    }
                }
            })
        };
        self.processing.fetch_sub(1, Ordering::SeqCst);

        match finished {
            Some(job) => self.finish(job, Some(model.as_ref())).await,
            None => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                self.live
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
            }
        }
    }

    /// Book-keeping for a job that reached completed or failed.
    ///
    /// `job` must already be terminal in `live`.
    async fn finish(&self, job: ProcessingJob, model: Option<&ModelDescriptor>) {
        let success = *job.status() == JobStatus::Completed;
        self.outstanding.fetch_sub(1, Ordering::SeqCst);

        if let Some(model) = model {
            let elapsed = (*job.processing_time()).unwrap_or(0.0);
            if let Err(e) = self
                .selector
                .registry()
                .update_metrics(model.name(), elapsed, success)
            {
                warn!(error = %e, "Could not update model metrics");
            }
            if let Err(e) = self.usage.record_job(&job).await {
                warn!(error = %e, "Could not record usage");
            }
        }
        if let Err(e) = self.store.update(&job).await {
            warn!(error = %e, "Could not persist finished job");
        }

        let category = job.task_category().to_string();
        self.metrics
            .record_finished(&category, success, *job.processing_time());
        if success {
            self.counters.completed.fetch_add(1, Ordering::Relaxed);
            info!(id = %job.id(), tokens = ?job.token_count(), seconds = ?job.processing_time(), "Job completed");
        } else {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(id = %job.id(), error = ?job.error_message(), "Job failed");
        }
        self.publish(job);
    }

    async fn finish_cancelled(&self, job: ProcessingJob) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        if let Err(e) = self.store.update(&job).await {
            warn!(error = %e, "Could not persist cancelled job");
        }
        self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .record_cancelled(&job.task_category().to_string());
        info!(id = %job.id(), "Job cancelled");
        self.publish(job);
    }

    /// Wake waiters and retire the live entry. Runs after the store write,
    /// so a caller missing the entry reads the terminal record instead.
    fn publish(&self, job: ProcessingJob) {
        let entry = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job.id());
        if let Some(entry) = entry {
            entry.done.send_replace(Some(job));
        }
    }
}
