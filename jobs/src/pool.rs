//! The priority-queue worker pool: a single dispatcher hands jobs to
//! single-slot worker inboxes, workers execute registered handlers with
//! retry and a per-job deadline, and a scaling task grows or shrinks the
//! worker set from queue utilization.

use crate::breaker::{BreakerState, CircuitBreaker};
use crate::errors::{JobError, QueueError, SubmitError};
use crate::job::{Job, JobHandler, JobResult, JobStatus};
use crate::queue::PriorityQueue;
use crate::scaler::{ScaleAction, ScalerConfig, plan};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long the dispatcher sleeps after failing to place a job.
const DISPATCH_RETRY_DELAY: Duration = Duration::from_millis(10);

const BACKOFF_BASE: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Rolling window size for the average processing time.
const PROCESSING_WINDOW: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerPoolConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub scaler: ScalerConfig,
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
    #[serde(default = "default_breaker_timeout_secs")]
    pub breaker_timeout_secs: u64,
}

fn default_queue_capacity() -> usize {
    100
}
fn default_breaker_threshold() -> u32 {
    5
}
fn default_breaker_timeout_secs() -> u64 {
    30
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        WorkerPoolConfig {
            queue_capacity: default_queue_capacity(),
            scaler: ScalerConfig::default(),
            breaker_threshold: default_breaker_threshold(),
            breaker_timeout_secs: default_breaker_timeout_secs(),
        }
    }
}

/// Ring buffer with a running sum, so the average costs O(1) per update.
#[derive(Default)]
struct ProcessingWindow {
    samples: VecDeque<Duration>,
    sum: Duration,
}

impl ProcessingWindow {
    fn push(&mut self, sample: Duration) {
        if self.samples.len() == PROCESSING_WINDOW
            && let Some(oldest) = self.samples.pop_front()
        {
            self.sum -= oldest;
        }
        self.samples.push_back(sample);
        self.sum += sample;
    }

    fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.sum.as_secs_f64() * 1000.0 / self.samples.len() as f64
    }
}

struct PoolShared {
    queue: PriorityQueue,
    handlers: RwLock<HashMap<String, Arc<dyn JobHandler>>>,
    breaker: CircuitBreaker,
    stopped: AtomicBool,
    completed: AtomicU64,
    failed: AtomicU64,
    window: Mutex<ProcessingWindow>,
}

impl PoolShared {
    fn record_completion(&self, elapsed: Duration) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.window.lock().push(elapsed);
        metrics::histogram!("jobs.processing_ms").record(elapsed.as_secs_f64() * 1000.0);
    }
}

struct WorkerHandle {
    id: usize,
    busy: Arc<AtomicBool>,
    inbox: mpsc::Sender<Job>,
    cancel: CancellationToken,
    jobs_done: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

pub struct WorkerPool {
    config: WorkerPoolConfig,
    shared: Arc<PoolShared>,
    workers: Arc<Mutex<Vec<WorkerHandle>>>,
    cancel: CancellationToken,
    next_worker_id: Arc<AtomicUsize>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        let shared = Arc::new(PoolShared {
            queue: PriorityQueue::new(config.queue_capacity),
            handlers: RwLock::new(HashMap::new()),
            breaker: CircuitBreaker::new(
                config.breaker_threshold,
                Duration::from_secs(config.breaker_timeout_secs),
            ),
            stopped: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            window: Mutex::new(ProcessingWindow::default()),
        });
        WorkerPool {
            config,
            shared,
            workers: Arc::new(Mutex::new(Vec::new())),
            cancel: CancellationToken::new(),
            next_worker_id: Arc::new(AtomicUsize::new(0)),
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn register_handler(&self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.shared.handlers.write().insert(job_type.into(), handler);
    }

    /// Spawns the initial workers, the dispatcher, and the scaling task.
    /// Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        for _ in 0..self.config.scaler.min_workers {
            let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
            spawn_worker(&self.shared, &self.workers, &self.cancel, id);
        }
        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(dispatch_loop(
            self.shared.clone(),
            self.workers.clone(),
            self.cancel.clone(),
        )));
        tasks.push(tokio::spawn(scale_loop(
            self.config.scaler,
            self.shared.clone(),
            self.workers.clone(),
            self.cancel.clone(),
            self.next_worker_id.clone(),
        )));
        tracing::info!(
            workers = self.config.scaler.min_workers,
            queue_capacity = self.config.queue_capacity,
            "worker pool started"
        );
    }

    /// Enqueues a job at its priority. Rejected when the pool is stopped,
    /// the queue is full, or the circuit breaker refuses admission.
    pub fn submit(&self, job: Job) -> Result<(), SubmitError> {
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(SubmitError::Stopped);
        }
        if !self.shared.breaker.allow() {
            metrics::counter!("jobs.rejected", "reason" => "breaker").increment(1);
            return Err(SubmitError::CircuitOpen);
        }
        self.shared.queue.push(job).map_err(|err| match err {
            QueueError::Full => {
                metrics::counter!("jobs.rejected", "reason" => "full").increment(1);
                SubmitError::QueueFull
            }
            QueueError::Closed | QueueError::Cancelled => SubmitError::Stopped,
        })
    }

    /// Submits and blocks until the job reaches a terminal status or
    /// `wait_timeout` elapses. Any callbacks already set on the job still
    /// run first.
    pub async fn submit_and_wait(
        &self,
        mut job: Job,
        wait_timeout: Duration,
    ) -> Result<JobResult, SubmitError> {
        let (sender, receiver) = tokio::sync::oneshot::channel();
        let sender = Arc::new(Mutex::new(Some(sender)));

        let previous_complete = job.on_complete.take();
        let complete_sender = sender.clone();
        job = job.on_complete(move |job: &Job| {
            if let Some(callback) = previous_complete {
                callback(job);
            }
            if let Some(sender) = complete_sender.lock().take() {
                let _ = sender.send(JobResult::from(job));
            }
        });

        let previous_error = job.on_error.take();
        job = job.on_error(move |job: &Job| {
            if let Some(callback) = previous_error {
                callback(job);
            }
            if let Some(sender) = sender.lock().take() {
                let _ = sender.send(JobResult::from(job));
            }
        });

        self.submit(job)?;
        match tokio::time::timeout(wait_timeout, receiver).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) | Err(_) => Err(SubmitError::WaitTimeout),
        }
    }

    /// Signals every task and waits for workers to wind down. In-flight
    /// jobs observe cancellation and finish as Cancelled.
    pub async fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.queue.close();
        self.cancel.cancel();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        let workers: Vec<WorkerHandle> = self.workers.lock().drain(..).collect();
        for worker in workers {
            let _ = worker.task.await;
        }
        tracing::info!("worker pool stopped");
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.shared.breaker.state()
    }

    pub fn completed_count(&self) -> u64 {
        self.shared.completed.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> u64 {
        self.shared.failed.load(Ordering::Relaxed)
    }

    pub fn avg_processing_ms(&self) -> f64 {
        self.shared.window.lock().average_ms()
    }
}

fn spawn_worker(
    shared: &Arc<PoolShared>,
    workers: &Arc<Mutex<Vec<WorkerHandle>>>,
    pool_cancel: &CancellationToken,
    id: usize,
) {
    let busy = Arc::new(AtomicBool::new(false));
    let jobs_done = Arc::new(AtomicU64::new(0));
    let (inbox_tx, inbox_rx) = mpsc::channel(1);
    let cancel = pool_cancel.child_token();
    let task = tokio::spawn(worker_loop(
        id,
        shared.clone(),
        busy.clone(),
        jobs_done.clone(),
        inbox_rx,
        cancel.clone(),
    ));
    let mut guard = workers.lock();
    guard.push(WorkerHandle {
        id,
        busy,
        inbox: inbox_tx,
        cancel,
        jobs_done,
        task,
    });
    metrics::gauge!("jobs.workers").set(guard.len() as f64);
}

async fn dispatch_loop(
    shared: Arc<PoolShared>,
    workers: Arc<Mutex<Vec<WorkerHandle>>>,
    cancel: CancellationToken,
) {
    loop {
        let job = match shared.queue.pop(&cancel).await {
            Ok(job) => job,
            // Closed or cancelled.
            Err(_) => break,
        };

        let mut undelivered = Some(job);
        {
            let guard = workers.lock();
            for worker in guard.iter() {
                if worker.busy.load(Ordering::Acquire) {
                    continue;
                }
                let Some(job) = undelivered.take() else { break };
                match worker.inbox.try_send(job) {
                    Ok(()) => break,
                    Err(TrySendError::Full(job)) | Err(TrySendError::Closed(job)) => {
                        undelivered = Some(job);
                    }
                }
            }
        }

        if let Some(job) = undelivered {
            // Every worker was busy; put the job back and let things settle.
            if let Err(err) = shared.queue.push(job) {
                tracing::error!(error = %err, "dropping job, re-enqueue failed");
            }
            tokio::time::sleep(DISPATCH_RETRY_DELAY).await;
        }
    }
    tracing::debug!("dispatcher stopped");
}

async fn worker_loop(
    id: usize,
    shared: Arc<PoolShared>,
    busy: Arc<AtomicBool>,
    jobs_done: Arc<AtomicU64>,
    mut inbox: mpsc::Receiver<Job>,
    cancel: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            received = inbox.recv() => match received {
                Some(job) => job,
                None => break,
            },
        };
        busy.store(true, Ordering::Release);
        process_job(&shared, job, &cancel).await;
        busy.store(false, Ordering::Release);
        jobs_done.fetch_add(1, Ordering::Relaxed);
    }

    // A handoff may be parked in the single-slot inbox; put it back so it is
    // not lost with this worker.
    inbox.close();
    while let Ok(job) = inbox.try_recv() {
        if let Err(err) = shared.queue.push(job) {
            tracing::error!(worker = id, error = %err, "dropping job parked at stopping worker");
        }
    }
    tracing::debug!(worker = id, "worker stopped");
}

async fn process_job(shared: &PoolShared, mut job: Job, cancel: &CancellationToken) {
    job.status = JobStatus::Running;
    job.started_at = Some(SystemTime::now());
    let started = Instant::now();

    let handler = shared.handlers.read().get(&job.job_type).cloned();
    let outcome = match handler {
        Some(handler) => execute_with_retry(&mut job, handler.as_ref(), cancel).await,
        None => Err(JobError::NoHandler(job.job_type.clone())),
    };

    match outcome {
        Ok(value) => {
            job.status = JobStatus::Completed;
            job.completed_at = Some(SystemTime::now());
            job.result = Some(value);
            shared.record_completion(started.elapsed());
            shared.breaker.record_success();
            metrics::counter!("jobs.completed").increment(1);
            if let Some(callback) = job.on_complete.take() {
                callback(&job);
            }
        }
        Err(error) => {
            let cancelled = matches!(error, JobError::Cancelled);
            job.status = if cancelled {
                JobStatus::Cancelled
            } else {
                JobStatus::Failed
            };
            job.completed_at = Some(SystemTime::now());
            job.error = Some(error.to_string());
            shared.failed.fetch_add(1, Ordering::Relaxed);
            // Cancellation is shutdown, not endpoint misbehavior; it does
            // not move the breaker.
            if !cancelled {
                shared.breaker.record_failure();
            }
            metrics::counter!("jobs.failed").increment(1);
            tracing::warn!(job = %job.id, job_type = %job.job_type, error = %error, "job failed");
            if let Some(callback) = job.on_error.take() {
                callback(&job);
            }
        }
    }
}

async fn execute_with_retry(
    job: &mut Job,
    handler: &dyn JobHandler,
    cancel: &CancellationToken,
) -> Result<Value, JobError> {
    let deadline = tokio::time::Instant::now() + job.timeout;
    let max_attempts = job.max_retries.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let result = tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return Err(JobError::Timeout(job.timeout)),
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            result = handler.execute(job) => result,
        };
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if attempt >= max_attempts {
            return Err(error);
        }
        job.retry_count = attempt;
        job.status = JobStatus::Retrying;
        let backoff = backoff_delay(attempt);
        tracing::debug!(
            job = %job.id,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            "job attempt failed, backing off"
        );
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return Err(JobError::Timeout(job.timeout)),
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_BASE
        .saturating_mul(1u32 << (attempt - 1).min(16))
        .min(BACKOFF_CAP)
}

async fn scale_loop(
    config: ScalerConfig,
    shared: Arc<PoolShared>,
    workers: Arc<Mutex<Vec<WorkerHandle>>>,
    pool_cancel: CancellationToken,
    next_worker_id: Arc<AtomicUsize>,
) {
    let mut ticker = tokio::time::interval(config.interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = pool_cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let utilization = shared.queue.len() as f64 / shared.queue.capacity() as f64;
        let current = workers.lock().len();
        match plan(&config, utilization, current) {
            ScaleAction::Grow(count) => {
                tracing::info!(add = count, utilization, "scaling workers up");
                for _ in 0..count {
                    let id = next_worker_id.fetch_add(1, Ordering::Relaxed);
                    spawn_worker(&shared, &workers, &pool_cancel, id);
                }
            }
            ScaleAction::Shrink(count) => {
                let mut guard = workers.lock();
                let mut removed = 0;
                let mut position = guard.len();
                // Sweep from the end; only a worker observed idle is
                // evicted, so a fully busy set skips the shrink this tick.
                while position > 0 && removed < count && guard.len() > config.min_workers {
                    position -= 1;
                    if !guard[position].busy.load(Ordering::Acquire) {
                        let worker = guard.remove(position);
                        worker.cancel.cancel();
                        tracing::debug!(
                            worker = worker.id,
                            jobs_done = worker.jobs_done.load(Ordering::Relaxed),
                            "worker evicted"
                        );
                        removed += 1;
                    }
                }
                metrics::gauge!("jobs.workers").set(guard.len() as f64);
                if removed > 0 {
                    tracing::info!(removed, utilization, "scaled workers down");
                }
            }
            ScaleAction::Hold => {}
        }
    }
    tracing::debug!("scaler stopped");
}
