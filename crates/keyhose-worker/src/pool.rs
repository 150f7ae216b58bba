//! Fixed-size worker pool.
//!
//! `workers` tokio tasks drain one bounded queue. Each job runs on tokio's
//! blocking pool under the job timeout, so a stuck entropy source cannot
//! stall the runtime. Callers hold a cloneable [`PoolHandle`] and await their
//! job's reply.
//!
//! A job that outlives its timeout is answered right away, but its worker
//! keeps the slot until the blocking call really returns. Abandoned work
//! therefore counts against the pool size like any other job.
//!
//! # Invariants
//!
//! - At most `workers` operations execute at any moment, timed out or not
//! - A job yields either its full output or a [`JobError`], never both
//! - Unknown operations are rejected before anything is queued
//! - Secrets never appear in log fields

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use bytes::Bytes;
use tokio::{
    sync::{Mutex, mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    error::WorkerError,
    job_error::JobError,
    operation::{Job, Operation, OperationTable},
};

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 10;

/// Default bound on queued jobs.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Default per-job timeout.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool sizing and limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Jobs that may wait for a worker before `execute` applies backpressure
    pub queue_depth: usize,
    /// Longest a single job may run
    pub job_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Reject zero-sized pools, queues and timeouts.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.workers == 0 {
            return Err(WorkerError::Config("workers must be at least 1".to_string()));
        }
        if self.queue_depth == 0 {
            return Err(WorkerError::Config("queue depth must be at least 1".to_string()));
        }
        if self.job_timeout.is_zero() {
            return Err(WorkerError::Config("job timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// A queued job with everything a worker needs to run it.
struct Dispatch {
    job: Job,
    operation_name: String,
    operation: Arc<dyn Operation>,
    reply: oneshot::Sender<Result<Bytes, JobError>>,
}

/// Running pool.
///
/// Dropping it stops the workers the same way [`WorkerPool::shutdown`] does,
/// without waiting for them.
pub struct WorkerPool {
    handle: PoolHandle,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn the workers. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `WorkerError::Config` if `config` fails validation
    pub fn start(config: PoolConfig, table: OperationTable) -> Result<Self, WorkerError> {
        config.validate()?;

        let (queue_tx, queue_rx) = mpsc::channel(config.queue_depth);
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let workers = (0..config.workers)
            .map(|index| {
                tokio::spawn(run_worker(
                    index,
                    Arc::clone(&queue_rx),
                    shutdown_rx.clone(),
                    config.job_timeout,
                ))
            })
            .collect();

        tracing::info!(
            workers = config.workers,
            queue_depth = config.queue_depth,
            job_timeout_ms = config.job_timeout.as_millis() as u64,
            operations = ?table.names(),
            "worker pool started"
        );

        let handle = PoolHandle {
            queue: queue_tx,
            table: Arc::new(table),
            next_job_id: Arc::new(AtomicU64::new(1)),
        };

        Ok(Self { handle, shutdown, workers })
    }

    /// A handle for submitting jobs.
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Stop the workers and wait for them to exit.
    ///
    /// Jobs already running finish; queued jobs are dropped and their callers
    /// see [`JobError::PoolClosed`], as does every later `execute`.
    pub async fn shutdown(self) {
        // Receivers may all be gone already
        let _ = self.shutdown.send(true);
        drop(self.handle);

        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "worker task failed");
            }
        }

        tracing::info!("worker pool stopped");
    }
}

/// Cloneable submission handle.
#[derive(Clone)]
pub struct PoolHandle {
    queue: mpsc::Sender<Dispatch>,
    table: Arc<OperationTable>,
    next_job_id: Arc<AtomicU64>,
}

impl PoolHandle {
    /// Run `operation` on `data` and wait for its output.
    ///
    /// Waits for queue space when the queue is full.
    ///
    /// # Errors
    ///
    /// - `UnknownOperation` if nothing is registered under `operation`
    /// - `PoolClosed` if the pool shut down before the job completed
    /// - `TimedOut` if the job exceeded the pool's job timeout
    /// - `WorkerPanicked` if the operation panicked
    /// - Any error the operation itself returns
    pub async fn execute(&self, operation: &str, data: Bytes) -> Result<Bytes, JobError> {
        let Some(op) = self.table.get(operation) else {
            tracing::warn!(operation, error_type = "unknown_operation", "job rejected");
            return Err(JobError::UnknownOperation(operation.to_string()));
        };

        let id = self.next_job_id.fetch_add(1, Ordering::Relaxed);
        let (reply, outcome) = oneshot::channel();

        tracing::debug!(job_id = id, operation, data_len = data.len(), "job queued");

        let dispatch = Dispatch {
            job: Job { id, data },
            operation_name: operation.to_string(),
            operation: op,
            reply,
        };
        self.queue.send(dispatch).await.map_err(|_| JobError::PoolClosed)?;

        outcome.await.map_err(|_| JobError::PoolClosed)?
    }

    /// True once the pool has shut down.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

async fn run_worker(
    index: usize,
    queue: Arc<Mutex<mpsc::Receiver<Dispatch>>>,
    mut shutdown: watch::Receiver<bool>,
    job_timeout: Duration,
) {
    tracing::debug!(worker = index, "worker started");

    loop {
        let next = {
            let mut queue = queue.lock().await;
            tokio::select! {
                biased;
                // Fires on shutdown and when the pool is dropped
                _ = shutdown.changed() => None,
                dispatch = queue.recv() => dispatch,
            }
        };

        let Some(dispatch) = next else { break };
        run_job(index, dispatch, job_timeout).await;
    }

    tracing::debug!(worker = index, "worker stopped");
}

async fn run_job(index: usize, dispatch: Dispatch, job_timeout: Duration) {
    let Dispatch { job, operation_name, operation, reply } = dispatch;
    let job_id = job.id;
    let started = Instant::now();

    let runner = Arc::clone(&operation);
    let mut task = tokio::task::spawn_blocking(move || runner.execute(&job));

    let (outcome, abandoned) = match tokio::time::timeout(job_timeout, &mut task).await {
        Ok(Ok(result)) => (result.map(Bytes::from), false),
        Ok(Err(join_error)) if join_error.is_panic() => (Err(JobError::WorkerPanicked), false),
        Ok(Err(_)) => (Err(JobError::PoolClosed), false),
        Err(_) => (Err(operation.timeout_error(started.elapsed())), true),
    };

    let elapsed_us = started.elapsed().as_micros() as u64;
    match &outcome {
        Ok(output) => tracing::debug!(
            worker = index,
            job_id,
            operation = %operation_name,
            elapsed_us,
            output_len = output.len(),
            "job completed"
        ),
        Err(e) => tracing::warn!(
            worker = index,
            job_id,
            operation = %operation_name,
            elapsed_us,
            error_type = e.error_type(),
            error = %e,
            "job failed"
        ),
    }

    if reply.send(outcome).is_err() {
        tracing::debug!(job_id, "caller went away before the reply");
    }

    // Blocking tasks cannot be cancelled; hold the slot until this one ends
    if abandoned {
        let _ = task.await;
        tracing::debug!(
            worker = index,
            job_id,
            held_ms = started.elapsed().as_millis() as u64,
            "abandoned job returned, worker free"
        );
    }
}
