use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use tracing::info_span;

use crate::error::{ExtractError, JobError};
use crate::jobs::JobStore;
use crate::pipeline::{ExtractionResult, ExtractorChain, TempFileGuard};
use crate::worker::job::Job;

/// Queue slots per worker before `submit` applies backpressure.
const QUEUE_DEPTH_PER_WORKER: usize = 64;

pub struct WorkerPool {
    job_sender: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` workers that run `chain` on submitted jobs and
    /// record each outcome in `store`.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(
        chain: Arc<ExtractorChain>,
        store: Arc<JobStore>,
        worker_count: usize,
        job_timeout: Duration,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (job_sender, job_receiver) = bounded::<Job>(worker_count * QUEUE_DEPTH_PER_WORKER);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let worker_chain = Arc::clone(&chain);
            let worker_store = Arc::clone(&store);

            let handle = thread::spawn(move || {
                run_worker(worker_id, job_rx, worker_chain, worker_store, job_timeout);
            });

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Self {
            job_sender,
            workers,
            shutdown,
        }
    }

    pub fn submit(&self, job: Job) -> Result<(), JobError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(JobError::ShuttingDown);
        }

        self.job_sender
            .send(job)
            .map_err(|_| JobError::ChannelClosed)
    }

    /// Stops accepting new jobs. Already queued jobs still run.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Closes the queue and joins every worker once it has drained.
    pub fn wait(self) {
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn queued(&self) -> usize {
        self.job_sender.len()
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<Job>,
    chain: Arc<ExtractorChain>,
    store: Arc<JobStore>,
    job_timeout: Duration,
) {
    debug!("Worker {} started", worker_id);

    // Runs until every sender is dropped and the queue is empty.
    for job in job_receiver.iter() {
        let _span = info_span!("job", job_id = %job.id, file = %job.filename).entered();
        debug!("Worker {} processing job {}", worker_id, job.id);

        if !store.begin(&job.id) {
            warn!("Job {} is no longer processing, skipping it", job.id);
            drop(TempFileGuard::new(job.upload_path));
            continue;
        }

        let job_id = job.id.clone();
        let result = execute_with_timeout(&chain, job, job_timeout);

        if !store.resolve(&job_id, &result) {
            debug!("Job {} was already resolved, result discarded", job_id);
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Runs the chain on its own thread and waits at most `timeout` for it.
///
/// The chain gets the same deadline: it starts no backend after it, and
/// external tools still running at it are killed. Whatever the thread
/// produces after the timeout is dropped with the channel.
fn execute_with_timeout(chain: &Arc<ExtractorChain>, job: Job, timeout: Duration) -> ExtractionResult {
    let (result_tx, result_rx) = bounded::<Result<ExtractionResult, ExtractError>>(1);
    let chain = Arc::clone(chain);
    let upload_path = job.upload_path.clone();
    let parent_span = tracing::Span::current();
    let deadline = Instant::now().checked_add(timeout);

    let spawned = thread::Builder::new()
        .name(format!("extract-{}", short_id(&job.id)))
        .spawn(move || {
            let _entered = parent_span.entered();
            let outcome = chain.run_until(&job.upload_path, job.media_type.as_str(), deadline);
            // The worker may have given up already.
            let _ = result_tx.send(outcome);
        });

    if let Err(e) = spawned {
        error!("Failed to spawn extraction thread: {}", e);
        drop(TempFileGuard::new(upload_path));
        return ExtractionResult::failure(JobError::SpawnFailed(e.to_string()).to_string());
    }

    match result_rx.recv_timeout(timeout) {
        // Backends cut short by the deadline fail; that is still a timeout.
        Ok(Ok(result)) if !result.is_completed() && deadline.is_some_and(|d| Instant::now() >= d) => {
            timed_out(timeout)
        }
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!("Extraction rejected: {}", e);
            ExtractionResult::failure(e.to_string())
        }
        Err(RecvTimeoutError::Timeout) => timed_out(timeout),
        Err(RecvTimeoutError::Disconnected) => {
            error!("Extraction thread exited without a result");
            ExtractionResult::failure(JobError::ChannelClosed.to_string())
        }
    }
}

fn timed_out(timeout: Duration) -> ExtractionResult {
    let err = JobError::Timeout { limit: timeout };
    warn!("{}", err);
    ExtractionResult::failure(err.to_string())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
