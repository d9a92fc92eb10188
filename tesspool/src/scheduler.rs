//! Job scheduler distributing recognition work across OCR workers
//!
//! Every registered worker gets its own tokio task. The tasks share one job
//! queue, so whichever worker is idle picks up the next job. The blocking
//! engine call runs on `spawn_blocking`: the worker is moved into the
//! blocking closure and handed back when the job finishes.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::{default_error_handler, ErrorHandler};
use crate::engine::{Job, OcrWorker, RecognizeResult};
use crate::error::{Result, TessError};

pub type WorkerId = usize;

struct QueuedJob {
    id: u64,
    job: Job,
    reply: oneshot::Sender<Result<RecognizeResult>>,
}

type JobQueue = Arc<Mutex<mpsc::UnboundedReceiver<QueuedJob>>>;

/// State shared between the scheduler handle and its worker tasks.
struct Shared {
    queue: JobQueue,
    shutdown: CancellationToken,
    active_workers: AtomicUsize,
    queued_jobs: AtomicUsize,
    error_handler: ErrorHandler,
}

pub struct Scheduler {
    sender: mpsc::UnboundedSender<QueuedJob>,
    shared: Arc<Shared>,
    tracker: TaskTracker,
    next_worker_id: AtomicUsize,
    next_job_id: AtomicU64,
}

impl Scheduler {
    /// Create an empty scheduler whose workers report job errors to `error_handler`.
    pub fn new(error_handler: ErrorHandler) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            shared: Arc::new(Shared {
                queue: Arc::new(Mutex::new(receiver)),
                shutdown: CancellationToken::new(),
                active_workers: AtomicUsize::new(0),
                queued_jobs: AtomicUsize::new(0),
                error_handler,
            }),
            tracker: TaskTracker::new(),
            next_worker_id: AtomicUsize::new(0),
            next_job_id: AtomicU64::new(0),
        }
    }

    /// Register a ready worker. Must be called from within a tokio runtime.
    pub fn add_worker(&self, worker: Box<dyn OcrWorker>) -> WorkerId {
        let id = self.next_worker_id.fetch_add(1, Ordering::SeqCst);
        self.shared.active_workers.fetch_add(1, Ordering::SeqCst);
        self.tracker.spawn(run_worker(id, worker, Arc::clone(&self.shared)));
        debug!(worker = id, "Worker added to scheduler");
        id
    }

    pub fn num_workers(&self) -> usize {
        self.shared.active_workers.load(Ordering::SeqCst)
    }

    /// Jobs submitted but not yet picked up by a worker.
    pub fn queue_len(&self) -> usize {
        self.shared.queued_jobs.load(Ordering::SeqCst)
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Submit a job and wait for its result.
    ///
    /// Fails immediately with `NoWorkers` when the pool is empty rather than
    /// parking the job until a worker shows up.
    pub async fn add_job(&self, job: Job) -> Result<RecognizeResult> {
        if self.is_terminated() {
            return Err(TessError::SchedulerClosed);
        }
        if self.num_workers() == 0 {
            return Err(TessError::NoWorkers);
        }

        let response = self.enqueue(job).await?;
        response.await.map_err(|_| TessError::SchedulerClosed)?
    }

    async fn enqueue(&self, job: Job) -> Result<oneshot::Receiver<Result<RecognizeResult>>> {
        let id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
        let (reply, response) = oneshot::channel();
        debug!(job_id = id, job = job.name(), "Queueing job");

        self.shared.queued_jobs.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(QueuedJob { id, job, reply }).is_err() {
            self.shared.queued_jobs.fetch_sub(1, Ordering::SeqCst);
            return Err(TessError::SchedulerClosed);
        }

        // The last worker may have left, or terminate() may have drained the
        // queue, between the checks in `add_job` and the send. Nobody else will
        // pick the job up then.
        if self.is_terminated() {
            drain_queue(&self.shared, || TessError::SchedulerClosed).await;
        } else if self.num_workers() == 0 {
            drain_queue(&self.shared, || TessError::NoWorkers).await;
        }

        Ok(response)
    }

    /// Stop accepting jobs, let in-flight jobs finish and wait for every
    /// worker task to exit. Jobs still queued fail with `SchedulerClosed`.
    pub async fn terminate(&self) {
        info!(workers = self.num_workers(), "Terminating scheduler");
        self.shared.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        drain_queue(&self.shared, || TessError::SchedulerClosed).await;
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(default_error_handler())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

async fn run_worker(id: WorkerId, mut worker: Box<dyn OcrWorker>, shared: Arc<Shared>) {
    let lost = loop {
        let next = tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => None,
            job = async { shared.queue.lock().await.recv().await } => job,
        };
        let Some(QueuedJob { id: job_id, job, reply }) = next else {
            break None;
        };
        shared.queued_jobs.fetch_sub(1, Ordering::SeqCst);
        debug!(worker = id, job_id, job = job.name(), "Worker picked up job");

        let outcome = tokio::task::spawn_blocking(move || {
            let result = match &job {
                Job::Recognize(image) => worker.recognize(image),
            };
            (worker, result)
        })
        .await;

        match outcome {
            Ok((returned, result)) => {
                worker = returned;
                if let Err(e) = &result {
                    (shared.error_handler)(e);
                }
                let _ = reply.send(result);
            }
            Err(e) => {
                let error = TessError::Recognition(format!("worker {id} crashed: {e}"));
                (shared.error_handler)(&error);
                break Some((reply, error));
            }
        }
    };

    let remaining = shared.active_workers.fetch_sub(1, Ordering::SeqCst) - 1;
    if lost.is_some() {
        warn!(worker = id, remaining, "Worker removed from pool");
    }
    if remaining == 0 && !shared.shutdown.is_cancelled() {
        drain_queue(&shared, || TessError::NoWorkers).await;
    }
    if let Some((reply, error)) = lost {
        let _ = reply.send(Err(error));
    }
}

async fn drain_queue(shared: &Shared, error: impl Fn() -> TessError) {
    let mut queue = shared.queue.lock().await;
    while let Ok(job) = queue.try_recv() {
        shared.queued_jobs.fetch_sub(1, Ordering::SeqCst);
        let _ = job.reply.send(Err(error()));
    }
}
