//! Long-lived job worker.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::JobError;
use crate::worker::job::{Job, JobResult, WorkerId};
use crate::worker::manager::JobStats;

/// Receiving end of the job queue, shared by every worker.
pub type SharedJobQueue = Arc<Mutex<mpsc::UnboundedReceiver<Job>>>;

/// Pulls jobs from the shared queue, runs them and emits results.
pub struct JobWorker {
    id: WorkerId,
    jobs: SharedJobQueue,
    results: mpsc::UnboundedSender<JobResult>,
    stats: Arc<JobStats>,
}

impl JobWorker {
    pub fn new(
        id: WorkerId,
        jobs: SharedJobQueue,
        results: mpsc::UnboundedSender<JobResult>,
        stats: Arc<JobStats>,
    ) -> Self {
        Self {
            id,
            jobs,
            results,
            stats,
        }
    }

    /// Start the worker loop on the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until the job queue closes or the result queue is dropped.
    pub async fn run(self) {
        info!(worker = %self.id, "Job worker started");

        loop {
            // Only one worker waits on the receiver at a time; the lock is
            // released as soon as a job is handed out.
            let next = {
                let mut queue = self.jobs.lock().await;
                queue.recv().await
            };

            let Some(job) = next else {
                debug!(worker = %self.id, "Job queue closed, worker exiting");
                break;
            };

            if let Ok(result) = self.handle_job(job).await
                && self.results.send(result).is_err()
            {
                warn!(worker = %self.id, "Result queue closed, worker exiting");
                break;
            }
        }
    }

    /// Execute a single job.
    ///
    /// A failed job yields `Err` and nothing is emitted for it: its callback
    /// stays in the correlation table and never fires.
    pub async fn handle_job(&self, job: Job) -> Result<JobResult, JobError> {
        let Job {
            id,
            handler,
            kwargs,
        } = job;
        let name = handler.name().to_string();

        debug!(worker = %self.id, job_id = %id, job = %name, ?kwargs, "Got job");

        let outcome = tokio::spawn(async move { handler.run(&kwargs).await }).await;
        let result = match outcome {
            Ok(result) => result,
            Err(join_err) => Err(JobError::Panicked {
                job: name.clone(),
                reason: join_err.to_string(),
            }),
        };

        match result {
            Ok(return_value) => {
                debug!(worker = %self.id, job_id = %id, job = %name, "Finished running the job");
                self.stats.record_completed();
                Ok(JobResult {
                    job_id: id,
                    return_value,
                    worker: self.id,
                })
            }
            Err(e) => {
                error!(
                    worker = %self.id,
                    job_id = %id,
                    job = %name,
                    error = %e,
                    "Failed to run the job, result abandoned"
                );
                self.stats.record_failed();
                Err(e)
            }
        }
    }
}
