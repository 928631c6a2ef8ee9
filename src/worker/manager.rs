//! Job manager: job queue, result monitor and callback correlation.
//!
//! Jobs are pushed onto an unbounded queue shared by a fixed pool of
//! [`JobWorker`]s. Workers push results onto a second queue drained by a
//! single monitor task, which pops the matching callback from the
//! correlation table and runs it. Each callback fires at most once.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::JobError;
use crate::worker::job::{CallbackEntry, CallbackFn, Job, JobHandler, JobResult, Kwargs, WorkerId};
use crate::worker::worker::JobWorker;

/// Counters describing job traffic.
#[derive(Debug, Default)]
pub struct JobStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    callbacks_run: AtomicU64,
    callback_failures: AtomicU64,
    orphaned_results: AtomicU64,
}

/// Point-in-time copy of [`JobStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JobStatsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub callbacks_run: u64,
    pub callback_failures: u64,
    pub orphaned_results: u64,
}

impl JobStats {
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback_run(&self) {
        self.callbacks_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback_failure(&self) {
        self.callback_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_orphaned(&self) {
        self.orphaned_results.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> JobStatsSnapshot {
        JobStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            callbacks_run: self.callbacks_run.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            orphaned_results: self.orphaned_results.load(Ordering::Relaxed),
        }
    }
}

type CorrelationTable = Arc<Mutex<HashMap<Uuid, CallbackEntry>>>;

/// Owns the worker pool and routes completed jobs back to their callbacks.
pub struct JobManager {
    job_tx: mpsc::UnboundedSender<Job>,
    callbacks: CorrelationTable,
    stats: Arc<JobStats>,
    /// Worker and monitor tasks. Held for the lifetime of the manager.
    _tasks: Vec<JoinHandle<()>>,
}

impl JobManager {
    /// Start a manager with `worker_count` workers and the result monitor.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(worker_count: usize) -> Arc<Self> {
        let (job_tx, job_rx) = mpsc::unbounded_channel::<Job>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<JobResult>();
        let callbacks: CorrelationTable = Arc::new(Mutex::new(HashMap::new()));
        let stats = Arc::new(JobStats::default());

        let mut tasks = Vec::with_capacity(worker_count + 1);
        tasks.push(tokio::spawn(Self::monitor_results(
            result_rx,
            Arc::clone(&callbacks),
            Arc::clone(&stats),
        )));

        let shared_jobs = Arc::new(Mutex::new(job_rx));
        for i in 0..worker_count {
            let worker = JobWorker::new(
                WorkerId(i),
                Arc::clone(&shared_jobs),
                result_tx.clone(),
                Arc::clone(&stats),
            );
            tasks.push(worker.spawn());
        }

        info!(workers = worker_count, "Job manager started");

        Arc::new(Self {
            job_tx,
            callbacks,
            stats,
            _tasks: tasks,
        })
    }

    /// Enqueue a job to be run in the background.
    ///
    /// Returns as soon as the job is queued. `callback` is invoked with the
    /// job's return value and `callback_kwargs` once a worker finishes it.
    pub async fn enqueue_job(
        &self,
        job: Arc<dyn JobHandler>,
        job_kwargs: Kwargs,
        callback: CallbackFn,
        callback_kwargs: Kwargs,
    ) -> Result<Uuid, JobError> {
        let job_id = Uuid::new_v4();
        let job_name = job.name().to_string();

        // The entry must be visible before any worker can finish the job.
        self.callbacks.lock().await.insert(
            job_id,
            CallbackEntry {
                func: callback,
                kwargs: callback_kwargs,
            },
        );

        let description = Job {
            id: job_id,
            handler: job,
            kwargs: job_kwargs,
        };
        if self.job_tx.send(description).is_err() {
            self.callbacks.lock().await.remove(&job_id);
            error!(job_id = %job_id, job = %job_name, "Job queue closed, job dropped");
            return Err(JobError::QueueClosed { id: job_id });
        }

        self.stats.record_submitted();
        debug!(job_id = %job_id, job = %job_name, "Job enqueued");
        Ok(job_id)
    }

    /// Number of callbacks still waiting for a result.
    ///
    /// Includes entries for jobs that failed, which are never removed.
    pub async fn pending_callbacks(&self) -> usize {
        self.callbacks.lock().await.len()
    }

    pub fn stats(&self) -> JobStatsSnapshot {
        self.stats.snapshot()
    }

    async fn monitor_results(
        mut results: mpsc::UnboundedReceiver<JobResult>,
        callbacks: CorrelationTable,
        stats: Arc<JobStats>,
    ) {
        while let Some(result) = results.recv().await {
            Self::run_callback(result, &callbacks, &stats).await;
        }
        debug!("Result queue closed, monitor exiting");
    }

    /// Pop the callback for `result` and start it.
    ///
    /// The callback runs detached from the monitor, so one slow or stuck
    /// callback never holds back results for other jobs. A watcher task
    /// records its outcome and catches panics.
    async fn run_callback(result: JobResult, callbacks: &CorrelationTable, stats: &Arc<JobStats>) {
        let JobResult {
            job_id,
            return_value,
            worker,
        } = result;

        let Some(entry) = callbacks.lock().await.remove(&job_id) else {
            error!(job_id = %job_id, worker = %worker, "Didn't find the callback for job");
            stats.record_orphaned();
            return;
        };

        let CallbackEntry { func, kwargs } = entry;
        let running = tokio::spawn(func(return_value, kwargs));
        let stats = Arc::clone(stats);
        tokio::spawn(async move {
            let outcome = running.await;
            stats.record_callback_run();

            match outcome {
                Ok(Ok(())) => debug!(job_id = %job_id, worker = %worker, "Callback finished"),
                Ok(Err(e)) => {
                    warn!(job_id = %job_id, error = %e, "Callback reported failure");
                    stats.record_callback_failure();
                }
                Err(join_err) => {
                    error!(job_id = %job_id, error = %join_err, "Failed to run callback");
                    stats.record_callback_failure();
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallbackError;
    use crate::worker::job::callback;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    struct Double;

    #[async_trait]
    impl JobHandler for Double {
        fn name(&self) -> &str {
            "double"
        }
        async fn run(&self, kwargs: &Kwargs) -> Result<Value, JobError> {
            let n = kwargs.get("n").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(n * 2))
        }
    }

    struct Failing;

    #[async_trait]
    impl JobHandler for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn run(&self, _kwargs: &Kwargs) -> Result<Value, JobError> {
            Err(JobError::InvalidArgument {
                job: "failing".to_string(),
                reason: "always fails".to_string(),
            })
        }
    }

    /// Blocks until released, to prove enqueue does not wait on completion.
    struct Gate(std::sync::Mutex<Option<oneshot::Receiver<()>>>);

    #[async_trait]
    impl JobHandler for Gate {
        fn name(&self) -> &str {
            "gate"
        }
        async fn run(&self, _kwargs: &Kwargs) -> Result<Value, JobError> {
            let rx = self.0.lock().unwrap().take();
            if let Some(rx) = rx {
                let _ = rx.await;
            }
            Ok(json!("released"))
        }
    }

    fn kwargs(value: Value) -> Kwargs {
        value.as_object().cloned().unwrap_or_default()
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        timeout(TEST_TIMEOUT, async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn callback_receives_return_value_and_kwargs() {
        let manager = JobManager::new(2);
        let (tx, rx) = oneshot::channel();

        manager
            .enqueue_job(
                Arc::new(Double),
                kwargs(json!({"n": 21})),
                callback(move |value, kwargs| async move {
                    let _ = tx.send((value, kwargs));
                    Ok(())
                }),
                kwargs(json!({"other_user": "u2"})),
            )
            .await
            .unwrap();

        let (value, args) = timeout(TEST_TIMEOUT, rx).await.unwrap().unwrap();
        assert_eq!(value, json!(42));
        assert_eq!(args["other_user"], "u2");
    }

    #[tokio::test]
    async fn enqueue_returns_before_job_completes() {
        let manager = JobManager::new(1);
        let (release_tx, release_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        timeout(
            Duration::from_millis(500),
            manager.enqueue_job(
                Arc::new(Gate(std::sync::Mutex::new(Some(release_rx)))),
                Kwargs::new(),
                callback(move |value, _| async move {
                    let _ = done_tx.send(value);
                    Ok(())
                }),
                Kwargs::new(),
            ),
        )
        .await
        .expect("enqueue blocked")
        .unwrap();

        assert_eq!(manager.pending_callbacks().await, 1);
        release_tx.send(()).unwrap();
        let value = timeout(TEST_TIMEOUT, done_rx).await.unwrap().unwrap();
        assert_eq!(value, json!("released"));
    }

    #[tokio::test]
    async fn each_callback_fires_exactly_once_under_concurrency() {
        let manager = JobManager::new(4);
        let fired = Arc::new(std::sync::Mutex::new(HashMap::<i64, usize>::new()));

        for n in 0..50 {
            let fired = Arc::clone(&fired);
            manager
                .enqueue_job(
                    Arc::new(Double),
                    kwargs(json!({"n": n})),
                    callback(move |value, _| async move {
                        let key = value.as_i64().unwrap() / 2;
                        *fired.lock().unwrap().entry(key).or_default() += 1;
                        Ok(())
                    }),
                    Kwargs::new(),
                )
                .await
                .unwrap();
        }

        let stats = Arc::clone(&manager.stats);
        wait_for(|| stats.snapshot().callbacks_run == 50).await;

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 50);
        assert!(fired.values().all(|count| *count == 1));
        assert_eq!(manager.pending_callbacks().await, 0);
        assert_eq!(manager.stats().orphaned_results, 0);
    }

    #[tokio::test]
    async fn failed_job_never_fires_callback_and_stays_pending() {
        let manager = JobManager::new(1);
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        manager
            .enqueue_job(
                Arc::new(Failing),
                Kwargs::new(),
                callback(move |_, _| async move {
                    let _ = tx.send(());
                    Ok(())
                }),
                Kwargs::new(),
            )
            .await
            .unwrap();

        let stats = Arc::clone(&manager.stats);
        wait_for(|| stats.snapshot().failed == 1).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(manager.pending_callbacks().await, 1);
        assert_eq!(manager.stats().callbacks_run, 0);
    }

    #[tokio::test]
    async fn failing_and_panicking_callbacks_do_not_stop_monitor() {
        let manager = JobManager::new(2);

        manager
            .enqueue_job(
                Arc::new(Double),
                Kwargs::new(),
                callback(|_, _| async move {
                    Err(CallbackError::Other("nope".to_string()))
                }),
                Kwargs::new(),
            )
            .await
            .unwrap();
        manager
            .enqueue_job(
                Arc::new(Double),
                Kwargs::new(),
                callback(|_, _| async move {
                    let missing: Option<()> = None;
                    missing.expect("callback panic");
                    Ok(())
                }),
                Kwargs::new(),
            )
            .await
            .unwrap();

        let stats = Arc::clone(&manager.stats);
        wait_for(|| stats.snapshot().callback_failures == 2).await;

        let (tx, rx) = oneshot::channel();
        manager
            .enqueue_job(
                Arc::new(Double),
                kwargs(json!({"n": 4})),
                callback(move |value, _| async move {
                    let _ = tx.send(value);
                    Ok(())
                }),
                Kwargs::new(),
            )
            .await
            .unwrap();
        assert_eq!(timeout(TEST_TIMEOUT, rx).await.unwrap().unwrap(), json!(8));
    }

    #[tokio::test]
    async fn stuck_callback_does_not_hold_back_other_results() {
        let manager = JobManager::new(2);

        manager
            .enqueue_job(
                Arc::new(Double),
                Kwargs::new(),
                callback(|_, _| async move {
                    std::future::pending::<()>().await;
                    Ok(())
                }),
                Kwargs::new(),
            )
            .await
            .unwrap();

        let stats = Arc::clone(&manager.stats);
        wait_for(|| stats.snapshot().completed == 1).await;

        let (tx, rx) = oneshot::channel();
        manager
            .enqueue_job(
                Arc::new(Double),
                kwargs(json!({"n": 5})),
                callback(move |value, _| async move {
                    let _ = tx.send(value);
                    Ok(())
                }),
                Kwargs::new(),
            )
            .await
            .unwrap();

        assert_eq!(timeout(TEST_TIMEOUT, rx).await.unwrap().unwrap(), json!(10));
        assert_eq!(manager.pending_callbacks().await, 0);
    }

    #[tokio::test]
    async fn stalled_recipient_does_not_hold_back_other_results() {
        use crate::server::Session;
        use tokio::io::{AsyncBufReadExt, BufReader, duplex};

        let manager = JobManager::new(2);

        // A recipient that never reads from its connection.
        let (_stalled_peer, stalled_end) = duplex(16);
        let stalled = Session::with_send_timeout("u1", stalled_end, Duration::from_secs(60));
        manager
            .enqueue_job(
                Arc::new(Double),
                kwargs(json!({"n": 1})),
                callback(move |value, _| async move {
                    let _ = stalled.send(&format!("result = {value}"), None).await;
                    Ok(())
                }),
                Kwargs::new(),
            )
            .await
            .unwrap();

        let (reader, healthy_end) = duplex(1024);
        let healthy = Session::new("u2", healthy_end);
        manager
            .enqueue_job(
                Arc::new(Double),
                kwargs(json!({"n": 3})),
                callback(move |value, _| async move {
                    let _ = healthy.send(&format!("result = {value}"), None).await;
                    Ok(())
                }),
                Kwargs::new(),
            )
            .await
            .unwrap();

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        timeout(Duration::from_secs(2), reader.read_line(&mut line))
            .await
            .expect("callback for the healthy recipient never ran")
            .unwrap();
        assert!(line.ends_with("] result = 6\n"), "got {line:?}");
    }

    #[test]
    fn snapshot_serializes_every_counter() {
        let stats = JobStats::default();
        stats.record_submitted();
        stats.record_failed();

        let value = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(
            value,
            json!({
                "submitted": 1,
                "completed": 0,
                "failed": 1,
                "callbacks_run": 0,
                "callback_failures": 0,
                "orphaned_results": 0,
            })
        );
    }

    #[tokio::test]
    async fn result_without_callback_is_discarded() {
        let callbacks: CorrelationTable = Arc::new(Mutex::new(HashMap::new()));
        let stats = Arc::new(JobStats::default());
        JobManager::run_callback(
            JobResult {
                job_id: Uuid::new_v4(),
                return_value: json!(1),
                worker: WorkerId(0),
            },
            &callbacks,
            &stats,
        )
        .await;
        assert_eq!(stats.snapshot().orphaned_results, 1);
        assert_eq!(stats.snapshot().callbacks_run, 0);
    }
}
