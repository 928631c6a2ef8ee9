//! Background job system.
//!
//! Core components:
//! - `job`: Job descriptions, results, callbacks and the `JobHandler` trait
//! - `worker`: Long-lived worker pulling from the shared job queue
//! - `manager`: Job queue, result monitor and job-id → callback correlation
//! - `builtin`: Job functions offered to commands (fibonacci, resource length)

pub mod builtin;
pub mod job;
pub mod manager;
pub mod worker;

pub use builtin::{Fibonacci, ResourceLength};
pub use job::{CallbackFn, Job, JobHandler, JobResult, Kwargs, WorkerId, callback};
pub use manager::{JobManager, JobStats, JobStatsSnapshot};
pub use worker::JobWorker;
