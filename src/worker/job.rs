//! Job descriptions, results and callbacks.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{CallbackError, JobError};

/// Keyword arguments passed to job functions and callbacks.
pub type Kwargs = serde_json::Map<String, Value>;

/// A function that can be run as a background job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Run the job with its keyword arguments.
    async fn run(&self, kwargs: &Kwargs) -> Result<Value, JobError>;
}

/// Identity of the worker that produced a result. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// A unit of work on the shared job queue.
pub struct Job {
    pub id: Uuid,
    pub handler: Arc<dyn JobHandler>,
    pub kwargs: Kwargs,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("handler", &self.handler.name())
            .field("kwargs", &self.kwargs)
            .finish()
    }
}

/// Output of a successfully completed job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: Uuid,
    pub return_value: Value,
    pub worker: WorkerId,
}

/// Future returned by a callback.
pub type CallbackFuture = BoxFuture<'static, Result<(), CallbackError>>;

/// Callback invoked with a job's return value and its stored kwargs.
pub type CallbackFn = Box<dyn FnOnce(Value, Kwargs) -> CallbackFuture + Send>;

/// Wrap an async closure as a [`CallbackFn`].
pub fn callback<F, Fut>(f: F) -> CallbackFn
where
    F: FnOnce(Value, Kwargs) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
{
    Box::new(move |value, kwargs| Box::pin(f(value, kwargs)))
}

/// A pending callback in the correlation table.
pub struct CallbackEntry {
    pub func: CallbackFn,
    pub kwargs: Kwargs,
}

/// Read a required integer kwarg.
pub fn require_i64(kwargs: &Kwargs, key: &str, job: &str) -> Result<i64, JobError> {
    kwargs
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| JobError::InvalidArgument {
            job: job.to_string(),
            reason: format!("missing integer argument '{key}'"),
        })
}

/// Read a required string kwarg.
pub fn require_str<'a>(kwargs: &'a Kwargs, key: &str, job: &str) -> Result<&'a str, JobError> {
    kwargs
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| JobError::InvalidArgument {
            job: job.to_string(),
            reason: format!("missing string argument '{key}'"),
        })
}
