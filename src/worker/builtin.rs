//! Built-in job functions.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::JobError;
use crate::worker::job::{JobHandler, Kwargs, require_i64, require_str};

/// n-th Fibonacci number, 1-indexed (`fib(1) == fib(2) == 1`).
pub fn fibonacci(n: i64) -> Result<u64, JobError> {
    if n < 1 {
        return Err(JobError::InvalidArgument {
            job: Fibonacci::NAME.to_string(),
            reason: "n must be greater than zero".to_string(),
        });
    }

    let (mut prev, mut current) = (1u64, 1u64);
    for _ in 2..n {
        let next = prev.checked_add(current).ok_or_else(|| JobError::Overflow {
            job: Fibonacci::NAME.to_string(),
            input: n.to_string(),
        })?;
        prev = current;
        current = next;
    }
    Ok(current)
}

/// CPU-bound Fibonacci job. Expects an integer kwarg `n`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fibonacci;

impl Fibonacci {
    pub const NAME: &'static str = "fibonacci";
}

#[async_trait]
impl JobHandler for Fibonacci {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, kwargs: &Kwargs) -> Result<Value, JobError> {
        let n = require_i64(kwargs, "n", Self::NAME)?;
        let value = tokio::task::spawn_blocking(move || fibonacci(n))
            .await
            .map_err(|e| JobError::Panicked {
                job: Self::NAME.to_string(),
                reason: e.to_string(),
            })??;
        Ok(json!(value))
    }
}

/// Network-bound job returning the byte length of a remote resource.
/// Expects a string kwarg `url`.
#[derive(Debug, Clone)]
pub struct ResourceLength {
    client: reqwest::Client,
}

impl ResourceLength {
    pub const NAME: &'static str = "resource_length";

    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_length(&self, url: &str) -> Result<usize, JobError> {
        let fetch_err = |reason: String| JobError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        Ok(body.len())
    }
}

#[async_trait]
impl JobHandler for ResourceLength {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, kwargs: &Kwargs) -> Result<Value, JobError> {
        let url = require_str(kwargs, "url", Self::NAME)?;
        let length = self.fetch_length(url).await?;
        tracing::debug!(url, length, "Fetched remote resource");
        Ok(json!(length))
    }
}
