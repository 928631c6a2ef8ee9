//! In-memory `CommandContext` double for command tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::commands::context::CommandContext;
use crate::error::JobError;
use crate::worker::{CallbackFn, JobHandler, Kwargs};

/// A delivered message: recipient, text and optional sender tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: String,
    pub message: String,
    pub sender: Option<String>,
}

/// Records every message instead of writing to sockets. Background jobs run
/// inline, so their callbacks complete before `run_in_background` returns.
pub struct MockContext {
    message: String,
    current_username: String,
    all_usernames: Vec<String>,
    unreachable: HashSet<String>,
    deliveries: Mutex<Vec<Delivery>>,
    jobs_run: Mutex<Vec<(String, Kwargs)>>,
}

impl MockContext {
    pub fn new(message: &str, current_username: &str, all_usernames: &[&str]) -> Arc<Self> {
        Self::build(message, current_username, all_usernames, &[])
    }

    /// Like `new`, but sends to any user in `unreachable` fail.
    pub fn with_unreachable(
        message: &str,
        current_username: &str,
        all_usernames: &[&str],
        unreachable: &[&str],
    ) -> Arc<Self> {
        Self::build(message, current_username, all_usernames, unreachable)
    }

    fn build(
        message: &str,
        current_username: &str,
        all_usernames: &[&str],
        unreachable: &[&str],
    ) -> Arc<Self> {
        Arc::new(Self {
            message: message.to_string(),
            current_username: current_username.to_string(),
            all_usernames: all_usernames.iter().map(|u| u.to_string()).collect(),
            unreachable: unreachable.iter().map(|u| u.to_string()).collect(),
            deliveries: Mutex::new(Vec::new()),
            jobs_run: Mutex::new(Vec::new()),
        })
    }

    /// Messages received by `username`, in order.
    pub fn sent_to(&self, username: &str) -> Vec<String> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.recipient == username)
            .map(|d| d.message.clone())
            .collect()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Names and kwargs of jobs submitted so far.
    pub fn jobs_run(&self) -> Vec<(String, Kwargs)> {
        self.jobs_run.lock().unwrap().clone()
    }

    fn record(&self, recipient: &str, message: &str, sender: Option<&str>) {
        self.deliveries.lock().unwrap().push(Delivery {
            recipient: recipient.to_string(),
            message: message.to_string(),
            sender: sender.map(str::to_string),
        });
    }
}

#[async_trait]
impl CommandContext for MockContext {
    fn message(&self) -> &str {
        &self.message
    }

    fn current_username(&self) -> &str {
        &self.current_username
    }

    async fn all_usernames(&self) -> Vec<String> {
        self.all_usernames.clone()
    }

    async fn send_message(&self, message: &str) -> bool {
        self.record(&self.current_username, message, None);
        true
    }

    async fn send_message_to_other_user(
        &self,
        recipient: &str,
        message: &str,
        sender: Option<&str>,
    ) -> bool {
        if !self.all_usernames.iter().any(|u| u == recipient) || self.unreachable.contains(recipient)
        {
            return false;
        }
        self.record(recipient, message, sender);
        true
    }

    async fn is_user_online(&self, username: &str) -> bool {
        self.all_usernames.iter().any(|u| u == username)
    }

    async fn run_in_background(
        &self,
        job: Arc<dyn JobHandler>,
        job_kwargs: Kwargs,
        callback: CallbackFn,
        callback_kwargs: Kwargs,
    ) -> Result<(), JobError> {
        self.jobs_run
            .lock()
            .unwrap()
            .push((job.name().to_string(), job_kwargs.clone()));
        // A failed job never reaches its callback, as with the real pool.
        if let Ok(value) = job.run(&job_kwargs).await {
            let _ = callback(value, callback_kwargs).await;
        }
        Ok(())
    }
}
