//! `CommandContext` bound to a live session.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::commands::CommandContext;
use crate::error::JobError;
use crate::server::session::Session;
use crate::server::state::ServerState;
use crate::worker::{CallbackFn, JobHandler, Kwargs};

/// Context for one input line from one session.
pub struct SessionContext {
    message: String,
    session: Arc<Session>,
    state: ServerState,
}

impl SessionContext {
    pub fn new(message: String, session: Arc<Session>, state: ServerState) -> Self {
        Self {
            message,
            session,
            state,
        }
    }
}

#[async_trait]
impl CommandContext for SessionContext {
    fn message(&self) -> &str {
        &self.message
    }

    fn current_username(&self) -> &str {
        self.session.username()
    }

    async fn all_usernames(&self) -> Vec<String> {
        self.state.registry.usernames().await
    }

    async fn send_message(&self, message: &str) -> bool {
        match self.session.send(message, None).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Reply not delivered");
                false
            }
        }
    }

    async fn send_message_to_other_user(
        &self,
        recipient: &str,
        message: &str,
        sender: Option<&str>,
    ) -> bool {
        let Some(session) = self.state.registry.find(recipient).await else {
            return false;
        };
        match session.send(message, sender).await {
            Ok(()) => true,
            Err(e) => {
                debug!(recipient, error = %e, "Message not delivered");
                false
            }
        }
    }

    async fn is_user_online(&self, username: &str) -> bool {
        self.state.registry.find(username).await.is_some()
    }

    async fn run_in_background(
        &self,
        job: Arc<dyn JobHandler>,
        job_kwargs: Kwargs,
        callback: CallbackFn,
        callback_kwargs: Kwargs,
    ) -> Result<(), JobError> {
        let job_id = self
            .state
            .jobs
            .enqueue_job(job, job_kwargs, callback, callback_kwargs)
            .await?;
        debug!(username = %self.session.username(), job_id = %job_id, "Background job submitted");
        Ok(())
    }
}
