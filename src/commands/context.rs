//! The capability view a command handler operates through.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::JobError;
use crate::worker::{CallbackFn, JobHandler, Kwargs};

/// Everything a command may do, and nothing more.
///
/// Commands never see sessions, the registry or the job manager directly;
/// the server binds a context to the issuing session for each input line.
#[async_trait]
pub trait CommandContext: Send + Sync {
    /// Payload of the triggering line (everything after the command name).
    fn message(&self) -> &str;

    /// Username of the issuing session.
    fn current_username(&self) -> &str;

    /// Usernames of every online session, the caller included.
    async fn all_usernames(&self) -> Vec<String>;

    /// Send a system reply to the issuing session.
    async fn send_message(&self, message: &str) -> bool;

    /// Send to another online user, optionally attributed to `sender`.
    async fn send_message_to_other_user(
        &self,
        recipient: &str,
        message: &str,
        sender: Option<&str>,
    ) -> bool;

    async fn is_user_online(&self, username: &str) -> bool;

    /// Schedule `job` on the worker pool; `callback` runs with its result.
    async fn run_in_background(
        &self,
        job: Arc<dyn JobHandler>,
        job_kwargs: Kwargs,
        callback: CallbackFn,
        callback_kwargs: Kwargs,
    ) -> Result<(), JobError>;
}
