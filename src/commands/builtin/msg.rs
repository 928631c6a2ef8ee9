//! `msg <username> <text>`: private message to one user.

use std::sync::Arc;

use async_trait::async_trait;

use crate::commands::builtin::require_online;
use crate::commands::context::CommandContext;
use crate::commands::registry::Command;
use crate::error::CommandError;

pub struct MsgCommand;

#[async_trait]
impl Command for MsgCommand {
    fn name(&self) -> &str {
        "msg"
    }

    async fn execute(&self, ctx: Arc<dyn CommandContext>) -> Result<(), CommandError> {
        let payload = ctx.message();
        let (other_user, text) = payload.split_once(' ').unwrap_or((payload, ""));

        require_online(ctx.as_ref(), other_user).await?;

        let current = ctx.current_username();
        let reply = if ctx
            .send_message_to_other_user(other_user, text, Some(current))
            .await
        {
            format!("Message is delivered to {other_user}")
        } else {
            format!("Cannot deliver the message to {other_user}")
        };
        ctx.send_message(&reply).await;
        Ok(())
    }
}
