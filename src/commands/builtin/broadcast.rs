//! `broadcast <text>`: send to every other online user.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::commands::context::CommandContext;
use crate::commands::registry::Command;
use crate::error::CommandError;

pub struct BroadcastCommand;

#[async_trait]
impl Command for BroadcastCommand {
    fn name(&self) -> &str {
        "broadcast"
    }

    async fn execute(&self, ctx: Arc<dyn CommandContext>) -> Result<(), CommandError> {
        let current = ctx.current_username();
        let text = ctx.message();

        for username in ctx.all_usernames().await {
            if username == current {
                continue;
            }
            // A recipient that went away mid-broadcast must not stop the rest.
            if !ctx
                .send_message_to_other_user(&username, text, Some(current))
                .await
            {
                debug!(from = %current, to = %username, "Broadcast delivery failed");
            }
        }
        Ok(())
    }
}
