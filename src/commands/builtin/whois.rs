//! `whois`: list the other online users.

use std::sync::Arc;

use async_trait::async_trait;

use crate::commands::context::CommandContext;
use crate::commands::registry::Command;
use crate::error::CommandError;

pub struct WhoisCommand;

#[async_trait]
impl Command for WhoisCommand {
    fn name(&self) -> &str {
        "whois"
    }

    fn aliases(&self) -> &[&'static str] {
        &["w"]
    }

    async fn execute(&self, ctx: Arc<dyn CommandContext>) -> Result<(), CommandError> {
        let current = ctx.current_username();
        let users: Vec<String> = ctx
            .all_usernames()
            .await
            .into_iter()
            .filter(|u| u != current)
            .collect();

        let reply = if users.is_empty() {
            "No other user is connected.".to_string()
        } else {
            format!("Online users: {}", users.join(", "))
        };
        ctx.send_message(&reply).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::mock::MockContext;

    #[tokio::test]
    async fn alone_reports_no_other_user() {
        let ctx = MockContext::new("", "u1", &["u1"]);
        WhoisCommand.execute(ctx.clone()).await.unwrap();
        assert_eq!(ctx.sent_to("u1"), vec!["No other user is connected."]);
    }

    #[tokio::test]
    async fn lists_everyone_but_the_caller() {
        let ctx = MockContext::new("", "u1", &["u1", "u2"]);
        WhoisCommand.execute(ctx.clone()).await.unwrap();
        assert_eq!(ctx.sent_to("u1"), vec!["Online users: u2"]);

        let ctx = MockContext::new("ignored payload", "u2", &["u1", "u2", "u3"]);
        WhoisCommand.execute(ctx.clone()).await.unwrap();
        assert_eq!(ctx.sent_to("u2"), vec!["Online users: u1, u3"]);
    }
}
