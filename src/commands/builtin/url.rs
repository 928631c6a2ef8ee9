//! `url <username> <url>`: fetch a resource in the background and send its
//! size to another user.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::commands::builtin::{
    deliver_result, display_value, other_user, require_online, user_and_arg,
};
use crate::commands::context::CommandContext;
use crate::commands::registry::Command;
use crate::error::CommandError;
use crate::worker::{JobHandler, Kwargs, callback};

pub struct UrlCommand {
    job: Arc<dyn JobHandler>,
}

impl UrlCommand {
    pub fn new(job: Arc<dyn JobHandler>) -> Self {
        Self { job }
    }
}

#[async_trait]
impl Command for UrlCommand {
    fn name(&self) -> &str {
        "url"
    }

    async fn execute(&self, ctx: Arc<dyn CommandContext>) -> Result<(), CommandError> {
        let (recipient, url) = user_and_arg(ctx.message(), "url")?;
        require_online(ctx.as_ref(), recipient).await?;

        let mut job_kwargs = Kwargs::new();
        job_kwargs.insert("url".to_string(), json!(url));
        let mut callback_kwargs = Kwargs::new();
        callback_kwargs.insert("other_user".to_string(), json!(recipient));

        let reply_ctx = Arc::clone(&ctx);
        let url_owned = url.to_string();
        let on_done = callback(move |result, kwargs| async move {
            let target = other_user(&kwargs)?;
            let text = format!("resource_size({url_owned}) = {}", display_value(&result));
            deliver_result(
                reply_ctx.as_ref(),
                &target,
                &text,
                "URL size is delivered to",
                "Cannot deliver url size to",
            )
            .await
        });

        ctx.run_in_background(Arc::clone(&self.job), job_kwargs, on_done, callback_kwargs)
            .await
            .map_err(|e| CommandError::Schedule {
                reason: e.to_string(),
            })
    }
}
