//! `fib <username> <n>`: compute a Fibonacci number in the background and
//! send it to another user.

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

pub struct FibCommand {
    job: Arc<dyn JobHandler>,
}

impl FibCommand {
    pub fn new(job: Arc<dyn JobHandler>) -> Self {
        Self { job }
    }
}

#[async_trait]
impl Command for FibCommand {
    fn name(&self) -> &str {
        "fib"
    }

    async fn execute(&self, ctx: Arc<dyn CommandContext>) -> Result<(), CommandError> {
        let (recipient, number) = user_and_arg(ctx.message(), "fib")?;
        let n: i64 = number
            .parse()
            .map_err(|_| CommandError::InvalidParameters { command: "fib" })?;
        require_online(ctx.as_ref(), recipient).await?;

        let mut job_kwargs = Kwargs::new();
        job_kwargs.insert("n".to_string(), json!(n));
        let mut callback_kwargs = Kwargs::new();
        callback_kwargs.insert("other_user".to_string(), json!(recipient));

        let reply_ctx = Arc::clone(&ctx);
        let on_done = callback(move |result, kwargs| async move {
            let target = other_user(&kwargs)?;
            let text = format!("fib({n}) = {}", display_value(&result));
            deliver_result(
                reply_ctx.as_ref(),
                &target,
                &text,
                "Fib result is delivered to",
                "Cannot deliver fib result to",
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
