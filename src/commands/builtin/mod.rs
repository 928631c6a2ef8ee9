//! Built-in chat commands.

pub mod broadcast;
pub mod fib;
pub mod msg;
pub mod url;
pub mod whois;

use std::sync::Arc;

use serde_json::Value;

use crate::commands::context::CommandContext;
use crate::commands::registry::CommandRegistry;
use crate::error::{CallbackError, CommandError};
use crate::worker::JobHandler;

pub use broadcast::BroadcastCommand;
pub use fib::FibCommand;
pub use msg::MsgCommand;
pub use url::UrlCommand;
pub use whois::WhoisCommand;

/// Register every built-in command.
///
/// `fib_job` and `url_job` are the background functions behind `fib` and `url`.
pub fn register_builtins(
    registry: &mut CommandRegistry,
    fib_job: Arc<dyn JobHandler>,
    url_job: Arc<dyn JobHandler>,
) {
    registry.register(Arc::new(WhoisCommand));
    registry.register(Arc::new(MsgCommand));
    registry.register(Arc::new(BroadcastCommand));
    registry.register(Arc::new(UrlCommand::new(url_job)));
    registry.register(Arc::new(FibCommand::new(fib_job)));
}

/// Parse a `<username> <arg>` payload: exactly two tokens separated by a
/// single space.
fn user_and_arg<'a>(
    payload: &'a str,
    command: &'static str,
) -> Result<(&'a str, &'a str), CommandError> {
    let mut tokens = payload.split(' ');
    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(user), Some(arg), None) if !user.is_empty() && !arg.is_empty() => Ok((user, arg)),
        _ => Err(CommandError::InvalidParameters { command }),
    }
}

async fn require_online(ctx: &dyn CommandContext, username: &str) -> Result<(), CommandError> {
    if ctx.is_user_online(username).await {
        Ok(())
    } else {
        Err(CommandError::UserNotFound {
            username: username.to_string(),
        })
    }
}

/// Render a job result for display (strings without JSON quotes).
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Deliver a job's formatted result to `recipient` and confirm to the caller.
async fn deliver_result(
    ctx: &dyn CommandContext,
    recipient: &str,
    text: &str,
    delivered: &str,
    not_delivered: &str,
) -> Result<(), CallbackError> {
    if ctx.send_message_to_other_user(recipient, text, None).await {
        ctx.send_message(&format!("{delivered} {recipient}")).await;
        Ok(())
    } else {
        ctx.send_message(&format!("{not_delivered} {recipient}")).await;
        Err(CallbackError::DeliveryFailed {
            recipient: recipient.to_string(),
        })
    }
}

/// Recipient stored in a callback's kwargs.
fn other_user(kwargs: &crate::worker::Kwargs) -> Result<String, CallbackError> {
    kwargs
        .get("other_user")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CallbackError::Other("missing 'other_user' argument".to_string()))
}
