//! Command registry and line dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::commands::context::CommandContext;
use crate::error::CommandError;

/// A named command handler.
#[async_trait]
pub trait Command: Send + Sync {
    /// Primary command name (lowercase).
    fn name(&self) -> &str;

    /// Additional names the command answers to.
    fn aliases(&self) -> &[&'static str] {
        &[]
    }

    /// Run the command. A returned error is reported to the issuing session.
    async fn execute(&self, ctx: Arc<dyn CommandContext>) -> Result<(), CommandError>;
}

/// Split an input line into a lowercased command name and its payload.
///
/// Returns `None` for blank lines.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (name, payload) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim_start()),
        None => (line, ""),
    };
    Some((name.to_lowercase(), payload.to_string()))
}

/// Registry of commands, keyed by name and alias.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command under its name and all of its aliases.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        let names = std::iter::once(command.name().to_lowercase())
            .chain(command.aliases().iter().map(|a| a.to_lowercase()));
        for name in names {
            if self
                .commands
                .insert(name.clone(), Arc::clone(&command))
                .is_some()
            {
                tracing::warn!(command = %name, "Command registration replaced an existing handler");
            }
            debug!(command = %name, "Registered command");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(&name.to_lowercase()).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_lowercase())
    }

    /// All registered names, aliases included, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    /// Route `name` to its handler. Protocol errors, including an unknown
    /// command, are sent back through `ctx` and also returned.
    pub async fn dispatch(
        &self,
        name: &str,
        ctx: Arc<dyn CommandContext>,
    ) -> Result<(), CommandError> {
        let result = match self.get(name) {
            Some(command) => command.execute(Arc::clone(&ctx)).await,
            None => Err(CommandError::UnknownCommand {
                name: name.to_string(),
            }),
        };

        if let Err(ref e) = result {
            debug!(
                username = %ctx.current_username(),
                command = %name,
                error = %e,
                "Command rejected"
            );
            ctx.send_message(&e.to_string()).await;
        }

        result
    }
}
