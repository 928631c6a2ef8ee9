//! Process-scoped server state shared by the acceptor and every session.

use std::sync::Arc;

use crate::commands::{CommandRegistry, register_builtins};
use crate::config::ServerConfig;
use crate::error::Error;
use crate::server::registry::Registry;
use crate::server::session::SessionLimits;
use crate::worker::{Fibonacci, JobManager, ResourceLength};

/// Handles to the registry, job manager and command table, plus the
/// per-connection limits.
///
/// Built once at startup and passed down explicitly.
#[derive(Clone)]
pub struct ServerState {
    pub registry: Arc<Registry>,
    pub jobs: Arc<JobManager>,
    pub commands: Arc<CommandRegistry>,
    pub limits: SessionLimits,
}

impl ServerState {
    pub fn new(
        registry: Arc<Registry>,
        jobs: Arc<JobManager>,
        commands: Arc<CommandRegistry>,
    ) -> Self {
        Self {
            registry,
            jobs,
            commands,
            limits: SessionLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Build the full state described by `config`: an empty registry, a job
    /// manager with `config.worker_count` workers, the built-in commands and
    /// the configured session limits.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_config(config: &ServerConfig) -> Result<Self, Error> {
        let fetch = ResourceLength::new(config.fetch_timeout)?;

        let mut commands = CommandRegistry::new();
        register_builtins(&mut commands, Arc::new(Fibonacci), Arc::new(fetch));

        Ok(Self::new(
            Arc::new(Registry::new()),
            JobManager::new(config.worker_count),
            Arc::new(commands),
        )
        .with_limits(SessionLimits::from(config)))
    }
}
