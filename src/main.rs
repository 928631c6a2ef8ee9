use std::sync::Arc;

use line_chat::config::ServerConfig;
use line_chat::logging;
use line_chat::server::{Acceptor, SequentialUsernames, ServerState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    let _log_guard = logging::init(&config)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.bind_addr,
        workers = config.worker_count,
        "Starting line chat"
    );

    let state = ServerState::from_config(&config)?;
    let jobs = Arc::clone(&state.jobs);
    let usernames = Arc::new(SequentialUsernames::starting_at(config.first_user_id));
    let acceptor = Acceptor::bind(config.bind_addr, config.backlog, state, usernames)?;

    tokio::select! {
        _ = acceptor.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Interrupted, shutting down");
        }
    }

    let stats = serde_json::to_string(&jobs.stats())?;
    let pending_callbacks = jobs.pending_callbacks().await;
    tracing::info!(
        stats = %stats,
        pending_callbacks,
        "Job statistics at shutdown"
    );

    Ok(())
}
