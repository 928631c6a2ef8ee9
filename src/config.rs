//! Configuration types.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default number of background job workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default cap on one input line, terminator included.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listening socket binds to.
    pub bind_addr: SocketAddr,
    /// Listen backlog passed to the socket.
    pub backlog: u32,
    /// Number of job workers started with the job manager.
    pub worker_count: usize,
    /// Numeric suffix of the first allocated username (`u{n}`).
    pub first_user_id: u64,
    /// Directory for rolling log files. Logs go to stderr only when unset.
    pub log_dir: Option<PathBuf>,
    /// Timeout applied to remote resource fetches.
    pub fetch_timeout: Duration,
    /// How long a single write to a client may take before the session is
    /// considered dead.
    pub send_timeout: Duration,
    /// Longest accepted input line in bytes, newline included.
    pub max_line_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 12345)),
            backlog: 200,
            worker_count: DEFAULT_WORKER_COUNT,
            first_user_id: 1000,
            log_dir: None,
            fetch_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(10),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `CHAT_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = parse_var(&lookup, "CHAT_BIND_ADDR")?.unwrap_or(defaults.bind_addr);
        let backlog = parse_var(&lookup, "CHAT_BACKLOG")?.unwrap_or(defaults.backlog);
        let worker_count = parse_var(&lookup, "CHAT_WORKERS")?.unwrap_or(defaults.worker_count);
        let first_user_id =
            parse_var(&lookup, "CHAT_FIRST_USER_ID")?.unwrap_or(defaults.first_user_id);
        let fetch_timeout = parse_var::<u64, _>(&lookup, "CHAT_FETCH_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.fetch_timeout);
        let send_timeout = parse_var::<u64, _>(&lookup, "CHAT_SEND_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.send_timeout);
        let max_line_bytes =
            parse_var(&lookup, "CHAT_MAX_LINE_BYTES")?.unwrap_or(defaults.max_line_bytes);
        let log_dir = lookup("CHAT_LOG_DIR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        if worker_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHAT_WORKERS".to_string(),
                message: "at least one worker is required".to_string(),
            });
        }

        if send_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "CHAT_SEND_TIMEOUT_SECS".to_string(),
                message: "must be at least one second".to_string(),
            });
        }
        if max_line_bytes < 2 {
            return Err(ConfigError::InvalidValue {
                key: "CHAT_MAX_LINE_BYTES".to_string(),
                message: "must leave room for a command and its newline".to_string(),
            });
        }

        Ok(Self {
            bind_addr,
            backlog,
            worker_count,
            first_user_id,
            log_dir,
            fetch_timeout,
            send_timeout,
            max_line_bytes,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        })
}
