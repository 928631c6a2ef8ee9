//! One client connection: its writer, its username and its receive loop.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Local;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::commands::parse_line;
use crate::config::ServerConfig;
use crate::error::SessionError;
use crate::server::context::SessionContext;
use crate::server::state::ServerState;
use crate::server::wire;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Per-connection I/O bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Upper bound on one `send`, waiting for the writer lock included.
    pub send_timeout: Duration,
    /// Longest accepted input line in bytes, newline included.
    pub max_line_bytes: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for SessionLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            send_timeout: config.send_timeout,
            max_line_bytes: config.max_line_bytes,
        }
    }
}

/// Server-side state for one connected user.
pub struct Session {
    username: String,
    writer: Mutex<BoxedWriter>,
    alive: AtomicBool,
    /// Signalled when the session dies, so the receive loop stops too.
    closed: Notify,
    send_timeout: Duration,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl Session {
    pub fn new<W>(username: impl Into<String>, writer: W) -> Arc<Self>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::with_send_timeout(username, writer, SessionLimits::default().send_timeout)
    }

    pub fn with_send_timeout<W>(
        username: impl Into<String>,
        writer: W,
        send_timeout: Duration,
    ) -> Arc<Self>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Arc::new(Self {
            username: username.into(),
            writer: Mutex::new(Box::new(writer)),
            alive: AtomicBool::new(true),
            closed: Notify::new(),
            send_timeout,
        })
    }

    /// Register a new session, greet the client and spawn its receive loop.
    ///
    /// Fails without spawning anything if the username is already taken.
    pub async fn start<R, W>(
        username: impl Into<String>,
        reader: R,
        writer: W,
        state: ServerState,
    ) -> Result<(Arc<Self>, JoinHandle<()>), SessionError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let session = Self::with_send_timeout(username, writer, state.limits.send_timeout);
        state.registry.register(Arc::clone(&session)).await?;

        let task_session = Arc::clone(&session);
        let handle = tokio::spawn(async move {
            if let Err(e) = task_session
                .send(&wire::welcome(task_session.username()), None)
                .await
            {
                warn!(username = %task_session.username(), error = %e, "Failed to send welcome");
            }
            task_session.receive_loop(reader, state).await;
        });

        Ok((session, handle))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Write one timestamped line to the client.
    ///
    /// Returns an error instead of panicking when the connection is gone, so
    /// callers such as broadcast can carry on. A write that fails or does not
    /// finish within the send timeout kills the session.
    pub async fn send(&self, message: &str, sender: Option<&str>) -> Result<(), SessionError> {
        if !self.is_alive() {
            return Err(SessionError::Closed {
                username: self.username.clone(),
            });
        }

        let line = wire::format_line(Local::now().naive_local(), message, sender);
        let written = timeout(self.send_timeout, async {
            let mut writer = self.writer.lock().await;
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        })
        .await;

        match written {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => {
                self.mark_dead();
                Err(SessionError::Write {
                    username: self.username.clone(),
                    source,
                })
            }
            Err(_) => {
                warn!(username = %self.username, timeout = ?self.send_timeout, "Client is not reading, dropping session");
                self.mark_dead();
                Err(SessionError::WriteTimeout {
                    username: self.username.clone(),
                    after: self.send_timeout,
                })
            }
        }
    }

    /// Mark the session dead and shut down the write half.
    pub async fn close(&self) {
        if self.mark_dead() {
            let shutdown = timeout(self.send_timeout, async {
                self.writer.lock().await.shutdown().await
            })
            .await;
            match shutdown {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(username = %self.username, error = %e, "Error shutting down writer")
                }
                Err(_) => debug!(username = %self.username, "Timed out shutting down writer"),
            }
        }
    }

    /// Returns whether this call flipped the session from alive to dead.
    fn mark_dead(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::AcqRel);
        if was_alive {
            self.closed.notify_one();
        }
        was_alive
    }

    /// Read lines until the peer closes, the connection fails, a line is too
    /// long or the session dies on the write side, then unregister.
    pub async fn receive_loop<R>(self: Arc<Self>, reader: R, state: ServerState)
    where
        R: AsyncRead + Unpin,
    {
        let max_line_bytes = state.limits.max_line_bytes;
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            // One byte past the limit is enough to tell an overlong line.
            let mut limited = (&mut reader).take(max_line_bytes as u64 + 1);
            let read = tokio::select! {
                read = limited.read_line(&mut line) => read,
                _ = self.closed.notified() => {
                    info!(username = %self.username, "Session closed, stopping receive loop");
                    break;
                }
            };

            match read {
                Ok(0) => {
                    info!(username = %self.username, "Client disconnected");
                    break;
                }
                Ok(n) if n > max_line_bytes => {
                    warn!(username = %self.username, limit = max_line_bytes, "Input line too long, closing session");
                    break;
                }
                Ok(_) => self.handle_line(&line, &state).await,
                Err(e) => {
                    // Resets and invalid UTF-8 both end the session.
                    warn!(username = %self.username, error = %e, "Connection error, closing session");
                    break;
                }
            }
        }

        state.registry.unregister(&self).await;
        self.close().await;
    }

    async fn handle_line(self: &Arc<Self>, line: &str, state: &ServerState) {
        let Some((name, payload)) = parse_line(line) else {
            return;
        };
        debug!(username = %self.username, command = %name, "Received command");

        let ctx = Arc::new(SessionContext::new(payload, Arc::clone(self), state.clone()));
        // Protocol errors were already reported to the client.
        let _ = state.commands.dispatch(&name, ctx).await;
    }
}
