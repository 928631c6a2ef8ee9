//! TCP acceptor: binds the listener and turns connections into sessions.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{error, info, warn};

use crate::error::Error;
use crate::server::session::Session;
use crate::server::state::ServerState;

/// Pause after a failed `accept` (e.g. descriptor exhaustion).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Source of fresh, unique usernames.
pub trait UsernameSource: Send + Sync {
    fn next_username(&self) -> String;
}

/// Hands out `u{n}` from an increasing counter.
#[derive(Debug)]
pub struct SequentialUsernames {
    next: AtomicU64,
}

impl SequentialUsernames {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialUsernames {
    fn default() -> Self {
        Self::starting_at(1000)
    }
}

impl UsernameSource for SequentialUsernames {
    fn next_username(&self) -> String {
        format!("u{}", self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Accepts connections and starts a session for each.
pub struct Acceptor {
    listener: TcpListener,
    state: ServerState,
    usernames: Arc<dyn UsernameSource>,
}

impl Acceptor {
    /// Bind `addr` with `SO_REUSEADDR` and the given listen backlog.
    pub fn bind(
        addr: SocketAddr,
        backlog: u32,
        state: ServerState,
        usernames: Arc<dyn UsernameSource>,
    ) -> Result<Self, Error> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(backlog)?;

        info!(addr = %listener.local_addr()?, backlog, "Listening");
        Ok(Self {
            listener,
            state,
            usernames,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever.
    pub async fn run(self) {
        info!("Server started");
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => self.start_session(stream, peer).await,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }

    async fn start_session(&self, stream: TcpStream, peer: SocketAddr) {
        let username = self.usernames.next_username();
        if let Err(e) = stream.set_nodelay(true) {
            warn!(username = %username, error = %e, "Failed to set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        match Session::start(username.clone(), reader, writer, self.state.clone()).await {
            Ok(_) => info!(username = %username, peer = %peer, "User connected"),
            Err(e) => error!(username = %username, peer = %peer, error = %e, "Failed to start session"),
        }
    }
}
