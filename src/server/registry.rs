//! Presence registry: who is online, keyed by username.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::SessionError;
use crate::server::session::Session;

/// Directory of live sessions.
///
/// Every operation goes through one lock, and `all()` hands back a copy so
/// callers can iterate while others register or unregister.
#[derive(Default)]
pub struct Registry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. A username can be held by only one session at a time.
    pub async fn register(&self, session: Arc<Session>) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let username = session.username().to_string();
        if sessions.contains_key(&username) {
            return Err(SessionError::DuplicateUsername { username });
        }
        debug!(username = %username, online = sessions.len() + 1, "Session registered");
        sessions.insert(username, session);
        Ok(())
    }

    /// Remove `session` if it is the one registered under its username.
    ///
    /// Unregistering an absent session is a no-op; returns whether anything
    /// was removed.
    pub async fn unregister(&self, session: &Arc<Session>) -> bool {
        let mut sessions = self.sessions.write().await;
        let registered = sessions
            .get(session.username())
            .is_some_and(|current| Arc::ptr_eq(current, session));
        if registered {
            sessions.remove(session.username());
            debug!(username = %session.username(), online = sessions.len(), "Session unregistered");
        }
        registered
    }

    pub async fn find(&self, username: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(username).cloned()
    }

    /// Snapshot of every registered session, ordered by username.
    pub async fn all(&self) -> Vec<Arc<Session>> {
        let mut all: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.username().cmp(b.username()));
        all
    }

    /// Snapshot of every registered username, ordered.
    pub async fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
