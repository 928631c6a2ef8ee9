//! Error types for the chat server.

use std::time::Duration;

use uuid::Uuid;

/// Errors raised while building and binding the server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session and delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session {username} is closed")]
    Closed { username: String },

    #[error("Username {username} is already registered")]
    DuplicateUsername { username: String },

    #[error("Failed to write to {username}: {source}")]
    Write {
        username: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Write to {username} timed out after {after:?}")]
    WriteTimeout { username: String, after: Duration },
}

/// Protocol errors reported back to the issuing session.
///
/// The `Display` text of each variant is the exact reply line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    #[error("Invalid {command} parameters.")]
    InvalidParameters { command: &'static str },

    #[error("User not found: {username}")]
    UserNotFound { username: String },

    #[error("Failed to schedule background job: {reason}")]
    Schedule { reason: String },
}

/// Job execution and job manager errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid argument for job {job}: {reason}")]
    InvalidArgument { job: String, reason: String },

    #[error("Job {job} overflowed for input {input}")]
    Overflow { job: String, input: String },

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Job {job} panicked: {reason}")]
    Panicked { job: String, reason: String },

    #[error("Job {id} could not be queued: job queue is closed")]
    QueueClosed { id: Uuid },
}

/// Errors a job callback may report to the result monitor.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("Could not deliver result to {recipient}")]
    DeliveryFailed { recipient: String },

    #[error("Callback failed: {0}")]
    Other(String),
}

/// Result type alias for the server.
pub type Result<T> = std::result::Result<T, Error>;
