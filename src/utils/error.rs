//! The `error` module defines the error types used within `eventcast`.
//!
//! Command-level failures are never fatal: the dispatcher renders every
//! `BrokerError` back to the issuer and keeps serving. The only fatal
//! condition is `ServerError::Bind` at startup.

use std::path::PathBuf;

use thiserror::Error;

/// Outcome of a command that did not do what was asked.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("topic '{0}' does not exist")]
    TopicNotFound(String),

    #[error("topic '{0}' already exists")]
    AlreadyExists(String),

    #[error("not subscribed to '{0}'")]
    NotSubscribed(String),

    #[error("unrecognized command: '{0}'")]
    UnrecognizedCommand(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error("'{0}' is only available from the operator console")]
    ConsoleOnly(&'static str),

    #[error("'{0}' needs a network connection")]
    ConnectionOnly(&'static str),

    #[error("'{0}' is not connected")]
    NotConnected(String),

    #[error("server full ({0} connections)")]
    ServerFull(usize),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl BrokerError {
    /// Informational outcomes leave state unchanged and are not failures.
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::AlreadyExists(_) | Self::NotSubscribed(_))
    }
}

/// Failures of the snapshot store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
