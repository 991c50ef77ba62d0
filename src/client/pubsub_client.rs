use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::error::SendError;
use uuid::Uuid;

/// Stable identity of one live connection.
pub type SubscriberId = String;

/// Represents a connected client in the broker.
///
/// The transport owns the socket; the broker only keeps this handle, which
/// holds the sending side of the connection's outbound line queue. Dropping
/// every `Client` clone for a connection lets its writer task drain and close.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for the client (`client-<uuid>`).
    pub id: SubscriberId,

    /// Channel of newline-less text lines to write to the client.
    pub sender: UnboundedSender<String>,

    pub connected_at: DateTime<Utc>,
}

impl Client {
    pub fn new(sender: UnboundedSender<String>) -> Self {
        Self {
            id: format!("client-{}", Uuid::new_v4()),
            sender,
            connected_at: Utc::now(),
        }
    }

    /// Queues one line for delivery. Fails once the connection's writer is gone.
    pub fn send(&self, line: impl Into<String>) -> Result<(), SendError<String>> {
        self.sender.send(line.into())
    }
}

/// Who issued a command: the operator console or a network client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Issuer {
    Console,
    Client(SubscriberId),
}

impl Issuer {
    pub fn is_console(&self) -> bool {
        matches!(self, Self::Console)
    }
}

impl fmt::Display for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Console => write!(f, "console"),
            Self::Client(id) => write!(f, "{id}"),
        }
    }
}
