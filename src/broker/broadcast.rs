//! Broadcast engine
//!
//! Delivery is a non-blocking push onto each connection's outbound queue.
//! A queue whose writer has gone away counts as a failed delivery; it is
//! logged and never aborts delivery to the others.

use tracing::warn;

use crate::broker::engine::Broker;
use crate::client::Client;

/// What happened to one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

impl Broker {
    /// Sends `message` to every connected client.
    pub fn broadcast_to_all(&self, message: &str) -> Delivery {
        deliver(self.clients(), message)
    }

    /// Sends `message` to the connections subscribed to `topic`.
    /// Subscribers without a live connection count as failures.
    pub fn broadcast_to_subscribers(&self, topic: &str, message: &str) -> Delivery {
        let mut report = Delivery::default();
        for subscriber in self.subscriptions().subscribers(topic) {
            match self.client(subscriber) {
                Some(client) => report.record(send(client, message)),
                None => {
                    warn!("No client registered with id: {subscriber}");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

impl Delivery {
    fn record(&mut self, ok: bool) {
        if ok {
            self.delivered += 1;
        } else {
            self.failed += 1;
        }
    }
}

fn deliver<'a>(clients: impl Iterator<Item = &'a Client>, message: &str) -> Delivery {
    let mut report = Delivery::default();
    for client in clients {
        report.record(send(client, message));
    }
    report
}

fn send(client: &Client, message: &str) -> bool {
    match client.send(message) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to send to {}: {e}", client.id);
            false
        }
    }
}
