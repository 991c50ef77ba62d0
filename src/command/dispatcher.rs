//! Command dispatcher
//!
//! Routes parsed commands to the broker, the snapshot store and the shutdown
//! signal. Network clients and the operator console share this dispatcher;
//! operator-only commands are authorised by the issuer's identity.
//!
//! Every command touching broker state runs inside one lock scope. Save and
//! load do their file I/O outside the lock: save copies the registry first,
//! load parses the file fully and then swaps it in.

use std::path::Path;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::broker::engine::{SharedBroker, lock};
use crate::broker::{Delivery, Subscription};
use crate::client::{Issuer, SubscriberId};
use crate::command::parser::{Command, parse};
use crate::persistence::SnapshotStore;
use crate::utils::error::BrokerError;

/// What the transport should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Write the text back to the issuer.
    Reply(String),
    /// Write the text back, then close the issuing connection.
    Close(String),
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Reply(text) | Self::Close(text) => text,
        }
    }
}

#[derive(Debug)]
pub struct Dispatcher<S> {
    broker: SharedBroker,
    store: S,
    shutdown: watch::Sender<bool>,
}

impl<S: SnapshotStore> Dispatcher<S> {
    pub fn new(broker: SharedBroker, store: S) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            broker,
            store,
            shutdown,
        }
    }

    pub fn broker(&self) -> &SharedBroker {
        &self.broker
    }

    /// Receiver flipped to `true` once `exit` has been accepted.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Asks the transport to stop accepting and wind down connections.
    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Loads `path` and swaps it in as the whole topic registry. The file is
    /// read and parsed before the lock is taken; on failure nothing changes.
    pub async fn load_snapshot(&self, path: &Path) -> Result<usize, BrokerError> {
        let snapshot = self.store.load(path).await?;
        Ok(lock(&self.broker).restore(snapshot))
    }

    /// Runs one line from `issuer`. Never fails: errors become replies.
    pub async fn dispatch(&self, issuer: &Issuer, line: &str) -> Outcome {
        debug!("{issuer} sent: {line}");
        match self.execute(issuer, line).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_informational() {
                    debug!("{issuer}: {e}");
                } else {
                    warn!("{issuer}: {e}");
                }
                Outcome::Reply(render_error(&e))
            }
        }
    }

    async fn execute(&self, issuer: &Issuer, line: &str) -> Result<Outcome, BrokerError> {
        let command = parse(line)?;
        if command.is_console_only() && !issuer.is_console() {
            return Err(BrokerError::ConsoleOnly(command.name()));
        }

        match command {
            Command::Add(topic) => {
                lock(&self.broker).add_topic(&topic)?;
                Ok(ok(format!("topic '{topic}' added")))
            }
            Command::Remove(topic) => {
                let existed = lock(&self.broker).remove_topic(&topic);
                if existed {
                    Ok(ok(format!("topic '{topic}' removed")))
                } else {
                    Ok(ok(format!("topic '{topic}' was not registered")))
                }
            }
            Command::Sub(topic) => {
                let subscriber = connection_of(issuer, "sub")?;
                let outcome = lock(&self.broker).subscribe(&topic, subscriber)?;
                match outcome {
                    Subscription::New => Ok(ok(format!("subscribed to '{topic}'"))),
                    Subscription::Existing => Ok(ok(format!("already subscribed to '{topic}'"))),
                }
            }
            Command::Unsub(topic) => {
                let subscriber = connection_of(issuer, "unsub")?;
                lock(&self.broker).unsubscribe(&topic, subscriber)?;
                Ok(ok(format!("unsubscribed from '{topic}'")))
            }
            Command::List(topic) => {
                let count = lock(&self.broker).subscriber_count(&topic);
                match count {
                    Some(n) => Ok(ok(format!("'{topic}' has {n} subscriber(s)"))),
                    None => Ok(Outcome::Reply(format!(
                        "info: no subscriptions recorded for '{topic}'"
                    ))),
                }
            }
            Command::Ask => {
                let names = lock(&self.broker).topics().sorted_names().join(", ");
                if names.is_empty() {
                    Ok(ok("no topics"))
                } else {
                    Ok(ok(format!("topics: {names}")))
                }
            }
            Command::Trigger(None) => {
                let delivery = {
                    let broker = lock(&self.broker);
                    let names = broker.topics().sorted_names().join(", ");
                    let summary = if names.is_empty() {
                        "no topics available".to_string()
                    } else {
                        format!("topics available: {names}")
                    };
                    broker.broadcast_to_all(&summary)
                };
                info!("{issuer} triggered a topic summary broadcast");
                Ok(ok(describe("trigger", delivery)))
            }
            Command::Trigger(Some(topic)) => {
                let delivery = {
                    let broker = lock(&self.broker);
                    if !broker.topic_exists(&topic) {
                        return Err(BrokerError::TopicNotFound(topic));
                    }
                    broker.broadcast_to_subscribers(&topic, &format!("event '{topic}' triggered"))
                };
                info!("{issuer} triggered '{topic}'");
                Ok(ok(describe("trigger", delivery)))
            }
            Command::All => {
                let dump = lock(&self.broker).dump();
                Ok(ok(format!("state\n{dump}")))
            }
            Command::Clients => {
                let count = lock(&self.broker).connected_count();
                Ok(ok(format!("{count} client(s) connected")))
            }
            Command::Disconnect => {
                let client_id = connection_of(issuer, "disconnect")?;
                lock(&self.broker).disconnect(client_id);
                Ok(Outcome::Close("ok: goodbye".to_string()))
            }
            Command::Save(path) => {
                let snapshot = lock(&self.broker).snapshot();
                self.store.save(&path, &snapshot).await?;
                Ok(ok(format!(
                    "saved {} topic(s) to {}",
                    snapshot.len(),
                    path.display()
                )))
            }
            Command::Load(path) => {
                let count = self.load_snapshot(&path).await?;
                Ok(ok(format!("loaded {count} topic(s) from {}", path.display())))
            }
            Command::Exit => {
                self.request_shutdown();
                info!("Shutdown requested from the console");
                Ok(ok("shutting down"))
            }
        }
    }
}

fn connection_of<'a>(
    issuer: &'a Issuer,
    command: &'static str,
) -> Result<&'a SubscriberId, BrokerError> {
    match issuer {
        Issuer::Client(id) => Ok(id),
        Issuer::Console => Err(BrokerError::ConnectionOnly(command)),
    }
}

fn ok(text: impl AsRef<str>) -> Outcome {
    Outcome::Reply(format!("ok: {}", text.as_ref()))
}

fn describe(command: &str, delivery: Delivery) -> String {
    if delivery.failed == 0 {
        format!("{command} delivered to {} client(s)", delivery.delivered)
    } else {
        format!(
            "{command} delivered to {} client(s), {} failed",
            delivery.delivered, delivery.failed
        )
    }
}

/// Renders an error as a reply line.
pub fn render_error(e: &BrokerError) -> String {
    if e.is_informational() {
        format!("info: {e}")
    } else {
        format!("error: {e}")
    }
}
