//! Broker engine
//!
//! `Broker` is the single owned state object of the system: the topic
//! registry, the subscription table and the set of connected clients.
//!
//! Concurrency and usage notes:
//! - The API here is synchronous and held behind `SharedBroker`
//!   (`Arc<Mutex<Broker>>`). Every command runs as one critical section, so a
//!   reader never sees a half-applied subscribe.
//! - Callers must not hold the lock across `.await`. Persistence I/O happens
//!   outside the lock and only the final swap is done under it.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::broker::subscriptions::{Subscription, SubscriptionTable};
use crate::broker::topic::TopicRegistry;
use crate::client::{Client, SubscriberId};
use crate::persistence::Snapshot;
use crate::utils::error::BrokerError;

pub type SharedBroker = Arc<Mutex<Broker>>;

/// Locks the shared broker. A panic in another holder does not leave the
/// state torn (every mutation is a single map operation), so poisoning is
/// recovered rather than propagated.
pub fn lock(broker: &SharedBroker) -> MutexGuard<'_, Broker> {
    broker.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct Broker {
    topics: TopicRegistry,
    subscriptions: SubscriptionTable,
    clients: HashMap<SubscriberId, Client>,
    max_connections: usize,
}

impl Broker {
    pub const DEFAULT_MAX_CONNECTIONS: usize = 1000;
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Self::with_max_connections(Self::DEFAULT_MAX_CONNECTIONS)
    }

    pub fn with_max_connections(max_connections: usize) -> Self {
        Self {
            topics: TopicRegistry::new(),
            subscriptions: SubscriptionTable::new(),
            clients: HashMap::new(),
            max_connections,
        }
    }

    pub fn into_shared(self) -> SharedBroker {
        Arc::new(Mutex::new(self))
    }

    pub fn topics(&self) -> &TopicRegistry {
        &self.topics
    }

    pub fn subscriptions(&self) -> &SubscriptionTable {
        &self.subscriptions
    }

    pub fn add_topic(&mut self, name: &str) -> Result<(), BrokerError> {
        self.topics.add(name)?;
        info!("Topic '{name}' added");
        Ok(())
    }

    /// Removes the topic from the registry only; its subscription entry is
    /// left in place.
    pub fn remove_topic(&mut self, name: &str) -> bool {
        let existed = self.topics.remove(name);
        if existed {
            info!("Topic '{name}' removed");
        }
        existed
    }

    pub fn topic_exists(&self, name: &str) -> bool {
        self.topics.exists(name)
    }

    pub fn subscribe(
        &mut self,
        topic: &str,
        subscriber: &SubscriberId,
    ) -> Result<Subscription, BrokerError> {
        // only live handles; disconnect purges once and never again
        if !self.clients.contains_key(subscriber) {
            return Err(BrokerError::NotConnected(subscriber.clone()));
        }
        if !self.topics.exists(topic) {
            return Err(BrokerError::TopicNotFound(topic.to_string()));
        }
        let outcome = self.subscriptions.subscribe(topic, subscriber);
        match outcome {
            Subscription::New => info!("{subscriber} subscribed to '{topic}'"),
            Subscription::Existing => debug!("{subscriber} already subscribed to '{topic}'"),
        }
        Ok(outcome)
    }

    pub fn unsubscribe(&mut self, topic: &str, subscriber: &SubscriberId) -> Result<(), BrokerError> {
        if self.subscriptions.unsubscribe(topic, subscriber) {
            info!("{subscriber} unsubscribed from '{topic}'");
            Ok(())
        } else {
            Err(BrokerError::NotSubscribed(topic.to_string()))
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> Option<usize> {
        self.subscriptions.subscriber_count(topic)
    }

    /// Drops `subscriber` from every topic it was subscribed to.
    pub fn purge_client(&mut self, subscriber: &SubscriberId) -> usize {
        let removed = self.subscriptions.purge(subscriber);
        if removed > 0 {
            debug!("Purged {subscriber} from {removed} topic(s)");
        }
        removed
    }

    /// Registers a new connection, refusing it once the limit is reached.
    pub fn connect(&mut self, client: Client) -> Result<(), BrokerError> {
        if self.clients.len() >= self.max_connections {
            return Err(BrokerError::ServerFull(self.max_connections));
        }
        info!("{} connected ({} total)", client.id, self.clients.len() + 1);
        self.clients.insert(client.id.clone(), client);
        Ok(())
    }

    /// Forgets a connection and purges its subscriptions.
    ///
    /// Returns `false` when the client was already gone, so a disconnect
    /// reported through several signals is only counted once.
    pub fn disconnect(&mut self, client_id: &SubscriberId) -> bool {
        if self.clients.remove(client_id).is_none() {
            return false;
        }
        self.purge_client(client_id);
        info!("{client_id} disconnected ({} remaining)", self.clients.len());
        true
    }

    pub fn connected_count(&self) -> usize {
        self.clients.len()
    }

    pub fn client(&self, client_id: &SubscriberId) -> Option<&Client> {
        self.clients.get(client_id)
    }

    pub fn clients(&self) -> impl Iterator<Item = &Client> + '_ {
        self.clients.values()
    }

    /// Captures the registry for saving. Subscriber lists are always empty:
    /// live connections cannot be persisted.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_names(self.topics.names())
    }

    /// Replaces the whole registry with the snapshot's topics in one step.
    /// Subscription entries are kept as they are.
    pub fn restore(&mut self, snapshot: Snapshot) -> usize {
        self.topics.replace(snapshot.into_names());
        info!("Registry restored with {} topic(s)", self.topics.len());
        self.topics.len()
    }

    /// Full state dump for the operator console.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "topics ({}):", self.topics.len());
        for name in self.topics.sorted_names() {
            if let Some(topic) = self.topics.get(name) {
                let _ = writeln!(out, "  {name} (created {})", topic.created_at.to_rfc3339());
            }
        }

        let mut entries: Vec<&str> = self.subscriptions.topics().collect();
        entries.sort_unstable();
        let _ = writeln!(out, "subscriptions ({}):", entries.len());
        for topic in entries {
            let mut subscribers: Vec<&str> = self
                .subscriptions
                .subscribers(topic)
                .map(String::as_str)
                .collect();
            subscribers.sort_unstable();
            let marker = if self.topics.exists(topic) { "" } else { " [removed]" };
            let _ = writeln!(out, "  {topic}{marker}: [{}]", subscribers.join(", "));
        }

        let mut clients: Vec<&Client> = self.clients.values().collect();
        clients.sort_by(|a, b| a.connected_at.cmp(&b.connected_at));
        let _ = write!(out, "clients ({}):", clients.len());
        for client in clients {
            let _ = write!(
                out,
                "\n  {} (since {})",
                client.id,
                client.connected_at.to_rfc3339()
            );
        }
        out
    }
}
