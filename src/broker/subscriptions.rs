use std::collections::{HashMap, HashSet};

use crate::client::SubscriberId;

/// Result of a successful subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    New,
    Existing,
}

/// Per-topic sets of subscribed connections.
///
/// Entries are keyed by topic name and outlive the topic itself: removing a
/// topic from the registry does not touch this table.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    entries: HashMap<String, HashSet<SubscriberId>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `subscriber` into the topic's set. Existence of the topic is
    /// checked by the caller against the registry.
    pub fn subscribe(&mut self, topic: &str, subscriber: &SubscriberId) -> Subscription {
        let set = self.entries.entry(topic.to_string()).or_default();
        if set.insert(subscriber.clone()) {
            Subscription::New
        } else {
            Subscription::Existing
        }
    }

    /// Returns `false` when there was nothing to remove.
    pub fn unsubscribe(&mut self, topic: &str, subscriber: &SubscriberId) -> bool {
        self.entries
            .get_mut(topic)
            .is_some_and(|set| set.remove(subscriber))
    }

    /// `None` means the topic has never had an entry here, which is not the
    /// same as an entry with zero subscribers.
    pub fn subscriber_count(&self, topic: &str) -> Option<usize> {
        self.entries.get(topic).map(HashSet::len)
    }

    pub fn subscribers(&self, topic: &str) -> impl Iterator<Item = &SubscriberId> + '_ {
        self.entries.get(topic).into_iter().flatten()
    }

    pub fn is_subscribed(&self, topic: &str, subscriber: &SubscriberId) -> bool {
        self.entries
            .get(topic)
            .is_some_and(|set| set.contains(subscriber))
    }

    /// Removes `subscriber` from every topic. Safe to call repeatedly.
    /// Returns how many topics it was removed from.
    pub fn purge(&mut self, subscriber: &SubscriberId) -> usize {
        self.entries
            .values_mut()
            .map(|set| set.remove(subscriber))
            .filter(|removed| *removed)
            .count()
    }

    /// Topic names that have an entry, including stale ones.
    pub fn topics(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }
}
