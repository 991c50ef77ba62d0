use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::utils::error::BrokerError;

/// A named channel clients may subscribe to and the operator may trigger.
///
/// Subscribers are not stored here; the `SubscriptionTable` is the only
/// place connection handles are recorded.
#[derive(Debug, Clone)]
pub struct Topic {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// The set of topics that currently exist.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: HashMap<String, Topic>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `name` if absent. A second add reports `AlreadyExists` and
    /// leaves the registry untouched.
    pub fn add(&mut self, name: &str) -> Result<(), BrokerError> {
        if name.is_empty() {
            return Err(BrokerError::MissingArgument("add"));
        }
        if self.topics.contains_key(name) {
            return Err(BrokerError::AlreadyExists(name.to_string()));
        }
        self.topics.insert(name.to_string(), Topic::new(name));
        Ok(())
    }

    /// Deletes `name` unconditionally. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.topics.remove(name).is_some()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.topics.contains_key(name)
    }

    /// Topic names in no particular order. Call again to restart.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.topics.keys().map(String::as_str)
    }

    /// Topic names sorted, for stable output.
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, name: &str) -> Option<&Topic> {
        self.topics.get(name)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Swaps in a fresh set of topics. Nothing of the previous content survives.
    pub fn replace<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.topics = names
            .into_iter()
            .filter(|name| !name.is_empty())
            .map(|name| {
                let topic = Topic::new(&name);
                (name, topic)
            })
            .collect();
    }
}
