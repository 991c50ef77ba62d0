//! The `client` module defines how the broker sees a connection.
//!
//! `Client` is the connection handle the transport registers with the broker,
//! and `Issuer` tells the dispatcher whether a command came from a network
//! client or from the privileged operator console.

pub mod pubsub_client;
pub use pubsub_client::{Client, Issuer, SubscriberId};
