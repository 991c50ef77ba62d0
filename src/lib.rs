//! # Eventcast
//!
//! `eventcast` is a minimal, in-memory publish/subscribe broker. Named topics
//! are created by an operator, network clients subscribe to them over a
//! newline-delimited TCP protocol, and triggers broadcast notifications to
//! the connected clients.
//!
//! ## Core Modules
//!
//! - `broker`: topic registry, subscription table, connection lifecycle and
//!   broadcast delivery, all owned by one `Broker` behind a mutex.
//! - `command`: parses protocol lines and dispatches them against the broker.
//! - `client`: the connection handle and issuer identity.
//! - `config`: layered configuration loading.
//! - `persistence`: saving and restoring the topic registry as JSON.
//! - `transport`: the TCP server, operator console and a line client.
//! - `utils`: error types and logging.

pub mod broker;
pub mod client;
pub mod command;
pub mod config;
pub mod persistence;
pub mod transport;
pub mod utils;
