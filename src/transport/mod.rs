//! The `transport` module is responsible for the I/O around the broker:
//! the TCP server network clients talk to, the operator console, and a
//! small interactive client.
//!
//! The wire protocol is newline-delimited UTF-8 text, one command per line;
//! replies and broadcasts are written back one per line.

pub mod console;
pub mod line_client;
pub mod tcp;

pub use console::{run_console, spawn_stdin_reader};
pub use line_client::run_client;
pub use tcp::{bind, serve};

use tokio::sync::watch;

/// Resolves once the shutdown flag is set (or its sender is gone).
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
