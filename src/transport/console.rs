//! Operator console
//!
//! Lines typed locally are dispatched as the privileged `Issuer::Console`
//! and every reply is written to `output`. Input arrives over a channel so the
//! blocking stdin reader can live on its own thread (see `spawn_stdin_reader`).

use std::io::BufRead;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::client::Issuer;
use crate::command::Dispatcher;
use crate::persistence::SnapshotStore;
use crate::transport::shutdown_requested;

/// Runs console commands until input ends or shutdown is requested.
pub async fn run_console<S, W>(
    dispatcher: Arc<Dispatcher<S>>,
    mut input: UnboundedReceiver<String>,
    output: &mut W,
) -> std::io::Result<()>
where
    S: SnapshotStore,
    W: AsyncWrite + Unpin,
{
    let mut shutdown = dispatcher.shutdown_signal();

    loop {
        // nothing typed after `exit` runs
        let line = tokio::select! {
            biased;
            () = shutdown_requested(&mut shutdown) => break,
            line = input.recv() => line,
        };
        let Some(line) = line else {
            debug!("Console input closed");
            break;
        };

        let outcome = dispatcher.dispatch(&Issuer::Console, line.trim()).await;
        output.write_all(outcome.text().as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }

    Ok(())
}

/// Reads stdin on a dedicated thread and forwards each line.
///
/// The thread is detached: a blocking stdin read cannot be cancelled, and
/// it must not hold up runtime shutdown.
pub fn spawn_stdin_reader() -> UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || forward_lines(std::io::stdin().lock(), &tx));
    rx
}

/// Forwards lines until the reader ends or the receiver is dropped.
pub(crate) fn forward_lines<R: BufRead>(reader: R, tx: &UnboundedSender<String>) {
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to read console input: {e}");
                break;
            }
        }
    }
}
