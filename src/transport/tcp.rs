//! TCP transport
//!
//! Newline-delimited text over TCP. Responsibilities:
//! - Accept connections and register a `Client` for each with the broker
//! - Read lines and hand them to the `Dispatcher`
//! - Write replies and broadcasts through a per-connection writer task
//! - Tear each connection down exactly once, whichever side notices first
//! - Stop accepting on shutdown and let connections flush what is queued

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::broker::engine::lock;
use crate::client::{Client, Issuer, SubscriberId};
use crate::command::dispatcher::render_error;
use crate::command::{Dispatcher, Outcome};
use crate::persistence::SnapshotStore;
use crate::transport::shutdown_requested;
use crate::utils::error::{BrokerError, ServerError};

/// Longest command line accepted from a connection, newline included.
pub const MAX_LINE_BYTES: u64 = 4096;

/// Binds the listening socket. Failing here is the only fatal error.
pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Accepts connections until the dispatcher's shutdown signal fires, then
/// waits for open connections to finish.
pub async fn serve<S: SnapshotStore>(listener: TcpListener, dispatcher: Arc<Dispatcher<S>>) {
    let mut shutdown = dispatcher.shutdown_signal();
    let mut connections = JoinSet::new();

    if let Ok(addr) = listener.local_addr() {
        info!("Listening on {addr}");
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(handle_connection(stream, peer, dispatcher.clone()));
                }
                Err(e) => warn!("Failed to accept connection: {e}"),
            },
            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = finished {
                    warn!("Connection task failed: {e}");
                }
            }
            () = shutdown_requested(&mut shutdown) => break,
        }
    }

    drop(listener);
    info!(
        "Listener closed, waiting for {} connection(s)",
        connections.len()
    );
    while let Some(finished) = connections.join_next().await {
        if let Err(e) = finished {
            warn!("Connection task failed: {e}");
        }
    }
    info!("Server stopped");
}

async fn handle_connection<S: SnapshotStore>(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher<S>>,
) {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let client = Client::new(tx.clone());
    let client_id = client.id.clone();

    let cleanup_called = Arc::new(AtomicBool::new(false));
    let do_cleanup = {
        let dispatcher = dispatcher.clone();
        let client_id = client_id.clone();
        let cleanup_called = cleanup_called.clone();

        move || {
            if !cleanup_called.swap(true, Ordering::SeqCst) {
                lock(dispatcher.broker()).disconnect(&client_id);
            }
        }
    };

    let registered = lock(dispatcher.broker()).connect(client);
    if let Err(e) = registered {
        warn!("Refusing connection from {peer}: {e}");
        let _ = tx.send(render_error(&e));
        drop(tx);
        write_loop(write_half, rx, client_id, || {}).await;
        return;
    }
    debug!("{client_id} is {peer}");

    let writer = tokio::spawn(write_loop(
        write_half,
        rx,
        client_id.clone(),
        do_cleanup.clone(),
    ));

    let issuer = Issuer::Client(client_id.clone());
    let mut reader = BufReader::new(read_half);
    let mut shutdown = dispatcher.shutdown_signal();
    let mut buf = Vec::new();

    loop {
        let read = tokio::select! {
            read = read_line(&mut reader, &mut buf) => read,
            () = shutdown_requested(&mut shutdown) => {
                let _ = tx.send("info: server shutting down".to_string());
                break;
            }
        };

        // the writer may already have torn this connection down
        if cleanup_called.load(Ordering::SeqCst) {
            break;
        }

        match read {
            Ok(Line::Eof) => break,
            Ok(Line::TooLong(head)) => {
                debug!("{client_id} sent a line over {MAX_LINE_BYTES} bytes");
                let e = BrokerError::UnrecognizedCommand(format!("{head}..."));
                if tx.send(render_error(&e)).is_err() {
                    break;
                }
            }
            Ok(Line::Complete) => {
                let line = String::from_utf8_lossy(&buf);
                match dispatcher.dispatch(&issuer, line.trim()).await {
                    Outcome::Reply(text) => {
                        if tx.send(text).is_err() {
                            break;
                        }
                    }
                    Outcome::Close(text) => {
                        let _ = tx.send(text);
                        break;
                    }
                }
            }
            Err(e) => {
                debug!("Read from {client_id} failed: {e}");
                break;
            }
        }
    }

    do_cleanup();
    drop(tx);
    if let Err(e) = writer.await {
        warn!("Send loop for {client_id} failed: {e}");
    }
}

pub(crate) enum Line {
    Eof,
    Complete,
    /// The line ran past `MAX_LINE_BYTES`; carries its first few characters.
    TooLong(String),
}

/// Reads one line into `buf`, never buffering more than `MAX_LINE_BYTES`.
/// The remainder of an over-long line is read and thrown away.
pub(crate) async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader).take(MAX_LINE_BYTES).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(Line::Eof);
    }
    if buf.ends_with(b"\n") || (read as u64) < MAX_LINE_BYTES {
        return Ok(Line::Complete);
    }

    let head: String = String::from_utf8_lossy(buf).chars().take(32).collect();
    loop {
        buf.clear();
        let read = (&mut *reader).take(MAX_LINE_BYTES).read_until(b'\n', buf).await?;
        if read == 0 || buf.ends_with(b"\n") {
            break;
        }
    }
    buf.clear();
    Ok(Line::TooLong(head))
}

/// Writes queued lines until every sender is gone, then closes the socket.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: UnboundedReceiver<String>,
    client_id: SubscriberId,
    on_failure: impl FnOnce(),
) {
    while let Some(line) = rx.recv().await {
        let mut data = line.into_bytes();
        data.push(b'\n');
        if let Err(e) = writer.write_all(&data).await {
            warn!("Failed to send message to {client_id}: {e}");
            on_failure();
            return;
        }
    }

    let _ = writer.shutdown().await;
    debug!("Send loop closed for {client_id}");
}
