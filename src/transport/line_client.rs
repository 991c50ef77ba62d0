//! Interactive line client
//!
//! Connects to a broker, forwards each input line as a command and copies
//! every line the broker sends to `output`. When input ends, the write side
//! is shut down and the client keeps reading until the broker closes.

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

pub async fn run_client<W>(
    addr: &str,
    mut input: UnboundedReceiver<String>,
    output: &mut W,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let stream = TcpStream::connect(addr).await?;
    info!("Connected to {addr}");

    let (read_half, mut write_half) = stream.into_split();
    let mut server_lines = BufReader::new(read_half).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            line = server_lines.next_line() => match line? {
                Some(line) => {
                    output.write_all(line.as_bytes()).await?;
                    output.write_all(b"\n").await?;
                    output.flush().await?;
                }
                None => {
                    info!("Connection closed by server");
                    break;
                }
            },
            command = input.recv(), if input_open => match command {
                Some(command) => {
                    write_half.write_all(command.trim().as_bytes()).await?;
                    write_half.write_all(b"\n").await?;
                }
                None => {
                    input_open = false;
                    write_half.shutdown().await?;
                }
            },
        }
    }

    Ok(())
}
