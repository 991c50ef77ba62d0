//! CLI for Eventcast
//!
//! Subcommands:
//! - `serve` (default): run the broker with the operator console on stdin
//! - `client`: connect to a broker and send commands typed on stdin

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use eventcast::broker::Broker;
use eventcast::command::Dispatcher;
use eventcast::config::{load_config, load_config_from};
use eventcast::persistence::JsonFileStore;
use eventcast::transport::{bind, run_client, run_console, serve, spawn_stdin_reader};
use eventcast::utils::logging;

#[derive(Parser)]
#[command(name = "eventcast", version, about = "Minimal topic pub/sub broker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the broker and its operator console
    Serve(ServeArgs),
    /// Connect to a running broker and forward stdin lines as commands
    Client {
        /// Broker address to connect to
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
    },
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Configuration file (defaults to config/default.*)
    #[arg(long)]
    config: Option<String>,
    /// Overrides server.host
    #[arg(long)]
    host: Option<String>,
    /// Overrides server.port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => run_server(args).await,
        Command::Client { addr } => {
            logging::init("warn");
            let mut stdout = tokio::io::stdout();
            run_client(&addr, spawn_stdin_reader(), &mut stdout)
                .await
                .map_err(Into::into)
        }
    };

    if let Err(e) = result {
        logging::init("info");
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run_server(args: ServeArgs) -> Result<(), Box<dyn Error>> {
    let mut settings = match &args.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    logging::init(&settings.logging.level);

    let broker = Broker::with_max_connections(settings.broker.max_connections).into_shared();
    let store = JsonFileStore::new(&settings.persistence.snapshot_dir);
    let dispatcher = Arc::new(Dispatcher::new(broker, store));

    if let Some(file) = &settings.persistence.load_on_start {
        match dispatcher.load_snapshot(Path::new(file)).await {
            Ok(count) => info!("Loaded {count} topic(s) from {file}"),
            Err(e) => warn!("Starting with an empty registry: {e}"),
        }
    }

    let listener = bind(&settings.server.addr()).await?;

    let console = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            if let Err(e) = run_console(dispatcher, spawn_stdin_reader(), &mut stdout).await {
                error!("Console failed: {e}");
            }
        })
    };

    let signals = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                dispatcher.request_shutdown();
            }
        })
    };

    serve(listener, dispatcher).await;

    console.abort();
    signals.abort();
    Ok(())
}
