//! chatmesh-server: run one or more federated chat server instances.
//!
//! ```text
//! chatmesh-server                 # create a new directory
//! chatmesh-server 1024            # attach to directory 1024
//! chatmesh-server --instances 3   # three federated instances in one process
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chatmesh_server::{DirectoryId, Ipc, Server, ServerConfig, logging};
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser)]
#[command(name = "chatmesh-server", about = "Federated chat router", version)]
struct Cli {
    /// Directory to attach to. A new one is created when omitted.
    directory: Option<u32>,

    /// Configuration file (TOML).
    #[arg(long, env = "CHATMESH_CONFIG")]
    config: Option<PathBuf>,

    /// File log lines are appended to.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Seconds between heartbeat cycles.
    #[arg(long)]
    heartbeat_secs: Option<u64>,

    /// Dispatcher back-off in milliseconds when the mailbox is empty.
    #[arg(long)]
    idle_poll_ms: Option<u64>,

    /// Number of server instances to run in this process.
    #[arg(long, default_value = "1")]
    instances: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(directory) = cli.directory {
        config.directory = Some(DirectoryId(directory));
    }
    if let Some(log_file) = cli.log_file {
        config.log_file = log_file;
    }
    if let Some(secs) = cli.heartbeat_secs {
        config.heartbeat_secs = secs;
    }
    if let Some(ms) = cli.idle_poll_ms {
        config.idle_poll_ms = ms;
    }

    logging::init(&config.log_file)?;
    info!("chatmesh-server {} launching", env!("CARGO_PKG_VERSION"));

    let ipc = Ipc::new(config.mailbox_capacity);
    let (stop_tx, stop_rx) = watch::channel(false);

    let mut tasks = Vec::new();
    for _ in 0..cli.instances.max(1) {
        let server = Arc::new(Server::start(ipc.clone(), config.clone()).await?);
        // Later instances join the directory the first one ended up in.
        config.directory = server.directory_id().await;

        let mut stop = stop_rx.clone();
        tasks.push(tokio::spawn(server.run(async move {
            let _ = stop.wait_for(|stopped| *stopped).await;
        })));
    }

    tokio::signal::ctrl_c().await?;
    info!("interrupted, detaching");
    let _ = stop_tx.send(true);

    for task in tasks {
        task.await??;
    }
    info!("exiting");
    Ok(())
}
