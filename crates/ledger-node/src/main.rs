use clap::Parser;
use ledger_node::config::Args;
use ledger_storage::sled_store::SledStore;
use std::{path::Path, sync::Arc};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.node_config()?;

    // One activity log per listening port so several nodes can share a data dir.
    let log_dir = Path::new(&args.data_dir).join(config.listen.port().to_string());
    let store = Arc::new(SledStore::open(&log_dir)?);

    let running = ledger_node::start(config, store).await?;
    info!("node id {}", running.peer_id());

    tokio::signal::ctrl_c().await?;
    info!("closing...");
    running.shutdown().await
}
