use crate::{
    constants::{DEFAULT_EXCHANGE_TIMEOUT_MS, DEFAULT_PROBE_INTERVAL_MS},
    network::PeerId,
};
use anyhow::Context;
use clap::Parser;
use std::{net::SocketAddr, time::Duration};

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node")]
#[command(about = "Proof-of-work ledger node that syncs its chain with peers")]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: String,

    /// URL peers should use to reach this node (defaults to http://<listen>)
    #[arg(long)]
    pub advertise: Option<String>,

    /// Seed peer URL; may be repeated
    #[arg(long = "peer")]
    pub peers: Vec<String>,

    /// Data directory for the activity log
    #[arg(long, default_value = "./data")]
    pub data_dir: String,

    /// Give up on a peer exchange after this many milliseconds
    #[arg(long, default_value_t = DEFAULT_EXCHANGE_TIMEOUT_MS)]
    pub exchange_timeout_ms: u64,

    /// How often known peers are probed for liveness and new peers
    #[arg(long, default_value_t = DEFAULT_PROBE_INTERVAL_MS)]
    pub probe_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub listen: SocketAddr,
    pub advertise: Option<PeerId>,
    pub peers: Vec<PeerId>,
    pub exchange_timeout: Duration,
    pub probe_interval: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            advertise: None,
            peers: Vec::new(),
            exchange_timeout: Duration::from_millis(DEFAULT_EXCHANGE_TIMEOUT_MS),
            probe_interval: Duration::from_millis(DEFAULT_PROBE_INTERVAL_MS),
        }
    }
}

impl Args {
    pub fn node_config(&self) -> anyhow::Result<NodeConfig> {
        let listen: SocketAddr = self
            .listen
            .parse()
            .with_context(|| format!("invalid listen address {}", self.listen))?;
        if self.exchange_timeout_ms == 0 {
            anyhow::bail!("exchange timeout must be greater than zero");
        }
        if self.probe_interval_ms == 0 {
            anyhow::bail!("probe interval must be greater than zero");
        }
        Ok(NodeConfig {
            listen,
            advertise: self.advertise.as_deref().map(PeerId::new),
            peers: self.peers.iter().map(|p| PeerId::new(p.as_str())).collect(),
            exchange_timeout: Duration::from_millis(self.exchange_timeout_ms),
            probe_interval: Duration::from_millis(self.probe_interval_ms),
        })
    }
}
