pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod network;
pub mod node;
pub mod reactor;
pub mod transport;

use crate::{
    api::HttpNode,
    config::NodeConfig,
    network::{Network, PeerId},
    node::Node,
    reactor::PeerLifecycleReactor,
    transport::HttpNetwork,
};
use anyhow::Context;
use ledger_core::SharedLedger;
use ledger_storage::ActivityLog;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tracing::{info, warn};

/// A node serving on its listener, with its reactor and prober running.
pub struct RunningNode {
    pub node: Arc<HttpNode>,
    pub local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<std::io::Result<()>>,
    reactor: JoinHandle<()>,
    prober: JoinHandle<()>,
}

impl RunningNode {
    pub fn peer_id(&self) -> PeerId {
        self.node.network().local_peer()
    }

    /// Stops serving and clears this session's activity log.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.prober.abort();
        let _ = self.shutdown.send(());
        match self.server.await {
            Ok(result) => result.context("http server")?,
            Err(e) => warn!("http server task ended abnormally: {e}"),
        }
        self.reactor.abort();
        self.node.activity().clear()?;
        info!("node stopped");
        Ok(())
    }
}

/// Binds the listener, wires the substrate, ledger, reactor and API together, then
/// announces ourselves and our seed peers.
pub async fn start(
    config: NodeConfig,
    activity: Arc<dyn ActivityLog>,
) -> anyhow::Result<RunningNode> {
    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("bind {}", config.listen))?;
    let local_addr = listener.local_addr()?;
    let local = config
        .advertise
        .clone()
        .unwrap_or_else(|| PeerId::new(format!("http://{local_addr}")));

    let (events_tx, events_rx) = events::channel();
    let network = Arc::new(HttpNetwork::new(
        local.clone(),
        config.exchange_timeout,
        events_tx,
    )?);
    let node = Arc::new(Node::new(
        SharedLedger::default(),
        Arc::clone(&network),
        activity,
        config.exchange_timeout,
    ));

    let reactor = PeerLifecycleReactor::new(Arc::clone(&node)).spawn(events_rx);

    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let app = api::router(Arc::clone(&node));
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });
    info!("ledger-node {local} listening on {local_addr}");

    network.announce_self();
    for peer in &config.peers {
        network.add_seed(peer.clone());
    }
    let prober = Arc::clone(&network).spawn_prober(config.probe_interval);

    Ok(RunningNode {
        node,
        local_addr,
        shutdown,
        server,
        reactor,
        prober,
    })
}
