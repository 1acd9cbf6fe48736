use crate::{
    events::{EventReceiver, PeerEvent},
    network::Network,
    node::Node,
};
use ledger_core::now_millis;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Turns peer lifecycle events into outbound sync traffic. Events are consumed one
/// at a time by a single task.
pub struct PeerLifecycleReactor<N: Network> {
    node: Arc<Node<N>>,
}

impl<N: Network> PeerLifecycleReactor<N> {
    pub fn new(node: Arc<Node<N>>) -> Self {
        Self { node }
    }

    pub fn spawn(self, events: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    pub async fn run(self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        debug!("peer event channel closed");
    }

    pub async fn handle(&self, event: PeerEvent) {
        if let Err(e) = self
            .node
            .activity()
            .record_event(&event.to_record(now_millis()))
        {
            warn!("failed to record {} event: {e:#}", event.kind().name());
        }

        match event {
            PeerEvent::Discovery { peer, addresses } => {
                info!(%peer, ?addresses, "discovered peer");
                if let Err(e) = self.node.send_latest_block(&peer).await {
                    warn!(%peer, "latest-block send on discovery failed: {e}");
                }
            }
            PeerEvent::Connect { peer } => info!(%peer, "peer connected"),
            PeerEvent::Disconnect { peer } => info!(%peer, "peer disconnected"),
            PeerEvent::SelfUpdate { peer, .. } => {
                info!(%peer, "local peer updated, rebroadcasting");
                self.node.broadcast_latest_block().await;
            }
        }
    }
}
