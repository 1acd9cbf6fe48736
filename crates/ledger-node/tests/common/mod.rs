#![allow(dead_code)]

use async_trait::async_trait;
use ledger_core::{Block, Ledger, ProtocolId, SharedLedger};
use ledger_node::{
    error::NetworkError,
    network::{Network, PeerId},
    node::Node,
};
use ledger_storage::{sled_store::SledStore, ActivityLog};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, RwLock, Weak},
    time::Duration,
};

pub const TIMEOUT: Duration = Duration::from_secs(2);

/// A ledger extended by `extra` freshly mined blocks.
pub fn mined_ledger(extra: usize) -> Ledger {
    let mut ledger = Ledger::new();
    for i in 0..extra {
        let block = ledger.mine(&format!("test block {i}")).unwrap();
        ledger.append(block).unwrap();
    }
    ledger
}

pub fn activity() -> Arc<dyn ActivityLog> {
    Arc::new(SledStore::temporary().unwrap())
}

#[derive(Clone, Debug)]
pub struct Sent {
    pub peer: PeerId,
    pub protocol: ProtocolId,
    pub payload: Vec<u8>,
}

/// Records every outbound exchange instead of delivering it.
pub struct RecordingNetwork {
    local: PeerId,
    peers: Vec<PeerId>,
    sent: Mutex<Vec<Sent>>,
    delay: Option<Duration>,
}

impl RecordingNetwork {
    pub fn new(local: &str, peers: &[&str]) -> Self {
        Self {
            local: PeerId::new(local),
            peers: peers.iter().map(|p| PeerId::new(*p)).collect(),
            sent: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_with(&self, protocol: ProtocolId) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| s.protocol == protocol)
            .collect()
    }
}

#[async_trait]
impl Network for RecordingNetwork {
    async fn open_stream(
        &self,
        peer: &PeerId,
        protocol: ProtocolId,
        payload: Vec<u8>,
    ) -> Result<(), NetworkError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(Sent {
            peer: peer.clone(),
            protocol,
            payload,
        });
        Ok(())
    }

    fn list_peers(&self) -> Vec<PeerId> {
        self.peers.clone()
    }

    fn local_peer(&self) -> PeerId {
        self.local.clone()
    }
}

pub fn recording_node(
    ledger: Ledger,
    network: RecordingNetwork,
) -> (Arc<Node<RecordingNetwork>>, Arc<RecordingNetwork>) {
    let network = Arc::new(network);
    let node = Arc::new(Node::new(
        SharedLedger::new(ledger),
        Arc::clone(&network),
        activity(),
        TIMEOUT,
    ));
    (node, network)
}

/// Delivers exchanges directly to other in-process nodes.
#[derive(Default)]
pub struct Hub {
    nodes: RwLock<BTreeMap<PeerId, Arc<Node<HubLink>>>>,
}

pub struct HubLink {
    hub: Weak<Hub>,
    local: PeerId,
}

impl Hub {
    pub fn join(self: &Arc<Self>, name: &str, ledger: Ledger) -> Arc<Node<HubLink>> {
        let link = Arc::new(HubLink {
            hub: Arc::downgrade(self),
            local: PeerId::new(name),
        });
        let node = Arc::new(Node::new(SharedLedger::new(ledger), link, activity(), TIMEOUT));
        self.nodes
            .write()
            .unwrap()
            .insert(PeerId::new(name), Arc::clone(&node));
        node
    }

    fn get(&self, peer: &PeerId) -> Option<Arc<Node<HubLink>>> {
        self.nodes.read().unwrap().get(peer).cloned()
    }

    fn peers(&self) -> Vec<PeerId> {
        self.nodes.read().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl Network for HubLink {
    async fn open_stream(
        &self,
        peer: &PeerId,
        protocol: ProtocolId,
        payload: Vec<u8>,
    ) -> Result<(), NetworkError> {
        let target = self
            .hub
            .upgrade()
            .and_then(|hub| hub.get(peer))
            .ok_or_else(|| NetworkError::UnknownPeer(peer.clone()))?;
        target.handle_inbound(protocol, &payload, &self.local).await;
        Ok(())
    }

    fn list_peers(&self) -> Vec<PeerId> {
        self.hub
            .upgrade()
            .map(|hub| hub.peers())
            .unwrap_or_default()
            .into_iter()
            .filter(|p| *p != self.local)
            .collect()
    }

    fn local_peer(&self) -> PeerId {
        self.local.clone()
    }
}

pub fn tip(blocks: &[Block]) -> &Block {
    blocks.last().unwrap()
}
