//! HTTP substrate: each exchange is a POST of the payload to the peer's URL plus
//! the protocol id. Peers are learned from configuration, from inbound exchanges
//! and from other peers' `/peers` lists; a periodic probe tracks reachability.

use crate::{
    constants::{MAX_FAILED_PROBES, PEER_HEADER},
    error::NetworkError,
    events::{EventSender, PeerEvent},
    network::{Network, PeerId},
};
use async_trait::async_trait;
use ledger_core::ProtocolId;
use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};
use tokio::{
    sync::mpsc::error::TrySendError,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Reachability {
    Unknown,
    Reachable,
    Unreachable,
}

#[derive(Clone, Copy, Debug)]
struct PeerState {
    reachability: Reachability,
    failed_probes: u32,
    // Seeds come from configuration and are kept however long they stay down.
    seed: bool,
}

impl PeerState {
    fn new(seed: bool) -> Self {
        Self {
            reachability: Reachability::Unknown,
            failed_probes: 0,
            seed,
        }
    }
}

pub struct HttpNetwork {
    local: PeerId,
    client: reqwest::Client,
    peers: RwLock<BTreeMap<PeerId, PeerState>>,
    events: EventSender,
}

impl HttpNetwork {
    pub fn new(
        local: PeerId,
        timeout: Duration,
        events: EventSender,
    ) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            local,
            client,
            peers: RwLock::new(BTreeMap::new()),
            events,
        })
    }

    // Never waits on the reactor: callers include HTTP handlers.
    fn emit(&self, event: PeerEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let kind = event.kind().name();
                warn!(peer = %event.peer(), "peer event channel full, dropping {kind}");
            }
            Err(TrySendError::Closed(_)) => debug!("peer event channel closed, dropping event"),
        }
    }

    fn insert(&self, peer: PeerId, addresses: Vec<String>, seed: bool) -> bool {
        if peer == self.local {
            return false;
        }
        let is_new = {
            let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
            match peers.get_mut(&peer) {
                Some(state) => {
                    state.seed |= seed;
                    false
                }
                None => {
                    peers.insert(peer.clone(), PeerState::new(seed));
                    true
                }
            }
        };
        if is_new {
            self.emit(PeerEvent::Discovery { peer, addresses });
        }
        is_new
    }

    /// Adds `peer` to the peer store. Emits a discovery the first time it is seen.
    pub fn add_peer(&self, peer: PeerId, addresses: Vec<String>) -> bool {
        self.insert(peer, addresses, false)
    }

    /// Adds a configured peer. Seeds are never evicted for being unreachable.
    pub fn add_seed(&self, peer: PeerId) -> bool {
        let addresses = vec![peer.to_string()];
        self.insert(peer, addresses, true)
    }

    /// Called for every inbound exchange that names its sender.
    pub fn observe_inbound(&self, from: &PeerId) {
        self.add_peer(from.clone(), vec![from.to_string()]);
    }

    /// Announces our own address and protocol set.
    pub fn announce_self(&self) {
        self.emit(PeerEvent::SelfUpdate {
            peer: self.local.clone(),
            addresses: vec![self.local.to_string()],
            protocols: ProtocolId::ALL
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
        });
    }

    fn probe_succeeded(&self, peer: &PeerId) {
        let was = {
            let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
            let Some(state) = peers.get_mut(peer) else {
                return;
            };
            state.failed_probes = 0;
            std::mem::replace(&mut state.reachability, Reachability::Reachable)
        };
        if was != Reachability::Reachable {
            self.emit(PeerEvent::Connect { peer: peer.clone() });
        }
    }

    fn probe_failed(&self, peer: &PeerId) {
        let (was, evicted) = {
            let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
            let Some(state) = peers.get_mut(peer) else {
                return;
            };
            state.failed_probes += 1;
            let was = std::mem::replace(&mut state.reachability, Reachability::Unreachable);
            let evicted = !state.seed && state.failed_probes >= MAX_FAILED_PROBES;
            if evicted {
                peers.remove(peer);
            }
            (was, evicted)
        };
        if was == Reachability::Reachable {
            self.emit(PeerEvent::Disconnect { peer: peer.clone() });
        }
        if evicted {
            info!(%peer, "forgetting peer after {MAX_FAILED_PROBES} failed probes");
        }
    }

    /// Asks every known peer for its peer list. Reachability changes become
    /// connect/disconnect events and unseen peers become discoveries. Non-seed
    /// peers that keep failing are dropped from the store.
    pub async fn probe(&self) {
        for peer in self.list_peers() {
            let listed = self
                .client
                .get(format!("{peer}/peers"))
                .send()
                .await
                .and_then(|res| res.error_for_status());
            let listed = match listed {
                Ok(res) => res.json::<Vec<PeerId>>().await,
                Err(e) => Err(e),
            };

            match listed {
                Ok(others) => {
                    self.probe_succeeded(&peer);
                    for other in others {
                        let addresses = vec![other.to_string()];
                        self.add_peer(other, addresses);
                    }
                }
                Err(e) => {
                    trace!(%peer, "probe failed: {e}");
                    self.probe_failed(&peer);
                }
            }
        }
    }

    pub fn spawn_prober(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.probe().await;
            }
        })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn open_stream(
        &self,
        peer: &PeerId,
        protocol: ProtocolId,
        payload: Vec<u8>,
    ) -> Result<(), NetworkError> {
        let res = self
            .client
            .post(format!("{peer}{protocol}"))
            .header(PEER_HEADER, self.local.as_str())
            .body(payload)
            .send()
            .await
            .map_err(|source| NetworkError::Transport {
                peer: peer.clone(),
                source,
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(NetworkError::Rejected {
                peer: peer.clone(),
                protocol,
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    fn list_peers(&self) -> Vec<PeerId> {
        let peers = self.peers.read().unwrap_or_else(PoisonError::into_inner);
        peers.keys().cloned().collect()
    }

    fn local_peer(&self) -> PeerId {
        self.local.clone()
    }
}
