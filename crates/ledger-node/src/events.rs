use crate::{constants::EVENT_CHANNEL_CAPACITY, network::PeerId};
use ledger_storage::{EventKind, EventRecord};
use tokio::sync::mpsc;

/// Lifecycle signals raised by the networking substrate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerEvent {
    Discovery {
        peer: PeerId,
        addresses: Vec<String>,
    },
    Connect {
        peer: PeerId,
    },
    Disconnect {
        peer: PeerId,
    },
    /// Our own addresses or protocol set changed.
    SelfUpdate {
        peer: PeerId,
        addresses: Vec<String>,
        protocols: Vec<String>,
    },
}

impl PeerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PeerEvent::Discovery { .. } => EventKind::Discovery,
            PeerEvent::Connect { .. } => EventKind::Connect,
            PeerEvent::Disconnect { .. } => EventKind::Disconnect,
            PeerEvent::SelfUpdate { .. } => EventKind::SelfUpdate,
        }
    }

    pub fn peer(&self) -> &PeerId {
        match self {
            PeerEvent::Discovery { peer, .. }
            | PeerEvent::Connect { peer }
            | PeerEvent::Disconnect { peer }
            | PeerEvent::SelfUpdate { peer, .. } => peer,
        }
    }

    pub fn to_record(&self, timestamp: u64) -> EventRecord {
        let (addresses, protocols) = match self {
            PeerEvent::Discovery { addresses, .. } => (addresses.clone(), Vec::new()),
            PeerEvent::SelfUpdate {
                addresses,
                protocols,
                ..
            } => (addresses.clone(), protocols.clone()),
            PeerEvent::Connect { .. } | PeerEvent::Disconnect { .. } => (Vec::new(), Vec::new()),
        };
        EventRecord {
            timestamp,
            event: self.kind(),
            peer: self.peer().to_string(),
            addresses,
            protocols,
        }
    }
}

pub type EventSender = mpsc::Sender<PeerEvent>;
pub type EventReceiver = mpsc::Receiver<PeerEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}
