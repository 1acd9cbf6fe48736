pub mod sled_store;

use anyhow::Result;
use ledger_core::{Block, ProtocolId};
use serde::{Deserialize, Serialize};

/// Peer lifecycle signals recorded in the peer-event log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Discovery,
    Connect,
    Disconnect,
    SelfUpdate,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Discovery,
        EventKind::Connect,
        EventKind::Disconnect,
        EventKind::SelfUpdate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Discovery => "discovery",
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::SelfUpdate => "self-update",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: u64,
    pub event: EventKind,
    pub peer: String,
    pub addresses: Vec<String>,
    pub protocols: Vec<String>,
}

/// One decoded inbound sync exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolRecord {
    pub timestamp: u64,
    pub protocol: ProtocolId,
    pub from: String,
    pub blocks: Vec<Block>,
}

/// Append-only record of peer events and protocol exchanges, queried by the command layer.
pub trait ActivityLog: Send + Sync {
    fn record_event(&self, record: &EventRecord) -> Result<()>;
    fn record_protocol(&self, record: &ProtocolRecord) -> Result<()>;
    /// Records in insertion order, optionally filtered by kind.
    fn events(&self, kind: Option<EventKind>) -> Result<Vec<EventRecord>>;
    fn protocols(&self, protocol: Option<ProtocolId>) -> Result<Vec<ProtocolRecord>>;
    fn clear(&self) -> Result<()>;
}
