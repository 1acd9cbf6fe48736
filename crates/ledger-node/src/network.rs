//! The seam between the sync core and whatever moves bytes between peers.
//!
//! Outbound, the core calls [`Network::open_stream`] and [`Network::list_peers`].
//! Inbound, a substrate hands received payloads to `Node::handle_inbound` and
//! pushes lifecycle signals into the reactor's event channel.

use crate::error::NetworkError;
use async_trait::async_trait;
use ledger_core::ProtocolId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A peer's address as the substrate understands it (for HTTP, its base URL).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self(id.trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[async_trait]
pub trait Network: Send + Sync + 'static {
    /// Opens a stream for `protocol` to `peer`, writes `payload` to completion and closes it.
    async fn open_stream(
        &self,
        peer: &PeerId,
        protocol: ProtocolId,
        payload: Vec<u8>,
    ) -> Result<(), NetworkError>;

    /// Peers currently known to the substrate, excluding ourselves.
    fn list_peers(&self) -> Vec<PeerId>;

    fn local_peer(&self) -> PeerId;
}
