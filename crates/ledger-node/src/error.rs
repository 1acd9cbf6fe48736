use crate::network::PeerId;
use ledger_core::{LedgerError, ProtocolId};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),

    #[error("failed to reach {peer}: {source}")]
    Transport {
        peer: PeerId,
        source: reqwest::Error,
    },

    #[error("{peer} rejected {protocol} with status {status}")]
    Rejected {
        peer: PeerId,
        protocol: ProtocolId,
        status: u16,
    },

    #[error("{protocol} exchange with {peer} timed out after {after:?}")]
    Timeout {
        peer: PeerId,
        protocol: ProtocolId,
        after: Duration,
    },

    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("blocking worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
