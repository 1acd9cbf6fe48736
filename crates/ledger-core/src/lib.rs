use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub mod chain;
pub mod constants;
pub mod mine;
pub mod protocol;

pub use chain::{LatestBlockOutcome, Ledger, SharedLedger};
pub use protocol::ProtocolId;

/// Lowercase hex SHA-256 digest.
pub type Hash = String;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Block {
    pub index: u64,
    pub previous_hash: Hash,
    pub timestamp: u64,
    pub data: String,
    pub nonce: u64,
    pub hash: Hash,
}

impl Block {
    pub fn new(
        index: u64,
        previous_hash: impl Into<Hash>,
        timestamp: u64,
        data: impl Into<String>,
        nonce: u64,
        hash: impl Into<Hash>,
    ) -> Self {
        Self {
            index,
            previous_hash: previous_hash.into(),
            timestamp,
            data: data.into(),
            nonce,
            hash: hash.into(),
        }
    }

    /// The fixed first block every valid chain starts with.
    pub fn genesis() -> Self {
        Self::new(
            0,
            constants::GENESIS_PREVIOUS_HASH,
            constants::GENESIS_TIMESTAMP,
            constants::GENESIS_DATA,
            constants::GENESIS_NONCE,
            constants::GENESIS_HASH,
        )
    }

    /// Digest of the five content fields, ignoring the stored `hash`.
    pub fn compute_hash(&self) -> Hash {
        compute_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.data,
            self.nonce,
        )
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Strings and integers only: there is no map key or non-finite float to fail on.
        serde_json::to_vec(self).expect("block fields always serialize")
    }

    /// Parses one JSON-encoded block. Hash correctness and difficulty are not checked here.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// `SHA256(index ++ previous_hash ++ timestamp ++ data ++ nonce)` over the decimal/string forms.
pub fn compute_hash(
    index: u64,
    previous_hash: &str,
    timestamp: u64,
    data: &str,
    nonce: u64,
) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(format!("{index}{previous_hash}{timestamp}{data}{nonce}"));
    hex::encode(hasher.finalize())
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("malformed block payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid block #{index}: {reason}")]
    InvalidBlock { index: u64, reason: BlockRejection },

    #[error("invalid chain: {0}")]
    InvalidChain(ChainRejection),

    #[error("nonce space exhausted while mining block #{index}")]
    MiningExhausted { index: u64 },
}

/// Which successor condition a candidate block failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum BlockRejection {
    #[error("index {found} does not follow {predecessor}")]
    IndexGap { predecessor: u64, found: u64 },

    #[error("previous hash does not link to the predecessor")]
    PreviousHashMismatch,

    #[error("hash does not match block contents")]
    HashMismatch,

    #[error("hash does not meet the difficulty target")]
    InsufficientDifficulty,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChainRejection {
    #[error("candidate length {theirs} is not longer than {ours}")]
    NotLonger { ours: usize, theirs: usize },

    #[error("candidate chain is empty")]
    Empty,

    #[error("first block is not the genesis block")]
    GenesisMismatch,

    #[error("block at position {position} rejected: {reason}")]
    BrokenLink {
        position: usize,
        reason: BlockRejection,
    },
}

pub mod pow {
    /// Number of leading `'0'` characters in a hex hash.
    pub fn count_leading_zero_hex(hash: &str) -> usize {
        hash.chars().take_while(|c| *c == '0').count()
    }

    pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
        count_leading_zero_hex(hash) >= difficulty
    }
}
