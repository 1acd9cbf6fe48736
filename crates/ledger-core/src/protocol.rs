//! Wire identifiers and payload encoding for the two sync exchanges.
//!
//! A latest-block payload is one JSON block. An entire-chain payload is the
//! chain's JSON blocks concatenated in index order, each followed by a newline.

use crate::{constants, Block, LedgerError};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolId {
    LatestBlock,
    EntireChain,
}

impl ProtocolId {
    pub const ALL: [ProtocolId; 2] = [ProtocolId::LatestBlock, ProtocolId::EntireChain];

    /// Full protocol identifier, e.g. `/blockchain/latest-block/1.0.0`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolId::LatestBlock => constants::LATEST_BLOCK_PROTOCOL,
            ProtocolId::EntireChain => constants::ENTIRE_CHAIN_PROTOCOL,
        }
    }

    /// Short name used by the activity log and the command shell.
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolId::LatestBlock => "latest-block",
            ProtocolId::EntireChain => "entire-chain",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn encode_block(block: &Block) -> Vec<u8> {
    block.to_bytes()
}

pub fn decode_block(bytes: &[u8]) -> Result<Block, LedgerError> {
    Block::from_bytes(bytes)
}

pub fn encode_chain(blocks: &[Block]) -> Vec<u8> {
    let mut out = Vec::new();
    for block in blocks {
        out.extend_from_slice(&block.to_bytes());
        out.push(b'\n');
    }
    out
}

/// Decodes concatenated blocks, preserving their order. Any malformed element fails
/// the whole payload.
pub fn decode_chain(bytes: &[u8]) -> Result<Vec<Block>, LedgerError> {
    let blocks = serde_json::Deserializer::from_slice(bytes)
        .into_iter::<Block>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(blocks)
}
