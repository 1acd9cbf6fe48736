pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Required number of leading `'0'` hex characters in a block hash.
pub const POW_TARGET_DIFFICULTY: usize = 4;

pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const GENESIS_TIMESTAMP: u64 = 1_750_742_712_760;
pub const GENESIS_DATA: &str = "Genesis Block";
pub const GENESIS_NONCE: u64 = 36_325;
pub const GENESIS_HASH: &str = "000010b327efa1730807db65401105c31978720b1f97ee21522e8f6b3bc4259b";

pub const LATEST_BLOCK_PROTOCOL: &str = "/blockchain/latest-block/1.0.0";
pub const ENTIRE_CHAIN_PROTOCOL: &str = "/blockchain/entire-chain/1.0.0";
