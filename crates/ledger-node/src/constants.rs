/// Header carrying the sender's advertised URL on inbound exchanges.
pub const PEER_HEADER: &str = "x-ledger-peer";
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_EXCHANGE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 2_000;
/// Consecutive failed probes after which a non-seed peer is forgotten.
pub const MAX_FAILED_PROBES: u32 = 3;
