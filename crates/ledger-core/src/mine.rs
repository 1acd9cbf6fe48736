use crate::{compute_hash, now_millis, pow::meets_difficulty, Block, LedgerError};
use tracing::{debug, info};

/// Searches nonces upward from 0, sampling the wall clock on every attempt, until the
/// candidate hash has at least `difficulty` leading zero hex characters.
///
/// Gives up with [`LedgerError::MiningExhausted`] once `max_nonce` has been tried.
/// This is CPU-bound and blocking; async callers should run it on a blocking worker.
pub fn mine_block(
    index: u64,
    previous_hash: &str,
    data: &str,
    difficulty: usize,
    max_nonce: u64,
) -> Result<Block, LedgerError> {
    debug!(index, difficulty, "starting proof-of-work search");

    for nonce in 0..=max_nonce {
        let timestamp = now_millis();
        let hash = compute_hash(index, previous_hash, timestamp, data, nonce);
        if meets_difficulty(&hash, difficulty) {
            info!("Mined block {} with nonce {} and hash {}", index, nonce, hash);
            return Ok(Block::new(
                index,
                previous_hash,
                timestamp,
                data,
                nonce,
                hash,
            ));
        }
    }

    Err(LedgerError::MiningExhausted { index })
}
