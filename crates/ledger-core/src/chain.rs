use crate::{
    constants::POW_TARGET_DIFFICULTY, mine::mine_block, pow, Block, BlockRejection,
    ChainRejection, LedgerError,
};
use rayon::prelude::*;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Checks every condition for `candidate` to directly follow `predecessor`.
pub fn check_successor(
    candidate: &Block,
    predecessor: &Block,
    difficulty: usize,
) -> Result<(), BlockRejection> {
    if predecessor.index.checked_add(1) != Some(candidate.index) {
        return Err(BlockRejection::IndexGap {
            predecessor: predecessor.index,
            found: candidate.index,
        });
    }
    if candidate.previous_hash != predecessor.hash {
        return Err(BlockRejection::PreviousHashMismatch);
    }
    if candidate.compute_hash() != candidate.hash {
        return Err(BlockRejection::HashMismatch);
    }
    if !pow::meets_difficulty(&candidate.hash, difficulty) {
        return Err(BlockRejection::InsufficientDifficulty);
    }
    Ok(())
}

/// Validates a whole candidate chain against its own elements: it must start with
/// genesis and every block must be a valid successor of the one before it.
///
/// Links are hashed in parallel; the lowest failing position is reported.
pub fn validate_chain(chain: &[Block], difficulty: usize) -> Result<(), ChainRejection> {
    let first = chain.first().ok_or(ChainRejection::Empty)?;
    if *first != Block::genesis() {
        return Err(ChainRejection::GenesisMismatch);
    }

    let broken = chain
        .par_windows(2)
        .enumerate()
        .find_map_first(|(i, pair)| {
            check_successor(&pair[1], &pair[0], difficulty)
                .err()
                .map(|reason| ChainRejection::BrokenLink {
                    position: i + 1,
                    reason,
                })
        });

    match broken {
        Some(rejection) => Err(rejection),
        None => Ok(()),
    }
}

/// The canonical ordered sequence of blocks. Never empty; always starts with genesis.
#[derive(Clone, Debug)]
pub struct Ledger {
    blocks: Vec<Block>,
    difficulty: usize,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
            difficulty: POW_TARGET_DIFFICULTY,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn latest(&self) -> &Block {
        // Seeded with genesis and only ever replaced by non-empty chains.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn block_by_index(&self, index: u64) -> Option<&Block> {
        self.blocks.iter().find(|b| b.index == index)
    }

    pub fn block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.hash == hash)
    }

    pub fn meets_difficulty(&self, hash: &str) -> bool {
        pow::meets_difficulty(hash, self.difficulty)
    }

    /// Searches for the next block on top of `latest()` without appending it.
    pub fn mine(&self, data: &str) -> Result<Block, LedgerError> {
        let tip = self.latest();
        mine_block(tip.index + 1, &tip.hash, data, self.difficulty, u64::MAX)
    }

    pub fn check_successor(
        &self,
        candidate: &Block,
        predecessor: &Block,
    ) -> Result<(), BlockRejection> {
        check_successor(candidate, predecessor, self.difficulty)
    }

    pub fn is_valid_successor(&self, candidate: &Block, predecessor: &Block) -> bool {
        self.check_successor(candidate, predecessor).is_ok()
    }

    pub fn append(&mut self, candidate: Block) -> Result<(), LedgerError> {
        self.check_successor(&candidate, self.latest())
            .map_err(|reason| LedgerError::InvalidBlock {
                index: candidate.index,
                reason,
            })?;
        debug!(index = candidate.index, hash = %candidate.hash, "appended block");
        self.blocks.push(candidate);
        Ok(())
    }

    pub fn is_longer(&self, other: &[Block]) -> bool {
        other.len() > self.blocks.len()
    }

    pub fn validate_chain(&self, other: &[Block]) -> Result<(), ChainRejection> {
        validate_chain(other, self.difficulty)
    }

    pub fn is_valid_chain(&self, other: &[Block]) -> bool {
        self.validate_chain(other).is_ok()
    }

    /// Adopts `other` if it is strictly longer and fully valid; ties keep the incumbent.
    pub fn replace(&mut self, other: &[Block]) -> Result<(), LedgerError> {
        self.ensure_longer(other)?;
        self.validate_chain(other)
            .map_err(LedgerError::InvalidChain)?;
        self.install(other);
        Ok(())
    }

    fn ensure_longer(&self, other: &[Block]) -> Result<(), LedgerError> {
        if self.is_longer(other) {
            Ok(())
        } else {
            Err(LedgerError::InvalidChain(ChainRejection::NotLonger {
                ours: self.blocks.len(),
                theirs: other.len(),
            }))
        }
    }

    fn install(&mut self, other: &[Block]) {
        debug!(from = self.blocks.len(), to = other.len(), "replaced chain");
        self.blocks = other.to_vec();
    }
}

/// What a node did with a block offered by a peer's latest-block exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatestBlockOutcome {
    /// The block extended our chain and is now our latest.
    Appended,
    /// Our latest block has a higher index, so the sender is behind.
    PeerBehind,
    /// Neither: a fork or an equal-height divergent block. Left for a later chain exchange.
    Ignored,
}

/// A ledger shared between concurrent handlers. Every decision that reads `latest()`
/// and then mutates runs inside one critical section.
#[derive(Clone, Default)]
pub struct SharedLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    // Mutations are a single push or a whole-vector swap, so a poisoned guard
    // still holds a valid ledger.
    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn latest(&self) -> Block {
        self.lock().latest().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn difficulty(&self) -> usize {
        self.lock().difficulty()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.lock().blocks().to_vec()
    }

    pub fn block_by_index(&self, index: u64) -> Option<Block> {
        self.lock().block_by_index(index).cloned()
    }

    pub fn block_by_hash(&self, hash: &str) -> Option<Block> {
        self.lock().block_by_hash(hash).cloned()
    }

    pub fn append(&self, candidate: Block) -> Result<(), LedgerError> {
        self.lock().append(candidate)
    }

    /// Length is checked under the lock, the candidate is validated outside it, and
    /// the length is re-checked before swapping in case another chain landed meanwhile.
    pub fn replace(&self, other: &[Block]) -> Result<(), LedgerError> {
        let difficulty = {
            let ledger = self.lock();
            ledger.ensure_longer(other)?;
            ledger.difficulty()
        };

        validate_chain(other, difficulty).map_err(LedgerError::InvalidChain)?;

        let mut ledger = self.lock();
        ledger.ensure_longer(other)?;
        ledger.install(other);
        Ok(())
    }

    /// Decides on a block received from a peer: append it if it links to our latest,
    /// report the peer as behind if our latest is higher, otherwise ignore it.
    pub fn offer(&self, block: Block) -> Result<LatestBlockOutcome, LedgerError> {
        let mut ledger = self.lock();
        let (links, latest_index) = {
            let latest = ledger.latest();
            (latest.hash == block.previous_hash, latest.index)
        };
        if links {
            ledger.append(block)?;
            Ok(LatestBlockOutcome::Appended)
        } else if latest_index > block.index {
            Ok(LatestBlockOutcome::PeerBehind)
        } else {
            Ok(LatestBlockOutcome::Ignored)
        }
    }

    /// Mines on top of the current latest block with the lock released, then appends.
    ///
    /// Fails with [`LedgerError::InvalidBlock`] if another block was appended during the search.
    pub fn mine_and_append(&self, data: &str) -> Result<Block, LedgerError> {
        self.mine_and_append_bounded(data, u64::MAX)
    }

    pub fn mine_and_append_bounded(
        &self,
        data: &str,
        max_nonce: u64,
    ) -> Result<Block, LedgerError> {
        let (index, previous_hash, difficulty) = {
            let ledger = self.lock();
            let tip = ledger.latest();
            (tip.index + 1, tip.hash.clone(), ledger.difficulty())
        };

        let block = mine_block(index, &previous_hash, data, difficulty, max_nonce)?;
        self.append(block.clone())?;
        Ok(block)
    }
}
