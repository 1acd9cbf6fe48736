//! Responder and initiator sides of the latest-block and entire-chain exchanges.

use crate::{
    error::{NetworkError, NodeError},
    network::{Network, PeerId},
};
use ledger_core::{
    now_millis,
    protocol::{decode_block, decode_chain, encode_block, encode_chain},
    Block, LatestBlockOutcome, LedgerError, ProtocolId, SharedLedger,
};
use ledger_storage::{ActivityLog, ProtocolRecord};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

pub struct Node<N: Network> {
    ledger: SharedLedger,
    network: Arc<N>,
    activity: Arc<dyn ActivityLog>,
    exchange_timeout: Duration,
}

impl<N: Network> Node<N> {
    pub fn new(
        ledger: SharedLedger,
        network: Arc<N>,
        activity: Arc<dyn ActivityLog>,
        exchange_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            network,
            activity,
            exchange_timeout,
        }
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    pub fn network(&self) -> &Arc<N> {
        &self.network
    }

    pub fn activity(&self) -> &Arc<dyn ActivityLog> {
        &self.activity
    }

    async fn exchange(
        &self,
        peer: &PeerId,
        protocol: ProtocolId,
        payload: Vec<u8>,
    ) -> Result<(), NetworkError> {
        match tokio::time::timeout(
            self.exchange_timeout,
            self.network.open_stream(peer, protocol, payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout {
                peer: peer.clone(),
                protocol,
                after: self.exchange_timeout,
            }),
        }
    }

    pub async fn send_latest_block(&self, peer: &PeerId) -> Result<(), NetworkError> {
        let latest = self.ledger.latest();
        debug!(%peer, index = latest.index, "sending latest block");
        self.exchange(peer, ProtocolId::LatestBlock, encode_block(&latest))
            .await
    }

    pub async fn send_entire_chain(&self, peer: &PeerId) -> Result<(), NetworkError> {
        let blocks = self.ledger.blocks();
        debug!(%peer, length = blocks.len(), "sending entire chain");
        self.exchange(peer, ProtocolId::EntireChain, encode_chain(&blocks))
            .await
    }

    /// Sends our latest block to every known peer. Returns how many sends succeeded.
    pub async fn broadcast_latest_block(&self) -> usize {
        let mut delivered = 0;
        for peer in self.network.list_peers() {
            match self.send_latest_block(&peer).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(%peer, "broadcast failed: {e}"),
            }
        }
        delivered
    }

    /// Mines `data` on a blocking worker, appends it, and broadcasts the result.
    ///
    /// If a peer's block lands during the search the append is rejected; the whole
    /// mine-and-append is then retried once on top of the new latest block.
    pub async fn mine(&self, data: impl Into<String>) -> Result<Block, NodeError> {
        let data = data.into();
        let block = match self.mine_once(data.clone()).await {
            Err(NodeError::Ledger(LedgerError::InvalidBlock { index, .. })) => {
                info!(index, "latest block moved while mining, retrying once");
                self.mine_once(data).await?
            }
            other => other?,
        };
        self.broadcast_latest_block().await;
        Ok(block)
    }

    async fn mine_once(&self, data: String) -> Result<Block, NodeError> {
        let ledger = self.ledger.clone();
        let block = tokio::task::spawn_blocking(move || ledger.mine_and_append(&data)).await??;
        Ok(block)
    }

    /// Entry point for the substrate's inbound streams. Failures end here: they are
    /// logged and never affect the connection or later exchanges.
    pub async fn handle_inbound(&self, protocol: ProtocolId, payload: &[u8], from: &PeerId) {
        let result = match protocol {
            ProtocolId::LatestBlock => self
                .handle_latest_block(payload, from)
                .await
                .map(|_| ())
                .map_err(NodeError::from),
            ProtocolId::EntireChain => self.handle_entire_chain(payload, from).await,
        };

        match result {
            Ok(()) => {}
            Err(NodeError::Ledger(LedgerError::InvalidChain(reason))) => {
                debug!(%from, "kept our chain: {reason}");
            }
            Err(e) => warn!(%from, %protocol, "{e}"),
        }
    }

    /// Handles a peer's latest block: extend our chain with it, or push our chain
    /// back if the sender is behind, or do nothing on a divergent block.
    pub async fn handle_latest_block(
        &self,
        payload: &[u8],
        from: &PeerId,
    ) -> Result<LatestBlockOutcome, LedgerError> {
        let block = decode_block(payload)?;
        self.record(ProtocolId::LatestBlock, from, vec![block.clone()]);

        let index = block.index;
        let outcome = self.ledger.offer(block)?;
        match outcome {
            LatestBlockOutcome::Appended => {
                info!(%from, index, "appended block from peer");
                self.broadcast_latest_block().await;
            }
            LatestBlockOutcome::PeerBehind => {
                debug!(%from, index, "peer is behind, sending our chain");
                if let Err(e) = self.send_entire_chain(from).await {
                    warn!(%from, "entire-chain push failed: {e}");
                }
            }
            LatestBlockOutcome::Ignored => {
                debug!(%from, index, "ignored divergent block");
            }
        }
        Ok(outcome)
    }

    /// Handles a peer's full chain: adopt it if strictly longer and valid, then
    /// rebroadcast our new latest block. Validation hashes every block, so it runs
    /// on a blocking worker.
    pub async fn handle_entire_chain(
        &self,
        payload: &[u8],
        from: &PeerId,
    ) -> Result<(), NodeError> {
        let blocks = decode_chain(payload)?;
        self.record(ProtocolId::EntireChain, from, blocks.clone());

        let length = blocks.len();
        let ledger = self.ledger.clone();
        tokio::task::spawn_blocking(move || ledger.replace(&blocks)).await??;
        info!(%from, length, "adopted longer chain");
        self.broadcast_latest_block().await;
        Ok(())
    }

    fn record(&self, protocol: ProtocolId, from: &PeerId, blocks: Vec<Block>) {
        let record = ProtocolRecord {
            timestamp: now_millis(),
            protocol,
            from: from.to_string(),
            blocks,
        };
        if let Err(e) = self.activity.record_protocol(&record) {
            warn!("failed to record {protocol} exchange: {e:#}");
        }
    }
}
