mod common;

use common::{mined_ledger, recording_node, tip, Hub, RecordingNetwork};
use ledger_core::{
    protocol::{decode_block, decode_chain, encode_block, encode_chain},
    Block, ChainRejection, LatestBlockOutcome, Ledger, LedgerError, ProtocolId,
};
use ledger_node::{
    error::{NetworkError, NodeError},
    network::PeerId,
};
use std::{sync::Arc, time::Duration};

fn recorder(local: &str, peers: &[&str]) -> RecordingNetwork {
    RecordingNetwork::new(local, peers)
}

#[tokio::test]
async fn genesis_node_ignores_unlinked_block_from_ahead() {
    // A genesis-only ledger receives index 5 with a previous hash it cannot link.
    let (node, net) = recording_node(Ledger::new(), recorder("http://a", &["http://b"]));
    let foreign = mined_ledger(5);
    let mut block = tip(foreign.blocks()).clone();
    block.previous_hash = "f".repeat(64);

    let outcome = node
        .handle_latest_block(&encode_block(&block), &PeerId::new("http://b"))
        .await
        .unwrap();

    assert_eq!(outcome, LatestBlockOutcome::Ignored);
    assert_eq!(node.ledger().len(), 1);
    assert!(net.sent().is_empty());
}

#[tokio::test]
async fn longer_node_pushes_chain_to_peer_that_is_behind() {
    // B holds six blocks; A's latest is index 1 on a different history.
    let (node_b, net) = recording_node(mined_ledger(5), recorder("http://b", &["http://a"]));
    let from_a = mined_ledger(1);
    let block = tip(from_a.blocks()).clone();
    assert_ne!(block.previous_hash, node_b.ledger().latest().hash);

    let outcome = node_b
        .handle_latest_block(&encode_block(&block), &PeerId::new("http://a"))
        .await
        .unwrap();

    assert_eq!(outcome, LatestBlockOutcome::PeerBehind);
    let pushes = net.sent_with(ProtocolId::EntireChain);
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].peer, PeerId::new("http://a"));
    assert_eq!(decode_chain(&pushes[0].payload).unwrap(), node_b.ledger().blocks());
    assert_eq!(node_b.ledger().len(), 6);
}

#[tokio::test]
async fn linked_block_is_appended_and_rebroadcast() {
    let peers = recorder("http://a", &["http://b", "http://c"]);
    let (node, net) = recording_node(Ledger::new(), peers);
    let block = Ledger::new().mine("from b").unwrap();

    let outcome = node
        .handle_latest_block(&encode_block(&block), &PeerId::new("http://b"))
        .await
        .unwrap();

    assert_eq!(outcome, LatestBlockOutcome::Appended);
    assert_eq!(node.ledger().latest(), block);
    let sent = net.sent_with(ProtocolId::LatestBlock);
    assert_eq!(sent.len(), 2);
    for s in &sent {
        assert_eq!(decode_block(&s.payload).unwrap(), block);
    }
}

#[tokio::test]
async fn linked_but_tampered_block_is_rejected() {
    let (node, net) = recording_node(Ledger::new(), recorder("http://a", &["http://b"]));
    let mut block = Ledger::new().mine("honest").unwrap();
    block.data = "forged".into();

    let err = node
        .handle_latest_block(&encode_block(&block), &PeerId::new("http://b"))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InvalidBlock { index: 1, .. }));
    assert_eq!(node.ledger().len(), 1);
    assert!(net.sent().is_empty());
}

#[tokio::test]
async fn malformed_payloads_are_decode_errors() {
    let (node, net) = recording_node(Ledger::new(), recorder("http://a", &["http://b"]));
    let from = PeerId::new("http://b");

    let err = node.handle_latest_block(b"{\"index\":1}", &from).await.unwrap_err();
    assert!(matches!(err, LedgerError::Decode(_)));
    let err = node.handle_entire_chain(b"garbage", &from).await.unwrap_err();
    assert!(matches!(err, NodeError::Ledger(LedgerError::Decode(_))));

    // The inbound boundary swallows both and the node keeps working.
    node.handle_inbound(ProtocolId::LatestBlock, b"nope", &from).await;
    node.handle_inbound(ProtocolId::EntireChain, b"nope", &from).await;
    assert_eq!(node.ledger().len(), 1);
    assert!(net.sent().is_empty());

    let block = Ledger::new().mine("after garbage").unwrap();
    node.handle_inbound(ProtocolId::LatestBlock, &encode_block(&block), &from).await;
    assert_eq!(node.ledger().len(), 2);
}

#[tokio::test]
async fn longer_valid_chain_is_adopted_and_rebroadcast() {
    let peers = recorder("http://a", &["http://b", "http://c"]);
    let (node, net) = recording_node(mined_ledger(1), peers);
    let longer = mined_ledger(3);

    node.handle_entire_chain(&encode_chain(longer.blocks()), &PeerId::new("http://b"))
        .await
        .unwrap();

    assert_eq!(node.ledger().blocks(), longer.blocks());
    let sent = net.sent_with(ProtocolId::LatestBlock);
    assert_eq!(sent.len(), 2);
    assert_eq!(decode_block(&sent[0].payload).unwrap(), *tip(longer.blocks()));
}

#[tokio::test]
async fn longer_chain_with_broken_link_is_rejected() {
    let (node, net) = recording_node(mined_ledger(1), recorder("http://a", &["http://b"]));
    let before = node.ledger().blocks();
    let mut blocks = mined_ledger(5).blocks().to_vec();
    blocks[3].previous_hash = "1".repeat(64);

    let err = node
        .handle_entire_chain(&encode_chain(&blocks), &PeerId::new("http://b"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        NodeError::Ledger(LedgerError::InvalidChain(ChainRejection::BrokenLink {
            position: 3,
            ..
        }))
    ));
    assert_eq!(node.ledger().blocks(), before);
    assert!(net.sent().is_empty());
}

#[tokio::test]
async fn equal_length_chain_keeps_incumbent() {
    let (node, net) = recording_node(mined_ledger(2), recorder("http://a", &["http://b"]));
    let before = node.ledger().blocks();
    let rival = mined_ledger(2);

    let err = node
        .handle_entire_chain(&encode_chain(rival.blocks()), &PeerId::new("http://b"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        NodeError::Ledger(LedgerError::InvalidChain(ChainRejection::NotLonger {
            ours: 3,
            theirs: 3
        }))
    ));
    assert_eq!(node.ledger().blocks(), before);
    assert!(net.sent().is_empty());
}

#[tokio::test]
async fn replaying_the_same_chain_is_a_no_op() {
    let (node, _net) = recording_node(Ledger::new(), recorder("http://a", &[]));
    let longer = mined_ledger(2);
    let payload = encode_chain(longer.blocks());
    let from = PeerId::new("http://b");

    node.handle_entire_chain(&payload, &from).await.unwrap();
    node.handle_inbound(ProtocolId::EntireChain, &payload, &from).await;

    assert_eq!(node.ledger().blocks(), longer.blocks());
}

#[tokio::test]
async fn inbound_exchanges_are_recorded() {
    let (node, _net) = recording_node(Ledger::new(), recorder("http://a", &[]));
    let from = PeerId::new("http://b");
    let chain = mined_ledger(1);

    node.handle_inbound(ProtocolId::LatestBlock, &encode_block(&Block::genesis()), &from)
        .await;
    node.handle_inbound(ProtocolId::EntireChain, &encode_chain(chain.blocks()), &from)
        .await;

    let latest = node.activity().protocols(Some(ProtocolId::LatestBlock)).unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].from, "http://b");
    assert_eq!(latest[0].blocks, vec![Block::genesis()]);

    let chains = node.activity().protocols(Some(ProtocolId::EntireChain)).unwrap();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].blocks, chain.blocks());
}

#[tokio::test]
async fn mining_appends_and_broadcasts() {
    let peers = recorder("http://a", &["http://b", "http://c"]);
    let (node, net) = recording_node(Ledger::new(), peers);

    let block = node.mine("hi there").await.unwrap();

    assert_eq!(block.index, 1);
    assert_eq!(block.compute_hash(), block.hash);
    assert!(ledger_core::pow::meets_difficulty(&block.hash, node.ledger().difficulty()));
    assert_eq!(node.ledger().latest(), block);
    let sent = net.sent_with(ProtocolId::LatestBlock);
    let peers: Vec<PeerId> = sent.iter().map(|s| s.peer.clone()).collect();
    assert_eq!(peers, vec![PeerId::new("http://b"), PeerId::new("http://c")]);
}

// On a current-thread runtime the spawned miner snapshots the tip and parks on
// its blocking search before this task resumes and lands a peer's block.
#[tokio::test(flavor = "current_thread")]
async fn mining_retries_once_when_tip_moves() {
    let (node, net) = recording_node(Ledger::new(), recorder("http://a", &["http://b"]));
    let from_peer = Ledger::new().mine("from b").unwrap();

    let miner = tokio::spawn({
        let node = Arc::clone(&node);
        async move { node.mine("local").await }
    });
    tokio::task::yield_now().await;
    node.ledger().append(from_peer.clone()).unwrap();

    let mined = miner.await.unwrap().unwrap();
    assert_eq!(mined.index, 2);
    assert_eq!(mined.previous_hash, from_peer.hash);
    assert_eq!(node.ledger().blocks()[1], from_peer);
    assert_eq!(node.ledger().latest(), mined);
    assert_eq!(node.ledger().len(), 3);
    // Only the successful attempt is broadcast.
    let sent = net.sent_with(ProtocolId::LatestBlock);
    assert_eq!(sent.len(), 1);
    assert_eq!(decode_block(&sent[0].payload).unwrap(), mined);
}

#[tokio::test]
async fn slow_exchange_times_out() {
    let network = Arc::new(recorder("http://a", &["http://b"]).with_delay(Duration::from_secs(5)));
    let node = ledger_node::node::Node::new(
        ledger_core::SharedLedger::default(),
        Arc::clone(&network),
        common::activity(),
        Duration::from_millis(50),
    );

    let err = node.send_latest_block(&PeerId::new("http://b")).await.unwrap_err();
    assert!(matches!(
        err,
        NetworkError::Timeout { protocol: ProtocolId::LatestBlock, .. }
    ));
    assert_eq!(node.broadcast_latest_block().await, 0);
    assert!(network.sent().is_empty());
}

#[tokio::test]
async fn lagging_peer_converges_through_hub() {
    let hub = Arc::new(Hub::default());
    let a = hub.join("http://a", mined_ledger(3));
    let b = hub.join("http://b", Ledger::new());

    // B announces its genesis tip; A is ahead and pushes its whole chain back.
    b.send_latest_block(&PeerId::new("http://a")).await.unwrap();

    assert_eq!(b.ledger().blocks(), a.ledger().blocks());
    assert_eq!(b.ledger().len(), 4);
}

#[tokio::test]
async fn mined_block_reaches_every_hub_peer() {
    let hub = Arc::new(Hub::default());
    let a = hub.join("http://a", Ledger::new());
    let b = hub.join("http://b", Ledger::new());
    let c = hub.join("http://c", Ledger::new());

    let block = a.mine("for everyone").await.unwrap();

    for node in [&a, &b, &c] {
        assert_eq!(node.ledger().len(), 2);
        assert_eq!(node.ledger().latest(), block);
    }
}

#[tokio::test]
async fn forked_peers_settle_on_the_longer_chain() {
    let hub = Arc::new(Hub::default());
    let a = hub.join("http://a", mined_ledger(2));
    let b = hub.join("http://b", mined_ledger(1));

    // B's divergent tip reaches A, which is ahead and pushes its chain.
    b.broadcast_latest_block().await;

    assert_eq!(a.ledger().len(), 3);
    assert_eq!(b.ledger().blocks(), a.ledger().blocks());
}
