#![allow(dead_code)]

use std::fs;

use ledger_core::{Block, ProtocolId};
use ledger_storage::{sled_store::SledStore, ActivityLog, EventKind, EventRecord, ProtocolRecord};
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, SledStore) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (
        temp_dir,
        SledStore::open(db_path.to_str().unwrap()).expect("Failed to open SledStore"),
    )
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    // Verify the directory is removed
    assert!(!db_path.exists(), "Database directory should be removed");
}

pub fn event(kind: EventKind, peer: &str, timestamp: u64) -> EventRecord {
    EventRecord {
        timestamp,
        event: kind,
        peer: peer.to_string(),
        addresses: vec![format!("{peer}/addr")],
        protocols: vec![],
    }
}

pub fn exchange(protocol: ProtocolId, from: &str, blocks: Vec<Block>) -> ProtocolRecord {
    ProtocolRecord {
        timestamp: 1_700_000_000_000,
        protocol,
        from: from.to_string(),
        blocks,
    }
}
