use crate::{ActivityLog, EventKind, EventRecord, ProtocolRecord};
use anyhow::{Context, Result};
use ledger_core::ProtocolId;
use serde::{de::DeserializeOwned, Serialize};
use sled::{Db, Tree};
use std::path::Path;
use tracing::info;

const TREE_EVENTS: &str = "peer_events";
const TREE_PROTOCOLS: &str = "protocols";

#[derive(Clone)]
pub struct SledStore {
  db: Db,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let db = sled::open(path)?;
    info!("sled store opened");
    Ok(Self { db })
  }

  /// A store that lives only as long as this process.
  pub fn temporary() -> Result<Self> {
    let db = sled::Config::new().temporary(true).open()?;
    Ok(Self { db })
  }

  fn tree(&self, name: &str) -> Result<Tree> {
    self
      .db
      .open_tree(name)
      .with_context(|| format!("open tree {name}"))
  }

  // Keys are sled's monotonic ids, so a scan returns insertion order.
  fn append<T: Serialize>(&self, tree: &str, value: &T) -> Result<()> {
    let id = self.db.generate_id()?;
    let bytes = bincode::serialize(value)?;
    self.tree(tree)?.insert(id.to_be_bytes(), bytes)?;
    self.db.flush()?;
    Ok(())
  }

  fn scan<T: DeserializeOwned>(&self, tree: &str) -> Result<Vec<T>> {
    self
      .tree(tree)?
      .iter()
      .values()
      .map(|v| {
        let bytes = v?;
        bincode::deserialize(&bytes).with_context(|| format!("corrupt record in {tree}"))
      })
      .collect()
  }
}

impl ActivityLog for SledStore {
  fn record_event(&self, record: &EventRecord) -> Result<()> {
    self.append(TREE_EVENTS, record)
  }

  fn record_protocol(&self, record: &ProtocolRecord) -> Result<()> {
    self.append(TREE_PROTOCOLS, record)
  }

  fn events(&self, kind: Option<EventKind>) -> Result<Vec<EventRecord>> {
    let mut records: Vec<EventRecord> = self.scan(TREE_EVENTS)?;
    if let Some(kind) = kind {
      records.retain(|r| r.event == kind);
    }
    Ok(records)
  }

  fn protocols(&self, protocol: Option<ProtocolId>) -> Result<Vec<ProtocolRecord>> {
    let mut records: Vec<ProtocolRecord> = self.scan(TREE_PROTOCOLS)?;
    if let Some(protocol) = protocol {
      records.retain(|r| r.protocol == protocol);
    }
    Ok(records)
  }

  fn clear(&self) -> Result<()> {
    self.tree(TREE_EVENTS)?.clear()?;
    self.tree(TREE_PROTOCOLS)?.clear()?;
    self.db.flush()?;
    Ok(())
  }
}
