// Path: crates/storage/src/redb_kv.rs
//! Contract key/value storage persisted in redb.

use crate::keys::{kv_prefix, kv_versioned};
use crate::kv::{stage, KvTx};
use crate::metrics::metrics;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use tessera_api::storage::{KvStorage, KvStorageFactory};
use tessera_types::app::SortKey;
use tessera_types::error::StorageError;
use tessera_types::prelude::OptionExt;

/// key = len(contract) || contract || len(key) || key || sort_key,
/// value = 0x01 || bytes, or 0x00 for a delete.
const KV: TableDefinition<&[u8], &[u8]> = TableDefinition::new("CONTRACT_KV");

const LIVE: u8 = 0x01;
const TOMBSTONE: u8 = 0x00;

fn backend(e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn decode_value(raw: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
    match raw.split_first() {
        Some((&LIVE, rest)) => Ok(Some(rest.to_vec())),
        Some((&TOMBSTONE, _)) => Ok(None),
        _ => Err(StorageError::Decode("malformed key/value entry".into())),
    }
}

/// The key/value storage of one contract inside a shared redb database.
pub struct RedbKvStorage {
    db: Arc<Database>,
    contract_id: String,
    tx: Mutex<Option<KvTx>>,
}

impl RedbKvStorage {
    fn read_at(&self, key: &[u8], at: Option<&SortKey>) -> Result<Option<Vec<u8>>, StorageError> {
        let lo = kv_prefix(&self.contract_id, key);
        let hi = match at {
            Some(sk) => kv_versioned(&self.contract_id, key, sk),
            // Sort keys are ASCII, so 0xff sorts after all of them.
            None => [lo.as_slice(), &[0xff][..]].concat(),
        };
        let r = self.db.begin_read().map_err(backend)?;
        let table = r.open_table(KV).map_err(backend)?;
        let last = table
            .range(lo.as_slice()..=hi.as_slice())
            .map_err(backend)?
            .next_back();
        match last {
            Some(entry) => {
                let (_, v) = entry.map_err(backend)?;
                decode_value(v.value())
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl KvStorage for RedbKvStorage {
    async fn open(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        *self.tx.lock() = None;
        Ok(())
    }

    async fn begin(&self, sort_key: &SortKey) -> Result<(), StorageError> {
        *self.tx.lock() = Some(KvTx::new(sort_key));
        Ok(())
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let at = {
            let guard = self.tx.lock();
            match guard.as_ref() {
                Some(tx) => {
                    if let Some(staged) = tx.writes.get(key) {
                        return Ok(staged.clone());
                    }
                    Some(tx.sort_key.clone())
                }
                None => None,
            }
        };
        self.read_at(key, at.as_ref())
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        stage(&self.tx, key, Some(value))
    }

    async fn del(&self, key: &[u8]) -> Result<(), StorageError> {
        stage(&self.tx, key, None)
    }

    async fn commit(&self) -> Result<(), StorageError> {
        let tx = self.tx.lock().take().required(StorageError::NoTransaction)?;
        if tx.writes.is_empty() {
            return Ok(());
        }
        let mut bytes = 0u64;
        let w = self.db.begin_write().map_err(backend)?;
        {
            let mut table = w.open_table(KV).map_err(backend)?;
            for (key, value) in &tx.writes {
                let stored_key = kv_versioned(&self.contract_id, key, &tx.sort_key);
                let stored = match value {
                    Some(v) => [&[LIVE][..], v.as_slice()].concat(),
                    None => vec![TOMBSTONE],
                };
                table
                    .insert(stored_key.as_slice(), stored.as_slice())
                    .map_err(backend)?;
                bytes += (stored_key.len() + stored.len()) as u64;
            }
        }
        w.commit().map_err(backend)?;
        metrics().inc_bytes_written_total(bytes);
        tracing::trace!(
            target: "checkpoint",
            contract = %self.contract_id,
            sort_key = %tx.sort_key,
            writes = tx.writes.len(),
            "committed key/value writes"
        );
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StorageError> {
        self.tx.lock().take();
        Ok(())
    }
}

/// Hands out per-contract views over one redb database.
pub struct RedbKvFactory {
    db: Arc<Database>,
    stores: DashMap<String, Arc<RedbKvStorage>>,
}

impl RedbKvFactory {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;
        {
            let w = db.begin_write().map_err(backend)?;
            w.open_table(KV).map_err(backend)?;
            w.commit().map_err(backend)?;
        }
        Ok(Self {
            db: Arc::new(db),
            stores: DashMap::new(),
        })
    }
}

impl KvStorageFactory for RedbKvFactory {
    fn storage_for(&self, contract_id: &str) -> Result<Arc<dyn KvStorage>, StorageError> {
        let store = self
            .stores
            .entry(contract_id.to_string())
            .or_insert_with(|| {
                Arc::new(RedbKvStorage {
                    db: self.db.clone(),
                    contract_id: contract_id.to_string(),
                    tx: Mutex::new(None),
                })
            })
            .clone();
        Ok(store)
    }
}
