// Path: crates/storage/src/kv.rs
//! In-memory key/value storage for contracts, versioned by sort key.

use crate::metrics::metrics;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::ops::Bound::{Included, Unbounded};
use std::sync::Arc;
use tessera_api::storage::{KvStorage, KvStorageFactory};
use tessera_types::app::SortKey;
use tessera_types::error::StorageError;
use tessera_types::prelude::OptionExt;

/// `None` marks a delete, so older versions stay hidden at later sort keys.
type Versions = BTreeMap<SortKey, Option<Vec<u8>>>;

/// The write phase of one interaction.
#[derive(Debug)]
pub(crate) struct KvTx {
    pub(crate) sort_key: SortKey,
    pub(crate) writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl KvTx {
    pub(crate) fn new(sort_key: &SortKey) -> Self {
        Self {
            sort_key: sort_key.clone(),
            writes: BTreeMap::new(),
        }
    }
}

/// Buffers a write into the open transaction, failing when none is open.
pub(crate) fn stage(
    tx: &Mutex<Option<KvTx>>,
    key: &[u8],
    value: Option<&[u8]>,
) -> Result<(), StorageError> {
    let mut guard = tx.lock();
    let open = guard.as_mut().required(StorageError::NoTransaction)?;
    open.writes.insert(key.to_vec(), value.map(<[u8]>::to_vec));
    Ok(())
}

/// Key/value storage of one contract held in memory.
#[derive(Debug, Default)]
pub struct MemKvStorage {
    versions: RwLock<BTreeMap<Vec<u8>, Versions>>,
    tx: Mutex<Option<KvTx>>,
}

impl MemKvStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value of `key` as of `at`, or the newest value when `at` is `None`.
    pub fn value_at(&self, key: &[u8], at: Option<&SortKey>) -> Option<Vec<u8>> {
        let guard = self.versions.read();
        let versions = guard.get(key)?;
        let upper = match at {
            Some(sk) => Included(sk),
            None => Unbounded,
        };
        versions
            .range((Unbounded, upper))
            .next_back()
            .and_then(|(_, v)| v.clone())
    }
}

#[async_trait]
impl KvStorage for MemKvStorage {
    async fn open(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        *self.tx.lock() = None;
        Ok(())
    }

    async fn begin(&self, sort_key: &SortKey) -> Result<(), StorageError> {
        let mut guard = self.tx.lock();
        if let Some(stale) = guard.as_ref() {
            tracing::warn!(
                target: "checkpoint",
                sort_key = %stale.sort_key,
                "discarding uncommitted key/value writes"
            );
        }
        *guard = Some(KvTx::new(sort_key));
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
        Ok(self.value_at(key, at.as_ref()))
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        stage(&self.tx, key, Some(value))
    }

    async fn del(&self, key: &[u8]) -> Result<(), StorageError> {
        stage(&self.tx, key, None)
    }

    async fn commit(&self) -> Result<(), StorageError> {
        let tx = self.tx.lock().take().required(StorageError::NoTransaction)?;
        let mut bytes = 0u64;
        let mut guard = self.versions.write();
        for (key, value) in tx.writes {
            bytes += (key.len() + value.as_ref().map_or(0, Vec::len)) as u64;
            guard
                .entry(key)
                .or_default()
                .insert(tx.sort_key.clone(), value);
        }
        metrics().inc_bytes_written_total(bytes);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StorageError> {
        self.tx.lock().take();
        Ok(())
    }
}

/// Hands out one [`MemKvStorage`] per contract.
#[derive(Debug, Default)]
pub struct MemKvFactory {
    stores: DashMap<String, Arc<MemKvStorage>>,
}

impl MemKvFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The concrete storage of a contract, for inspection.
    pub fn mem_storage_for(&self, contract_id: &str) -> Arc<MemKvStorage> {
        self.stores
            .entry(contract_id.to_string())
            .or_insert_with(|| Arc::new(MemKvStorage::new()))
            .clone()
    }
}

impl KvStorageFactory for MemKvFactory {
    fn storage_for(&self, contract_id: &str) -> Result<Arc<dyn KvStorage>, StorageError> {
        Ok(self.mem_storage_for(contract_id))
    }
}
