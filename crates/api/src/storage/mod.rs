// Path: crates/api/src/storage/mod.rs

//! Persistence interfaces: the checkpoint store behind incremental replay, and
//! the sort-key versioned key/value storage contracts may use as scratch space.

use crate::error::StorageError;
use async_trait::async_trait;
use std::sync::Arc;
use tessera_types::app::{Checkpoint, SortKey};

/// Contains statistics about a completed pruning operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneStats {
    /// Checkpoints held before pruning.
    pub entries_before: usize,
    /// Checkpoints held after pruning.
    pub entries_after: usize,
}

/// A cache of evaluation results keyed by `(contract_id, sort_key)`.
///
/// Backends must support exact and nearest-predecessor lookups and must write
/// each checkpoint atomically. They may not reorder or merge checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Point lookup.
    async fn get(
        &self,
        contract_id: &str,
        sort_key: &SortKey,
    ) -> Result<Option<Checkpoint>, StorageError>;

    /// The checkpoint with the greatest key `<= sort_key`.
    async fn get_last_below_or_at(
        &self,
        contract_id: &str,
        sort_key: &SortKey,
    ) -> Result<Option<Checkpoint>, StorageError>;

    /// The checkpoint with the greatest key `< sort_key`.
    async fn get_last_below(
        &self,
        contract_id: &str,
        sort_key: &SortKey,
    ) -> Result<Option<Checkpoint>, StorageError>;

    /// The latest checkpoint of the contract.
    async fn get_last(&self, contract_id: &str) -> Result<Option<Checkpoint>, StorageError>;

    /// Atomic upsert of one checkpoint.
    async fn put(&self, contract_id: &str, checkpoint: &Checkpoint) -> Result<(), StorageError>;

    /// Writes several checkpoints. Backends with transactions write them in one.
    async fn put_batch(&self, entries: &[(String, Checkpoint)]) -> Result<(), StorageError> {
        for (contract_id, checkpoint) in entries {
            self.put(contract_id, checkpoint).await?;
        }
        Ok(())
    }

    /// Makes buffered writes durable. A no-op for unbuffered backends.
    async fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Keeps only the `keep_latest` newest checkpoints of every contract.
    async fn prune(&self, keep_latest: usize) -> Result<PruneStats, StorageError>;

    /// Every contract with at least one checkpoint.
    async fn all_contracts(&self) -> Result<Vec<String>, StorageError>;

    /// Releases backend resources.
    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// One operation of a key/value batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    /// Insert or replace.
    Put(Vec<u8>, Vec<u8>),
    /// Remove.
    Del(Vec<u8>),
}

/// Key/value scratch storage of a single contract, versioned by sort key.
///
/// Reads observe the newest value written at or below the sort key passed to
/// [`KvStorage::begin`]. Writes are buffered until [`KvStorage::commit`] and
/// discarded by [`KvStorage::rollback`].
#[async_trait]
pub trait KvStorage: Send + Sync {
    /// Acquires backend resources.
    async fn open(&self) -> Result<(), StorageError>;
    /// Releases backend resources.
    async fn close(&self) -> Result<(), StorageError>;
    /// Starts the write phase of the interaction at `sort_key`.
    async fn begin(&self, sort_key: &SortKey) -> Result<(), StorageError>;
    /// Reads a value.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
    /// Buffers a write.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;
    /// Buffers a delete.
    async fn del(&self, key: &[u8]) -> Result<(), StorageError>;
    /// Buffers several operations.
    async fn batch(&self, ops: Vec<KvOp>) -> Result<(), StorageError> {
        for op in ops {
            match op {
                KvOp::Put(k, v) => self.put(&k, &v).await?,
                KvOp::Del(k) => self.del(&k).await?,
            }
        }
        Ok(())
    }
    /// Applies buffered writes atomically at the transaction's sort key.
    async fn commit(&self) -> Result<(), StorageError>;
    /// Discards buffered writes.
    async fn rollback(&self) -> Result<(), StorageError>;
}

/// Hands out the key/value storage of each contract.
pub trait KvStorageFactory: Send + Sync {
    /// The storage of `contract_id`. Repeated calls return the same storage.
    fn storage_for(&self, contract_id: &str) -> Result<Arc<dyn KvStorage>, StorageError>;
}
