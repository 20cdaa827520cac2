// Path: crates/storage/src/buffered.rs
//! A write buffer in front of another checkpoint store, for manual cache flushing.

use crate::mem::MemCheckpointStore;
use async_trait::async_trait;
use std::sync::Arc;
use tessera_api::storage::{CheckpointStore, PruneStats};
use tessera_types::app::{Checkpoint, SortKey};
use tessera_types::error::StorageError;

/// Holds checkpoints in memory until [`CheckpointStore::flush`].
///
/// Reads see buffered and durable checkpoints alike; for predecessor lookups
/// the greater key of the two wins.
pub struct BufferedCheckpointStore {
    durable: Arc<dyn CheckpointStore>,
    pending: MemCheckpointStore,
}

impl BufferedCheckpointStore {
    pub fn new(durable: Arc<dyn CheckpointStore>) -> Self {
        Self {
            durable,
            pending: MemCheckpointStore::new(),
        }
    }

    /// Number of checkpoints waiting for a flush.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn newer(a: Option<Checkpoint>, b: Option<Checkpoint>) -> Option<Checkpoint> {
        match (a, b) {
            (Some(a), Some(b)) => Some(if a.sort_key >= b.sort_key { a } else { b }),
            (a, b) => a.or(b),
        }
    }
}

#[async_trait]
impl CheckpointStore for BufferedCheckpointStore {
    async fn get(
        &self,
        contract_id: &str,
        sort_key: &SortKey,
    ) -> Result<Option<Checkpoint>, StorageError> {
        match self.pending.get(contract_id, sort_key).await? {
            Some(cp) => Ok(Some(cp)),
            None => self.durable.get(contract_id, sort_key).await,
        }
    }

    async fn get_last_below_or_at(
        &self,
        contract_id: &str,
        sort_key: &SortKey,
    ) -> Result<Option<Checkpoint>, StorageError> {
        let pending = self.pending.get_last_below_or_at(contract_id, sort_key).await?;
        let durable = self.durable.get_last_below_or_at(contract_id, sort_key).await?;
        Ok(Self::newer(pending, durable))
    }

    async fn get_last_below(
        &self,
        contract_id: &str,
        sort_key: &SortKey,
    ) -> Result<Option<Checkpoint>, StorageError> {
        let pending = self.pending.get_last_below(contract_id, sort_key).await?;
        let durable = self.durable.get_last_below(contract_id, sort_key).await?;
        Ok(Self::newer(pending, durable))
    }

    async fn get_last(&self, contract_id: &str) -> Result<Option<Checkpoint>, StorageError> {
        let pending = self.pending.get_last(contract_id).await?;
        let durable = self.durable.get_last(contract_id).await?;
        Ok(Self::newer(pending, durable))
    }

    async fn put(&self, contract_id: &str, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        self.pending.put(contract_id, checkpoint).await
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let batch = self.pending.drain();
        if batch.is_empty() {
            return Ok(());
        }
        tracing::debug!(target: "checkpoint", count = batch.len(), "flushing buffered checkpoints");
        if let Err(e) = self.durable.put_batch(&batch).await {
            // Keep the batch so a later flush can retry it.
            self.pending.put_batch(&batch).await?;
            return Err(e);
        }
        self.durable.flush().await
    }

    async fn prune(&self, keep_latest: usize) -> Result<PruneStats, StorageError> {
        self.flush().await?;
        self.durable.prune(keep_latest).await
    }

    async fn all_contracts(&self) -> Result<Vec<String>, StorageError> {
        let mut contracts = self.durable.all_contracts().await?;
        contracts.extend(self.pending.all_contracts().await?);
        contracts.sort();
        contracts.dedup();
        Ok(contracts)
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.flush().await?;
        self.durable.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_types::app::EvalStateResult;

    fn cp(height: u64, counter: i64) -> Checkpoint {
        Checkpoint::new(
            SortKey::last_for_height(height).unwrap(),
            EvalStateResult::new(json!({ "counter": counter })),
        )
    }

    #[tokio::test]
    async fn buffered_writes_become_durable_only_on_flush() {
        let durable = Arc::new(MemCheckpointStore::new());
        let store = BufferedCheckpointStore::new(durable.clone());
        store.put("c", &cp(1, 1)).await.unwrap();
        store.put("c", &cp(2, 2)).await.unwrap();

        assert_eq!(store.get_last("c").await.unwrap(), Some(cp(2, 2)));
        assert!(durable.get_last("c").await.unwrap().is_none());
        assert_eq!(store.pending_len(), 2);

        store.flush().await.unwrap();
        assert_eq!(durable.get_last("c").await.unwrap(), Some(cp(2, 2)));
        assert_eq!(store.pending_len(), 0);
    }

    #[tokio::test]
    async fn predecessor_lookup_merges_both_layers() {
        let durable = Arc::new(MemCheckpointStore::new());
        durable.put("c", &cp(5, 5)).await.unwrap();
        let store = BufferedCheckpointStore::new(durable);
        store.put("c", &cp(3, 3)).await.unwrap();
        store.put("c", &cp(8, 8)).await.unwrap();

        let at_6 = SortKey::last_for_height(6).unwrap();
        assert_eq!(
            store.get_last_below_or_at("c", &at_6).await.unwrap(),
            Some(cp(5, 5))
        );
        assert_eq!(store.get_last("c").await.unwrap(), Some(cp(8, 8)));
    }
}
