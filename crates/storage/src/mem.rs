// Path: crates/storage/src/mem.rs
//! An in-memory checkpoint store.

use crate::metrics::metrics;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included, Unbounded};
use tessera_api::storage::{CheckpointStore, PruneStats};
use tessera_types::app::{Checkpoint, SortKey};
use tessera_types::error::StorageError;

type ContractCheckpoints = BTreeMap<SortKey, Checkpoint>;

/// Checkpoints held in ordered maps behind a read/write lock.
///
/// Every read returns a deep copy, so callers can never mutate a stored
/// checkpoint through a returned value.
#[derive(Debug, Default)]
pub struct MemCheckpointStore {
    inner: RwLock<BTreeMap<String, ContractCheckpoints>>,
}

impl MemCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every checkpoint, ordered by contract and sort key.
    pub fn drain(&self) -> Vec<(String, Checkpoint)> {
        let taken = std::mem::take(&mut *self.inner.write());
        taken
            .into_iter()
            .flat_map(|(contract, cps)| cps.into_values().map(move |cp| (contract.clone(), cp)))
            .collect()
    }

    /// Total number of checkpoints held.
    pub fn len(&self) -> usize {
        self.inner.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn last_in(
        &self,
        contract_id: &str,
        upper: std::ops::Bound<&SortKey>,
    ) -> Option<Checkpoint> {
        let guard = self.inner.read();
        guard
            .get(contract_id)?
            .range((Unbounded, upper))
            .next_back()
            .map(|(_, cp)| cp.clone())
    }
}

#[async_trait]
impl CheckpointStore for MemCheckpointStore {
    async fn get(
        &self,
        contract_id: &str,
        sort_key: &SortKey,
    ) -> Result<Option<Checkpoint>, StorageError> {
        Ok(self
            .inner
            .read()
            .get(contract_id)
            .and_then(|cps| cps.get(sort_key))
            .cloned())
    }

    async fn get_last_below_or_at(
        &self,
        contract_id: &str,
        sort_key: &SortKey,
    ) -> Result<Option<Checkpoint>, StorageError> {
        Ok(self.last_in(contract_id, Included(sort_key)))
    }

    async fn get_last_below(
        &self,
        contract_id: &str,
        sort_key: &SortKey,
    ) -> Result<Option<Checkpoint>, StorageError> {
        Ok(self.last_in(contract_id, Excluded(sort_key)))
    }

    async fn get_last(&self, contract_id: &str) -> Result<Option<Checkpoint>, StorageError> {
        Ok(self.last_in(contract_id, Unbounded))
    }

    async fn put(&self, contract_id: &str, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        self.inner
            .write()
            .entry(contract_id.to_string())
            .or_default()
            .insert(checkpoint.sort_key.clone(), checkpoint.clone());
        metrics().inc_checkpoints_written("memory", 1);
        Ok(())
    }

    async fn put_batch(&self, entries: &[(String, Checkpoint)]) -> Result<(), StorageError> {
        let mut guard = self.inner.write();
        for (contract_id, checkpoint) in entries {
            guard
                .entry(contract_id.clone())
                .or_default()
                .insert(checkpoint.sort_key.clone(), checkpoint.clone());
        }
        metrics().inc_checkpoints_written("memory", entries.len() as u64);
        Ok(())
    }

    async fn prune(&self, keep_latest: usize) -> Result<PruneStats, StorageError> {
        let mut guard = self.inner.write();
        let entries_before = guard.values().map(BTreeMap::len).sum();
        for cps in guard.values_mut() {
            while cps.len() > keep_latest {
                cps.pop_first();
            }
        }
        guard.retain(|_, cps| !cps.is_empty());
        let entries_after: usize = guard.values().map(BTreeMap::len).sum();
        metrics().inc_checkpoints_pruned((entries_before - entries_after) as u64);
        Ok(PruneStats {
            entries_before,
            entries_after,
        })
    }

    async fn all_contracts(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.inner.read().keys().cloned().collect())
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
    async fn nearest_predecessor_lookups() {
        let store = MemCheckpointStore::new();
        store.put("c", &cp(10, 1)).await.unwrap();
        store.put("c", &cp(20, 2)).await.unwrap();
        store.put("other", &cp(15, 99)).await.unwrap();

        let at_15 = SortKey::last_for_height(15).unwrap();
        let at_20 = SortKey::last_for_height(20).unwrap();
        assert_eq!(
            store.get_last_below_or_at("c", &at_15).await.unwrap(),
            Some(cp(10, 1))
        );
        assert_eq!(
            store.get_last_below_or_at("c", &at_20).await.unwrap(),
            Some(cp(20, 2))
        );
        assert_eq!(
            store.get_last_below("c", &at_20).await.unwrap(),
            Some(cp(10, 1))
        );
        assert_eq!(store.get_last("c").await.unwrap(), Some(cp(20, 2)));
        assert!(store
            .get_last_below_or_at("c", &SortKey::last_for_height(5).unwrap())
            .await
            .unwrap()
            .is_none());
        assert!(store.get_last("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writing_the_same_checkpoint_twice_is_idempotent() {
        let store = MemCheckpointStore::new();
        store.put("c", &cp(10, 1)).await.unwrap();
        store.put("c", &cp(10, 1)).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store
                .get("c", &SortKey::last_for_height(10).unwrap())
                .await
                .unwrap(),
            Some(cp(10, 1))
        );
    }

    #[tokio::test]
    async fn prune_keeps_the_newest_per_contract() {
        let store = MemCheckpointStore::new();
        for h in 1..=5 {
            store.put("a", &cp(h, h as i64)).await.unwrap();
        }
        store.put("b", &cp(1, 1)).await.unwrap();
        let stats = store.prune(2).await.unwrap();
        assert_eq!(stats.entries_before, 6);
        assert_eq!(stats.entries_after, 3);
        assert_eq!(store.get_last("a").await.unwrap(), Some(cp(5, 5)));
        assert!(store
            .get("a", &SortKey::last_for_height(3).unwrap())
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.all_contracts().await.unwrap(), vec!["a", "b"]);
    }
}
