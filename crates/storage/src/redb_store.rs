// Path: crates/storage/src/redb_store.rs
//! A checkpoint store persisted in a single redb database.

use crate::keys::{checkpoint_key, contract_lower, contract_of, contract_upper};
use crate::metrics::metrics;
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use tessera_api::storage::{CheckpointStore, PruneStats};
use tessera_types::app::{Checkpoint, SortKey};
use tessera_types::codec;
use tessera_types::error::StorageError;

/// key = contract || 0x00 || sort_key, value = SCALE(StoredCheckpoint)
const CHECKPOINTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("CHECKPOINTS");

fn backend(e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// Checkpoints in redb. Every `put` is its own write transaction, so a
/// checkpoint is either fully present or absent.
#[derive(Clone)]
pub struct RedbCheckpointStore {
    db: Arc<Database>,
}

impl RedbCheckpointStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;
        // Ensure the table exists so read transactions never fail on a fresh file.
        {
            let w = db.begin_write().map_err(backend)?;
            w.open_table(CHECKPOINTS).map_err(backend)?;
            w.commit().map_err(backend)?;
        }
        tracing::info!(target: "checkpoint", path = %path.as_ref().display(), "opened redb checkpoint store");
        Ok(Self { db: Arc::new(db) })
    }

    fn decode(bytes: &[u8]) -> Result<Checkpoint, StorageError> {
        codec::decode_checkpoint(bytes).map_err(StorageError::Decode)
    }

    /// The last value in `[lo, hi)` or `[lo, hi]`, decoded.
    fn last_in_range(
        &self,
        lo: &[u8],
        hi: &[u8],
        inclusive: bool,
    ) -> Result<Option<Checkpoint>, StorageError> {
        let r = self.db.begin_read().map_err(backend)?;
        let table = r.open_table(CHECKPOINTS).map_err(backend)?;
        let last = if inclusive {
            table.range(lo..=hi).map_err(backend)?.next_back()
        } else {
            table.range(lo..hi).map_err(backend)?.next_back()
        };
        match last {
            Some(entry) => {
                let (_, v) = entry.map_err(backend)?;
                Ok(Some(Self::decode(v.value())?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CheckpointStore for RedbCheckpointStore {
    async fn get(
        &self,
        contract_id: &str,
        sort_key: &SortKey,
    ) -> Result<Option<Checkpoint>, StorageError> {
        let r = self.db.begin_read().map_err(backend)?;
        let table = r.open_table(CHECKPOINTS).map_err(backend)?;
        let key = checkpoint_key(contract_id, sort_key);
        let found = table
            .get(key.as_slice())
            .map_err(backend)?
            .map(|v| v.value().to_vec());
        found.map(|bytes| Self::decode(&bytes)).transpose()
    }

    async fn get_last_below_or_at(
        &self,
        contract_id: &str,
        sort_key: &SortKey,
    ) -> Result<Option<Checkpoint>, StorageError> {
        self.last_in_range(
            &contract_lower(contract_id),
            &checkpoint_key(contract_id, sort_key),
            true,
        )
    }

    async fn get_last_below(
        &self,
        contract_id: &str,
        sort_key: &SortKey,
    ) -> Result<Option<Checkpoint>, StorageError> {
        self.last_in_range(
            &contract_lower(contract_id),
            &checkpoint_key(contract_id, sort_key),
            false,
        )
    }

    async fn get_last(&self, contract_id: &str) -> Result<Option<Checkpoint>, StorageError> {
        self.last_in_range(
            &contract_lower(contract_id),
            &contract_upper(contract_id),
            false,
        )
    }

    async fn put(&self, contract_id: &str, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        self.put_batch(&[(contract_id.to_string(), checkpoint.clone())])
            .await
    }

    async fn put_batch(&self, entries: &[(String, Checkpoint)]) -> Result<(), StorageError> {
        let mut bytes_written = 0u64;
        let w = self.db.begin_write().map_err(backend)?;
        {
            let mut table = w.open_table(CHECKPOINTS).map_err(backend)?;
            for (contract_id, checkpoint) in entries {
                let value = codec::encode_checkpoint(checkpoint).map_err(StorageError::Encode)?;
                let key = checkpoint_key(contract_id, &checkpoint.sort_key);
                table
                    .insert(key.as_slice(), value.as_slice())
                    .map_err(backend)?;
                bytes_written += (key.len() + value.len()) as u64;
            }
        }
        w.commit().map_err(backend)?;
        metrics().inc_checkpoints_written("redb", entries.len() as u64);
        metrics().inc_bytes_written_total(bytes_written);
        Ok(())
    }

    async fn prune(&self, keep_latest: usize) -> Result<PruneStats, StorageError> {
        let w = self.db.begin_write().map_err(backend)?;
        let stats = {
            let mut table = w.open_table(CHECKPOINTS).map_err(backend)?;
            let everything: &[u8] = &[];
            let keys: Vec<Vec<u8>> = table
                .range(everything..)
                .map_err(backend)?
                .map(|r| r.map(|(k, _)| k.value().to_vec()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(backend)?;

            // Keys are grouped by contract and ascending within a group.
            let mut doomed = Vec::new();
            let mut start = 0;
            while start < keys.len() {
                let contract = keys.get(start).and_then(|k| contract_of(k));
                let mut end = start;
                while end < keys.len() && keys.get(end).and_then(|k| contract_of(k)) == contract {
                    end += 1;
                }
                let group = end - start;
                if group > keep_latest {
                    doomed.extend(
                        keys.get(start..end - keep_latest)
                            .unwrap_or_default()
                            .iter()
                            .cloned(),
                    );
                }
                start = end;
            }
            for key in &doomed {
                table.remove(key.as_slice()).map_err(backend)?;
            }
            PruneStats {
                entries_before: keys.len(),
                entries_after: keys.len() - doomed.len(),
            }
        };
        w.commit().map_err(backend)?;
        metrics().inc_checkpoints_pruned((stats.entries_before - stats.entries_after) as u64);
        Ok(stats)
    }

    async fn all_contracts(&self) -> Result<Vec<String>, StorageError> {
        let r = self.db.begin_read().map_err(backend)?;
        let table = r.open_table(CHECKPOINTS).map_err(backend)?;
        let everything: &[u8] = &[];
        let mut contracts: Vec<String> = Vec::new();
        for entry in table.range(everything..).map_err(backend)? {
            let (k, _) = entry.map_err(backend)?;
            if let Some(contract) = contract_of(k.value()) {
                if contracts.last().map(String::as_str) != Some(contract) {
                    contracts.push(contract.to_string());
                }
            }
        }
        Ok(contracts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;
    use tessera_types::app::EvalStateResult;

    fn cp(height: u64, counter: i64) -> Checkpoint {
        let mut result = EvalStateResult::new(json!({ "counter": counter }));
        result.apply_invalid(&format!("tx-{height}"), "rejected");
        Checkpoint::new(SortKey::last_for_height(height).unwrap(), result)
    }

    #[tokio::test]
    async fn lookups_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoints.redb");
        {
            let store = RedbCheckpointStore::open(&path).unwrap();
            store.put("c", &cp(10, 1)).await.unwrap();
            store.put("c", &cp(20, 2)).await.unwrap();
            store.put("cc", &cp(5, 7)).await.unwrap();
        }
        let store = RedbCheckpointStore::open(&path).unwrap();
        let at_20 = SortKey::last_for_height(20).unwrap();
        assert_eq!(
            store.get_last_below_or_at("c", &at_20).await.unwrap(),
            Some(cp(20, 2))
        );
        assert_eq!(
            store.get_last_below("c", &at_20).await.unwrap(),
            Some(cp(10, 1))
        );
        assert_eq!(store.get_last("c").await.unwrap(), Some(cp(20, 2)));
        assert_eq!(store.get_last("cc").await.unwrap(), Some(cp(5, 7)));
        assert!(store
            .get_last_below_or_at("c", &SortKey::last_for_height(9).unwrap())
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.all_contracts().await.unwrap(), vec!["c", "cc"]);
    }

    #[tokio::test]
    async fn prune_keeps_latest_per_contract() {
        let dir = tempdir().unwrap();
        let store = RedbCheckpointStore::open(dir.path().join("p.redb")).unwrap();
        for h in 1..=4 {
            store.put("a", &cp(h, h as i64)).await.unwrap();
        }
        store.put("b", &cp(1, 1)).await.unwrap();
        let stats = store.prune(1).await.unwrap();
        assert_eq!(stats.entries_before, 5);
        assert_eq!(stats.entries_after, 2);
        assert_eq!(store.get_last("a").await.unwrap(), Some(cp(4, 4)));
        assert!(store
            .get_last_below("a", &SortKey::last_for_height(4).unwrap())
            .await
            .unwrap()
            .is_none());
    }
}
