// Path: crates/execution/src/engine.rs
//! The root of the object graph: collaborators shared by every facade.

use crate::facade::ContractFacade;
use crate::sort_key::SortKeyService;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tessera_api::handler::{ContractHandler, HandlerFactory};
use tessera_api::loader::{DefinitionLoader, InteractionsLoader};
use tessera_api::storage::{CheckpointStore, KvStorage, KvStorageFactory};
use tessera_api::submit::InteractionSubmitter;
use tessera_storage::{BufferedCheckpointStore, MemCheckpointStore, MemKvFactory};
use tessera_types::app::{Checkpoint, ContractDefinition};
use tessera_types::config::EvaluationOptions;
use tessera_types::error::{EvaluationError, StorageError};

const HANDLER_CACHE_SIZE: usize = 256;

type DefinitionKey = (String, Option<String>);

pub(crate) struct EngineInner {
    pub(crate) interactions: Arc<dyn InteractionsLoader>,
    definitions: Arc<dyn DefinitionLoader>,
    handlers: Arc<dyn HandlerFactory>,
    durable: Arc<dyn CheckpointStore>,
    buffered: BufferedCheckpointStore,
    kv: Arc<dyn KvStorageFactory>,
    pub(crate) submitter: Option<Arc<dyn InteractionSubmitter>>,
    pub(crate) defaults: EvaluationOptions,
    pub(crate) sort_keys: SortKeyService,
    definition_cache: DashMap<DefinitionKey, Arc<ContractDefinition>>,
    handler_cache: Mutex<LruCache<String, Arc<dyn ContractHandler>>>,
    root_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    write_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl EngineInner {
    /// Reads see buffered checkpoints before they are flushed.
    pub(crate) fn checkpoints(&self) -> &dyn CheckpointStore {
        &self.buffered
    }

    pub(crate) async fn definition(
        &self,
        contract_id: &str,
        evolved_src_tx_id: Option<&str>,
    ) -> Result<Arc<ContractDefinition>, EvaluationError> {
        let key = (contract_id.to_string(), evolved_src_tx_id.map(str::to_string));
        if let Some(hit) = self.definition_cache.get(&key).map(|d| d.value().clone()) {
            return Ok(hit);
        }
        let loaded = Arc::new(self.definitions.load(contract_id, evolved_src_tx_id).await?);
        self.definition_cache.insert(key, loaded.clone());
        Ok(loaded)
    }

    pub(crate) async fn handler_for(
        &self,
        definition: &ContractDefinition,
    ) -> Result<Arc<dyn ContractHandler>, EvaluationError> {
        let key = format!("{}@{}", definition.tx_id, definition.src_tx_id);
        let hit = self.handler_cache.lock().get(&key).cloned();
        if let Some(handler) = hit {
            return Ok(handler);
        }
        let handler = self.handlers.create(definition).await?;
        self.handler_cache.lock().put(key, handler.clone());
        Ok(handler)
    }

    pub(crate) fn kv_for(&self, contract_id: &str) -> Result<Arc<dyn KvStorage>, StorageError> {
        self.kv.storage_for(contract_id)
    }

    fn lock_for(
        locks: &DashMap<String, Arc<tokio::sync::Mutex<()>>>,
        contract_id: &str,
    ) -> Arc<tokio::sync::Mutex<()>> {
        locks
            .entry(contract_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Serializes top-level evaluations of one contract.
    pub(crate) fn root_lock(&self, contract_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        Self::lock_for(&self.root_locks, contract_id)
    }

    /// Writes a checkpoint, one writer per contract at a time.
    pub(crate) async fn put_checkpoint(
        &self,
        contract_id: &str,
        checkpoint: &Checkpoint,
        buffer: bool,
    ) -> Result<(), StorageError> {
        let lock = Self::lock_for(&self.write_locks, contract_id);
        let _guard = lock.lock().await;
        if buffer {
            self.buffered.put(contract_id, checkpoint).await
        } else {
            self.durable.put(contract_id, checkpoint).await
        }
    }

    pub(crate) async fn flush(&self) -> Result<(), StorageError> {
        let pending = self.buffered.pending_len();
        self.buffered.flush().await?;
        tracing::info!(target: "checkpoint", event = "flush", checkpoints = pending);
        Ok(())
    }
}

/// Builds an [`Engine`]. Checkpoints default to memory and contract key/value
/// storage to [`MemKvFactory`].
pub struct EngineBuilder {
    interactions: Arc<dyn InteractionsLoader>,
    definitions: Arc<dyn DefinitionLoader>,
    handlers: Arc<dyn HandlerFactory>,
    checkpoints: Arc<dyn CheckpointStore>,
    kv: Arc<dyn KvStorageFactory>,
    submitter: Option<Arc<dyn InteractionSubmitter>>,
    defaults: EvaluationOptions,
}

impl EngineBuilder {
    pub fn checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = store;
        self
    }

    pub fn kv_storage(mut self, factory: Arc<dyn KvStorageFactory>) -> Self {
        self.kv = factory;
        self
    }

    pub fn submitter(mut self, submitter: Arc<dyn InteractionSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Options new facades start from.
    pub fn options(mut self, defaults: EvaluationOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn build(self) -> Engine {
        let capacity = NonZeroUsize::new(HANDLER_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Engine {
            inner: Arc::new(EngineInner {
                interactions: self.interactions,
                definitions: self.definitions,
                handlers: self.handlers,
                buffered: BufferedCheckpointStore::new(self.checkpoints.clone()),
                durable: self.checkpoints,
                kv: self.kv,
                submitter: self.submitter,
                defaults: self.defaults,
                sort_keys: SortKeyService::new(),
                definition_cache: DashMap::new(),
                handler_cache: Mutex::new(LruCache::new(capacity)),
                root_locks: DashMap::new(),
                write_locks: DashMap::new(),
            }),
        }
    }
}

/// Shared state behind every [`ContractFacade`]: loaders, the checkpoint
/// store, handler and definition caches.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn builder(
        interactions: Arc<dyn InteractionsLoader>,
        definitions: Arc<dyn DefinitionLoader>,
        handlers: Arc<dyn HandlerFactory>,
    ) -> EngineBuilder {
        EngineBuilder {
            interactions,
            definitions,
            handlers,
            checkpoints: Arc::new(MemCheckpointStore::new()),
            kv: Arc::new(MemKvFactory::new()),
            submitter: None,
            defaults: EvaluationOptions::default(),
        }
    }

    /// A root facade for `contract_id`, configured with the engine defaults.
    pub fn contract(&self, contract_id: &str) -> ContractFacade {
        ContractFacade::new(
            self.inner.clone(),
            contract_id,
            self.inner.defaults.clone(),
        )
    }

    /// Makes checkpoints buffered by `manual_cache_flush` durable.
    pub async fn flush(&self) -> Result<(), EvaluationError> {
        Ok(self.inner.flush().await?)
    }

    /// Checkpoints as evaluations see them, buffered writes included.
    pub fn checkpoints(&self) -> &dyn CheckpointStore {
        self.inner.checkpoints()
    }

    pub fn sort_keys(&self) -> SortKeyService {
        self.inner.sort_keys
    }
}
