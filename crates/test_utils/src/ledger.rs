// Path: crates/test_utils/src/ledger.rs
//! An in-memory ledger behind the loader and submitter interfaces.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tessera_api::loader::{DefinitionLoader, InteractionsLoader};
use tessera_api::submit::{InteractionSubmitter, SubmitRequest};
use tessera_types::app::{ContractDefinition, ContractManifest, Interaction, SortKey};
use tessera_types::config::EvaluationOptions;
use tessera_types::error::LoaderError;
use tessera_types::tags::{CONTRACT_TX_ID, INTERACT_WRITE};

/// Interactions held in memory, returned in insertion order.
#[derive(Debug, Default)]
pub struct MemInteractionsLoader {
    interactions: Mutex<Vec<Interaction>>,
    loads: Mutex<Vec<(String, usize)>>,
}

impl MemInteractionsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, interaction: Interaction) {
        self.interactions.lock().push(interaction);
    }

    pub fn extend(&self, interactions: impl IntoIterator<Item = Interaction>) {
        self.interactions.lock().extend(interactions);
    }

    /// `(contract, returned count)` of every load so far.
    pub fn loads(&self) -> Vec<(String, usize)> {
        self.loads.lock().clone()
    }

    pub fn clear_loads(&self) {
        self.loads.lock().clear();
    }
}

#[async_trait]
impl InteractionsLoader for MemInteractionsLoader {
    async fn load(
        &self,
        contract_id: &str,
        from: Option<&SortKey>,
        to: Option<&SortKey>,
        options: &EvaluationOptions,
    ) -> Result<Vec<Interaction>, LoaderError> {
        let found: Vec<Interaction> = self
            .interactions
            .lock()
            .iter()
            .filter(|tx| {
                tx.tag_values(CONTRACT_TX_ID).any(|c| c == contract_id)
                    || (options.internal_writes
                        && tx.tag_values(INTERACT_WRITE).any(|c| c == contract_id))
            })
            .filter(|tx| from.map_or(true, |from| tx.sort_key > *from))
            .filter(|tx| to.map_or(true, |to| tx.sort_key <= *to))
            .cloned()
            .collect();
        self.loads
            .lock()
            .push((contract_id.to_string(), found.len()));
        Ok(found)
    }
}

#[derive(Debug, Clone)]
struct Source {
    content_type: String,
    manifest: ContractManifest,
}

/// Deployed contracts and the sources they may evolve to.
#[derive(Debug, Default)]
pub struct MemDefinitionLoader {
    contracts: Mutex<HashMap<String, ContractDefinition>>,
    sources: Mutex<HashMap<String, Source>>,
}

impl MemDefinitionLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploys a contract and registers its source.
    pub fn deploy(&self, definition: ContractDefinition) {
        self.add_source(
            &definition.src_tx_id,
            &definition.content_type,
            definition.manifest.clone(),
        );
        self.contracts
            .lock()
            .insert(definition.tx_id.clone(), definition);
    }

    /// Registers a source a deployed contract may evolve to.
    pub fn add_source(&self, src_tx_id: &str, content_type: &str, manifest: ContractManifest) {
        self.sources.lock().insert(
            src_tx_id.to_string(),
            Source {
                content_type: content_type.to_string(),
                manifest,
            },
        );
    }
}

#[async_trait]
impl DefinitionLoader for MemDefinitionLoader {
    async fn load(
        &self,
        contract_id: &str,
        evolved_src_tx_id: Option<&str>,
    ) -> Result<ContractDefinition, LoaderError> {
        let mut definition = self
            .contracts
            .lock()
            .get(contract_id)
            .cloned()
            .ok_or_else(|| LoaderError::NotFound(contract_id.to_string()))?;
        if let Some(src_tx_id) = evolved_src_tx_id {
            let source = self
                .sources
                .lock()
                .get(src_tx_id)
                .cloned()
                .ok_or_else(|| LoaderError::NotFound(src_tx_id.to_string()))?;
            definition.src_tx_id = src_tx_id.to_string();
            definition.content_type = source.content_type;
            definition.manifest = source.manifest;
        }
        Ok(definition)
    }
}

/// Accepts every submission and remembers it.
#[derive(Debug, Default)]
pub struct RecordingSubmitter {
    submitted: Mutex<Vec<SubmitRequest>>,
}

impl RecordingSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<SubmitRequest> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl InteractionSubmitter for RecordingSubmitter {
    async fn submit(&self, request: SubmitRequest) -> anyhow::Result<String> {
        let mut submitted = self.submitted.lock();
        let id = crate::ids::tx_id(&format!("submitted-{}", submitted.len()));
        submitted.push(request);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::InteractionBuilder;
    use serde_json::json;

    #[tokio::test]
    async fn load_filters_by_contract_range_and_markers() {
        let loader = MemInteractionsLoader::new();
        loader.push(InteractionBuilder::new("a1", "A", json!({})).height(1).build());
        loader.push(InteractionBuilder::new("a2", "A", json!({})).height(2).build());
        loader.push(
            InteractionBuilder::new("b1", "B", json!({}))
                .height(3)
                .writes_to("A")
                .build(),
        );
        let mut opts = EvaluationOptions::default();
        let from = SortKey::last_for_height(1).unwrap();

        let plain = loader.load("A", Some(&from), None, &opts).await.unwrap();
        assert_eq!(plain.len(), 1);

        opts.internal_writes = true;
        let with_markers = loader.load("A", None, None, &opts).await.unwrap();
        assert_eq!(with_markers.len(), 3);
        assert_eq!(loader.loads(), vec![("A".into(), 1), ("A".into(), 3)]);
    }

    #[tokio::test]
    async fn unknown_evolve_sources_are_not_found() {
        let defs = MemDefinitionLoader::new();
        defs.deploy(ContractDefinition {
            tx_id: "A".into(),
            src_tx_id: "s1".into(),
            src: String::new(),
            content_type: "x".into(),
            init_state: json!({}),
            owner: "o".into(),
            manifest: Default::default(),
        });
        assert!(defs.load("A", None).await.is_ok());
        assert!(matches!(
            defs.load("A", Some("s2")).await,
            Err(LoaderError::NotFound(_))
        ));
        defs.add_source("s2", "y", Default::default());
        assert_eq!(defs.load("A", Some("s2")).await.unwrap().content_type, "y");
    }
}
