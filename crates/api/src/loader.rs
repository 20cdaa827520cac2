// Path: crates/api/src/loader.rs
//! Loaders for the two kinds of ledger data the evaluator consumes.

use crate::error::LoaderError;
use async_trait::async_trait;
use tessera_types::app::{ContractDefinition, Interaction, SortKey};
use tessera_types::config::EvaluationOptions;

/// Loads the interactions addressed to a contract.
///
/// Must return every interaction tagged for the contract with
/// `from < sort_key <= to` (an absent bound is open), including internal-write
/// markers when `options.internal_writes` is set. The result may be unordered
/// and may contain duplicates across pages; the engine de-duplicates by id,
/// drops bundled interactions and sorts.
#[async_trait]
pub trait InteractionsLoader: Send + Sync {
    /// Loads interactions in `(from, to]`.
    async fn load(
        &self,
        contract_id: &str,
        from: Option<&SortKey>,
        to: Option<&SortKey>,
        options: &EvaluationOptions,
    ) -> Result<Vec<Interaction>, LoaderError>;
}

/// Loads contract definitions.
#[async_trait]
pub trait DefinitionLoader: Send + Sync {
    /// Loads `contract_id`. With `evolved_src_tx_id` the definition is built
    /// around that source instead of the deployed one.
    async fn load(
        &self,
        contract_id: &str,
        evolved_src_tx_id: Option<&str>,
    ) -> Result<ContractDefinition, LoaderError>;
}
