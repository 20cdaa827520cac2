// Path: crates/api/src/handler/mod.rs
//! Defines the capability interface of contract execution backends and the
//! bridge through which running contract code reaches other contracts.

pub mod contract;

pub use contract::{ContractCall, ContractOutput, NativeContract};

use crate::error::{BridgeError, HandlerError};
use crate::storage::KvStorage;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tessera_types::app::{
    ContractDefinition, EvalStateResult, HandlerResult, InteractionData, InteractionResult,
};
use tessera_types::config::EvaluationOptions;

/// Everything a handler may consult besides the state and the interaction.
#[derive(Clone)]
pub struct ExecutionContext {
    /// The contract being executed.
    pub contract_id: String,
    /// The definition in effect at this interaction's position.
    pub definition: Arc<ContractDefinition>,
    /// Options resolved for this contract.
    pub options: Arc<EvaluationOptions>,
    /// Internal calls into other contracts.
    pub bridge: Arc<dyn ContractBridge>,
    /// The contract's own key/value storage, if enabled.
    pub kv: Option<Arc<dyn KvStorage>>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("contract_id", &self.contract_id)
            .field("src_tx_id", &self.definition.src_tx_id)
            .field("kv", &self.kv.is_some())
            .finish()
    }
}

/// Executes exactly one interaction against a state.
///
/// Implementations must be deterministic for an identical `(state, interaction)`
/// pair. Business rejections and runtime faults are reported through
/// [`HandlerResult`], never as a Rust error.
#[async_trait]
pub trait ContractHandler: Send + Sync {
    /// Runs one interaction.
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        current: &EvalStateResult,
        data: &InteractionData,
    ) -> HandlerResult;

    /// A short name of the backend, for diagnostics.
    fn backend(&self) -> &'static str;
}

/// Builds a handler for a contract definition. Selected once per contract
/// instantiation and again after every `evolve`. Handlers are cached per
/// contract and source and shared by every evaluation, so anything that
/// depends on evaluation options is read from the [`ExecutionContext`].
#[async_trait]
pub trait HandlerFactory: Send + Sync {
    /// Creates a handler for `definition`.
    async fn create(
        &self,
        definition: &ContractDefinition,
    ) -> Result<Arc<dyn ContractHandler>, HandlerError>;
}

/// Internal calls available to contract code while it executes an interaction.
///
/// Every call observes the target contract as of the position of the
/// interaction being executed, plus any uncommitted effects produced earlier
/// in the same top-level call.
#[async_trait]
pub trait ContractBridge: Send + Sync {
    /// Reads another contract's state.
    async fn read_contract_state(&self, contract_id: &str) -> Result<EvalStateResult, BridgeError>;

    /// Runs a view function of another contract.
    async fn view_contract_state(
        &self,
        contract_id: &str,
        input: Value,
    ) -> Result<InteractionResult, BridgeError>;

    /// Writes to another contract with the executing contract as caller.
    async fn write(&self, contract_id: &str, input: Value)
        -> Result<InteractionResult, BridgeError>;

    /// Returns the executing contract's own state as other contracts have
    /// left it during this interaction.
    async fn refresh_state(&self) -> Result<Value, BridgeError>;
}

/// A bridge for contexts where internal calls are not available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBridge;

#[async_trait]
impl ContractBridge for NoBridge {
    async fn read_contract_state(&self, contract_id: &str) -> Result<EvalStateResult, BridgeError> {
        Err(BridgeError::Contract(format!(
            "internal reads are not available (target {contract_id})"
        )))
    }

    async fn view_contract_state(
        &self,
        contract_id: &str,
        _input: Value,
    ) -> Result<InteractionResult, BridgeError> {
        Err(BridgeError::Contract(format!(
            "internal views are not available (target {contract_id})"
        )))
    }

    async fn write(
        &self,
        contract_id: &str,
        _input: Value,
    ) -> Result<InteractionResult, BridgeError> {
        Err(BridgeError::Contract(format!(
            "internal writes are not available (target {contract_id})"
        )))
    }

    async fn refresh_state(&self) -> Result<Value, BridgeError> {
        Err(BridgeError::Contract("state refresh is not available".into()))
    }
}
