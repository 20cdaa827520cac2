// Path: crates/api/src/handler/contract.rs
//! The programming interface of contracts compiled into the host process.

use super::ExecutionContext;
use crate::error::ContractError;
use async_trait::async_trait;
use serde_json::Value;
use tessera_types::app::{
    BlockInfo, ContractDefinition, Interaction, InteractionData, InteractionResult,
    InteractionType,
};

/// One invocation of a contract: the interaction being executed and the
/// capabilities available while executing it.
pub struct ContractCall<'a> {
    ctx: &'a ExecutionContext,
    data: &'a InteractionData,
}

impl<'a> ContractCall<'a> {
    pub fn new(ctx: &'a ExecutionContext, data: &'a InteractionData) -> Self {
        Self { ctx, data }
    }

    pub fn contract_id(&self) -> &str {
        &self.ctx.contract_id
    }

    pub fn caller(&self) -> &str {
        &self.data.interaction.caller
    }

    pub fn input(&self) -> &Value {
        &self.data.interaction.input
    }

    pub fn function(&self) -> Option<&str> {
        self.data.interaction.function()
    }

    pub fn interaction_type(&self) -> InteractionType {
        self.data.interaction.interaction_type
    }

    pub fn transaction(&self) -> &Interaction {
        &self.data.tx
    }

    pub fn block(&self) -> &BlockInfo {
        &self.data.tx.block
    }

    pub fn definition(&self) -> &ContractDefinition {
        &self.ctx.definition
    }

    /// The gas budget of this interaction.
    pub fn gas_limit(&self) -> u64 {
        self.ctx.options.gas_limit
    }

    /// The state of another contract at this interaction's position.
    pub async fn read_contract_state(&self, contract_id: &str) -> Result<Value, ContractError> {
        Ok(self.ctx.bridge.read_contract_state(contract_id).await?.state)
    }

    pub async fn view_contract_state(
        &self,
        contract_id: &str,
        input: Value,
    ) -> Result<InteractionResult, ContractError> {
        Ok(self
            .ctx
            .bridge
            .view_contract_state(contract_id, input)
            .await?)
    }

    /// Writes to another contract with this contract as the caller.
    pub async fn write(
        &self,
        contract_id: &str,
        input: Value,
    ) -> Result<InteractionResult, ContractError> {
        Ok(self.ctx.bridge.write(contract_id, input).await?)
    }

    /// This contract's state as left by other contracts writing to it during
    /// the current interaction.
    pub async fn refresh_state(&self) -> Result<Value, ContractError> {
        Ok(self.ctx.bridge.refresh_state().await?)
    }

    fn kv(&self) -> Result<&dyn crate::storage::KvStorage, ContractError> {
        self.ctx
            .kv
            .as_deref()
            .ok_or_else(|| ContractError::Business("KV storage not enabled for this contract".into()))
    }

    /// Reads a JSON value from the contract's key/value storage.
    pub async fn kv_get(&self, key: &str) -> Result<Option<Value>, ContractError> {
        let raw = self
            .kv()?
            .get(key.as_bytes())
            .await
            .map_err(|e| ContractError::Exception(e.to_string()))?;
        raw.map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(|e| ContractError::Exception(format!("corrupt KV value under '{key}': {e}")))
    }

    /// Stages a JSON value into the contract's key/value storage.
    pub async fn kv_put(&self, key: &str, value: &Value) -> Result<(), ContractError> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| ContractError::Exception(e.to_string()))?;
        self.kv()?
            .put(key.as_bytes(), &bytes)
            .await
            .map_err(|e| ContractError::Exception(e.to_string()))
    }

    pub async fn kv_del(&self, key: &str) -> Result<(), ContractError> {
        self.kv()?
            .del(key.as_bytes())
            .await
            .map_err(|e| ContractError::Exception(e.to_string()))
    }
}

/// What a contract returns from a successful invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractOutput {
    /// The new state. `None` leaves the state unchanged.
    pub state: Option<Value>,
    /// The value returned to the caller, mostly by views.
    pub result: Value,
    pub gas_used: u64,
}

impl ContractOutput {
    pub fn state(state: Value) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn result(result: Value) -> Self {
        Self {
            result,
            ..Default::default()
        }
    }

    pub fn with_gas(mut self, gas_used: u64) -> Self {
        self.gas_used = gas_used;
        self
    }
}

/// A contract implemented in Rust and linked into the host.
///
/// `Err(ContractError::Business)` rejects the interaction; any other error is
/// treated as a runtime fault.
#[async_trait]
pub trait NativeContract: Send + Sync {
    async fn handle(
        &self,
        call: &ContractCall<'_>,
        state: Value,
    ) -> Result<ContractOutput, ContractError>;
}
