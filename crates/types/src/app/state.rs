// Path: crates/types/src/app/state.rs

use super::SortKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A contract state together with the per-interaction verdicts that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalStateResult {
    /// The contract state.
    pub state: Value,
    /// Interaction id to validity.
    #[serde(default)]
    pub validity: BTreeMap<String, bool>,
    /// Interaction id to error message, for invalid interactions only.
    #[serde(default)]
    pub error_messages: BTreeMap<String, String>,
}

impl EvalStateResult {
    /// A result with no interactions applied yet.
    pub fn new(state: Value) -> Self {
        Self {
            state,
            validity: BTreeMap::new(),
            error_messages: BTreeMap::new(),
        }
    }

    /// Records a valid interaction, replacing the state.
    pub fn apply_valid(&mut self, tx_id: &str, state: Value) {
        self.state = state;
        self.validity.insert(tx_id.to_string(), true);
        self.error_messages.remove(tx_id);
    }

    /// Records an invalid interaction, leaving the state unchanged.
    pub fn apply_invalid(&mut self, tx_id: &str, message: impl Into<String>) {
        self.validity.insert(tx_id.to_string(), false);
        self.error_messages.insert(tx_id.to_string(), message.into());
    }

    /// The recorded validity of `tx_id`, if any.
    pub fn validity_of(&self, tx_id: &str) -> Option<bool> {
        self.validity.get(tx_id).copied()
    }
}

/// An evaluation result pinned at a position in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// The sort key of the last interaction reflected in `result`.
    pub sort_key: SortKey,
    /// State, validity and error messages as of `sort_key`.
    pub result: EvalStateResult,
}

impl Checkpoint {
    /// Creates a checkpoint.
    pub fn new(sort_key: SortKey, result: EvalStateResult) -> Self {
        Self { sort_key, result }
    }

    /// Shorthand for `&self.result.state`.
    pub fn state(&self) -> &Value {
        &self.result.state
    }
}
