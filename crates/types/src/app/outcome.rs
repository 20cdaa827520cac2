// Path: crates/types/src/app/outcome.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// What a contract handler returns for one interaction.
///
/// Business rejections and runtime faults are values, not errors: the
/// evaluator records them and moves on to the next interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerResult {
    /// The interaction succeeded.
    Ok {
        /// The new state (for views, the unchanged state).
        state: Value,
        /// The value returned to the caller.
        result: Value,
        /// Gas consumed.
        gas_used: u64,
    },
    /// The contract rejected the interaction.
    Error {
        /// The contract's message.
        message: String,
        /// Gas consumed.
        gas_used: u64,
    },
    /// The handler faulted or timed out.
    Exception {
        /// A description of the fault.
        message: String,
        /// Gas consumed.
        gas_used: u64,
    },
}

impl HandlerResult {
    /// An `Ok` outcome with no gas accounting.
    pub fn ok(state: Value, result: Value) -> Self {
        Self::Ok {
            state,
            result,
            gas_used: 0,
        }
    }

    /// An `Error` outcome.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            gas_used: 0,
        }
    }

    /// An `Exception` outcome.
    pub fn exception(message: impl Into<String>) -> Self {
        Self::Exception {
            message: message.into(),
            gas_used: 0,
        }
    }

    /// Gas consumed by the handler.
    pub fn gas_used(&self) -> u64 {
        match self {
            Self::Ok { gas_used, .. }
            | Self::Error { gas_used, .. }
            | Self::Exception { gas_used, .. } => *gas_used,
        }
    }

    /// The outcome tag.
    pub fn kind(&self) -> InteractionResultType {
        match self {
            Self::Ok { .. } => InteractionResultType::Ok,
            Self::Error { .. } => InteractionResultType::Error,
            Self::Exception { .. } => InteractionResultType::Exception,
        }
    }

    /// The error message of a failed outcome.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::Error { message, .. } | Self::Exception { message, .. } => Some(message),
        }
    }

    /// Converts into the public result shape; failed outcomes report `base_state`.
    pub fn into_interaction_result(self, base_state: &Value) -> InteractionResult {
        let kind = self.kind();
        match self {
            Self::Ok {
                state,
                result,
                gas_used,
            } => InteractionResult {
                kind,
                state,
                result,
                error_message: None,
                gas_used,
                original_validity: BTreeMap::new(),
                original_error_messages: BTreeMap::new(),
            },
            Self::Error { message, gas_used } | Self::Exception { message, gas_used } => {
                InteractionResult {
                    kind,
                    state: base_state.clone(),
                    result: Value::Null,
                    error_message: Some(message),
                    gas_used,
                    original_validity: BTreeMap::new(),
                    original_error_messages: BTreeMap::new(),
                }
            }
        }
    }
}

/// The outcome tag of an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionResultType {
    /// Succeeded.
    Ok,
    /// Rejected by the contract.
    Error,
    /// Faulted.
    Exception,
}

/// The result of `dry_write`, `view_state` and internal calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionResult {
    /// The outcome tag.
    #[serde(rename = "type")]
    pub kind: InteractionResultType,
    /// The state after the interaction (unchanged on failure).
    pub state: Value,
    /// The value returned by the contract.
    pub result: Value,
    /// Set for failed outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Gas consumed.
    #[serde(default)]
    pub gas_used: u64,
    /// The callee's validity map before the interaction.
    #[serde(default)]
    pub original_validity: BTreeMap<String, bool>,
    /// The callee's error messages before the interaction.
    #[serde(default)]
    pub original_error_messages: BTreeMap<String, String>,
}

impl InteractionResult {
    /// Whether the outcome is `ok`.
    pub fn is_ok(&self) -> bool {
        self.kind == InteractionResultType::Ok
    }
}
