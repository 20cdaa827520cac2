// Path: crates/types/src/app/interaction.rs

use super::SortKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single name/value tag attached to a ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// The tag name.
    pub name: String,
    /// The tag value.
    pub value: String,
}

impl Tag {
    /// Creates a tag.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The ledger block an interaction was mined in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block height.
    pub height: u64,
    /// Base64url block id.
    pub id: String,
    /// Block timestamp in seconds.
    pub timestamp: u64,
}

/// An immutable, signed call to a contract as loaded from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// The transaction id (base64url).
    pub id: String,
    /// The position of this interaction in the total order.
    pub sort_key: SortKey,
    /// The address that signed the interaction.
    pub owner: String,
    /// The block the interaction was included in.
    pub block: BlockInfo,
    /// All transaction tags, in ledger order.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Marks a synthesized, simulation-only interaction.
    #[serde(default)]
    pub dry: bool,
    /// Set for transactions bundled inside another transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Interaction {
    /// Returns the value of the first tag named `name`.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }

    /// Iterates the values of every tag named `name`.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.name == name)
            .map(|t| t.value.as_str())
    }
}

/// How a contract handler is asked to treat an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    /// The interaction may change state.
    Write,
    /// The interaction only computes a result.
    View,
}

/// The kind of a nested call from one contract into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InnerCallType {
    /// `read_contract_state`.
    Read,
    /// `view_contract_state`.
    View,
    /// `write`.
    Write,
}

/// The decoded call a handler executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInteraction {
    /// The JSON input, conventionally `{ "function": ..., ...args }`.
    pub input: Value,
    /// The immediate caller: a wallet address, or a contract id for internal calls.
    pub caller: String,
    /// Write or view.
    pub interaction_type: InteractionType,
}

impl ContractInteraction {
    /// The `function` field of the input, if present.
    pub fn function(&self) -> Option<&str> {
        self.input.get("function").and_then(Value::as_str)
    }
}

/// Everything a handler receives for one interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionData {
    /// The decoded call.
    pub interaction: ContractInteraction,
    /// The ledger transaction that carries the call.
    pub tx: Interaction,
}

/// Per-call options for submitting a new interaction.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Extra tags appended to the submitted transaction.
    pub tags: Vec<Tag>,
    /// Overrides the facade's `strict` option for this call.
    pub strict: Option<bool>,
}

/// The outcome of handing an interaction to the submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteInteractionResponse {
    /// The id of the submitted transaction.
    pub original_tx_id: String,
    /// Contracts named in `Interact-Write` tags of the submitted transaction.
    #[serde(default)]
    pub interact_write: Vec<String>,
}
