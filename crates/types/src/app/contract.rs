// Path: crates/types/src/app/contract.rs

use crate::config::ManifestOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content type of sources executed by the native in-process backend.
pub const CONTENT_TYPE_NATIVE: &str = "application/x.tessera-native";
/// Content type of sources executed by the isolated-task backend.
pub const CONTENT_TYPE_ISOLATED: &str = "application/x.tessera-isolated";

/// Evaluation-relevant flags baked into a contract source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractManifest {
    /// Option values the source requires, overriding the facade's options.
    #[serde(default)]
    pub evaluation_options: ManifestOptions,
    /// The source calls out to the unsafe client.
    #[serde(default)]
    pub unsafe_client: bool,
}

/// A deployed contract together with its currently effective source.
///
/// Immutable once loaded. An `evolve` produces a new definition with the same
/// `tx_id` and a different `src_tx_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDefinition {
    /// The contract id (deployment transaction id).
    pub tx_id: String,
    /// The id of the effective source transaction.
    pub src_tx_id: String,
    /// The source itself. For native backends this is a registry identifier.
    pub src: String,
    /// Selects the execution backend.
    pub content_type: String,
    /// The state before the first interaction.
    pub init_state: Value,
    /// The deployer.
    pub owner: String,
    /// Flags baked into the source.
    #[serde(default)]
    pub manifest: ContractManifest,
}

impl ContractDefinition {
    /// Whether executing this source requires the unsafe client.
    pub fn uses_unsafe_client(&self) -> bool {
        self.manifest.unsafe_client || self.src.contains("SmartWeave.unsafeClient")
    }
}
