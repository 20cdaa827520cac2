// Path: crates/api/src/submit.rs
//! Hands new interactions to whatever signs and posts them to the ledger.

use async_trait::async_trait;
use serde_json::Value;
use tessera_types::app::Tag;

/// A fully prepared interaction, ready to be signed and posted.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    /// The target contract.
    pub contract_id: String,
    /// The interaction input.
    pub input: Value,
    /// Tags in addition to the protocol tags (`Contract`, `Input`, ...).
    pub tags: Vec<Tag>,
    /// Where to post, if not the ledger directly.
    pub sequencer_url: Option<String>,
    /// Block until the interaction is confirmed.
    pub wait_for_confirmation: bool,
}

/// Signs and posts interactions. Out of the engine's scope; injected.
#[async_trait]
pub trait InteractionSubmitter: Send + Sync {
    /// Submits the interaction and returns its transaction id.
    async fn submit(&self, request: SubmitRequest) -> anyhow::Result<String>;
}
