// Path: crates/test_utils/src/builders.rs
//! Builders for ledger interactions.

use crate::ids::{block_id, tx_id};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tessera_types::app::{BlockInfo, Interaction, SortKey, Tag};
use tessera_types::tags::{
    APP_NAME, APP_NAME_CONTRACT_ACTION, CONTRACT_TX_ID, INPUT, INTERACT_WRITE,
};

/// The sort key the ledger assigns to `tx_id` mined at `height`.
pub fn sort_key_for(tx_id: &str, height: u64) -> SortKey {
    let mut hasher = Sha256::new();
    hasher.update(URL_SAFE_NO_PAD.decode(block_id(height)).unwrap_or_default());
    hasher.update(URL_SAFE_NO_PAD.decode(tx_id).unwrap_or_default());
    let hash = hex::encode(hasher.finalize());
    SortKey::from_parts(height, &hash).unwrap_or_else(|_| SortKey::genesis())
}

/// Builds an interaction addressed to one contract.
#[derive(Debug, Clone)]
pub struct InteractionBuilder {
    id: String,
    contract_id: String,
    input: Value,
    height: u64,
    owner: String,
    extra_tags: Vec<Tag>,
    parent: Option<String>,
}

impl InteractionBuilder {
    /// An interaction with id `tx_id(seed)` calling `contract_id` with `input`.
    pub fn new(seed: &str, contract_id: &str, input: Value) -> Self {
        Self {
            id: tx_id(seed),
            contract_id: contract_id.to_string(),
            input,
            height: 1,
            owner: "alice".to_string(),
            extra_tags: Vec::new(),
            parent: None,
        }
    }

    pub fn height(mut self, height: u64) -> Self {
        self.height = height;
        self
    }

    pub fn owner(mut self, owner: &str) -> Self {
        self.owner = owner.to_string();
        self
    }

    /// Marks the interaction as writing to `target`.
    pub fn writes_to(mut self, target: &str) -> Self {
        self.extra_tags.push(Tag::new(INTERACT_WRITE, target));
        self
    }

    /// Marks the interaction as bundled inside `parent`.
    pub fn bundled_in(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn build(self) -> Interaction {
        let mut tags = vec![
            Tag::new(APP_NAME, APP_NAME_CONTRACT_ACTION),
            Tag::new(CONTRACT_TX_ID, self.contract_id),
            Tag::new(INPUT, self.input.to_string()),
        ];
        tags.extend(self.extra_tags);
        Interaction {
            sort_key: sort_key_for(&self.id, self.height),
            id: self.id,
            owner: self.owner,
            block: BlockInfo {
                height: self.height,
                id: block_id(self.height),
                timestamp: 1_700_000_000 + self.height * 120,
            },
            tags,
            dry: false,
            parent: self.parent,
        }
    }
}
