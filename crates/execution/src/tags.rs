// Path: crates/execution/src/tags.rs
//! Reads the engine-relevant tags of an interaction.

use serde_json::Value;
use tessera_types::app::Interaction;
use tessera_types::tags::{CONTRACT_TX_ID, INPUT, INTERACT_WRITE};

/// The parsed input of `tx` addressed to `contract_id`.
///
/// An interaction may address several contracts; each `Input` tag belongs to
/// the `Contract` tag preceding it. A single `Input` tag is used as is.
pub fn input_for(tx: &Interaction, contract_id: &str) -> Option<Value> {
    let mut addressed = false;
    let mut raw = None;
    for tag in &tx.tags {
        if tag.name == CONTRACT_TX_ID {
            addressed = tag.value == contract_id;
        } else if tag.name == INPUT && addressed {
            raw = Some(tag.value.as_str());
            break;
        }
    }
    let raw = match raw {
        Some(raw) => raw,
        None => {
            let mut inputs = tx.tag_values(INPUT);
            match (inputs.next(), inputs.next()) {
                (Some(only), None) => only,
                _ => return None,
            }
        }
    };
    match serde_json::from_str(raw) {
        Ok(input) => Some(input),
        Err(e) => {
            log::warn!("interaction {} carries unparsable input: {}", tx.id, e);
            None
        }
    }
}

/// The contract an interaction was sent to.
pub fn target_contract(tx: &Interaction) -> Option<&str> {
    tx.tag(CONTRACT_TX_ID)
}

/// Whether `tx` names `contract_id` as a contract it writes to.
pub fn is_interact_write(tx: &Interaction, contract_id: &str) -> bool {
    tx.tag_values(INTERACT_WRITE).any(|v| v == contract_id)
}

/// Every contract `tx` declares it writes to.
pub fn interact_write_targets(tx: &Interaction) -> Vec<String> {
    tx.tag_values(INTERACT_WRITE).map(str::to_string).collect()
}

/// Whether `tx` is another contract's interaction that writes into
/// `contract_id`, rather than an interaction sent to `contract_id` itself.
pub fn is_write_marker(tx: &Interaction, contract_id: &str) -> bool {
    is_interact_write(tx, contract_id) && target_contract(tx) != Some(contract_id)
}
