// Path: crates/execution/src/evolve.rs
//! Detects a request to swap a contract's source in its state.

use serde_json::Value;

/// Source ids are 43 characters of unpadded base64url.
pub fn is_valid_src_tx_id(id: &str) -> bool {
    id.len() == 43
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// A setting either at the top level of `state.settings` or, for contracts
/// storing settings as `[[name, value], ...]`, in its list of pairs.
fn setting<'a>(state: &'a Value, name: &str) -> Option<&'a Value> {
    match state.get("settings")? {
        Value::Object(map) => map.get(name),
        Value::Array(pairs) => pairs.iter().find_map(|pair| match pair.as_array()?.as_slice() {
            [key, value] if key.as_str() == Some(name) => Some(value),
            _ => None,
        }),
        _ => None,
    }
}

fn lookup<'a>(state: &'a Value, name: &str) -> Option<&'a Value> {
    state
        .get(name)
        .filter(|v| !v.is_null())
        .or_else(|| setting(state, name))
}

/// The source a contract asks to evolve to, if evolving is allowed and the id
/// is well formed.
pub fn evolved_src_tx_id(state: &Value) -> Option<String> {
    let can_evolve = lookup(state, "canEvolve")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    if !can_evolve {
        return None;
    }
    let id = lookup(state, "evolve")?.as_str()?;
    if !is_valid_src_tx_id(id) {
        tracing::debug!(target: "evolve", id, "ignoring malformed evolve source id");
        return None;
    }
    Some(id.to_string())
}
