// Path: crates/types/src/codec.rs

//! The canonical binary codec for persisted checkpoints.
//!
//! Records are SCALE-encoded (`parity-scale-codec`). The contract state itself
//! is arbitrary JSON, so it travels as JSON bytes inside the SCALE envelope;
//! validity and error maps are stored as sorted pair lists, which keeps the
//! encoding of a given checkpoint byte-identical across nodes.

use crate::app::{Checkpoint, EvalStateResult, SortKey};
use parity_scale_codec::{Decode, DecodeAll, Encode};

/// Encodes a value into a deterministic, canonical byte representation using SCALE codec.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Result<Vec<u8>, String> {
    Ok(v.encode())
}

/// Decodes a value from a canonical byte representation using SCALE codec.
///
/// Fails on trailing bytes as well as on malformed input.
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, String> {
    T::decode_all(&mut &*b).map_err(|e| format!("canonical decode failed: {}", e))
}

/// The on-disk shape of a checkpoint.
#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct StoredCheckpoint {
    /// The checkpoint's sort key.
    pub sort_key: SortKey,
    /// The contract state as JSON bytes.
    pub state_json: Vec<u8>,
    /// Validity entries, ordered by interaction id.
    pub validity: Vec<(String, bool)>,
    /// Error message entries, ordered by interaction id.
    pub error_messages: Vec<(String, String)>,
}

impl StoredCheckpoint {
    /// Converts a checkpoint into its stored shape.
    pub fn from_checkpoint(cp: &Checkpoint) -> Result<Self, String> {
        let state_json = serde_json::to_vec(&cp.result.state).map_err(|e| e.to_string())?;
        Ok(Self {
            sort_key: cp.sort_key.clone(),
            state_json,
            validity: cp
                .result
                .validity
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            error_messages: cp
                .result
                .error_messages
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }

    /// Converts back into a checkpoint.
    pub fn into_checkpoint(self) -> Result<Checkpoint, String> {
        let state = serde_json::from_slice(&self.state_json).map_err(|e| e.to_string())?;
        Ok(Checkpoint::new(
            self.sort_key,
            EvalStateResult {
                state,
                validity: self.validity.into_iter().collect(),
                error_messages: self.error_messages.into_iter().collect(),
            },
        ))
    }
}

/// Encodes a checkpoint for persistence.
pub fn encode_checkpoint(cp: &Checkpoint) -> Result<Vec<u8>, String> {
    to_bytes_canonical(&StoredCheckpoint::from_checkpoint(cp)?)
}

/// Decodes a persisted checkpoint.
pub fn decode_checkpoint(bytes: &[u8]) -> Result<Checkpoint, String> {
    from_bytes_canonical::<StoredCheckpoint>(bytes)?.into_checkpoint()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn checkpoint() -> Checkpoint {
        let mut result = EvalStateResult::new(json!({ "counter": 555, "owner": "abc" }));
        result.apply_valid("tx-b", json!({ "counter": 556 }));
        result.apply_invalid("tx-a", "Insufficient balance");
        Checkpoint::new(SortKey::last_for_height(12).unwrap(), result)
    }

    #[test]
    fn checkpoint_survives_persistence() {
        let cp = checkpoint();
        let bytes = encode_checkpoint(&cp).unwrap();
        assert_eq!(decode_checkpoint(&bytes).unwrap(), cp);
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(
            encode_checkpoint(&checkpoint()).unwrap(),
            encode_checkpoint(&checkpoint()).unwrap()
        );
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode_checkpoint(&checkpoint()).unwrap();
        bytes.push(0);
        assert!(decode_checkpoint(&bytes).is_err());
    }
}
