// Path: crates/execution/src/sort_key.rs
//! Builds and compares the total-order key of interactions.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use tessera_types::app::{Interaction, SortKey};
use tessera_types::error::EvaluationError;

fn decode_id(kind: &str, id: &str) -> Result<Vec<u8>, EvaluationError> {
    URL_SAFE_NO_PAD
        .decode(id.trim_end_matches('='))
        .map_err(|e| EvaluationError::InvalidSortKey(format!("{kind} '{id}' is not base64url: {e}")))
}

/// Sort keys are `{height:012},{hex(sha256(block_id ++ tx_id))}`. Height
/// dominates; the hash breaks ties inside a block identically on every node.
#[derive(Debug, Default, Clone, Copy)]
pub struct SortKeyService;

impl SortKeyService {
    pub fn new() -> Self {
        Self
    }

    pub fn create(
        &self,
        block_id: &str,
        tx_id: &str,
        block_height: u64,
    ) -> Result<SortKey, EvaluationError> {
        let mut hasher = Sha256::new();
        hasher.update(decode_id("block id", block_id)?);
        hasher.update(decode_id("transaction id", tx_id)?);
        SortKey::from_parts(block_height, &hex::encode(hasher.finalize()))
    }

    pub fn compare(&self, a: &SortKey, b: &SortKey) -> Ordering {
        a.cmp(b)
    }

    /// Compares less than every real key.
    pub fn genesis(&self) -> SortKey {
        SortKey::genesis()
    }

    /// Compares greater than or equal to every key at `block_height`.
    pub fn last_sort_key_for_height(&self, block_height: u64) -> Result<SortKey, EvaluationError> {
        SortKey::last_for_height(block_height)
    }

    /// Sorts interactions by sort key. Stable, so equal keys keep load order.
    pub fn sort(&self, interactions: &mut [Interaction]) {
        interactions.sort_by(|a, b| self.compare(&a.sort_key, &b.sort_key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(seed: u8) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest([seed]))
    }

    #[test]
    fn create_is_deterministic_and_fixed_width() {
        let svc = SortKeyService::new();
        let a = svc.create(&id(1), &id(2), 1_234).unwrap();
        let b = svc.create(&id(1), &id(2), 1_234).unwrap();
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("000000001234,"));
        assert_eq!(a.as_str().len(), 12 + 1 + 64);
        assert_ne!(a, svc.create(&id(1), &id(3), 1_234).unwrap());
    }

    #[test]
    fn padded_ids_are_accepted() {
        let svc = SortKeyService::new();
        let padded = format!("{}=", id(1));
        assert_eq!(
            svc.create(&padded, &id(2), 7).unwrap(),
            svc.create(&id(1), &id(2), 7).unwrap()
        );
    }

    #[test]
    fn malformed_input_is_rejected() {
        let svc = SortKeyService::new();
        assert!(matches!(
            svc.create("not base64!", &id(2), 1),
            Err(EvaluationError::InvalidSortKey(_))
        ));
        assert!(matches!(
            svc.create(&id(1), &id(2), 1_000_000_000_000),
            Err(EvaluationError::InvalidSortKey(_))
        ));
    }

    proptest! {
        #[test]
        fn height_dominates_the_order(h1 in 0u64..1_000_000, h2 in 0u64..1_000_000, s1: u8, s2: u8) {
            let svc = SortKeyService::new();
            let k1 = svc.create(&id(s1), &id(s2), h1).unwrap();
            let k2 = svc.create(&id(s2), &id(s1), h2).unwrap();
            if h1 != h2 {
                prop_assert_eq!(svc.compare(&k1, &k2), h1.cmp(&h2));
            }
            prop_assert!(svc.genesis() < k1);
            prop_assert!(k1 <= svc.last_sort_key_for_height(h1).unwrap());
        }
    }
}
