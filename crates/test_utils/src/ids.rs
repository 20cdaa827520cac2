// Path: crates/test_utils/src/ids.rs
//! Deterministic, well-formed ledger ids.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

fn id(domain: &str, seed: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(format!("{domain}:{seed}")))
}

/// A 43-character base64url transaction id derived from `seed`.
pub fn tx_id(seed: &str) -> String {
    id("tx", seed)
}

/// The block id used for `height`.
pub fn block_id(height: u64) -> String {
    id("block", &height.to_string())
}

/// A contract source id derived from `name`. Valid as an `evolve` target.
pub fn src_id(name: &str) -> String {
    id("src", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_and_unpadded() {
        assert_eq!(tx_id("a"), tx_id("a"));
        assert_ne!(tx_id("a"), src_id("a"));
        assert_eq!(block_id(7).len(), 43);
        assert!(!tx_id("a").contains('='));
    }
}
