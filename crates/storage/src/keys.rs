// Path: crates/storage/src/keys.rs
//! Byte layouts of composite keys. All layouts sort the way the engine scans them.

use tessera_types::app::SortKey;

/// Encodes a u32 into a big-endian byte array.
#[inline]
pub fn be32(x: u32) -> [u8; 4] {
    x.to_be_bytes()
}

/// Separates a contract id from a sort key. Contract ids are base64url and
/// never contain it.
const SEP: u8 = 0x00;

/// `contract || 0x00 || sort_key`.
pub fn checkpoint_key(contract_id: &str, sort_key: &SortKey) -> Vec<u8> {
    [
        contract_id.as_bytes(),
        &[SEP][..],
        sort_key.as_str().as_bytes(),
    ]
    .concat()
}

/// The smallest checkpoint key of `contract_id`.
pub fn contract_lower(contract_id: &str) -> Vec<u8> {
    [contract_id.as_bytes(), &[SEP][..]].concat()
}

/// The first key past every checkpoint of `contract_id`.
pub fn contract_upper(contract_id: &str) -> Vec<u8> {
    [contract_id.as_bytes(), &[SEP + 1][..]].concat()
}

/// Splits a checkpoint key back into the contract id.
pub fn contract_of(key: &[u8]) -> Option<&str> {
    let pos = key.iter().position(|b| *b == SEP)?;
    std::str::from_utf8(key.get(..pos)?).ok()
}

/// `len(contract) || contract || len(key) || key`; user keys are arbitrary bytes.
pub fn kv_prefix(contract_id: &str, key: &[u8]) -> Vec<u8> {
    [
        be32(contract_id.len() as u32).as_slice(),
        contract_id.as_bytes(),
        be32(key.len() as u32).as_slice(),
        key,
    ]
    .concat()
}

/// `kv_prefix || sort_key`.
pub fn kv_versioned(contract_id: &str, key: &[u8], sort_key: &SortKey) -> Vec<u8> {
    [kv_prefix(contract_id, key).as_slice(), sort_key.as_str().as_bytes()].concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_keys_of_one_contract_stay_within_bounds() {
        let k = checkpoint_key("abc", &SortKey::last_for_height(3).unwrap());
        assert!(contract_lower("abc") < k);
        assert!(k < contract_upper("abc"));
        // A contract id that extends another must not fall into its range.
        let other = checkpoint_key("abcd", &SortKey::genesis());
        assert!(other >= contract_upper("abc"));
        assert_eq!(contract_of(&k), Some("abc"));
    }

    #[test]
    fn kv_versions_sort_by_sort_key() {
        let early = kv_versioned("c", b"k", &SortKey::last_for_height(1).unwrap());
        let late = kv_versioned("c", b"k", &SortKey::last_for_height(2).unwrap());
        assert!(early < late);
        assert!(early.starts_with(&kv_prefix("c", b"k")));
        assert!(!kv_versioned("c", b"k\0", &SortKey::genesis()).starts_with(&kv_prefix("c", b"k")));
    }
}
