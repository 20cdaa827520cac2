// Path: crates/types/src/app/sort_key.rs

use crate::error::EvaluationError;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal digits used for the zero-padded block height component.
pub const HEIGHT_WIDTH: usize = 12;
/// Number of lowercase hex characters in the hash component.
pub const HASH_WIDTH: usize = 64;
/// The largest block height representable in a sort key.
pub const MAX_SORT_KEY_HEIGHT: u64 = 999_999_999_999;

/// A fixed-width, lexicographically comparable ordering key for an interaction.
///
/// The layout is `{height:012},{hash}` where `hash` is 64 lowercase hex
/// characters. Plain string comparison implements the total order: height
/// dominates, ties within a block are broken by the hash.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
#[serde(transparent)]
pub struct SortKey(String);

impl SortKey {
    /// Validates an externally supplied key.
    pub fn parse(raw: impl Into<String>) -> Result<Self, EvaluationError> {
        let raw = raw.into();
        let Some((height, hash)) = raw.split_once(',') else {
            return Err(EvaluationError::InvalidSortKey(format!(
                "missing separator in '{raw}'"
            )));
        };
        if height.len() != HEIGHT_WIDTH || !height.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EvaluationError::InvalidSortKey(format!(
                "height component of '{raw}' must be {HEIGHT_WIDTH} decimal digits"
            )));
        }
        if hash.len() != HASH_WIDTH || !hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(EvaluationError::InvalidSortKey(format!(
                "hash component of '{raw}' must be {HASH_WIDTH} lowercase hex characters"
            )));
        }
        Ok(Self(raw))
    }

    /// Assembles a key from an already validated height and hex hash.
    pub fn from_parts(height: u64, hash_hex: &str) -> Result<Self, EvaluationError> {
        if height > MAX_SORT_KEY_HEIGHT {
            return Err(EvaluationError::InvalidSortKey(format!(
                "block height {height} exceeds {MAX_SORT_KEY_HEIGHT}"
            )));
        }
        Self::parse(format!("{height:0width$},{hash_hex}", width = HEIGHT_WIDTH))
    }

    /// The sentinel that compares below every real key.
    pub fn genesis() -> Self {
        Self(format!(
            "{},{}",
            "0".repeat(HEIGHT_WIDTH),
            "0".repeat(HASH_WIDTH)
        ))
    }

    /// An upper bound for every key at `height`: the largest hex digit in
    /// every hash position.
    pub fn last_for_height(height: u64) -> Result<Self, EvaluationError> {
        Self::from_parts(height, &"f".repeat(HASH_WIDTH))
    }

    /// The block height component.
    pub fn height(&self) -> u64 {
        self.0
            .get(..HEIGHT_WIDTH)
            .and_then(|h| h.parse().ok())
            .unwrap_or_default()
    }

    /// Returns true for the genesis sentinel.
    pub fn is_genesis(&self) -> bool {
        *self == Self::genesis()
    }

    /// The raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SortKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for SortKey {
    type Error = EvaluationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0d1f0bbd6d6b36b9a0e5a0c4e5b7ec8a33ce59a4a6d3f39c1ac1b8b5c7e4f2a1";

    #[test]
    fn genesis_sorts_first() {
        let k = SortKey::from_parts(0, HASH).unwrap();
        assert!(SortKey::genesis() < k);
        assert!(SortKey::genesis().is_genesis());
    }

    #[test]
    fn last_for_height_bounds_the_block() {
        let inside = SortKey::from_parts(42, HASH).unwrap();
        let upper = SortKey::last_for_height(42).unwrap();
        let next = SortKey::from_parts(43, &"0".repeat(HASH_WIDTH)).unwrap();
        let high_hash = SortKey::from_parts(42, &format!("fe{}", &HASH[2..])).unwrap();
        assert!(inside < upper);
        assert!(high_hash < upper);
        assert!(SortKey::from_parts(42, &"f".repeat(HASH_WIDTH)).unwrap() <= upper);
        assert!(upper < next);
        assert_eq!(upper.height(), 42);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(SortKey::parse("12,abc").is_err());
        assert!(SortKey::parse(format!("000000000001,{}", HASH.to_uppercase())).is_err());
        assert!(SortKey::parse("000000000001").is_err());
        assert!(SortKey::from_parts(MAX_SORT_KEY_HEIGHT + 1, HASH).is_err());
    }

    #[test]
    fn height_dominates_hash() {
        let low = SortKey::from_parts(9, &"f".repeat(HASH_WIDTH)).unwrap();
        let high = SortKey::from_parts(10, &"0".repeat(HASH_WIDTH)).unwrap();
        assert!(low < high);
    }
}
