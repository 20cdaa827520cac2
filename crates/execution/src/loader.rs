// Path: crates/execution/src/loader.rs
//! Turns what an interactions loader returned into the replay delta.

use crate::sort_key::SortKeyService;
use crate::tags;
use std::collections::{BTreeSet, HashSet};
use std::ops::Bound;
use tessera_types::app::{Interaction, SortKey};

/// De-duplicates by id (first occurrence wins), drops bundled interactions
/// and those in `excluded`, keeps `from < key` within `to`, drops write
/// markers unless `internal_writes`, and sorts.
pub fn prepare_delta(
    loaded: Vec<Interaction>,
    contract_id: &str,
    from: Option<&SortKey>,
    to: Bound<&SortKey>,
    excluded: &BTreeSet<String>,
    internal_writes: bool,
) -> Vec<Interaction> {
    let mut seen = HashSet::with_capacity(loaded.len());
    let mut delta: Vec<Interaction> = loaded
        .into_iter()
        .filter(|tx| seen.insert(tx.id.clone()))
        .filter(|tx| tx.parent.is_none())
        .filter(|tx| !excluded.contains(&tx.id))
        .filter(|tx| from.map_or(true, |from| tx.sort_key > *from))
        .filter(|tx| match to {
            Bound::Included(to) => tx.sort_key <= *to,
            Bound::Excluded(to) => tx.sort_key < *to,
            Bound::Unbounded => true,
        })
        .filter(|tx| internal_writes || !tags::is_write_marker(tx, contract_id))
        .collect();
    SortKeyService::new().sort(&mut delta);
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::app::{BlockInfo, Tag};
    use tessera_types::tags::{CONTRACT_TX_ID, INTERACT_WRITE};

    fn tx(id: &str, height: u64) -> Interaction {
        Interaction {
            id: id.into(),
            sort_key: SortKey::last_for_height(height).unwrap(),
            owner: "o".into(),
            block: BlockInfo {
                height,
                ..Default::default()
            },
            tags: vec![Tag::new(CONTRACT_TX_ID, "c")],
            dry: false,
            parent: None,
        }
    }

    #[test]
    fn range_is_exclusive_below_and_inclusive_above() {
        let loaded = (1..=8).rev().map(|h| tx(&format!("t{h}"), h)).collect();
        let from = SortKey::last_for_height(2).unwrap();
        let to = SortKey::last_for_height(6).unwrap();
        let delta = prepare_delta(
            loaded,
            "c",
            Some(&from),
            Bound::Included(&to),
            &BTreeSet::new(),
            false,
        );
        let ids: Vec<_> = delta.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t4", "t5", "t6"]);
    }

    #[test]
    fn duplicates_bundles_exclusions_and_markers_are_dropped() {
        let mut bundled = tx("bundled", 3);
        bundled.parent = Some("outer".into());
        let mut marker = tx("marker", 4);
        marker.tags = vec![
            Tag::new(CONTRACT_TX_ID, "writer"),
            Tag::new(INTERACT_WRITE, "c"),
        ];
        let loaded = vec![tx("a", 1), tx("a", 1), bundled, marker.clone(), tx("b", 2)];
        let excluded = BTreeSet::from(["b".to_string()]);

        let delta = prepare_delta(
            loaded.clone(),
            "c",
            None,
            Bound::Unbounded,
            &excluded,
            false,
        );
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].id, "a");

        let with_markers = prepare_delta(loaded, "c", None, Bound::Unbounded, &excluded, true);
        assert_eq!(with_markers.len(), 2);
        assert_eq!(with_markers[1], marker);
    }
}
