// Path: crates/api/src/overlay.rs

//! A scoped, copy-on-write overlay of uncommitted contract states.
//!
//! Each scope is pinned to a position in history (the sort key of the
//! interaction executing in it). A scope opened at the same position as the
//! scope below it is a child: reads fall through to the parent and its writes
//! merge back into the parent on commit. A scope opened at any other position
//! starts empty and never sees the entries below it.

use std::collections::BTreeMap;
use tessera_types::app::{EvalStateResult, SortKey};

/// Identifies an open scope. Scopes must be closed in reverse opening order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

#[derive(Debug, Clone)]
struct Scope {
    position: SortKey,
    inherits: bool,
    // BTreeMap for a deterministic merge order.
    entries: BTreeMap<String, EvalStateResult>,
}

/// The uncommitted states of one top-level call.
#[derive(Debug, Clone, Default)]
pub struct UncommittedOverlay {
    scopes: Vec<Scope>,
}

impl UncommittedOverlay {
    /// Creates an overlay with no open scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a scope at `position`.
    pub fn open_scope(&mut self, position: &SortKey) -> ScopeId {
        let inherits = self
            .scopes
            .last()
            .is_some_and(|top| top.position == *position);
        self.scopes.push(Scope {
            position: position.clone(),
            inherits,
            entries: BTreeMap::new(),
        });
        ScopeId(self.scopes.len() - 1)
    }

    /// Closes `id` and every scope opened after it. With `commit`, the entries
    /// of a child scope are merged into its parent; otherwise they are dropped.
    pub fn close_scope(&mut self, id: ScopeId, commit: bool) {
        if id.0 >= self.scopes.len() {
            return;
        }
        while self.scopes.len() > id.0 + 1 {
            if let Some(orphan) = self.scopes.pop() {
                log::warn!(
                    "closing orphaned overlay scope at {} with {} entries",
                    orphan.position,
                    orphan.entries.len()
                );
            }
        }
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        if commit && scope.inherits {
            if let Some(parent) = self.scopes.last_mut() {
                parent.entries.extend(scope.entries);
            }
        }
    }

    /// The uncommitted state of `contract_id` visible from the top scope.
    pub fn get(&self, contract_id: &str) -> Option<&EvalStateResult> {
        for scope in self.scopes.iter().rev() {
            if let Some(entry) = scope.entries.get(contract_id) {
                return Some(entry);
            }
            if !scope.inherits {
                break;
            }
        }
        None
    }

    /// Records an uncommitted state in the top scope. Returns false when no
    /// scope is open, in which case nothing is recorded.
    pub fn put(&mut self, contract_id: &str, result: EvalStateResult) -> bool {
        match self.scopes.last_mut() {
            Some(top) => {
                top.entries.insert(contract_id.to_string(), result);
                true
            }
            None => false,
        }
    }

    /// The position of the top scope.
    pub fn position(&self) -> Option<&SortKey> {
        self.scopes.last().map(|s| &s.position)
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Contracts with an entry in the top scope, in order.
    pub fn touched(&self) -> Vec<String> {
        self.scopes
            .last()
            .map(|s| s.entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(height: u64) -> SortKey {
        SortKey::last_for_height(height).unwrap()
    }

    fn counter(n: i64) -> EvalStateResult {
        EvalStateResult::new(json!({ "counter": n }))
    }

    #[test]
    fn child_scope_reads_through_and_merges_on_commit() {
        let mut overlay = UncommittedOverlay::new();
        let root = overlay.open_scope(&key(5));
        overlay.put("A", counter(100));

        let child = overlay.open_scope(&key(5));
        assert_eq!(overlay.get("A"), Some(&counter(100)));
        overlay.put("B", counter(755));
        overlay.close_scope(child, true);

        assert_eq!(overlay.get("B"), Some(&counter(755)));
        overlay.close_scope(root, false);
        assert_eq!(overlay.depth(), 0);
        assert!(overlay.get("A").is_none());
    }

    #[test]
    fn rolled_back_child_leaves_parent_untouched() {
        let mut overlay = UncommittedOverlay::new();
        let root = overlay.open_scope(&key(5));
        overlay.put("B", counter(555));

        let child = overlay.open_scope(&key(5));
        overlay.put("B", counter(9_999));
        overlay.close_scope(child, false);

        assert_eq!(overlay.get("B"), Some(&counter(555)));
        overlay.close_scope(root, true);
    }

    #[test]
    fn scope_at_another_position_is_isolated() {
        let mut overlay = UncommittedOverlay::new();
        let root = overlay.open_scope(&key(9));
        overlay.put("C", counter(1));

        let replay = overlay.open_scope(&key(3));
        assert!(overlay.get("C").is_none());
        overlay.put("C", counter(0));
        overlay.close_scope(replay, true);

        assert_eq!(overlay.get("C"), Some(&counter(1)));
        overlay.close_scope(root, false);
    }

    #[test]
    fn closing_an_outer_scope_closes_orphans() {
        let mut overlay = UncommittedOverlay::new();
        let root = overlay.open_scope(&key(1));
        let _child = overlay.open_scope(&key(1));
        let _grandchild = overlay.open_scope(&key(1));
        overlay.close_scope(root, false);
        assert_eq!(overlay.depth(), 0);
        assert!(!overlay.put("A", counter(1)));
    }
}
