// Path: crates/execution/src/session.rs
//! State shared by every nested evaluation of one top-level call.

use crate::call_graph::CallGraph;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tessera_api::overlay::UncommittedOverlay;
use tessera_types::error::EvaluationError;

/// What the top-level call is doing. Decides the default of
/// `throw_on_internal_write_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Replaying history (`read_state`).
    Replay,
    /// Simulating a new interaction (`dry_write`, `write_interaction`).
    DryWrite,
    /// Running a view function (`view_state`).
    View,
}

impl SessionKind {
    pub fn throws_on_internal_write_error(self) -> bool {
        !matches!(self, Self::View)
    }
}

#[derive(Debug)]
pub struct Session {
    pub kind: SessionKind,
    pub overlay: UncommittedOverlay,
    pub graph: CallGraph,
    /// `(call id, calling contract, interaction id)` of every call in progress.
    chain: Vec<(u64, String, String)>,
    next_call: u64,
    fatal: Option<EvaluationError>,
    frozen: BTreeMap<String, String>,
}

pub type SharedSession = Arc<Mutex<Session>>;

/// An entry on the call chain, removed when the guard drops. Dropping the
/// calling future (timeouts, aborted handler tasks) leaves the call too.
#[must_use]
pub struct CallGuard {
    session: SharedSession,
    call: u64,
}

impl CallGuard {
    pub fn enter(
        session: &SharedSession,
        contract_id: &str,
        interaction_id: &str,
    ) -> Result<Self, EvaluationError> {
        let call = session.lock().enter_call(contract_id, interaction_id)?;
        Ok(Self {
            session: session.clone(),
            call,
        })
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.session.lock().leave_call(self.call);
    }
}

impl Session {
    pub fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            overlay: UncommittedOverlay::new(),
            graph: CallGraph::new(),
            chain: Vec::new(),
            next_call: 0,
            fatal: None,
            frozen: BTreeMap::new(),
        }
    }

    pub fn shared(kind: SessionKind) -> SharedSession {
        Arc::new(Mutex::new(Self::new(kind)))
    }

    /// Enters an outgoing call of `contract_id` made while executing
    /// `interaction_id`. The same pair twice on the chain is a cycle. The
    /// returned id leaves the call again.
    pub fn enter_call(
        &mut self,
        contract_id: &str,
        interaction_id: &str,
    ) -> Result<u64, EvaluationError> {
        if self
            .chain
            .iter()
            .any(|(_, c, i)| c == contract_id && i == interaction_id)
        {
            return Err(EvaluationError::CyclicCall {
                contract_tx_id: contract_id.to_string(),
                interaction_tx_id: interaction_id.to_string(),
                chain: self.render_chain(),
            });
        }
        let call = self.next_call;
        self.next_call += 1;
        self.chain
            .push((call, contract_id.to_string(), interaction_id.to_string()));
        Ok(call)
    }

    /// Removes `call` from the chain wherever it sits. A cancelled call may
    /// leave after calls entered later.
    pub fn leave_call(&mut self, call: u64) {
        if let Some(pos) = self.chain.iter().rposition(|(id, _, _)| *id == call) {
            self.chain.remove(pos);
        }
    }

    fn render_chain(&self) -> String {
        self.chain
            .iter()
            .map(|(_, c, i)| format!("{c}:{i}"))
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Interaction ids with a call in progress.
    pub fn active_interactions(&self) -> BTreeSet<String> {
        self.chain.iter().map(|(_, _, i)| i.clone()).collect()
    }

    /// Parks a fatal error raised below a contract handler. The first one wins.
    pub fn raise(&mut self, error: EvaluationError) {
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
    }

    pub fn take_fatal(&mut self) -> Option<EvaluationError> {
        self.fatal.take()
    }

    pub fn freeze(&mut self, contract_id: &str, message: &str) {
        self.frozen
            .entry(contract_id.to_string())
            .or_insert_with(|| message.to_string());
    }

    /// The error a frozen contract keeps failing with.
    pub fn frozen(&self, contract_id: &str) -> Option<&str> {
        self.frozen.get(contract_id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_contract_and_interaction_twice_is_a_cycle() {
        let mut s = Session::new(SessionKind::Replay);
        let a = s.enter_call("A", "tx1").unwrap();
        let b = s.enter_call("B", "tx1").unwrap();
        let err = s.enter_call("A", "tx1").unwrap_err();
        match err {
            EvaluationError::CyclicCall { chain, .. } => assert_eq!(chain, "A:tx1 -> B:tx1"),
            other => panic!("unexpected {other:?}"),
        }
        s.leave_call(b);
        s.leave_call(a);
        s.enter_call("A", "tx1").unwrap();
        assert_eq!(
            s.active_interactions(),
            BTreeSet::from(["tx1".to_string()])
        );
    }

    #[test]
    fn calls_can_leave_out_of_order() {
        let mut s = Session::new(SessionKind::Replay);
        let stale = s.enter_call("A", "tx1").unwrap();
        let live = s.enter_call("B", "tx2").unwrap();
        s.leave_call(stale);
        assert_eq!(s.active_interactions(), BTreeSet::from(["tx2".to_string()]));
        s.leave_call(live);
        s.leave_call(live);
        assert!(s.active_interactions().is_empty());
    }

    #[tokio::test]
    async fn cancelled_calls_leave_the_chain() {
        let session = Session::shared(SessionKind::Replay);
        let inner = session.clone();
        let call = async move {
            let _guard = CallGuard::enter(&inner, "A", "tx1")?;
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok::<_, EvaluationError>(())
        };
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(10), call).await;
        assert!(timed_out.is_err());
        assert!(session.lock().active_interactions().is_empty());
        let _again = CallGuard::enter(&session, "A", "tx1").unwrap();
    }

    #[test]
    fn first_fatal_error_wins() {
        let mut s = Session::new(SessionKind::DryWrite);
        s.raise(EvaluationError::ValidityNotSet("a".into()));
        s.raise(EvaluationError::ValidityNotSet("b".into()));
        assert!(matches!(s.take_fatal(), Some(EvaluationError::ValidityNotSet(id)) if id == "a"));
        assert!(s.take_fatal().is_none());
    }

    #[test]
    fn views_do_not_throw_by_default() {
        assert!(SessionKind::Replay.throws_on_internal_write_error());
        assert!(SessionKind::DryWrite.throws_on_internal_write_error());
        assert!(!SessionKind::View.throws_on_internal_write_error());
    }
}
