// Path: crates/execution/src/bridge.rs
//! Internal reads, views and writes issued by a running contract.
//!
//! A callee is looked up in the session overlay first and only evaluated
//! (strictly below the calling interaction) on a miss. Views and writes run in
//! a child scope of the caller's overlay scope; a successful write merges the
//! callee's new state back into it, where later reads in the same top-level
//! call see it. Nothing reaches the checkpoint store from here.

use crate::call_graph::RecordId;
use crate::evaluator::{check_depth, outcome_label, EvalRequest, Evaluator, Prepared, Upper};
use crate::session::CallGuard;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tessera_api::error::BridgeError;
use tessera_api::handler::ContractBridge;
use tessera_telemetry::{error_metrics, evaluation_metrics};
use tessera_types::app::{
    ContractInteraction, EvalStateResult, HandlerResult, InnerCallType, Interaction,
    InteractionData, InteractionResult, InteractionType,
};
use tessera_types::config::{EvaluationOptions, WhitelistViolationPolicy};
use tessera_types::error::{ErrorCode, EvaluationError};

struct Callee {
    pre: EvalStateResult,
    contract: Prepared,
    record: RecordId,
    cache_hit: bool,
}

/// The bridge handed to a contract executing `tx`.
pub(crate) struct InternalCalls {
    evaluator: Evaluator,
    contract_id: String,
    options: Arc<EvaluationOptions>,
    tx: Interaction,
    depth: u32,
    record: RecordId,
}

fn call_label(call_type: InnerCallType) -> &'static str {
    match call_type {
        InnerCallType::Read => "read",
        InnerCallType::View => "view",
        InnerCallType::Write => "write",
    }
}

impl InternalCalls {
    pub fn new(
        evaluator: Evaluator,
        contract_id: &str,
        options: Arc<EvaluationOptions>,
        tx: Interaction,
        depth: u32,
        record: RecordId,
    ) -> Self {
        Self {
            evaluator,
            contract_id: contract_id.to_string(),
            options,
            tx,
            depth,
            record,
        }
    }

    /// Runs `call` between the cycle bookkeeping and maps its failure for the
    /// calling contract.
    async fn guarded<T, F>(&self, callee: &str, call_type: InnerCallType, call: F) -> Result<T, BridgeError>
    where
        F: std::future::Future<Output = Result<T, EvaluationError>>,
    {
        evaluation_metrics().inc_internal_calls(call_label(call_type));
        tracing::debug!(
            target: "bridge",
            caller = %self.contract_id,
            callee,
            tx = %self.tx.id,
            depth = self.depth + 1,
            call = call_label(call_type),
            "internal call"
        );
        if let Some(message) = self.evaluator.session.lock().frozen(callee) {
            return Err(BridgeError::Contract(message.to_string()));
        }
        let _call = match self.enter(callee) {
            Ok(guard) => guard,
            Err(e) => return Err(self.lift(callee, e)),
        };
        call.await.map_err(|e| self.lift(callee, e))
    }

    fn enter(&self, callee: &str) -> Result<CallGuard, EvaluationError> {
        if callee == self.contract_id {
            return Err(EvaluationError::CyclicCall {
                contract_tx_id: callee.to_string(),
                interaction_tx_id: self.tx.id.clone(),
                chain: format!("{callee}:{} -> {callee}", self.tx.id),
            });
        }
        check_depth(
            self.depth + 1,
            self.options.max_call_depth,
            callee,
            &self.tx.id,
        )?;
        CallGuard::enter(&self.evaluator.session, &self.contract_id, &self.tx.id)
    }

    /// Recoverable callee failures reach the caller as contract errors; the
    /// rest are parked in the session and abort the whole evaluation.
    fn lift(&self, callee: &str, e: EvaluationError) -> BridgeError {
        let message = e.to_string();
        if e.is_callee_recoverable() {
            error_metrics().inc_error("bridge", e.code());
            if matches!(e, EvaluationError::NonWhitelistedSource { .. })
                && self.evaluator.root_options.whitelist_violation_policy
                    == WhitelistViolationPolicy::FreezeContract
            {
                tracing::info!(target: "bridge", event = "freeze", callee, "callee frozen for this call");
                self.evaluator.session.lock().freeze(callee, &message);
            }
            BridgeError::Contract(message)
        } else {
            tracing::warn!(
                target: "bridge",
                caller = %self.contract_id,
                callee,
                tx = %self.tx.id,
                error = %e,
                "aborting evaluation"
            );
            self.evaluator.session.lock().raise(e);
            BridgeError::Aborted(message)
        }
    }

    /// The callee's state at the calling interaction's position, uncommitted
    /// effects of this top-level call included.
    async fn callee(&self, callee: &str, call_type: InnerCallType) -> Result<Callee, EvaluationError> {
        let parent = (self.record, self.tx.id.as_str());
        let pending = self.evaluator.session.lock().overlay.get(callee).cloned();
        let found = match pending {
            Some(pre) => {
                let contract = self.evaluator.resolve(callee, Some(&pre.state)).await?;
                self.evaluator.check_whitelist(&contract)?;
                let record = self.evaluator.session.lock().graph.open(
                    callee,
                    self.depth + 1,
                    Some(call_type),
                    Some(parent),
                );
                Callee {
                    pre,
                    contract,
                    record,
                    cache_hit: true,
                }
            }
            None => {
                let evaluated = self
                    .evaluator
                    .evaluate(EvalRequest {
                        contract_id: callee.to_string(),
                        upper: Upper::Exclusive(self.tx.sort_key.clone()),
                        depth: self.depth + 1,
                        call_type: Some(call_type),
                        parent: Some((self.record, self.tx.id.clone())),
                        dry: None,
                    })
                    .await?;
                self.evaluator
                    .session
                    .lock()
                    .overlay
                    .put(callee, evaluated.result.clone());
                Callee {
                    pre: evaluated.result,
                    contract: evaluated.contract,
                    record: evaluated.record,
                    cache_hit: evaluated.cache_hit,
                }
            }
        };
        if found.contract.options.use_kv_storage {
            return Err(EvaluationError::KvStorageForeignCall(callee.to_string()));
        }
        Ok(found)
    }

    /// Runs `input` on the callee in a child scope. The scope is committed
    /// only for a successful write.
    async fn execute(
        &self,
        callee: &str,
        input: Value,
        interaction_type: InteractionType,
    ) -> Result<InteractionResult, EvaluationError> {
        let call_type = match interaction_type {
            InteractionType::Write => InnerCallType::Write,
            InteractionType::View => InnerCallType::View,
        };
        let target = self.callee(callee, call_type).await?;
        let data = InteractionData {
            interaction: ContractInteraction {
                input,
                caller: self.contract_id.clone(),
                interaction_type,
            },
            tx: self.tx.clone(),
        };
        let session = &self.evaluator.session;
        session.lock().graph.record(target.record, &data);

        let scope = session.lock().overlay.open_scope(&self.tx.sort_key);
        let run = self
            .evaluator
            .run_handler(
                &target.contract,
                None,
                &target.pre,
                &data,
                target.record,
                self.depth + 1,
            )
            .await;
        let (outcome, elapsed_ms) = match run {
            Ok(done) => done,
            Err(e) => {
                session.lock().overlay.close_scope(scope, false);
                return Err(e);
            }
        };
        self.evaluator.complete(
            target.record,
            &self.tx.id,
            &outcome,
            elapsed_ms,
            target.cache_hit,
        );

        let committed = match (&outcome, interaction_type) {
            (HandlerResult::Ok { state, .. }, InteractionType::Write) => {
                let mut post = target.pre.clone();
                post.apply_valid(&self.tx.id, state.clone());
                let mut session = session.lock();
                session.overlay.put(callee, post);
                session.overlay.close_scope(scope, true);
                true
            }
            _ => {
                session.lock().overlay.close_scope(scope, false);
                false
            }
        };
        tracing::debug!(
            target: "bridge",
            caller = %self.contract_id,
            callee,
            tx = %self.tx.id,
            outcome = outcome_label(&outcome),
            committed,
            "internal call finished"
        );

        let mut result = outcome.into_interaction_result(&target.pre.state);
        result.original_validity = target.pre.validity;
        result.original_error_messages = target.pre.error_messages;
        Ok(result)
    }

    fn throws_on_write_error(&self) -> bool {
        let kind = self.evaluator.session.lock().kind;
        self.options
            .throw_on_internal_write_error
            .unwrap_or_else(|| kind.throws_on_internal_write_error())
    }
}

#[async_trait]
impl ContractBridge for InternalCalls {
    async fn read_contract_state(&self, contract_id: &str) -> Result<EvalStateResult, BridgeError> {
        self.guarded(contract_id, InnerCallType::Read, async {
            Ok(self.callee(contract_id, InnerCallType::Read).await?.pre)
        })
        .await
    }

    async fn view_contract_state(
        &self,
        contract_id: &str,
        input: Value,
    ) -> Result<InteractionResult, BridgeError> {
        self.guarded(
            contract_id,
            InnerCallType::View,
            self.execute(contract_id, input, InteractionType::View),
        )
        .await
    }

    async fn write(&self, contract_id: &str, input: Value) -> Result<InteractionResult, BridgeError> {
        let result = self
            .guarded(
                contract_id,
                InnerCallType::Write,
                self.execute(contract_id, input, InteractionType::Write),
            )
            .await?;
        if !result.is_ok() && self.throws_on_write_error() {
            let message = result.error_message.clone().unwrap_or_default();
            return Err(BridgeError::Contract(format!(
                "Internal write to {contract_id} failed: {message}"
            )));
        }
        Ok(result)
    }

    async fn refresh_state(&self) -> Result<Value, BridgeError> {
        self.evaluator
            .session
            .lock()
            .overlay
            .get(&self.contract_id)
            .map(|current| current.state.clone())
            .ok_or_else(|| {
                BridgeError::Contract(format!(
                    "no pending state for {} in this call",
                    self.contract_id
                ))
            })
    }
}
