// Path: crates/execution/src/facade.rs
//! The client-facing handle of one contract.

use crate::call_graph::RecordId;
use crate::engine::EngineInner;
use crate::evaluator::{DryCall, EvalRequest, Evaluated, Evaluator, Upper};
use crate::session::{Session, SessionKind, SharedSession};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tessera_api::submit::SubmitRequest;
use tessera_telemetry::error_metrics;
use tessera_types::app::{
    Checkpoint, InteractionResult, InteractionType, SortKey, Tag, WriteInteractionResponse,
    WriteOptions,
};
use tessera_types::config::EvaluationOptions;
use tessera_types::error::{ErrorCode, EvaluationError};
use tessera_types::tags::INTERACT_WRITE;

/// A dry interaction and what it left behind.
struct Simulation {
    result: InteractionResult,
    tx_id: String,
    record: RecordId,
    session: SharedSession,
}

/// Reads, simulates and submits interactions of a single contract.
///
/// Every operation is one top-level call with a fresh session: overlays and
/// the call graph never outlive it.
pub struct ContractFacade {
    engine: Arc<EngineInner>,
    contract_id: String,
    caller: Option<String>,
    options: EvaluationOptions,
    last_call_graph: Mutex<Option<Value>>,
}

impl ContractFacade {
    pub(crate) fn new(
        engine: Arc<EngineInner>,
        contract_id: &str,
        options: EvaluationOptions,
    ) -> Self {
        Self {
            engine,
            contract_id: contract_id.to_string(),
            caller: None,
            options,
            last_call_graph: Mutex::new(None),
        }
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    /// Sets the wallet address simulated and submitted interactions come from.
    pub fn connect(mut self, caller: &str) -> Self {
        self.caller = Some(caller.to_string());
        self
    }

    pub fn set_evaluation_options(&mut self, options: EvaluationOptions) {
        self.options = options;
    }

    pub fn evaluation_options(&self) -> &EvaluationOptions {
        &self.options
    }

    fn caller(&self) -> String {
        self.caller.clone().unwrap_or_default()
    }

    async fn run(
        &self,
        kind: SessionKind,
        request: EvalRequest,
    ) -> Result<(Evaluated, SharedSession), EvaluationError> {
        let session = Session::shared(kind);
        let evaluator = Evaluator::new(
            self.engine.clone(),
            session.clone(),
            Arc::new(self.options.clone()),
        );
        let outcome = match self.options.validate() {
            Ok(()) => evaluator.evaluate(request).await,
            Err(e) => Err(e),
        };
        *self.last_call_graph.lock() = Some(session.lock().graph.to_json());
        match outcome {
            Ok(evaluated) => Ok((evaluated, session)),
            Err(e) => {
                error_metrics().inc_error("evaluation", e.code());
                tracing::warn!(
                    target: "facade",
                    contract = %self.contract_id,
                    code = e.code(),
                    error = %e,
                    "evaluation failed"
                );
                Err(e)
            }
        }
    }

    /// The state after every interaction up to and including `sort_key`, or
    /// after all known interactions.
    pub async fn read_state(&self, sort_key: Option<SortKey>) -> Result<Checkpoint, EvaluationError> {
        let upper = match sort_key {
            Some(k) => Upper::Inclusive(k),
            None => Upper::Latest,
        };
        let (evaluated, _) = self
            .run(SessionKind::Replay, EvalRequest::root(&self.contract_id, upper))
            .await?;
        Ok(evaluated.into_checkpoint())
    }

    async fn simulate(
        &self,
        kind: SessionKind,
        input: Value,
        caller: String,
        interaction_type: InteractionType,
    ) -> Result<Simulation, EvaluationError> {
        let request = EvalRequest::root(&self.contract_id, Upper::Latest).with_dry(DryCall {
            input,
            caller,
            interaction_type,
        });
        let (evaluated, session) = self.run(kind, request).await?;
        let Evaluated {
            result: base,
            record,
            dry,
            ..
        } = evaluated;
        let dry = dry.ok_or_else(|| EvaluationError::ValidityNotSet(self.contract_id.clone()))?;
        let mut result = dry.outcome.into_interaction_result(&base.state);
        result.original_validity = base.validity;
        result.original_error_messages = base.error_messages;
        Ok(Simulation {
            result,
            tx_id: dry.tx.id,
            record,
            session,
        })
    }

    /// Runs a view function on the latest state. Nothing is persisted.
    pub async fn view_state(&self, input: Value) -> Result<InteractionResult, EvaluationError> {
        let simulation = self
            .simulate(SessionKind::View, input, self.caller(), InteractionType::View)
            .await?;
        Ok(simulation.result)
    }

    /// Evaluates `input` as the next interaction without persisting anything.
    pub async fn dry_write(
        &self,
        input: Value,
        caller_override: Option<&str>,
    ) -> Result<InteractionResult, EvaluationError> {
        let caller = caller_override
            .map(str::to_string)
            .unwrap_or_else(|| self.caller());
        let simulation = self
            .simulate(SessionKind::DryWrite, input, caller, InteractionType::Write)
            .await?;
        Ok(simulation.result)
    }

    /// Hands a new interaction to the submitter. In strict mode a failing dry
    /// run refuses the write. With internal writes enabled, the contracts the
    /// interaction writes to are tagged.
    pub async fn write_interaction(
        &self,
        input: Value,
        write: WriteOptions,
    ) -> Result<WriteInteractionResponse, EvaluationError> {
        let strict = write.strict.unwrap_or(self.options.strict);
        let mut tags = write.tags;
        let mut interact_write = Vec::new();
        if strict || self.options.internal_writes {
            let simulation = self
                .simulate(
                    SessionKind::DryWrite,
                    input.clone(),
                    self.caller(),
                    InteractionType::Write,
                )
                .await?;
            if strict && !simulation.result.is_ok() {
                let message = simulation.result.error_message.unwrap_or_default();
                let e = EvaluationError::DryRunFailed(message);
                error_metrics().inc_error("facade", e.code());
                return Err(e);
            }
            if self.options.internal_writes {
                interact_write = simulation
                    .session
                    .lock()
                    .graph
                    .inner_writes(simulation.record, &simulation.tx_id);
                tags.extend(interact_write.iter().map(|c| Tag::new(INTERACT_WRITE, c.as_str())));
            }
        }

        let submitter = self
            .engine
            .submitter
            .as_ref()
            .ok_or_else(|| EvaluationError::Submission("no interaction submitter configured".into()))?;
        let original_tx_id = submitter
            .submit(SubmitRequest {
                contract_id: self.contract_id.clone(),
                input,
                tags,
                sequencer_url: self.options.sequencer_url.clone(),
                wait_for_confirmation: self.options.wait_for_confirmation,
            })
            .await
            .map_err(|e| EvaluationError::Submission(e.to_string()))?;
        tracing::info!(
            target: "facade",
            event = "submitted",
            contract = %self.contract_id,
            tx = %original_tx_id,
            interact_write = interact_write.len(),
        );
        Ok(WriteInteractionResponse {
            original_tx_id,
            interact_write,
        })
    }

    /// Submits an interaction switching the contract to `new_src_tx_id`.
    pub async fn evolve(&self, new_src_tx_id: &str) -> Result<WriteInteractionResponse, EvaluationError> {
        self.write_interaction(
            json!({ "function": "evolve", "value": new_src_tx_id }),
            WriteOptions::default(),
        )
        .await
    }

    /// The call graph of the last operation.
    pub fn call_stack(&self) -> Option<Value> {
        self.last_call_graph.lock().clone()
    }

    /// Writes checkpoints buffered by `manual_cache_flush`.
    pub async fn flush(&self) -> Result<(), EvaluationError> {
        Ok(self.engine.flush().await?)
    }
}
