// Path: crates/execution/src/evaluator.rs
//! Replays a contract's interactions on top of its nearest checkpoint.
//!
//! An evaluation is seeded from the checkpoint at or below its upper bound
//! (or from the initial state, after the constructor when one is required),
//! replays the delta the interactions loader returns, and persists
//! checkpoints on the way. Handler outcomes are recorded per interaction:
//! `error` and `exception` outcomes invalidate only their own interaction.
//! Only [`EvaluationError`]s abort.
//!
//! Nested evaluations reached through internal calls share the top-level
//! call's [`Session`](crate::session::Session) and are bounded below the
//! calling interaction's position, so a callee is always observed as of the
//! caller's point in history.

use crate::bridge::InternalCalls;
use crate::call_graph::{InteractionOutput, RecordId};
use crate::engine::EngineInner;
use crate::evolve;
use crate::loader::prepare_delta;
use crate::session::SharedSession;
use crate::tags;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::ops::Bound;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tessera_api::handler::{ContractHandler, ExecutionContext};
use tessera_api::storage::KvStorage;
use tessera_telemetry::time::InteractionTimer;
use tessera_telemetry::{error_metrics, evaluation_metrics};
use tessera_types::app::{
    BlockInfo, Checkpoint, ContractDefinition, ContractInteraction, EvalStateResult,
    HandlerResult, InnerCallType, Interaction, InteractionData, InteractionType, SortKey, Tag,
};
use tessera_types::config::EvaluationOptions;
use tessera_types::error::{ErrorCode, EvaluationError};
use tessera_types::tags::{APP_NAME, APP_NAME_CONTRACT_ACTION, CONTRACT_TX_ID, INPUT};

pub(crate) const CONSTRUCTOR_FUNCTION: &str = "__init";
const OUT_OF_GAS: &str = "[RE:OOG] Out of gas!";

/// Where an evaluation stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Upper {
    /// Everything the loader returns.
    Latest,
    /// Up to and including the key.
    Inclusive(SortKey),
    /// Strictly below the key. Used for callees of the interaction at the key.
    Exclusive(SortKey),
    /// Up to and including the key, but re-executing the interaction at the
    /// key even when a checkpoint covers it.
    Replay(SortKey),
}

impl Upper {
    fn loader_to(&self) -> Option<&SortKey> {
        match self {
            Self::Latest => None,
            Self::Inclusive(k) | Self::Exclusive(k) | Self::Replay(k) => Some(k),
        }
    }

    fn bound(&self) -> Bound<&SortKey> {
        match self {
            Self::Latest => Bound::Unbounded,
            Self::Inclusive(k) | Self::Replay(k) => Bound::Included(k),
            Self::Exclusive(k) => Bound::Excluded(k),
        }
    }
}

/// A call to run against the evaluated state without persisting it.
#[derive(Debug, Clone)]
pub(crate) struct DryCall {
    pub input: Value,
    pub caller: String,
    pub interaction_type: InteractionType,
}

pub(crate) struct EvalRequest {
    pub contract_id: String,
    pub upper: Upper,
    pub depth: u32,
    pub call_type: Option<InnerCallType>,
    pub parent: Option<(RecordId, String)>,
    pub dry: Option<DryCall>,
}

impl EvalRequest {
    pub fn root(contract_id: &str, upper: Upper) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            upper,
            depth: 0,
            call_type: None,
            parent: None,
            dry: None,
        }
    }

    pub fn with_dry(mut self, call: DryCall) -> Self {
        self.dry = Some(call);
        self
    }
}

/// A contract ready to execute: its effective definition, the options
/// resolved against its manifest, and its handler.
#[derive(Clone)]
pub(crate) struct Prepared {
    pub definition: Arc<ContractDefinition>,
    pub options: Arc<EvaluationOptions>,
    pub handler: Arc<dyn ContractHandler>,
}

pub(crate) struct DryOutcome {
    pub tx: Interaction,
    pub outcome: HandlerResult,
}

pub(crate) struct Evaluated {
    pub result: EvalStateResult,
    /// The last interaction reflected in `result`.
    pub sort_key: Option<SortKey>,
    pub contract: Prepared,
    pub record: RecordId,
    /// No interaction had to be replayed.
    pub cache_hit: bool,
    pub dry: Option<DryOutcome>,
}

impl Evaluated {
    pub fn into_checkpoint(self) -> Checkpoint {
        Checkpoint::new(
            self.sort_key.unwrap_or_else(SortKey::genesis),
            self.result,
        )
    }
}

pub(crate) fn outcome_label(outcome: &HandlerResult) -> &'static str {
    match outcome {
        HandlerResult::Ok { .. } => "ok",
        HandlerResult::Error { .. } => "error",
        HandlerResult::Exception { .. } => "exception",
    }
}

pub(crate) fn check_depth(
    depth: u32,
    max_depth: u32,
    contract_id: &str,
    interaction_id: &str,
) -> Result<(), EvaluationError> {
    if depth > max_depth {
        return Err(EvaluationError::MaxCallDepthExceeded {
            max_depth,
            contract_tx_id: contract_id.to_string(),
            interaction_tx_id: interaction_id.to_string(),
        });
    }
    Ok(())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Evaluates contracts for one top-level call.
#[derive(Clone)]
pub(crate) struct Evaluator {
    pub(crate) engine: Arc<EngineInner>,
    pub(crate) session: SharedSession,
    pub(crate) root_options: Arc<EvaluationOptions>,
}

impl Evaluator {
    pub fn new(
        engine: Arc<EngineInner>,
        session: SharedSession,
        root_options: Arc<EvaluationOptions>,
    ) -> Self {
        Self {
            engine,
            session,
            root_options,
        }
    }

    /// Loads the definition in effect for `state` and gets it ready to run.
    pub async fn resolve(
        &self,
        contract_id: &str,
        state: Option<&Value>,
    ) -> Result<Prepared, EvaluationError> {
        let base = self.engine.definition(contract_id, None).await?;
        let definition = match state.and_then(evolve::evolved_src_tx_id) {
            Some(src) if src != base.src_tx_id => {
                self.engine.definition(contract_id, Some(&src)).await?
            }
            _ => base,
        };
        self.prepare(definition).await
    }

    async fn prepare(
        &self,
        definition: Arc<ContractDefinition>,
    ) -> Result<Prepared, EvaluationError> {
        let (options, overridden) = self
            .root_options
            .resolve(&definition.manifest.evaluation_options);
        if !overridden.is_empty() {
            tracing::debug!(
                target: "evaluator",
                contract = %definition.tx_id,
                src = %definition.src_tx_id,
                ?overridden,
                "manifest overrides evaluation options"
            );
        }
        if definition.uses_unsafe_client() && !options.allow_unsafe_client {
            return Err(EvaluationError::UnsafeClientNotAllowed {
                contract_tx_id: definition.tx_id.clone(),
            });
        }
        let handler = self.engine.handler_for(&definition).await?;
        Ok(Prepared {
            definition,
            options: Arc::new(options),
            handler,
        })
    }

    pub fn check_whitelist(&self, contract: &Prepared) -> Result<(), EvaluationError> {
        let src = &contract.definition.src_tx_id;
        if self.root_options.is_source_allowed(src) {
            Ok(())
        } else {
            Err(EvaluationError::NonWhitelistedSource {
                src_tx_id: src.clone(),
            })
        }
    }

    pub fn evaluate(&self, req: EvalRequest) -> BoxFuture<'_, Result<Evaluated, EvaluationError>> {
        async move {
            let _root_guard = if req.depth == 0 {
                Some(self.engine.root_lock(&req.contract_id).lock_owned().await)
            } else {
                None
            };
            self.evaluate_unlocked(req).await
        }
        .boxed()
    }

    async fn evaluate_unlocked(&self, req: EvalRequest) -> Result<Evaluated, EvaluationError> {
        let id = req.contract_id.as_str();
        let store = self.engine.checkpoints();
        let cached = match &req.upper {
            Upper::Latest => store.get_last(id).await?,
            Upper::Inclusive(k) => store.get_last_below_or_at(id, k).await?,
            Upper::Exclusive(k) | Upper::Replay(k) => store.get_last_below(id, k).await?,
        };
        evaluation_metrics().inc_checkpoint_lookup(cached.is_some());

        let contract = self.resolve(id, cached.as_ref().map(Checkpoint::state)).await?;
        self.check_whitelist(&contract)?;

        let record = self.session.lock().graph.open(
            id,
            req.depth,
            req.call_type,
            req.parent.as_ref().map(|(r, tx)| (*r, tx.as_str())),
        );

        let kv = if contract.options.use_kv_storage {
            let kv = self.engine.kv_for(id)?;
            kv.open().await?;
            Some(kv)
        } else {
            None
        };

        let outcome = self.replay(&req, contract, cached, record, kv.as_ref()).await;
        if let Some(kv) = kv {
            match (&outcome, kv.close().await) {
                (Ok(_), Err(e)) => return Err(e.into()),
                (Err(_), Err(e)) => {
                    tracing::warn!(target: "evaluator", contract = id, error = %e, "failed to close KV storage")
                }
                _ => {}
            }
        }
        outcome
    }

    async fn replay(
        &self,
        req: &EvalRequest,
        mut contract: Prepared,
        cached: Option<Checkpoint>,
        record: RecordId,
        kv: Option<&Arc<dyn KvStorage>>,
    ) -> Result<Evaluated, EvaluationError> {
        let id = req.contract_id.as_str();
        let (mut result, mut last_key) = match cached {
            Some(cp) => (cp.result, Some(cp.sort_key)),
            None => (self.seed(&contract, kv, record, req.depth).await?, None),
        };

        let excluded = self.session.lock().active_interactions();
        let loaded = self
            .engine
            .interactions
            .load(id, last_key.as_ref(), req.upper.loader_to(), &contract.options)
            .await?;
        let delta = prepare_delta(
            loaded,
            id,
            last_key.as_ref(),
            req.upper.bound(),
            &excluded,
            contract.options.internal_writes,
        );
        let replayed = delta.len();
        tracing::debug!(
            target: "evaluator",
            contract = id,
            depth = req.depth,
            from = ?last_key.as_ref().map(SortKey::as_str),
            interactions = replayed,
            "replaying interactions"
        );

        let every = self.root_options.cache_every_n_interactions as usize;
        let mut checkpointed = last_key.clone();
        for (i, tx) in delta.into_iter().enumerate() {
            if let Err(e) = self.check_whitelist(&contract) {
                // Everything before an evolve to a refused source stays valid.
                if checkpointed != last_key {
                    self.checkpoint(id, last_key.as_ref(), &result).await?;
                }
                return Err(e);
            }
            let mut stop = false;
            if contract.options.internal_writes && tags::is_write_marker(&tx, id) {
                self.apply_marker(id, &contract, &mut result, &tx, record, req.depth)
                    .await?;
            } else if let Some(input) = tags::input_for(&tx, id) {
                stop = self
                    .apply_interaction(
                        id,
                        &mut contract,
                        &mut result,
                        &tx,
                        input,
                        record,
                        req.depth,
                        kv,
                    )
                    .await?;
            } else {
                tracing::warn!(
                    target: "evaluator",
                    contract = id,
                    tx = %tx.id,
                    "skipping interaction without a usable input"
                );
            }
            last_key = Some(tx.sort_key);
            if every > 0 && (i + 1) % every == 0 {
                self.checkpoint(id, last_key.as_ref(), &result).await?;
                checkpointed = last_key.clone();
            }
            if stop {
                break;
            }
        }
        if replayed > 0 && checkpointed != last_key {
            self.checkpoint(id, last_key.as_ref(), &result).await?;
        }

        let dry = match &req.dry {
            Some(call) => Some(
                self.run_dry(
                    id,
                    &contract,
                    &result,
                    last_key.as_ref(),
                    call,
                    record,
                    req.depth,
                    kv,
                )
                .await?,
            ),
            None => None,
        };

        tracing::info!(
            target: "evaluator",
            event = "evaluated",
            contract = id,
            depth = req.depth,
            sort_key = ?last_key.as_ref().map(SortKey::as_str),
            interactions = replayed,
            valid = result.validity.values().filter(|v| **v).count(),
        );
        Ok(Evaluated {
            result,
            sort_key: last_key,
            contract,
            record,
            cache_hit: replayed == 0,
            dry,
        })
    }

    async fn checkpoint(
        &self,
        contract_id: &str,
        sort_key: Option<&SortKey>,
        result: &EvalStateResult,
    ) -> Result<(), EvaluationError> {
        let Some(sort_key) = sort_key else {
            return Ok(());
        };
        let checkpoint = Checkpoint::new(sort_key.clone(), result.clone());
        let buffer = self.root_options.manual_cache_flush;
        self.engine
            .put_checkpoint(contract_id, &checkpoint, buffer)
            .await?;
        tracing::debug!(
            target: "checkpoint",
            contract = contract_id,
            sort_key = %sort_key,
            buffered = buffer,
            "checkpoint written"
        );
        Ok(())
    }

    /// The state before the first interaction.
    async fn seed(
        &self,
        contract: &Prepared,
        kv: Option<&Arc<dyn KvStorage>>,
        record: RecordId,
        depth: u32,
    ) -> Result<EvalStateResult, EvaluationError> {
        let definition = &contract.definition;
        let initial = EvalStateResult::new(definition.init_state.clone());
        if !contract.options.use_constructor {
            return Ok(initial);
        }

        let mut input = match &definition.init_state {
            Value::Object(fields) => fields.clone(),
            _ => serde_json::Map::new(),
        };
        input.insert("function".into(), json!(CONSTRUCTOR_FUNCTION));
        let genesis = self.engine.sort_keys.genesis();
        let data = InteractionData {
            interaction: ContractInteraction {
                input: Value::Object(input),
                caller: definition.owner.clone(),
                interaction_type: InteractionType::Write,
            },
            tx: Interaction {
                id: definition.tx_id.clone(),
                sort_key: genesis.clone(),
                owner: definition.owner.clone(),
                block: BlockInfo::default(),
                tags: Vec::new(),
                dry: false,
                parent: None,
            },
        };
        self.session.lock().graph.record(record, &data);
        if let Some(kv) = kv {
            kv.begin(&genesis).await?;
        }
        let run = self
            .run_handler(contract, kv, &initial, &data, record, depth)
            .await;
        let (outcome, elapsed_ms) = match run {
            Ok(done) => done,
            Err(e) => {
                self.rollback(kv).await;
                return Err(e);
            }
        };
        self.complete(record, &data.tx.id, &outcome, elapsed_ms, false);
        match outcome {
            HandlerResult::Ok { state, .. } => {
                if let Some(kv) = kv {
                    kv.commit().await?;
                }
                tracing::debug!(target: "evaluator", contract = %definition.tx_id, "constructor applied");
                Ok(EvalStateResult::new(state))
            }
            HandlerResult::Error { message, .. } | HandlerResult::Exception { message, .. } => {
                self.rollback(kv).await;
                Err(EvaluationError::ConstructorFailed {
                    contract_tx_id: definition.tx_id.clone(),
                    message,
                })
            }
        }
    }

    async fn rollback(&self, kv: Option<&Arc<dyn KvStorage>>) {
        if let Some(kv) = kv {
            if let Err(e) = kv.rollback().await {
                tracing::warn!(target: "evaluator", error = %e, "KV rollback failed");
            }
        }
    }

    fn reserved_call(&self, contract: &Prepared, data: &InteractionData) -> Option<String> {
        (contract.options.use_constructor
            && data.interaction.function() == Some(CONSTRUCTOR_FUNCTION))
        .then(|| format!("{CONSTRUCTOR_FUNCTION} is reserved for the constructor"))
    }

    /// Applies one interaction of the contract's own history. Returns true
    /// when replay must stop after it.
    #[allow(clippy::too_many_arguments)]
    async fn apply_interaction(
        &self,
        contract_id: &str,
        contract: &mut Prepared,
        result: &mut EvalStateResult,
        tx: &Interaction,
        input: Value,
        record: RecordId,
        depth: u32,
        kv: Option<&Arc<dyn KvStorage>>,
    ) -> Result<bool, EvaluationError> {
        let data = InteractionData {
            interaction: ContractInteraction {
                input,
                caller: tx.owner.clone(),
                interaction_type: InteractionType::Write,
            },
            tx: tx.clone(),
        };
        self.session.lock().graph.record(record, &data);
        if let Some(message) = self.reserved_call(contract, &data) {
            result.apply_invalid(&tx.id, message.clone());
            self.complete(record, &tx.id, &HandlerResult::error(message), 0, false);
            return Ok(false);
        }

        let scope = {
            let mut session = self.session.lock();
            let scope = session.overlay.open_scope(&tx.sort_key);
            session.overlay.put(contract_id, result.clone());
            scope
        };
        if let Some(kv) = kv {
            kv.begin(&tx.sort_key).await?;
        }
        let run = self
            .run_handler(contract, kv, result, &data, record, depth)
            .await;
        let (outcome, elapsed_ms) = match run {
            Ok(done) => done,
            Err(e) => {
                self.session.lock().overlay.close_scope(scope, false);
                self.rollback(kv).await;
                return Err(e);
            }
        };
        self.complete(record, &tx.id, &outcome, elapsed_ms, false);

        match outcome {
            HandlerResult::Ok { state, .. } => {
                let evolved = match evolve::evolved_src_tx_id(&state) {
                    Some(src) if src != contract.definition.src_tx_id => {
                        Some(self.evolve_to(contract_id, &src).await)
                    }
                    _ => None,
                };
                match evolved {
                    Some(Err(e @ EvaluationError::UnsafeClientNotAllowed { .. })) => {
                        tracing::warn!(
                            target: "evolve",
                            contract = contract_id,
                            tx = %tx.id,
                            error = %e,
                            "evolve rejected, stopping replay"
                        );
                        error_metrics().inc_error("evaluation", e.code());
                        result.apply_invalid(&tx.id, e.to_string());
                        self.session.lock().overlay.close_scope(scope, false);
                        self.rollback(kv).await;
                        return Ok(true);
                    }
                    Some(Err(e)) => {
                        self.session.lock().overlay.close_scope(scope, false);
                        self.rollback(kv).await;
                        return Err(e);
                    }
                    Some(Ok(next)) => *contract = next,
                    None => {}
                }
                result.apply_valid(&tx.id, state);
                {
                    let mut session = self.session.lock();
                    session.overlay.put(contract_id, result.clone());
                    session.overlay.close_scope(scope, true);
                }
                if let Some(kv) = kv {
                    kv.commit().await?;
                }
            }
            HandlerResult::Error { message, .. } | HandlerResult::Exception { message, .. } => {
                tracing::debug!(
                    target: "evaluator",
                    contract = contract_id,
                    tx = %tx.id,
                    error = %message,
                    "interaction invalid"
                );
                result.apply_invalid(&tx.id, message);
                self.session.lock().overlay.close_scope(scope, false);
                self.rollback(kv).await;
            }
        }
        Ok(false)
    }

    async fn evolve_to(&self, contract_id: &str, src: &str) -> Result<Prepared, EvaluationError> {
        let definition = self.engine.definition(contract_id, Some(src)).await?;
        let next = self.prepare(definition).await?;
        evaluation_metrics().inc_evolves();
        tracing::info!(
            target: "evolve",
            event = "evolved",
            contract = contract_id,
            src,
        );
        Ok(next)
    }

    /// Applies an internal-write marker: the writing contract is replayed up
    /// to the marked interaction, and this contract takes whatever that
    /// interaction left in the overlay for it.
    async fn apply_marker(
        &self,
        contract_id: &str,
        contract: &Prepared,
        result: &mut EvalStateResult,
        tx: &Interaction,
        record: RecordId,
        depth: u32,
    ) -> Result<(), EvaluationError> {
        let writer = tags::target_contract(tx).unwrap_or_default().to_string();
        let data = InteractionData {
            interaction: ContractInteraction {
                input: tags::input_for(tx, &writer).unwrap_or(Value::Null),
                caller: tx.owner.clone(),
                interaction_type: InteractionType::Write,
            },
            tx: tx.clone(),
        };
        self.session.lock().graph.record(record, &data);
        tracing::debug!(
            target: "evaluator",
            contract = contract_id,
            writer = %writer,
            tx = %tx.id,
            "processing internal write marker"
        );
        check_depth(
            depth + 1,
            contract.options.max_call_depth,
            &writer,
            &tx.id,
        )?;

        let scope = {
            let mut session = self.session.lock();
            let scope = session.overlay.open_scope(&tx.sort_key);
            session.overlay.put(contract_id, result.clone());
            scope
        };
        let replayed = self
            .evaluate(EvalRequest {
                contract_id: writer.clone(),
                upper: Upper::Replay(tx.sort_key.clone()),
                depth: depth + 1,
                call_type: None,
                parent: Some((record, tx.id.clone())),
                dry: None,
            })
            .await;
        let verdict = match replayed {
            Ok(writer_eval) => match writer_eval.result.validity_of(&tx.id) {
                Some(true) => self
                    .session
                    .lock()
                    .overlay
                    .get(contract_id)
                    .map(|post| post.state.clone())
                    .ok_or_else(|| EvaluationError::ValidityNotSet(tx.id.clone()).to_string()),
                Some(false) => Err(writer_eval
                    .result
                    .error_messages
                    .get(&tx.id)
                    .cloned()
                    .unwrap_or_default()),
                None => Err(EvaluationError::ValidityNotSet(tx.id.clone()).to_string()),
            },
            Err(e) if e.is_callee_recoverable() => {
                error_metrics().inc_error("evaluation", e.code());
                Err(e.to_string())
            }
            Err(e) => {
                self.session.lock().overlay.close_scope(scope, false);
                return Err(e);
            }
        };
        self.session.lock().overlay.close_scope(scope, false);

        let outcome = match verdict {
            Ok(state) => {
                result.apply_valid(&tx.id, state);
                HandlerResult::ok(result.state.clone(), Value::Null)
            }
            Err(message) => {
                result.apply_invalid(&tx.id, message.clone());
                HandlerResult::error(message)
            }
        };
        self.complete(record, &tx.id, &outcome, 0, false);
        Ok(())
    }

    /// Runs a call against the evaluated state in a scope that is always
    /// rolled back.
    #[allow(clippy::too_many_arguments)]
    async fn run_dry(
        &self,
        contract_id: &str,
        contract: &Prepared,
        result: &EvalStateResult,
        last_key: Option<&SortKey>,
        call: &DryCall,
        record: RecordId,
        depth: u32,
        kv: Option<&Arc<dyn KvStorage>>,
    ) -> Result<DryOutcome, EvaluationError> {
        self.check_whitelist(contract)?;
        let height = last_key.map(SortKey::height).unwrap_or_default() + 1;
        let tx = self.dry_interaction(contract_id, &call.input, &call.caller, height)?;
        let data = InteractionData {
            interaction: ContractInteraction {
                input: call.input.clone(),
                caller: call.caller.clone(),
                interaction_type: call.interaction_type,
            },
            tx: tx.clone(),
        };
        self.session.lock().graph.record(record, &data);
        if let Some(message) = self.reserved_call(contract, &data) {
            let outcome = HandlerResult::error(message);
            self.complete(record, &tx.id, &outcome, 0, true);
            return Ok(DryOutcome { tx, outcome });
        }

        let scope = {
            let mut session = self.session.lock();
            let scope = session.overlay.open_scope(&tx.sort_key);
            session.overlay.put(contract_id, result.clone());
            scope
        };
        if let Some(kv) = kv {
            kv.begin(&tx.sort_key).await?;
        }
        let run = self
            .run_handler(contract, kv, result, &data, record, depth)
            .await;
        self.session.lock().overlay.close_scope(scope, false);
        self.rollback(kv).await;
        let (outcome, elapsed_ms) = run?;
        self.complete(record, &tx.id, &outcome, elapsed_ms, true);
        Ok(DryOutcome { tx, outcome })
    }

    /// A synthetic interaction positioned right after the evaluated state.
    fn dry_interaction(
        &self,
        contract_id: &str,
        input: &Value,
        caller: &str,
        height: u64,
    ) -> Result<Interaction, EvaluationError> {
        let mut hasher = Sha256::new();
        hasher.update(contract_id.as_bytes());
        hasher.update(input.to_string().as_bytes());
        hasher.update(caller.as_bytes());
        hasher.update(height.to_be_bytes());
        let id = URL_SAFE_NO_PAD.encode(hasher.finalize());
        let block_id = URL_SAFE_NO_PAD.encode(Sha256::digest(format!("dry-block-{height}")));
        let sort_key = self.engine.sort_keys.create(&block_id, &id, height)?;
        Ok(Interaction {
            id,
            sort_key,
            owner: caller.to_string(),
            block: BlockInfo {
                height,
                id: block_id,
                timestamp: unix_now(),
            },
            tags: vec![
                Tag::new(APP_NAME, APP_NAME_CONTRACT_ACTION),
                Tag::new(CONTRACT_TX_ID, contract_id),
                Tag::new(INPUT, input.to_string()),
            ],
            dry: true,
            parent: None,
        })
    }

    /// Runs the handler under the interaction time budget and gas limit.
    pub async fn run_handler(
        &self,
        contract: &Prepared,
        kv: Option<&Arc<dyn KvStorage>>,
        current: &EvalStateResult,
        data: &InteractionData,
        record: RecordId,
        depth: u32,
    ) -> Result<(HandlerResult, u64), EvaluationError> {
        let options = &contract.options;
        let bridge = InternalCalls::new(
            self.clone(),
            &contract.definition.tx_id,
            options.clone(),
            data.tx.clone(),
            depth,
            record,
        );
        let ctx = ExecutionContext {
            contract_id: contract.definition.tx_id.clone(),
            definition: contract.definition.clone(),
            options: options.clone(),
            bridge: Arc::new(bridge),
            kv: kv.cloned(),
        };

        let budget = options.interaction_time_budget();
        let timer = InteractionTimer::new(evaluation_metrics());
        let outcome =
            match tokio::time::timeout(budget, contract.handler.handle(&ctx, current, data)).await
            {
                Ok(outcome) => outcome,
                Err(_) => HandlerResult::exception(format!(
                    "[RE:TIMEOUT] Interaction {} exceeded {}s",
                    data.tx.id, options.max_interaction_evaluation_time_seconds
                )),
            };
        let elapsed_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);
        drop(timer);

        if let Some(fatal) = self.session.lock().take_fatal() {
            return Err(fatal);
        }
        let outcome = match outcome {
            HandlerResult::Ok { gas_used, .. } if gas_used > options.gas_limit => {
                HandlerResult::Exception {
                    message: OUT_OF_GAS.to_string(),
                    gas_used,
                }
            }
            other => other,
        };
        evaluation_metrics().inc_interactions_evaluated(outcome_label(&outcome));
        if let HandlerResult::Exception { message, .. } = &outcome {
            if !options.ignore_exceptions {
                return Err(EvaluationError::UnhandledException {
                    tx_id: data.tx.id.clone(),
                    message: message.clone(),
                });
            }
        }
        Ok((outcome, elapsed_ms))
    }

    pub fn complete(
        &self,
        record: RecordId,
        tx_id: &str,
        outcome: &HandlerResult,
        elapsed_ms: u64,
        cache_hit: bool,
    ) {
        let state = match outcome {
            HandlerResult::Ok { state, .. } if self.root_options.stack_trace.save_state => {
                Some(state.clone())
            }
            _ => None,
        };
        let output = InteractionOutput {
            cache_hit,
            execution_time_ms: elapsed_ms,
            valid: matches!(outcome, HandlerResult::Ok { .. }),
            error_message: outcome.error_message().map(str::to_string),
            gas_used: outcome.gas_used(),
            state,
        };
        self.session.lock().graph.complete(record, tx_id, output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_bounds_map_to_loader_ranges() {
        let k = SortKey::last_for_height(4).unwrap();
        assert_eq!(Upper::Latest.loader_to(), None);
        assert_eq!(Upper::Latest.bound(), Bound::Unbounded);
        assert_eq!(Upper::Inclusive(k.clone()).bound(), Bound::Included(&k));
        assert_eq!(Upper::Replay(k.clone()).bound(), Bound::Included(&k));
        assert_eq!(Upper::Exclusive(k.clone()).bound(), Bound::Excluded(&k));
        assert_eq!(Upper::Exclusive(k.clone()).loader_to(), Some(&k));
    }

    #[test]
    fn depth_limit_is_inclusive() {
        assert!(check_depth(7, 7, "c", "tx").is_ok());
        let err = check_depth(8, 7, "c", "tx").unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::MaxCallDepthExceeded { max_depth: 7, .. }
        ));
    }
}
