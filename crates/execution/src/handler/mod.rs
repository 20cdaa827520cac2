// Path: crates/execution/src/handler/mod.rs
//! Execution backends for contracts linked into the host.
//!
//! Both backends run a [`NativeContract`]; they differ in isolation. The
//! native backend polls the contract on the evaluator's task, the isolated one
//! moves it onto its own task so a panic or a runaway contract cannot unwind
//! into the evaluator.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tessera_api::error::{ContractError, HandlerError};
use tessera_api::handler::{
    ContractCall, ContractHandler, ContractOutput, ExecutionContext, HandlerFactory,
    NativeContract,
};
use tessera_types::app::{
    ContractDefinition, EvalStateResult, HandlerResult, InteractionData, CONTENT_TYPE_ISOLATED,
    CONTENT_TYPE_NATIVE,
};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn into_handler_result(
    outcome: Result<ContractOutput, ContractError>,
    current: &Value,
) -> HandlerResult {
    match outcome {
        Ok(out) => HandlerResult::Ok {
            state: out.state.unwrap_or_else(|| current.clone()),
            result: out.result,
            gas_used: out.gas_used,
        },
        Err(ContractError::Business(message)) => HandlerResult::error(message),
        Err(ContractError::Exception(message)) => HandlerResult::exception(message),
    }
}

/// Runs the contract in place.
pub struct NativeHandler {
    contract: Arc<dyn NativeContract>,
}

impl NativeHandler {
    pub fn new(contract: Arc<dyn NativeContract>) -> Self {
        Self { contract }
    }
}

#[async_trait]
impl ContractHandler for NativeHandler {
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        current: &EvalStateResult,
        data: &InteractionData,
    ) -> HandlerResult {
        let call = ContractCall::new(ctx, data);
        let run = self.contract.handle(&call, current.state.clone());
        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(outcome) => into_handler_result(outcome, &current.state),
            Err(payload) => {
                HandlerResult::exception(format!("[RE:PANIC] {}", panic_message(&*payload)))
            }
        }
    }

    fn backend(&self) -> &'static str {
        "native"
    }
}

/// Aborts the contract task when the handler future is dropped, e.g. on timeout.
struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs the contract on a task of its own.
pub struct IsolatedHandler {
    contract: Arc<dyn NativeContract>,
}

impl IsolatedHandler {
    pub fn new(contract: Arc<dyn NativeContract>) -> Self {
        Self { contract }
    }
}

#[async_trait]
impl ContractHandler for IsolatedHandler {
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        current: &EvalStateResult,
        data: &InteractionData,
    ) -> HandlerResult {
        let contract = self.contract.clone();
        let ctx = ctx.clone();
        let data = data.clone();
        let state = current.state.clone();
        let task = tokio::spawn(async move {
            let call = ContractCall::new(&ctx, &data);
            contract.handle(&call, state).await
        });
        let _guard = AbortOnDrop(task.abort_handle());
        match task.await {
            Ok(outcome) => into_handler_result(outcome, &current.state),
            Err(e) if e.is_panic() => {
                let payload = e.into_panic();
                HandlerResult::exception(format!("[RE:PANIC] {}", panic_message(&*payload)))
            }
            Err(e) => HandlerResult::exception(format!("[RE:ABORTED] {e}")),
        }
    }

    fn backend(&self) -> &'static str {
        "isolated"
    }
}

/// Builds handlers for registered contract sources, picking the backend from
/// the definition's content type.
#[derive(Default)]
pub struct NativeHandlerFactory {
    sources: DashMap<String, Arc<dyn NativeContract>>,
}

impl NativeHandlerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the implementation of source `src_tx_id`.
    pub fn register(&self, src_tx_id: &str, contract: Arc<dyn NativeContract>) {
        self.sources.insert(src_tx_id.to_string(), contract);
    }

    pub fn with_source(self, src_tx_id: &str, contract: Arc<dyn NativeContract>) -> Self {
        self.register(src_tx_id, contract);
        self
    }
}

#[async_trait]
impl HandlerFactory for NativeHandlerFactory {
    async fn create(
        &self,
        definition: &ContractDefinition,
    ) -> Result<Arc<dyn ContractHandler>, HandlerError> {
        let contract = self
            .sources
            .get(&definition.src_tx_id)
            .map(|c| c.value().clone())
            .ok_or_else(|| HandlerError::UnknownSource(definition.src_tx_id.clone()))?;
        let handler: Arc<dyn ContractHandler> = match definition.content_type.as_str() {
            CONTENT_TYPE_NATIVE => Arc::new(NativeHandler::new(contract)),
            CONTENT_TYPE_ISOLATED => Arc::new(IsolatedHandler::new(contract)),
            other => return Err(HandlerError::UnsupportedContentType(other.to_string())),
        };
        tracing::debug!(
            target: "handler",
            contract = %definition.tx_id,
            src = %definition.src_tx_id,
            backend = handler.backend(),
            "created contract handler"
        );
        Ok(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_api::handler::NoBridge;
    use tessera_types::config::EvaluationOptions;
    use tessera_types::app::{
        BlockInfo, ContractInteraction, Interaction, InteractionType, SortKey,
    };

    struct Flaky;

    #[async_trait]
    impl NativeContract for Flaky {
        async fn handle(
            &self,
            call: &ContractCall<'_>,
            state: Value,
        ) -> Result<ContractOutput, ContractError> {
            match call.function() {
                Some("ok") => Ok(ContractOutput::state(json!({ "n": state["n"].as_i64().unwrap_or(0) + 1 }))),
                Some("reject") => Err(ContractError::Business("nope".into())),
                _ => panic!("boom"),
            }
        }
    }

    fn definition(content_type: &str) -> ContractDefinition {
        ContractDefinition {
            tx_id: "c".into(),
            src_tx_id: "src".into(),
            src: String::new(),
            content_type: content_type.into(),
            init_state: json!({ "n": 0 }),
            owner: "owner".into(),
            manifest: Default::default(),
        }
    }

    fn ctx(def: ContractDefinition) -> ExecutionContext {
        ExecutionContext {
            contract_id: def.tx_id.clone(),
            definition: Arc::new(def),
            options: Arc::new(EvaluationOptions::default()),
            bridge: Arc::new(NoBridge),
            kv: None,
        }
    }

    fn data(function: &str) -> InteractionData {
        InteractionData {
            interaction: ContractInteraction {
                input: json!({ "function": function }),
                caller: "alice".into(),
                interaction_type: InteractionType::Write,
            },
            tx: Interaction {
                id: "tx".into(),
                sort_key: SortKey::last_for_height(1).unwrap(),
                owner: "alice".into(),
                block: BlockInfo::default(),
                tags: vec![],
                dry: false,
                parent: None,
            },
        }
    }

    #[tokio::test]
    async fn both_backends_agree() {
        let factory = NativeHandlerFactory::new().with_source("src", Arc::new(Flaky));
        let state = EvalStateResult::new(json!({ "n": 1 }));
        for content_type in [CONTENT_TYPE_NATIVE, CONTENT_TYPE_ISOLATED] {
            let def = definition(content_type);
            let handler = factory.create(&def).await.unwrap();
            let ctx = ctx(def);
            assert_eq!(
                handler.handle(&ctx, &state, &data("ok")).await,
                HandlerResult::ok(json!({ "n": 2 }), Value::Null)
            );
            assert_eq!(
                handler.handle(&ctx, &state, &data("reject")).await,
                HandlerResult::error("nope")
            );
            let crashed = handler.handle(&ctx, &state, &data("crash")).await;
            assert_eq!(crashed, HandlerResult::exception("[RE:PANIC] boom"));
        }
    }

    #[tokio::test]
    async fn unknown_sources_and_content_types_are_rejected() {
        let factory = NativeHandlerFactory::new().with_source("src", Arc::new(Flaky));
        assert!(matches!(
            factory.create(&definition("application/javascript")).await,
            Err(HandlerError::UnsupportedContentType(_))
        ));
        let mut def = definition(CONTENT_TYPE_NATIVE);
        def.src_tx_id = "other".into();
        assert!(matches!(
            factory.create(&def).await,
            Err(HandlerError::UnknownSource(_))
        ));
    }
}
