// Path: crates/execution/tests/common/mod.rs
#![allow(dead_code)]

use serde_json::Value;
use std::sync::Arc;
use tessera_execution::{Engine, EngineBuilder, NativeHandlerFactory};
use tessera_test_utils::contracts::{Counter, Writer};
use tessera_test_utils::{
    src_id, tx_id, InteractionBuilder, MemDefinitionLoader, MemInteractionsLoader,
    RecordingSubmitter,
};
use tessera_types::app::{
    ContractDefinition, ContractManifest, Interaction, CONTENT_TYPE_ISOLATED, CONTENT_TYPE_NATIVE,
};
use tessera_types::config::EvaluationOptions;

pub const OWNER: &str = "alice";

pub fn counter_src() -> String {
    src_id("counter")
}

pub fn counter_v2_src() -> String {
    src_id("counter-v2")
}

pub fn writer_src() -> String {
    src_id("writer")
}

/// A ledger, its contract sources and an engine factory over them.
pub struct Ledger {
    pub interactions: Arc<MemInteractionsLoader>,
    pub definitions: Arc<MemDefinitionLoader>,
    pub handlers: Arc<NativeHandlerFactory>,
    pub submitter: Arc<RecordingSubmitter>,
}

impl Ledger {
    pub fn new() -> Self {
        // Only the first caller in a test binary installs the subscriber.
        let _ = tessera_telemetry::init::init_tracing_with("warn");
        let handlers = NativeHandlerFactory::new()
            .with_source(&counter_src(), Arc::new(Counter::new()))
            .with_source(&counter_v2_src(), Arc::new(Counter::doubling()))
            .with_source(&writer_src(), Arc::new(Writer));
        let definitions = Arc::new(MemDefinitionLoader::new());
        definitions.add_source(&counter_v2_src(), CONTENT_TYPE_NATIVE, ContractManifest::default());
        Self {
            interactions: Arc::new(MemInteractionsLoader::new()),
            definitions,
            handlers: Arc::new(handlers),
            submitter: Arc::new(RecordingSubmitter::new()),
        }
    }

    pub fn definition(name: &str, src: &str, init_state: Value) -> ContractDefinition {
        ContractDefinition {
            tx_id: tx_id(name),
            src_tx_id: src.to_string(),
            src: String::new(),
            content_type: CONTENT_TYPE_NATIVE.to_string(),
            init_state,
            owner: OWNER.to_string(),
            manifest: ContractManifest::default(),
        }
    }

    /// Deploys a native contract and returns its id.
    pub fn deploy(&self, name: &str, src: &str, init_state: Value) -> String {
        self.deploy_definition(Self::definition(name, src, init_state))
    }

    /// Deploys `src` behind the isolated backend.
    pub fn deploy_isolated(&self, name: &str, src: &str, init_state: Value) -> String {
        let mut definition = Self::definition(name, src, init_state);
        definition.content_type = CONTENT_TYPE_ISOLATED.to_string();
        self.deploy_definition(definition)
    }

    pub fn deploy_definition(&self, definition: ContractDefinition) -> String {
        let id = definition.tx_id.clone();
        self.definitions.deploy(definition);
        id
    }

    /// Appends an interaction calling `contract_id` at `height`.
    pub fn call(&self, seed: &str, contract_id: &str, input: Value, height: u64) -> Interaction {
        self.push(InteractionBuilder::new(seed, contract_id, input).height(height))
    }

    pub fn push(&self, builder: InteractionBuilder) -> Interaction {
        let tx = builder.build();
        self.interactions.push(tx.clone());
        tx
    }

    pub fn builder(&self) -> EngineBuilder {
        Engine::builder(
            self.interactions.clone(),
            self.definitions.clone(),
            self.handlers.clone(),
        )
        .submitter(self.submitter.clone())
    }

    pub fn engine(&self) -> Engine {
        self.builder().build()
    }

    pub fn engine_with(&self, options: EvaluationOptions) -> Engine {
        self.builder().options(options).build()
    }
}

pub fn internal_writes() -> EvaluationOptions {
    EvaluationOptions {
        internal_writes: true,
        ..Default::default()
    }
}

pub fn counter_of(state: &Value) -> i64 {
    state["counter"].as_i64().unwrap_or_default()
}
