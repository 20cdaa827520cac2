// Path: crates/test_utils/src/contracts.rs
//! Sample contracts for the native backends.
//!
//! Both keep a `counter` in their state. [`Counter`] is a plain ledger
//! contract; [`Writer`] talks to other contracts.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tessera_api::error::ContractError;
use tessera_api::handler::{ContractCall, ContractOutput, NativeContract};
use tessera_types::app::InteractionResultType;

fn counter(state: &Value) -> i64 {
    state.get("counter").and_then(Value::as_i64).unwrap_or(0)
}

fn set_counter(state: &mut Value, value: i64) {
    if let Some(map) = state.as_object_mut() {
        map.insert("counter".into(), json!(value));
    }
}

fn amount(input: &Value) -> i64 {
    input.get("amount").and_then(Value::as_i64).unwrap_or(1)
}

fn arg<'a>(input: &'a Value, name: &str) -> Result<&'a str, ContractError> {
    input
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ContractError::Business(format!("missing '{name}'")))
}

fn unknown(function: Option<&str>) -> ContractError {
    ContractError::Business(format!("unknown function: {}", function.unwrap_or("<none>")))
}

/// A counter. `add` increments by `amount` (default 1) times the multiplier.
#[derive(Debug, Clone)]
pub struct Counter {
    multiplier: i64,
}

impl Counter {
    pub fn new() -> Self {
        Self { multiplier: 1 }
    }

    /// A later version of the source: `add` counts double.
    pub fn doubling() -> Self {
        Self { multiplier: 2 }
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NativeContract for Counter {
    async fn handle(
        &self,
        call: &ContractCall<'_>,
        mut state: Value,
    ) -> Result<ContractOutput, ContractError> {
        let input = call.input();
        match call.function() {
            Some("__init") => {
                if let Some(map) = state.as_object_mut() {
                    map.insert("initialized".into(), json!(true));
                    map.insert("deployer".into(), json!(call.caller()));
                }
                Ok(ContractOutput::state(state))
            }
            Some("add") | Some("addAmount") => {
                let next = counter(&state) + amount(input) * self.multiplier;
                set_counter(&mut state, next);
                Ok(ContractOutput::state(state))
            }
            Some("get") => Ok(ContractOutput::result(json!(counter(&state)))),
            Some("fail") => Err(ContractError::Business("counter refused".into())),
            Some("boom") => Err(ContractError::Exception("counter exploded".into())),
            #[allow(clippy::panic)]
            Some("panic") => panic!("counter panicked"),
            Some("burn") => {
                let gas = input.get("gas").and_then(Value::as_u64).unwrap_or(0);
                Ok(ContractOutput::state(state).with_gas(gas))
            }
            Some("sleep") => {
                let ms = input.get("ms").and_then(Value::as_u64).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(ContractOutput::state(state))
            }
            Some("addAndWrite") => {
                // Writes `amount` into `contractId`, then adds the callee's new counter.
                let target = arg(input, "contractId")?;
                let written = call
                    .write(target, json!({ "function": "addAmount", "amount": amount(input) }))
                    .await?;
                let next = counter(&state) + counter(&written.state);
                set_counter(&mut state, next);
                Ok(ContractOutput::state(state))
            }
            Some("evolve") => {
                if call.caller() != call.definition().owner {
                    return Err(ContractError::Business("only the owner can evolve".into()));
                }
                let src = arg(input, "value")?.to_string();
                if let Some(map) = state.as_object_mut() {
                    map.insert("evolve".into(), json!(src));
                }
                Ok(ContractOutput::state(state))
            }
            Some("kvPut") => {
                let key = arg(input, "key")?;
                let value = input.get("value").cloned().unwrap_or(Value::Null);
                call.kv_put(key, &value).await?;
                Ok(ContractOutput::state(state))
            }
            Some("kvGet") => {
                let key = arg(input, "key")?;
                let value = call.kv_get(key).await?.unwrap_or(Value::Null);
                Ok(ContractOutput::result(value))
            }
            other => Err(unknown(other)),
        }
    }
}

/// A contract that reads, views and writes other contracts.
#[derive(Debug, Clone, Default)]
pub struct Writer;

#[async_trait]
impl NativeContract for Writer {
    async fn handle(
        &self,
        call: &ContractCall<'_>,
        mut state: Value,
    ) -> Result<ContractOutput, ContractError> {
        let input = call.input();
        match call.function() {
            Some("addAmount") => {
                let next = counter(&state) + amount(input);
                set_counter(&mut state, next);
                Ok(ContractOutput::state(state))
            }
            Some("get") => Ok(ContractOutput::result(json!(counter(&state)))),
            Some("writeBack") => {
                // The callee writes into this contract; that write is
                // overwritten by the state returned here.
                let target = arg(input, "contractId")?;
                let written = call
                    .write(
                        target,
                        json!({
                            "function": "addAndWrite",
                            "amount": amount(input),
                            "contractId": call.contract_id(),
                        }),
                    )
                    .await?;
                let next = counter(&state) + counter(&written.state);
                set_counter(&mut state, next);
                Ok(ContractOutput::state(state))
            }
            Some("writeBackCheck") => {
                let target = arg(input, "contractId")?;
                let written = call
                    .write(
                        target,
                        json!({
                            "function": "addAndWrite",
                            "amount": amount(input),
                            "contractId": call.contract_id(),
                        }),
                    )
                    .await?;
                let mut state = call.refresh_state().await?;
                let next = counter(&state) + counter(&written.state);
                set_counter(&mut state, next);
                Ok(ContractOutput::state(state))
            }
            Some("readOther") => {
                let target = arg(input, "contractId")?;
                let other = call.read_contract_state(target).await?;
                if let Some(map) = state.as_object_mut() {
                    map.insert("seen".into(), json!(counter(&other)));
                }
                Ok(ContractOutput::state(state))
            }
            Some("viewOther") => {
                let target = arg(input, "contractId")?;
                let viewed = call
                    .view_contract_state(target, json!({ "function": "get" }))
                    .await?;
                Ok(ContractOutput::result(viewed.result))
            }
            Some("writeTo") => {
                let target = arg(input, "contractId")?;
                let payload = input.get("input").cloned().unwrap_or(Value::Null);
                if let Some(ms) = input.get("delayMs").and_then(Value::as_u64) {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }
                let written = call.write(target, payload).await?;
                let kind = match written.kind {
                    InteractionResultType::Ok => "ok",
                    InteractionResultType::Error => "error",
                    InteractionResultType::Exception => "exception",
                };
                if let Some(map) = state.as_object_mut() {
                    map.insert("lastWrite".into(), json!(kind));
                }
                Ok(ContractOutput::state(state))
            }
            Some("callSelf") => {
                call.read_contract_state(call.contract_id()).await?;
                Ok(ContractOutput::state(state))
            }
            Some("relay") => {
                // Forwards the call along `path`; the last hop counts it.
                let path: Vec<Value> = input
                    .get("path")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let Some((next, rest)) = path.split_first() else {
                    let next = counter(&state) + amount(input);
                    set_counter(&mut state, next);
                    return Ok(ContractOutput::state(state));
                };
                let next = next
                    .as_str()
                    .ok_or_else(|| ContractError::Business("malformed path".into()))?;
                call.write(
                    next,
                    json!({ "function": "relay", "path": rest, "amount": amount(input) }),
                )
                .await?;
                Ok(ContractOutput::state(state))
            }
            other => Err(unknown(other)),
        }
    }
}
