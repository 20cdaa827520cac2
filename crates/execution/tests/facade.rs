// Path: crates/execution/tests/facade.rs

mod common;

use anyhow::Result;
use common::{counter_of, counter_src, counter_v2_src, internal_writes, writer_src, Ledger, OWNER};
use serde_json::json;
use std::sync::Arc;
use tessera_execution::Engine;
use tessera_test_utils::{assert_err, tx_id};
use tessera_types::app::{InteractionResultType, Tag, WriteOptions};
use tessera_types::config::EvaluationOptions;
use tessera_types::error::EvaluationError;
use tessera_types::tags::INTERACT_WRITE;

fn counter_ledger() -> (Ledger, String) {
    let ledger = Ledger::new();
    let id = ledger.deploy("counter", &counter_src(), json!({ "counter": 1 }));
    ledger.call("a1", &id, json!({ "function": "add" }), 1);
    ledger.call("a2", &id, json!({ "function": "add" }), 2);
    (ledger, id)
}

#[tokio::test]
async fn dry_writes_leave_no_trace() -> Result<()> {
    let (ledger, id) = counter_ledger();
    let engine = ledger.engine();
    let facade = engine.contract(&id).connect(OWNER);

    let dry = facade.dry_write(json!({ "function": "add", "amount": 10 }), None).await?;
    assert_eq!(dry.kind, InteractionResultType::Ok);
    assert_eq!(counter_of(&dry.state), 13);

    let checkpoint = facade.read_state(None).await?;
    assert_eq!(counter_of(checkpoint.state()), 3);
    assert_eq!(checkpoint.result.validity.len(), 2);
    Ok(())
}

#[tokio::test]
async fn dry_writes_report_failures_as_results() -> Result<()> {
    let (ledger, id) = counter_ledger();
    let facade = ledger.engine().contract(&id).connect(OWNER);

    let failed = facade.dry_write(json!({ "function": "fail" }), None).await?;
    assert_eq!(failed.kind, InteractionResultType::Error);
    assert_eq!(failed.error_message.as_deref(), Some("counter refused"));
    assert_eq!(counter_of(&failed.state), 3);

    let exception = facade.dry_write(json!({ "function": "boom" }), None).await?;
    assert_eq!(exception.kind, InteractionResultType::Exception);
    Ok(())
}

#[tokio::test]
async fn dry_writes_run_as_the_connected_caller() -> Result<()> {
    let (ledger, id) = counter_ledger();
    let engine = ledger.engine();
    let evolve = json!({ "function": "evolve", "value": counter_v2_src() });

    let stranger = engine.contract(&id).connect("bob");
    assert!(!stranger.dry_write(evolve.clone(), None).await?.is_ok());
    assert!(stranger.dry_write(evolve.clone(), Some(OWNER)).await?.is_ok());
    assert!(engine.contract(&id).connect(OWNER).dry_write(evolve, None).await?.is_ok());
    Ok(())
}

#[tokio::test]
async fn views_return_the_function_result() -> Result<()> {
    let (ledger, id) = counter_ledger();
    let facade = ledger.engine().contract(&id);
    let viewed = facade.view_state(json!({ "function": "get" })).await?;
    assert!(viewed.is_ok());
    assert_eq!(viewed.result, json!(3));
    Ok(())
}

#[tokio::test]
async fn writes_are_handed_to_the_submitter() -> Result<()> {
    let (ledger, id) = counter_ledger();
    let facade = ledger.engine().contract(&id).connect(OWNER);

    let response = facade
        .write_interaction(
            json!({ "function": "add" }),
            WriteOptions {
                tags: vec![Tag::new("App-Version", "0.3.0")],
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(response.original_tx_id, tx_id("submitted-0"));
    assert!(response.interact_write.is_empty());

    let submitted = ledger.submitter.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].contract_id, id);
    assert_eq!(submitted[0].input, json!({ "function": "add" }));
    assert_eq!(submitted[0].tags, vec![Tag::new("App-Version", "0.3.0")]);
    Ok(())
}

#[tokio::test]
async fn strict_writes_refuse_failing_interactions() -> Result<()> {
    let (ledger, id) = counter_ledger();
    let facade = ledger.engine().contract(&id).connect(OWNER);
    let strict = || WriteOptions {
        strict: Some(true),
        ..Default::default()
    };

    let err = assert_err!(
        facade
            .write_interaction(json!({ "function": "fail" }), strict())
            .await
    );
    assert!(matches!(err, EvaluationError::DryRunFailed(ref message) if message == "counter refused"));
    assert!(ledger.submitter.submitted().is_empty());

    facade
        .write_interaction(json!({ "function": "add" }), strict())
        .await?;
    assert_eq!(ledger.submitter.submitted().len(), 1);
    Ok(())
}

#[tokio::test]
async fn internal_writes_are_tagged() -> Result<()> {
    let ledger = Ledger::new();
    let a = ledger.deploy("A", &writer_src(), json!({ "counter": 0 }));
    let b = ledger.deploy("B", &counter_src(), json!({ "counter": 0 }));
    let facade = ledger.engine_with(internal_writes()).contract(&a).connect(OWNER);

    let response = facade
        .write_interaction(
            json!({ "function": "writeTo", "contractId": b, "input": { "function": "add" } }),
            WriteOptions::default(),
        )
        .await?;
    assert_eq!(response.interact_write, vec![b.clone()]);
    let submitted = ledger.submitter.submitted();
    assert!(submitted[0].tags.contains(&Tag::new(INTERACT_WRITE, b.as_str())));

    // Reads write nothing.
    let response = facade
        .write_interaction(
            json!({ "function": "readOther", "contractId": b }),
            WriteOptions::default(),
        )
        .await?;
    assert!(response.interact_write.is_empty());
    Ok(())
}

#[tokio::test]
async fn evolve_submits_the_new_source() -> Result<()> {
    let (ledger, id) = counter_ledger();
    let facade = ledger.engine().contract(&id).connect(OWNER);
    facade.evolve(&counter_v2_src()).await?;
    let submitted = ledger.submitter.submitted();
    assert_eq!(
        submitted[0].input,
        json!({ "function": "evolve", "value": counter_v2_src() })
    );
    Ok(())
}

#[tokio::test]
async fn writes_need_a_submitter() -> Result<()> {
    let (ledger, id) = counter_ledger();
    let engine = Engine::builder(
        ledger.interactions.clone(),
        ledger.definitions.clone(),
        ledger.handlers.clone(),
    )
    .build();
    let err = assert_err!(
        engine
            .contract(&id)
            .write_interaction(json!({ "function": "add" }), WriteOptions::default())
            .await
    );
    assert!(matches!(err, EvaluationError::Submission(_)));
    Ok(())
}

#[tokio::test]
async fn call_stack_records_nested_calls() -> Result<()> {
    let ledger = Ledger::new();
    let a = ledger.deploy("A", &writer_src(), json!({ "counter": 0 }));
    let b = ledger.deploy("B", &counter_src(), json!({ "counter": 0 }));
    let facade = ledger.engine().contract(&a).connect(OWNER);
    assert!(facade.call_stack().is_none());

    facade
        .dry_write(
            json!({ "function": "writeTo", "contractId": b, "input": { "function": "add" } }),
            None,
        )
        .await?;
    let graph = facade.call_stack().unwrap_or_default();
    assert_eq!(graph["contractTxId"], json!(a));
    assert_eq!(graph["depth"], json!(0));
    let interactions = graph["interactions"].as_object().cloned().unwrap_or_default();
    assert_eq!(interactions.len(), 1);
    let call = interactions.values().next().cloned().unwrap_or_default();
    assert_eq!(call["calls"][0]["contractTxId"], json!(b));
    assert_eq!(call["calls"][0]["innerCallType"], json!("write"));
    assert_eq!(call["calls"][0]["depth"], json!(1));
    Ok(())
}

#[tokio::test]
async fn concurrent_reads_agree() -> Result<()> {
    let ledger = Ledger::new();
    let id = ledger.deploy("counter", &counter_src(), json!({ "counter": 0 }));
    for h in 1..=20 {
        ledger.call(&format!("add-{h}"), &id, json!({ "function": "add" }), h);
    }
    let engine = Arc::new(ledger.engine());

    let reads = (0..4).map(|_| {
        let engine = engine.clone();
        let id = id.clone();
        tokio::spawn(async move { engine.contract(&id).read_state(None).await })
    });
    let results = futures::future::join_all(reads).await;
    for joined in results {
        let checkpoint = joined??;
        assert_eq!(counter_of(checkpoint.state()), 20);
        assert_eq!(checkpoint.result.validity.len(), 20);
    }
    Ok(())
}

#[tokio::test]
async fn cached_handlers_follow_each_facade_options() -> Result<()> {
    let (ledger, id) = counter_ledger();
    let engine = ledger.engine();
    let burn = json!({ "function": "burn", "gas": 50 });

    let open = engine.contract(&id);
    assert!(open.dry_write(burn.clone(), None).await?.is_ok());

    let mut metered = engine.contract(&id);
    metered.set_evaluation_options(EvaluationOptions {
        gas_limit: 10,
        ..Default::default()
    });
    let refused = metered.dry_write(burn.clone(), None).await?;
    assert_eq!(refused.kind, InteractionResultType::Exception);

    assert!(open.dry_write(burn, None).await?.is_ok());
    Ok(())
}
