// Path: crates/execution/tests/whitelist_evolve.rs

mod common;

use anyhow::Result;
use common::{counter_of, counter_src, counter_v2_src, writer_src, Ledger};
use serde_json::json;
use tessera_api::storage::CheckpointStore;
use tessera_test_utils::{assert_err, assert_validity, src_id};
use tessera_types::app::{ContractManifest, CONTENT_TYPE_NATIVE};
use tessera_types::config::{EvaluationOptions, WhitelistViolationPolicy};
use tessera_types::error::EvaluationError;

fn whitelist(sources: &[String]) -> EvaluationOptions {
    EvaluationOptions {
        whitelist_sources: sources.to_vec(),
        ..Default::default()
    }
}

#[tokio::test]
async fn non_whitelisted_contract_names_its_source() -> Result<()> {
    let ledger = Ledger::new();
    let id = ledger.deploy("counter", &counter_src(), json!({ "counter": 0 }));
    ledger.call("add", &id, json!({ "function": "add" }), 1);

    let engine = ledger.engine_with(whitelist(&[writer_src()]));
    let err = assert_err!(engine.contract(&id).read_state(None).await);
    assert!(err.to_string().contains(&counter_src()));
    assert!(matches!(err, EvaluationError::NonWhitelistedSource { src_tx_id } if src_tx_id == counter_src()));

    let allowed = ledger.engine_with(whitelist(&[counter_src()]));
    assert_eq!(counter_of(allowed.contract(&id).read_state(None).await?.state()), 1);
    Ok(())
}

#[tokio::test]
async fn evolving_to_a_non_whitelisted_source_stops_at_the_next_interaction() -> Result<()> {
    let ledger = Ledger::new();
    let id = ledger.deploy("counter", &counter_src(), json!({ "counter": 0 }));
    let adds: Vec<_> = (1..=3)
        .map(|h| ledger.call(&format!("add-{h}"), &id, json!({ "function": "add" }), h))
        .collect();
    let evolve = ledger.call(
        "evolve",
        &id,
        json!({ "function": "evolve", "value": counter_v2_src() }),
        4,
    );
    ledger.call("add-after", &id, json!({ "function": "add" }), 5);

    let guarded = ledger.engine_with(whitelist(&[counter_src()]));
    let err = assert_err!(guarded.contract(&id).read_state(None).await);
    assert!(matches!(err, EvaluationError::NonWhitelistedSource { src_tx_id } if src_tx_id == counter_v2_src()));
    let kept = guarded.checkpoints().get_last(&id).await?.unwrap_or_else(|| panic!("no checkpoint"));
    assert_eq!(kept.sort_key, evolve.sort_key);
    assert_eq!(kept.result.validity.len(), 4);
    assert!(kept.result.validity.values().all(|v| *v));
    assert_eq!(counter_of(kept.state()), 3);

    let open = ledger.engine();
    let up_to_evolve = open
        .contract(&id)
        .read_state(Some(evolve.sort_key.clone()))
        .await?;
    assert_eq!(up_to_evolve.result.validity.len(), 4);
    assert!(up_to_evolve.result.validity.values().all(|v| *v));
    assert_validity!(up_to_evolve.result, [&adds[0].id => true, &evolve.id => true]);
    assert_eq!(counter_of(up_to_evolve.state()), 3);

    // The evolved source counts double.
    let latest = open.contract(&id).read_state(None).await?;
    assert_eq!(counter_of(latest.state()), 5);
    Ok(())
}

#[tokio::test]
async fn only_the_owner_may_evolve() -> Result<()> {
    let ledger = Ledger::new();
    let id = ledger.deploy("counter", &counter_src(), json!({ "counter": 0 }));
    let evolve = ledger.push(
        tessera_test_utils::InteractionBuilder::new(
            "evolve",
            &id,
            json!({ "function": "evolve", "value": counter_v2_src() }),
        )
        .owner("mallory"),
    );
    ledger.call("add", &id, json!({ "function": "add" }), 2);

    let checkpoint = ledger.engine().contract(&id).read_state(None).await?;
    assert_eq!(checkpoint.result.validity_of(&evolve.id), Some(false));
    assert_eq!(counter_of(checkpoint.state()), 1);
    Ok(())
}

#[tokio::test]
async fn evolving_to_an_unsafe_source_stops_replay() -> Result<()> {
    let ledger = Ledger::new();
    let unsafe_src = src_id("counter-unsafe");
    ledger.definitions.add_source(
        &unsafe_src,
        CONTENT_TYPE_NATIVE,
        ContractManifest {
            unsafe_client: true,
            ..Default::default()
        },
    );
    let id = ledger.deploy("counter", &counter_src(), json!({ "counter": 0 }));
    let add = ledger.call("add", &id, json!({ "function": "add" }), 1);
    let evolve = ledger.call(
        "evolve",
        &id,
        json!({ "function": "evolve", "value": unsafe_src }),
        2,
    );
    let after = ledger.call("after", &id, json!({ "function": "add" }), 3);

    let checkpoint = ledger.engine().contract(&id).read_state(None).await?;
    assert_validity!(checkpoint.result, [&add.id => true, &evolve.id => false]);
    assert_eq!(checkpoint.result.validity_of(&after.id), None);
    assert!(checkpoint.result.error_messages[&evolve.id].starts_with("[UnsafeClientError]"));
    assert_eq!(counter_of(checkpoint.state()), 1);
    Ok(())
}

#[tokio::test]
async fn unsafe_client_sources_need_the_option() -> Result<()> {
    let ledger = Ledger::new();
    let mut definition = Ledger::definition("unsafe", &counter_src(), json!({ "counter": 0 }));
    definition.src = "SmartWeave.unsafeClient.transactions.get()".into();
    let id = ledger.deploy_definition(definition);

    let err = assert_err!(ledger.engine().contract(&id).read_state(None).await);
    assert!(matches!(err, EvaluationError::UnsafeClientNotAllowed { .. }));

    let allowed = ledger.engine_with(EvaluationOptions {
        allow_unsafe_client: true,
        ..Default::default()
    });
    allowed.contract(&id).read_state(None).await?;
    Ok(())
}

async fn read_non_whitelisted_twice(policy: WhitelistViolationPolicy) -> Result<()> {
    let ledger = Ledger::new();
    let reader = ledger.deploy("reader", &writer_src(), json!({ "counter": 0 }));
    let target = ledger.deploy("target", &counter_src(), json!({ "counter": 3 }));
    let first = ledger.call(
        "first",
        &reader,
        json!({ "function": "readOther", "contractId": target }),
        1,
    );
    let second = ledger.call(
        "second",
        &reader,
        json!({ "function": "readOther", "contractId": target }),
        2,
    );
    let add = ledger.call("add", &reader, json!({ "function": "addAmount", "amount": 4 }), 3);

    let engine = ledger.engine_with(EvaluationOptions {
        whitelist_sources: vec![writer_src()],
        whitelist_violation_policy: policy,
        ..Default::default()
    });
    let checkpoint = engine.contract(&reader).read_state(None).await?;
    assert_validity!(
        checkpoint.result,
        [&first.id => false, &second.id => false, &add.id => true]
    );
    for tx in [&first, &second] {
        let message = &checkpoint.result.error_messages[&tx.id];
        assert!(message.contains("[NonWhitelistedSourceError]"), "{message}");
        assert!(message.contains(&counter_src()), "{message}");
    }
    assert_eq!(counter_of(checkpoint.state()), 4);
    assert!(checkpoint.state().get("seen").is_none());
    Ok(())
}

#[tokio::test]
async fn whitelist_violations_invalidate_the_calling_interaction() -> Result<()> {
    read_non_whitelisted_twice(WhitelistViolationPolicy::InvalidateInteraction).await
}

#[tokio::test]
async fn whitelist_violations_can_freeze_the_callee() -> Result<()> {
    read_non_whitelisted_twice(WhitelistViolationPolicy::FreezeContract).await
}

#[tokio::test]
async fn refused_evolve_keeps_the_unsaved_prefix() -> Result<()> {
    let ledger = Ledger::new();
    let id = ledger.deploy("counter", &counter_src(), json!({ "counter": 0 }));
    ledger.call("add-1", &id, json!({ "function": "add" }), 1);
    let evolve = ledger.call(
        "evolve",
        &id,
        json!({ "function": "evolve", "value": counter_v2_src() }),
        2,
    );
    let after = ledger.call("add-after", &id, json!({ "function": "add" }), 3);

    let engine = ledger.engine_with(EvaluationOptions {
        cache_every_n_interactions: 10,
        ..whitelist(&[counter_src()])
    });
    assert_err!(engine.contract(&id).read_state(None).await);
    let kept = engine.checkpoints().get_last(&id).await?.unwrap_or_else(|| panic!("no checkpoint"));
    assert_eq!(kept.sort_key, evolve.sort_key);
    assert_eq!(kept.result.validity_of(&evolve.id), Some(true));
    assert_eq!(kept.result.validity_of(&after.id), None);
    Ok(())
}
