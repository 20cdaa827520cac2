// Path: crates/execution/src/call_graph.rs
//! The record of contract invocations made during one top-level call.
//!
//! Records live in an arena owned by the session and link to their parent
//! interaction by index, so the graph can be walked and rendered after the
//! evaluation has unwound.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tessera_types::app::{InnerCallType, InteractionData};

/// Index of a record in its [`CallGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordId(usize);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionInput {
    pub tx_id: String,
    pub sort_key: String,
    pub block_height: u64,
    pub block_timestamp: u64,
    pub caller: String,
    pub function: Option<String>,
    pub arguments: Value,
    pub dry: bool,
    pub foreign_contract_calls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionOutput {
    pub cache_hit: bool,
    pub execution_time_ms: u64,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub gas_used: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionCall {
    pub input: InteractionInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<InteractionOutput>,
    #[serde(skip)]
    children: Vec<RecordId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractCallRecord {
    pub contract_tx_id: String,
    pub depth: u32,
    pub inner_call_type: Option<InnerCallType>,
    pub interactions: BTreeMap<String, InteractionCall>,
    parent: Option<(RecordId, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    records: Vec<ContractCallRecord>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a record for `contract_tx_id`. `parent` names the record and
    /// interaction that made the call.
    pub fn open(
        &mut self,
        contract_tx_id: &str,
        depth: u32,
        inner_call_type: Option<InnerCallType>,
        parent: Option<(RecordId, &str)>,
    ) -> RecordId {
        let id = RecordId(self.records.len());
        if let Some((parent_id, tx_id)) = parent {
            if let Some(call) = self.call_mut(parent_id, tx_id) {
                call.children.push(id);
                call.input
                    .foreign_contract_calls
                    .push(contract_tx_id.to_string());
            }
        }
        self.records.push(ContractCallRecord {
            contract_tx_id: contract_tx_id.to_string(),
            depth,
            inner_call_type,
            interactions: BTreeMap::new(),
            parent: parent.map(|(p, tx)| (p, tx.to_string())),
        });
        id
    }

    /// Logs an interaction's input before it executes.
    pub fn record(&mut self, record: RecordId, data: &InteractionData) {
        let Some(rec) = self.records.get_mut(record.0) else {
            return;
        };
        let input = &data.interaction.input;
        let call = InteractionCall {
            input: InteractionInput {
                tx_id: data.tx.id.clone(),
                sort_key: data.tx.sort_key.to_string(),
                block_height: data.tx.block.height,
                block_timestamp: data.tx.block.timestamp,
                caller: data.interaction.caller.clone(),
                function: data.interaction.function().map(str::to_string),
                arguments: input.clone(),
                dry: data.tx.dry,
                foreign_contract_calls: Vec::new(),
            },
            output: None,
            children: Vec::new(),
        };
        rec.interactions.insert(data.tx.id.clone(), call);
    }

    /// Logs an interaction's output.
    pub fn complete(&mut self, record: RecordId, tx_id: &str, output: InteractionOutput) {
        if let Some(call) = self.call_mut(record, tx_id) {
            call.output = Some(output);
        }
    }

    pub fn get(&self, record: RecordId) -> Option<&ContractCallRecord> {
        self.records.get(record.0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn call_mut(&mut self, record: RecordId, tx_id: &str) -> Option<&mut InteractionCall> {
        self.records.get_mut(record.0)?.interactions.get_mut(tx_id)
    }

    /// Contracts written to, directly or transitively, by interaction `tx_id`
    /// of `root`, in call order and without duplicates.
    pub fn inner_writes(&self, root: RecordId, tx_id: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_writes(root, tx_id, &mut out);
        out
    }

    fn collect_writes(&self, record: RecordId, tx_id: &str, out: &mut Vec<String>) {
        let Some(call) = self.get(record).and_then(|r| r.interactions.get(tx_id)) else {
            return;
        };
        for child in &call.children {
            let Some(rec) = self.get(*child) else {
                continue;
            };
            if rec.inner_call_type == Some(InnerCallType::Write) {
                if !out.contains(&rec.contract_tx_id) {
                    out.push(rec.contract_tx_id.clone());
                }
                self.collect_writes(*child, tx_id, out);
            }
        }
    }

    /// Renders every root record with its nested calls.
    pub fn to_json(&self) -> Value {
        let roots: Vec<Value> = (0..self.records.len())
            .map(RecordId)
            .filter(|id| self.get(*id).is_some_and(|r| r.parent.is_none()))
            .map(|id| self.render(id))
            .collect();
        match <[Value; 1]>::try_from(roots) {
            Ok([single]) => single,
            Err(many) => Value::Array(many),
        }
    }

    fn render(&self, id: RecordId) -> Value {
        let Some(rec) = self.get(id) else {
            return Value::Null;
        };
        let interactions: serde_json::Map<String, Value> = rec
            .interactions
            .iter()
            .map(|(tx_id, call)| {
                let mut rendered = serde_json::to_value(call).unwrap_or(Value::Null);
                if let Value::Object(obj) = &mut rendered {
                    obj.insert(
                        "calls".into(),
                        Value::Array(call.children.iter().map(|c| self.render(*c)).collect()),
                    );
                }
                (tx_id.clone(), rendered)
            })
            .collect();
        serde_json::json!({
            "contractTxId": rec.contract_tx_id,
            "depth": rec.depth,
            "innerCallType": rec.inner_call_type,
            "interactions": interactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_types::app::{
        BlockInfo, ContractInteraction, Interaction, InteractionType, SortKey,
    };

    fn data(tx_id: &str, caller: &str) -> InteractionData {
        InteractionData {
            interaction: ContractInteraction {
                input: json!({ "function": "writeBack", "target": "B" }),
                caller: caller.into(),
                interaction_type: InteractionType::Write,
            },
            tx: Interaction {
                id: tx_id.into(),
                sort_key: SortKey::last_for_height(9).unwrap(),
                owner: caller.into(),
                block: BlockInfo::default(),
                tags: vec![],
                dry: true,
                parent: None,
            },
        }
    }

    #[test]
    fn inner_writes_follow_the_dry_interaction_only() {
        let mut g = CallGraph::new();
        let root = g.open("A", 0, None, None);
        g.record(root, &data("hist", "alice"));
        g.record(root, &data("dry", "alice"));

        // A historical write must not leak into the dry interaction's writes.
        let old = g.open("Z", 1, Some(InnerCallType::Write), Some((root, "hist")));
        g.record(old, &data("hist", "A"));

        let b = g.open("B", 1, Some(InnerCallType::Write), Some((root, "dry")));
        g.record(b, &data("dry", "A"));
        let read = g.open("R", 2, Some(InnerCallType::Read), Some((b, "dry")));
        g.record(read, &data("dry", "B"));
        let c = g.open("C", 2, Some(InnerCallType::Write), Some((b, "dry")));
        g.record(c, &data("dry", "B"));
        let again = g.open("B", 1, Some(InnerCallType::Write), Some((root, "dry")));
        g.record(again, &data("dry", "A"));

        assert_eq!(g.inner_writes(root, "dry"), vec!["B", "C"]);
    }

    #[test]
    fn renders_nested_calls() {
        let mut g = CallGraph::new();
        let root = g.open("A", 0, None, None);
        g.record(root, &data("t1", "alice"));
        let b = g.open("B", 1, Some(InnerCallType::Read), Some((root, "t1")));
        g.complete(
            root,
            "t1",
            InteractionOutput {
                valid: true,
                gas_used: 3,
                ..Default::default()
            },
        );

        let json = g.to_json();
        assert_eq!(json["contractTxId"], "A");
        let call = &json["interactions"]["t1"];
        assert_eq!(call["input"]["foreignContractCalls"], json!(["B"]));
        assert_eq!(call["output"]["valid"], true);
        assert_eq!(call["calls"][0]["contractTxId"], "B");
        assert_eq!(call["calls"][0]["innerCallType"], "read");
        assert!(g.get(b).is_some());
    }
}
