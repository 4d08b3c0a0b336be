//! Scripted chain source shared by the integration tests.
//!
//! Routes are keyed `"{endpoint}|{method}|{arg}"`. Table routes use
//! `code/table/scope/bound` as the argument, where the bound is the lower
//! one (upper one plus a `/rev` suffix for reverse scans) and `-` means none.
//! A gate makes the matching call wait until the test releases it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use antelopex::error::SourceError;
use antelopex::source::{ChainSource, TableRowsRequest};
use antelopex::types::ChainInfo;

pub const EOS: &str = "https://eos.greymass.com";
pub const WAX: &str = "https://wax.greymass.com";
pub const HYPERION: &str = "https://wax.eosphere.io";

pub const TX_ID: &str = "8ca1b1d8e5ad4f3e2bd0ef1e9c3e2a9b4f6a0d1c2b3a4958677685940a1b2c3d";

#[derive(Default)]
pub struct MockSource {
    routes: Mutex<HashMap<String, Result<Value, SourceError>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, key: impl Into<String>, response: Result<Value, SourceError>) {
        self.routes.lock().unwrap().insert(key.into(), response);
    }

    pub fn ok(&self, key: impl Into<String>, body: Value) {
        self.route(key, Ok(body));
    }

    /// Chain with a `get_info` answer.
    pub fn chain(&self, endpoint: &str, chain_id: &str, head: u64) {
        self.ok(
            format!("{endpoint}|get_info|"),
            json!({
                "chain_id": chain_id,
                "head_block_num": head,
                "head_block_producer": "producer1",
            }),
        );
    }

    /// Holds calls to `key` until the returned handle is notified.
    pub fn gate(&self, key: impl Into<String>) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(key.into(), notify.clone());
        notify
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, key: &str) -> bool {
        self.calls().iter().any(|c| c == key)
    }

    async fn respond(&self, key: String) -> Result<Value, SourceError> {
        self.calls.lock().unwrap().push(key.clone());
        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.routes
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Err(SourceError::NotFound(key)))
    }
}

#[async_trait]
impl ChainSource for MockSource {
    async fn get_info(&self, endpoint: &str) -> Result<ChainInfo, SourceError> {
        let raw = self.respond(format!("{endpoint}|get_info|")).await?;
        serde_json::from_value(raw).map_err(|e| SourceError::Decode(e.to_string()))
    }

    async fn get_account(&self, endpoint: &str, name: &str) -> Result<Value, SourceError> {
        self.respond(format!("{endpoint}|get_account|{name}")).await
    }

    async fn get_block(&self, endpoint: &str, id_or_number: &str) -> Result<Value, SourceError> {
        self.respond(format!("{endpoint}|get_block|{id_or_number}")).await
    }

    async fn get_transaction(&self, endpoint: &str, id: &str) -> Result<Value, SourceError> {
        self.respond(format!("{endpoint}|get_transaction|{id}")).await
    }

    async fn get_table_rows(
        &self,
        endpoint: &str,
        request: &TableRowsRequest,
    ) -> Result<Value, SourceError> {
        let bound = if request.reverse {
            request.upper_bound.as_deref()
        } else {
            request.lower_bound.as_deref()
        };
        self.respond(format!(
            "{endpoint}|get_table_rows|{}/{}/{}/{}{}",
            request.code,
            request.table,
            request.scope,
            bound.unwrap_or("-"),
            if request.reverse { "/rev" } else { "" }
        ))
        .await
    }

    async fn get_abi(&self, endpoint: &str, account: &str) -> Result<Value, SourceError> {
        self.respond(format!("{endpoint}|get_abi|{account}")).await
    }

    async fn get_history_transaction(
        &self,
        history_endpoint: &str,
        id: &str,
    ) -> Result<Value, SourceError> {
        self.respond(format!("{history_endpoint}|get_history_transaction|{id}"))
            .await
    }
}

pub fn account_json(name: &str) -> Value {
    json!({
        "account_name": name,
        "core_liquid_balance": "12.5000 EOS",
        "ram_usage": 3200,
        "ram_quota": 8000,
        "cpu_limit": { "used": 100, "available": 900, "max": 1000 },
        "net_limit": { "used": "10", "available": "90", "max": "100" },
        "total_resources": { "cpu_weight": "1.0000 EOS", "net_weight": "0.5000 EOS" },
        "permissions": [
            {
                "perm_name": "active",
                "parent": "owner",
                "required_auth": {
                    "threshold": 1,
                    "keys": [{ "key": "EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV", "weight": 1 }],
                    "accounts": []
                }
            }
        ]
    })
}

pub fn rows_json(ids: &[u64], more: bool) -> Value {
    let rows: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "id": id, "owner": format!("user{id}") }))
        .collect();
    json!({ "rows": rows, "more": more })
}

pub fn ids(rows: &[serde_json::Map<String, Value>]) -> Vec<u64> {
    rows.iter()
        .filter_map(|r| r.get("id").and_then(Value::as_u64))
        .collect()
}
