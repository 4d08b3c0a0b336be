//! Remote data sources.
//!
//! `ChainSource` is the seam between the resolver and the network: the
//! primary chain API (`/v1/chain/*`, `/v1/history/*`) and the secondary
//! history index (`/v2/history/*`). Payloads come back as raw JSON; the
//! resolver owns normalization.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::SourceError;
use crate::rpc_utils::{chain_post, history_get};
use crate::types::ChainInfo;

/// `get_table_rows` request body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableRowsRequest {
    pub json: bool,
    pub code: String,
    pub table: String,
    pub scope: String,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reverse: bool,
}

#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn get_info(&self, endpoint: &str) -> Result<ChainInfo, SourceError>;

    async fn get_account(&self, endpoint: &str, name: &str) -> Result<Value, SourceError>;

    async fn get_block(&self, endpoint: &str, id_or_number: &str) -> Result<Value, SourceError>;

    /// Primary node's transaction history endpoint (may be pruned).
    async fn get_transaction(&self, endpoint: &str, id: &str) -> Result<Value, SourceError>;

    async fn get_table_rows(
        &self,
        endpoint: &str,
        request: &TableRowsRequest,
    ) -> Result<Value, SourceError>;

    async fn get_abi(&self, endpoint: &str, account: &str) -> Result<Value, SourceError>;

    /// Secondary history index lookup.
    async fn get_history_transaction(
        &self,
        history_endpoint: &str,
        id: &str,
    ) -> Result<Value, SourceError>;
}

/// reqwest-backed source talking to real nodes.
#[derive(Clone, Debug)]
pub struct HttpSource {
    timeout_ms: u64,
    retries: u32,
}

impl HttpSource {
    pub fn new(timeout_ms: u64, retries: u32) -> Self {
        Self {
            timeout_ms,
            retries,
        }
    }

    async fn chain(&self, endpoint: &str, path: &str, body: Value) -> Result<Value, SourceError> {
        chain_post(endpoint, path, &body, self.timeout_ms, self.retries).await
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new(8000, 2)
    }
}

#[async_trait]
impl ChainSource for HttpSource {
    async fn get_info(&self, endpoint: &str) -> Result<ChainInfo, SourceError> {
        let value = self.chain(endpoint, "chain/get_info", json!({})).await?;
        serde_json::from_value(value).map_err(|e| SourceError::Decode(e.to_string()))
    }

    async fn get_account(&self, endpoint: &str, name: &str) -> Result<Value, SourceError> {
        self.chain(endpoint, "chain/get_account", json!({ "account_name": name }))
            .await
    }

    async fn get_block(&self, endpoint: &str, id_or_number: &str) -> Result<Value, SourceError> {
        let id = id_or_number.trim();
        // Heights go over the wire as numbers, ids as strings.
        let block_num_or_id = match id.parse::<u64>() {
            Ok(num) if id.len() < 64 => json!(num),
            _ => json!(id),
        };
        self.chain(
            endpoint,
            "chain/get_block",
            json!({ "block_num_or_id": block_num_or_id }),
        )
        .await
    }

    async fn get_transaction(&self, endpoint: &str, id: &str) -> Result<Value, SourceError> {
        self.chain(endpoint, "history/get_transaction", json!({ "id": id }))
            .await
    }

    async fn get_table_rows(
        &self,
        endpoint: &str,
        request: &TableRowsRequest,
    ) -> Result<Value, SourceError> {
        let body = serde_json::to_value(request).map_err(|e| SourceError::Decode(e.to_string()))?;
        self.chain(endpoint, "chain/get_table_rows", body).await
    }

    async fn get_abi(&self, endpoint: &str, account: &str) -> Result<Value, SourceError> {
        self.chain(endpoint, "chain/get_abi", json!({ "account_name": account }))
            .await
    }

    async fn get_history_transaction(
        &self,
        history_endpoint: &str,
        id: &str,
    ) -> Result<Value, SourceError> {
        let path = format!(
            "v2/history/get_transaction?id={}",
            urlencoding::encode(id.trim())
        );
        history_get(history_endpoint, &path, self.timeout_ms, self.retries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_request_omits_unset_bounds() {
        let req = TableRowsRequest {
            json: true,
            code: "eosio.token".into(),
            table: "accounts".into(),
            scope: "alice".into(),
            limit: 10,
            lower_bound: None,
            upper_bound: None,
            reverse: false,
        };
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            json!({"json": true, "code": "eosio.token", "table": "accounts", "scope": "alice", "limit": 10})
        );

        let req = TableRowsRequest {
            lower_bound: Some("5".into()),
            reverse: true,
            ..req
        };
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["lower_bound"], "5");
        assert_eq!(body["reverse"], true);
    }
}
