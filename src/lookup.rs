//! Lookup relay boundary: one JSON request in, a normalized entity or
//! `{ "error": ... }` with a non-2xx status out.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ResolutionError;
use crate::resolver::Resolver;
use crate::types::{ChainConnection, EntityReference, ResolvedEntity, TableQuery};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupType {
    Account,
    Block,
    Transaction,
    Table,
    Abi,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRequest {
    #[serde(rename = "type")]
    pub kind: Option<LookupType>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, rename = "hyperionEndpoint")]
    pub hyperion_endpoint: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub lower_bound: Option<String>,
    #[serde(default)]
    pub upper_bound: Option<String>,
    #[serde(default)]
    pub reverse: Option<bool>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LookupResponse {
    pub status: u16,
    pub body: Value,
}

impl LookupResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

impl From<ResolutionError> for LookupResponse {
    fn from(err: ResolutionError) -> Self {
        LookupResponse::error(err.http_status(), err.to_string())
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn bad_request(message: &str) -> LookupResponse {
    LookupResponse::error(400, message)
}

/// Serializes the record itself, without the `kind` tag.
fn entity_body(entity: ResolvedEntity) -> Result<Value, ResolutionError> {
    let value = match entity {
        ResolvedEntity::Account(a) => serde_json::to_value(a),
        ResolvedEntity::Block(b) => serde_json::to_value(b),
        ResolvedEntity::Transaction(t) => serde_json::to_value(t),
        ResolvedEntity::Table(t) => serde_json::to_value(t),
        ResolvedEntity::Action(a) => serde_json::to_value(a),
    };
    value.map_err(|e| ResolutionError::Decode(e.to_string()))
}

/// Answers one relay request. Missing parameters are rejected before any
/// network call.
pub async fn handle(resolver: &Resolver, req: &LookupRequest) -> LookupResponse {
    let Some(kind) = req.kind else {
        return bad_request("Missing params: type");
    };
    let endpoint = present(&req.endpoint);
    let history = present(&req.hyperion_endpoint);
    let primary_required = kind != LookupType::Transaction;
    if primary_required && endpoint.is_none() {
        return bad_request("Missing params: endpoint");
    }
    if endpoint.is_none() && history.is_none() {
        return bad_request("Missing params: endpoint");
    }
    let conn = ChainConnection::detached(endpoint.unwrap_or_default(), history);

    let id = present(&req.id);
    if kind != LookupType::Table && id.is_none() {
        return bad_request("Missing params: id");
    }
    let id = id.unwrap_or_default();

    let reference = match kind {
        LookupType::Account => EntityReference::account(id),
        LookupType::Block => EntityReference::Block { id_or_number: id },
        LookupType::Transaction => EntityReference::Transaction { id },
        LookupType::Table => {
            let (Some(code), Some(table)) = (present(&req.code), present(&req.table)) else {
                return bad_request("Missing params: code, table");
            };
            EntityReference::TableQuery(TableQuery {
                code,
                table,
                scope: present(&req.scope),
                lower_bound: present(&req.lower_bound),
                upper_bound: present(&req.upper_bound),
                reverse: req.reverse.unwrap_or(false),
            })
        }
        LookupType::Abi => {
            if !crate::classify::is_account_name(&id) {
                return ResolutionError::MalformedIdentifier(id).into();
            }
            log::debug!("lookup abi {id}");
            return match resolver.contract_abi(&conn, &id).await {
                Ok(abi) => LookupResponse::ok(json!({ "abi": abi })),
                Err(e) => e.into(),
            };
        }
    };

    log::debug!("lookup {:?}", reference.kind());
    match resolver.resolve(&reference, &conn).await.and_then(entity_body) {
        Ok(body) => LookupResponse::ok(body),
        Err(e) => {
            log::info!("lookup {:?} failed: {e}", reference.kind());
            e.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_wire_names() {
        let req: LookupRequest = serde_json::from_value(json!({
            "type": "transaction",
            "id": "abc",
            "endpoint": "",
            "hyperionEndpoint": "https://wax.eosphere.io"
        }))
        .unwrap();
        assert_eq!(req.kind, Some(LookupType::Transaction));
        assert_eq!(present(&req.endpoint), None);
        assert_eq!(req.hyperion_endpoint.as_deref(), Some("https://wax.eosphere.io"));
    }

    #[test]
    fn errors_carry_status() {
        let res: LookupResponse = ResolutionError::NotFound("alice".into()).into();
        assert_eq!(res.status, 404);
        assert_eq!(res.body["error"], "not found: alice");
    }
}
