//! Resolver: reference + connection -> normalized entity.
//!
//! Stateless over calls. Source payloads never leave this module: each
//! source has a private adapter that produces the canonical record.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::classify::{strip_permission_suffix, validate_reference};
use crate::error::ResolutionError;
use crate::source::{ChainSource, TableRowsRequest};
use crate::types::{
    AbiField, AccountSummary, ActionRecord, ActionSchema, BlockSummary, ChainConnection,
    ContractAbi, EntityReference, KeyWeight, PermissionLevel, PermissionLevelWeight,
    PermissionSummary, RamUsage, ResolvedEntity, ResourceLimit, Row, TableQuery,
    TableQueryState, TransactionRecord, TxSource, TxStatus,
};

pub const DEFAULT_TABLE_LIMIT: u32 = 10;
/// Bound on `base` struct chains in an ABI.
const MAX_STRUCT_DEPTH: usize = 8;

/// One `get_table_rows` answer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TablePage {
    pub rows: Vec<Row>,
    pub more: bool,
}

pub struct Resolver {
    source: Arc<dyn ChainSource>,
    table_limit: u32,
}

impl Resolver {
    pub fn new(source: Arc<dyn ChainSource>) -> Self {
        Self::with_table_limit(source, DEFAULT_TABLE_LIMIT)
    }

    pub fn with_table_limit(source: Arc<dyn ChainSource>, table_limit: u32) -> Self {
        Self {
            source,
            table_limit: table_limit.max(1),
        }
    }

    pub fn table_limit(&self) -> u32 {
        self.table_limit
    }

    pub async fn resolve(
        &self,
        reference: &EntityReference,
        conn: &ChainConnection,
    ) -> Result<ResolvedEntity, ResolutionError> {
        validate_reference(reference)?;
        match reference {
            EntityReference::Account { name } => {
                self.account(conn, name).await.map(ResolvedEntity::Account)
            }
            EntityReference::Block { id_or_number } => {
                self.block(conn, id_or_number).await.map(ResolvedEntity::Block)
            }
            EntityReference::Transaction { id } => self
                .transaction(conn, id)
                .await
                .map(ResolvedEntity::Transaction),
            EntityReference::TableQuery(query) => {
                self.table(conn, query).await.map(ResolvedEntity::Table)
            }
            EntityReference::ActionSchema {
                code,
                action_name,
                initial_field_values,
            } => {
                let mut schema = self.action_schema(conn, code, action_name).await?;
                if let Some(values) = initial_field_values {
                    schema.initial_values = values.clone();
                }
                Ok(ResolvedEntity::Action(schema))
            }
        }
    }

    pub async fn account(
        &self,
        conn: &ChainConnection,
        name: &str,
    ) -> Result<AccountSummary, ResolutionError> {
        let endpoint = primary(conn)?;
        let name = strip_permission_suffix(name.trim());
        log::debug!("resolve account {name} via {endpoint}");
        let raw = self.source.get_account(endpoint, name).await?;
        account_from_primary(raw)
    }

    pub async fn block(
        &self,
        conn: &ChainConnection,
        id_or_number: &str,
    ) -> Result<BlockSummary, ResolutionError> {
        let endpoint = primary(conn)?;
        log::debug!("resolve block {id_or_number} via {endpoint}");
        let raw = self.source.get_block(endpoint, id_or_number.trim()).await?;
        block_from_primary(raw)
    }

    /// History index first when one is held; the primary node's history
    /// endpoint otherwise, or after the index failed.
    pub async fn transaction(
        &self,
        conn: &ChainConnection,
        id: &str,
    ) -> Result<TransactionRecord, ResolutionError> {
        let id = id.trim();
        match (conn.history(), conn.primary()) {
            (None, None) => Err(ResolutionError::SourceUnavailable(
                "transaction lookup needs a chain API or history endpoint".into(),
            )),
            (Some(history), primary) => {
                log::debug!("resolve tx {id} via history index {history}");
                let history_err = match self.source.get_history_transaction(history, id).await {
                    Ok(raw) => match transaction_from_history(raw, id) {
                        Ok(record) => return Ok(record),
                        Err(e) => e,
                    },
                    Err(e) => ResolutionError::from(e),
                };
                let Some(endpoint) = primary else {
                    return Err(history_err);
                };
                log::info!("history index failed for tx {id} ({history_err}); falling back to {endpoint}");
                let raw = self.source.get_transaction(endpoint, id).await?;
                transaction_from_primary(raw, id)
            }
            (None, Some(endpoint)) => {
                log::debug!("resolve tx {id} via chain api {endpoint}");
                let raw = self.source.get_transaction(endpoint, id).await?;
                transaction_from_primary(raw, id)
            }
        }
    }

    pub async fn table(
        &self,
        conn: &ChainConnection,
        query: &TableQuery,
    ) -> Result<TableQueryState, ResolutionError> {
        let page = self.fetch_table_page(conn, query).await?;
        Ok(TableQueryState::from_page(query, page))
    }

    /// Raw page fetch shared by `table` and the pagination engine.
    pub async fn fetch_table_page(
        &self,
        conn: &ChainConnection,
        query: &TableQuery,
    ) -> Result<TablePage, ResolutionError> {
        let endpoint = primary(conn)?;
        let request = TableRowsRequest {
            json: true,
            code: query.code.clone(),
            table: query.table.clone(),
            scope: query.effective_scope().to_string(),
            limit: self.table_limit,
            lower_bound: non_blank(query.lower_bound.as_deref()),
            upper_bound: non_blank(query.upper_bound.as_deref()),
            reverse: query.reverse,
        };
        log::debug!(
            "table {}/{} scope={} lower={:?} upper={:?} reverse={}",
            request.code,
            request.table,
            request.scope,
            request.lower_bound,
            request.upper_bound,
            request.reverse
        );
        let raw = self.source.get_table_rows(endpoint, &request).await?;
        table_page_from_primary(raw)
    }

    /// Contract ABI for `account`. An account without a contract answers an
    /// empty ABI.
    pub async fn contract_abi(
        &self,
        conn: &ChainConnection,
        account: &str,
    ) -> Result<ContractAbi, ResolutionError> {
        let endpoint = primary(conn)?;
        let raw = self.source.get_abi(endpoint, account).await?;
        match raw.get("abi") {
            None | Some(Value::Null) => Ok(ContractAbi::default()),
            Some(abi) => serde_json::from_value(abi.clone())
                .map_err(|e| ResolutionError::Decode(format!("abi for {account}: {e}"))),
        }
    }

    pub async fn action_schema(
        &self,
        conn: &ChainConnection,
        code: &str,
        action_name: &str,
    ) -> Result<ActionSchema, ResolutionError> {
        let abi = self.contract_abi(conn, code).await?;
        schema_from_abi(&abi, code, action_name)
    }
}

fn primary(conn: &ChainConnection) -> Result<&str, ResolutionError> {
    conn.primary().ok_or_else(|| {
        ResolutionError::SourceUnavailable("no chain API endpoint configured".into())
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Locate the action, then its struct by declared type name. Base struct
/// fields come first.
pub fn schema_from_abi(
    abi: &ContractAbi,
    code: &str,
    action_name: &str,
) -> Result<ActionSchema, ResolutionError> {
    let missing = || ResolutionError::ActionNotFound(format!("{code}::{action_name}"));
    let action = abi
        .actions
        .iter()
        .find(|a| a.name == action_name)
        .ok_or_else(missing)?;

    let mut chain = Vec::new();
    let mut type_name = action.type_name.as_str();
    while chain.len() < MAX_STRUCT_DEPTH {
        let Some(found) = abi.structs.iter().find(|s| s.name == type_name) else {
            break;
        };
        chain.push(found);
        if found.base.is_empty() {
            break;
        }
        type_name = found.base.as_str();
    }
    if chain.is_empty() {
        return Err(missing());
    }

    let fields: Vec<AbiField> = chain
        .iter()
        .rev()
        .flat_map(|s| s.fields.iter().cloned())
        .collect();
    Ok(ActionSchema {
        account_name: code.to_string(),
        action_name: action_name.to_string(),
        fields,
        initial_values: Default::default(),
    })
}

// Primary chain API payloads

#[derive(Deserialize)]
struct RawAccount {
    account_name: String,
    #[serde(default)]
    core_liquid_balance: Option<String>,
    #[serde(default, deserialize_with = "crate::types::lenient_i64")]
    ram_usage: i64,
    #[serde(default, deserialize_with = "crate::types::lenient_i64")]
    ram_quota: i64,
    #[serde(default)]
    cpu_limit: ResourceLimit,
    #[serde(default)]
    net_limit: ResourceLimit,
    #[serde(default)]
    total_resources: Option<RawTotalResources>,
    #[serde(default)]
    permissions: Vec<RawPermission>,
    #[serde(default)]
    voter_info: Option<Value>,
}

#[derive(Deserialize)]
struct RawTotalResources {
    #[serde(default)]
    cpu_weight: Option<Value>,
    #[serde(default)]
    net_weight: Option<Value>,
}

#[derive(Deserialize)]
struct RawPermission {
    perm_name: String,
    #[serde(default)]
    parent: String,
    required_auth: RawAuthority,
}

#[derive(Deserialize)]
struct RawAuthority {
    threshold: u32,
    #[serde(default)]
    keys: Vec<KeyWeight>,
    #[serde(default)]
    accounts: Vec<PermissionLevelWeight>,
}

fn weight_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "0".to_string(),
    }
}

fn account_from_primary(raw: Value) -> Result<AccountSummary, ResolutionError> {
    let raw: RawAccount = serde_json::from_value(raw)
        .map_err(|e| ResolutionError::Decode(format!("account: {e}")))?;
    let (cpu_staked, net_staked) = match &raw.total_resources {
        Some(t) => (
            weight_string(t.cpu_weight.as_ref()),
            weight_string(t.net_weight.as_ref()),
        ),
        None => ("0".to_string(), "0".to_string()),
    };
    Ok(AccountSummary {
        account_name: raw.account_name,
        balance: raw
            .core_liquid_balance
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| "0".to_string()),
        ram: RamUsage {
            used: raw.ram_usage,
            quota: raw.ram_quota,
        },
        cpu: raw.cpu_limit,
        net: raw.net_limit,
        cpu_staked,
        net_staked,
        permissions: raw
            .permissions
            .into_iter()
            .map(|p| PermissionSummary {
                name: p.perm_name,
                parent: p.parent,
                threshold: p.required_auth.threshold,
                keys: p.required_auth.keys,
                accounts: p.required_auth.accounts,
            })
            .collect(),
        voter_info: raw.voter_info.filter(|v| !v.is_null()),
    })
}

fn block_from_primary(raw: Value) -> Result<BlockSummary, ResolutionError> {
    let id = str_field(&raw, "id")
        .ok_or_else(|| ResolutionError::Decode("block without id".into()))?;
    let block_num = raw
        .get("block_num")
        .and_then(Value::as_u64)
        .ok_or_else(|| ResolutionError::Decode("block without block_num".into()))?;
    // Each receipt carries either a bare id (deferred) or the packed trx.
    let transaction_ids = raw
        .get("transactions")
        .and_then(Value::as_array)
        .map(|txs| {
            txs.iter()
                .filter_map(|t| match t.get("trx") {
                    Some(Value::String(id)) => Some(id.clone()),
                    Some(obj) => str_field(obj, "id"),
                    None => None,
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(BlockSummary {
        id,
        block_num,
        timestamp: normalize_timestamp(&str_field(&raw, "timestamp").unwrap_or_default()),
        producer: str_field(&raw, "producer").unwrap_or_default(),
        previous: str_field(&raw, "previous").unwrap_or_default(),
        confirmed: raw
            .get("confirmed")
            .and_then(Value::as_u64)
            .and_then(|c| u32::try_from(c).ok())
            .unwrap_or(0),
        transaction_ids,
    })
}

fn table_page_from_primary(raw: Value) -> Result<TablePage, ResolutionError> {
    let rows = raw
        .get("rows")
        .and_then(Value::as_array)
        .ok_or_else(|| ResolutionError::Decode("table response without rows".into()))?;
    let rows = rows
        .iter()
        .map(|row| match row {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        })
        .collect();
    let more = match raw.get("more") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    };
    Ok(TablePage { rows, more })
}

/// `/v1/history/get_transaction`: actions are flat under `trx.trx.actions`,
/// status under `trx.receipt.status`.
fn transaction_from_primary(raw: Value, requested: &str) -> Result<TransactionRecord, ResolutionError> {
    let actions = raw
        .pointer("/trx/trx/actions")
        .and_then(Value::as_array)
        .map(|acts| acts.iter().filter_map(action_from_flat).collect())
        .unwrap_or_default();
    let status = raw
        .pointer("/trx/receipt/status")
        .and_then(Value::as_str)
        .map(TxStatus::from_receipt)
        .unwrap_or(TxStatus::Unknown);
    let block_num = raw
        .get("block_num")
        .and_then(Value::as_u64)
        .ok_or_else(|| ResolutionError::NotFound(format!("transaction {requested}")))?;
    Ok(TransactionRecord {
        id: str_field(&raw, "id").unwrap_or_else(|| requested.to_string()),
        block_num,
        block_time: normalize_timestamp(&str_field(&raw, "block_time").unwrap_or_default()),
        actions,
        status,
        source: TxSource::ChainApi,
    })
}

/// `/v2/history/get_transaction`: each action wraps its body in `act` and
/// carries its own `block_num` and `@timestamp`.
fn transaction_from_history(raw: Value, requested: &str) -> Result<TransactionRecord, ResolutionError> {
    let raw_actions = raw
        .get("actions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let first = raw_actions.first();
    let block_num = raw
        .get("block_num")
        .and_then(Value::as_u64)
        .or_else(|| first.and_then(|a| a.get("block_num")).and_then(Value::as_u64));
    let Some(block_num) = block_num else {
        return Err(ResolutionError::NotFound(format!("transaction {requested}")));
    };
    let block_time = str_field(&raw, "block_time")
        .or_else(|| first.and_then(|a| str_field(a, "@timestamp")))
        .or_else(|| first.and_then(|a| str_field(a, "timestamp")))
        .unwrap_or_default();
    let status = match raw.get("executed").and_then(Value::as_bool) {
        Some(true) => TxStatus::Executed,
        Some(false) => TxStatus::NotExecuted,
        None => TxStatus::Unknown,
    };
    let actions = raw_actions
        .iter()
        .filter_map(|a| a.get("act"))
        .filter_map(action_from_flat)
        .collect();
    Ok(TransactionRecord {
        id: str_field(&raw, "trx_id").unwrap_or_else(|| requested.to_string()),
        block_num,
        block_time: normalize_timestamp(&block_time),
        actions,
        status,
        source: TxSource::HistoryIndex,
    })
}

fn action_from_flat(act: &Value) -> Option<ActionRecord> {
    let authorization = act
        .get("authorization")
        .cloned()
        .and_then(|a| serde_json::from_value::<Vec<PermissionLevel>>(a).ok())
        .unwrap_or_default();
    Some(ActionRecord {
        account: str_field(act, "account")?,
        name: str_field(act, "name")?,
        authorization,
        data: act.get("data").cloned().unwrap_or(Value::Null),
    })
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Chain timestamps come without a zone (`2024-05-01T12:00:00.500`) and are
/// UTC. Unparseable input is kept verbatim.
pub fn normalize_timestamp(raw: &str) -> String {
    const OUT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.naive_utc().format(OUT).to_string();
    }
    match NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(dt) => dt.format(OUT).to_string(),
        Err(_) => trimmed.to_string(),
    }
}
