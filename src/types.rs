use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The single active network connection. Built by the connection manager
/// after a successful `get_info`, never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConnection {
    pub endpoint: String,
    pub history_endpoint: Option<String>,
    pub name: String,
    pub chain_id: String,
    pub head_block_num: u64,
    pub head_producer: String,
}

impl ChainConnection {
    /// Connection built from raw endpoints without a `get_info` round trip.
    /// Used by the lookup relay, which receives endpoints per request.
    pub fn detached(endpoint: impl Into<String>, history_endpoint: Option<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            name: endpoint.clone(),
            endpoint,
            history_endpoint,
            chain_id: String::new(),
            head_block_num: 0,
            head_producer: String::new(),
        }
    }

    /// Primary chain API endpoint, if one is held.
    pub fn primary(&self) -> Option<&str> {
        non_empty(&self.endpoint)
    }

    /// Secondary history index endpoint, if one is held.
    pub fn history(&self) -> Option<&str> {
        self.history_endpoint.as_deref().and_then(non_empty)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// `get_info` payload (only the fields the explorer reads).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain_id: String,
    pub head_block_num: u64,
    pub head_block_producer: String,
    #[serde(default)]
    pub server_version_string: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Account,
    Block,
    Transaction,
    Table,
    Action,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "account",
            EntityKind::Block => "block",
            EntityKind::Transaction => "transaction",
            EntityKind::Table => "table",
            EntityKind::Action => "action",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableQuery {
    pub code: String,
    pub table: String,
    /// Defaults to `code` when unset.
    pub scope: Option<String>,
    pub lower_bound: Option<String>,
    pub upper_bound: Option<String>,
    pub reverse: bool,
}

impl TableQuery {
    pub fn new(code: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn effective_scope(&self) -> &str {
        match self.scope.as_deref().map(str::trim) {
            Some(scope) if !scope.is_empty() => scope,
            _ => &self.code,
        }
    }
}

/// Something the user asked to look at, before resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityReference {
    Account {
        name: String,
    },
    Block {
        id_or_number: String,
    },
    Transaction {
        id: String,
    },
    TableQuery(TableQuery),
    ActionSchema {
        code: String,
        action_name: String,
        initial_field_values: Option<BTreeMap<String, String>>,
    },
}

impl EntityReference {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityReference::Account { .. } => EntityKind::Account,
            EntityReference::Block { .. } => EntityKind::Block,
            EntityReference::Transaction { .. } => EntityKind::Transaction,
            EntityReference::TableQuery(_) => EntityKind::Table,
            EntityReference::ActionSchema { .. } => EntityKind::Action,
        }
    }

    pub fn account(name: impl Into<String>) -> Self {
        EntityReference::Account { name: name.into() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RamUsage {
    pub used: i64,
    pub quota: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimit {
    #[serde(default, deserialize_with = "crate::types::lenient_i64")]
    pub used: i64,
    #[serde(default, deserialize_with = "crate::types::lenient_i64")]
    pub available: i64,
    #[serde(default, deserialize_with = "crate::types::lenient_i64")]
    pub max: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: String,
    pub permission: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyWeight {
    pub key: String,
    pub weight: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevelWeight {
    pub permission: PermissionLevel,
    pub weight: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSummary {
    pub name: String,
    pub parent: String,
    pub threshold: u32,
    pub keys: Vec<KeyWeight>,
    pub accounts: Vec<PermissionLevelWeight>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_name: String,
    pub balance: String,
    pub ram: RamUsage,
    pub cpu: ResourceLimit,
    pub net: ResourceLimit,
    pub cpu_staked: String,
    pub net_staked: String,
    pub permissions: Vec<PermissionSummary>,
    pub voter_info: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub id: String,
    pub block_num: u64,
    pub timestamp: String,
    pub producer: String,
    pub previous: String,
    pub confirmed: u32,
    pub transaction_ids: Vec<String>,
}

impl BlockSummary {
    pub fn transaction_count(&self) -> usize {
        self.transaction_ids.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Executed,
    SoftFail,
    HardFail,
    Delayed,
    Expired,
    /// History index reported `executed: false`.
    NotExecuted,
    Unknown,
}

impl TxStatus {
    /// Maps a chain receipt status string (`executed`, `soft_fail`, ...).
    pub fn from_receipt(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "executed" => TxStatus::Executed,
            "soft_fail" => TxStatus::SoftFail,
            "hard_fail" => TxStatus::HardFail,
            "delayed" => TxStatus::Delayed,
            "expired" => TxStatus::Expired,
            _ => TxStatus::Unknown,
        }
    }
}

/// Which source a transaction record was normalized from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxSource {
    ChainApi,
    HistoryIndex,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub account: String,
    pub name: String,
    pub authorization: Vec<PermissionLevel>,
    pub data: Value,
}

/// Canonical transaction, identical in shape whichever source produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub block_num: u64,
    pub block_time: String,
    pub actions: Vec<ActionRecord>,
    pub status: TxStatus,
    pub source: TxSource,
}

pub type Row = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableViewMode {
    Table,
    Cards,
}

/// Loaded rows of one table query plus the cursor needed to continue it.
/// Only the pagination engine produces new values of this type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableQueryState {
    pub code: String,
    pub table: String,
    pub scope: String,
    pub lower_bound: Option<String>,
    pub upper_bound: Option<String>,
    pub reverse: bool,
    pub rows: Vec<Row>,
    pub has_more: bool,
    pub columns: Vec<String>,
    pub visible_columns: Vec<String>,
    pub view_mode: TableViewMode,
    /// Display page (zero based) over `rows`.
    pub page: usize,
    /// Last pagination failure; rows are left untouched when set.
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiStruct {
    pub name: String,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub fields: Vec<AbiField>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiAction {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ricardian_contract: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiTable {
    pub name: String,
    #[serde(default)]
    pub index_type: String,
    #[serde(default)]
    pub key_names: Vec<String>,
    #[serde(default)]
    pub key_types: Vec<String>,
    #[serde(rename = "type", default)]
    pub type_name: String,
}

/// The parts of a contract ABI the explorer uses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAbi {
    #[serde(default)]
    pub tables: Vec<AbiTable>,
    #[serde(default)]
    pub actions: Vec<AbiAction>,
    #[serde(default)]
    pub structs: Vec<AbiStruct>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSchema {
    pub account_name: String,
    pub action_name: String,
    pub fields: Vec<AbiField>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub initial_values: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedEntity {
    Account(AccountSummary),
    Block(BlockSummary),
    Transaction(TransactionRecord),
    Table(TableQueryState),
    Action(ActionSchema),
}

impl ResolvedEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            ResolvedEntity::Account(_) => EntityKind::Account,
            ResolvedEntity::Block(_) => EntityKind::Block,
            ResolvedEntity::Transaction(_) => EntityKind::Transaction,
            ResolvedEntity::Table(_) => EntityKind::Table,
            ResolvedEntity::Action(_) => EntityKind::Action,
        }
    }

    pub fn as_account(&self) -> Option<&AccountSummary> {
        match self {
            ResolvedEntity::Account(account) => Some(account),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableQueryState> {
        match self {
            ResolvedEntity::Table(state) => Some(state),
            _ => None,
        }
    }

    /// Contract account owning a table or action view.
    pub fn owning_code(&self) -> Option<&str> {
        match self {
            ResolvedEntity::Table(state) => Some(&state.code),
            ResolvedEntity::Action(schema) => Some(&schema.account_name),
            _ => None,
        }
    }
}

/// Chain endpoints report resource counters either as numbers or as
/// numeric strings depending on node version.
pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}
