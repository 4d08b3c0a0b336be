//! Deep link router for antelopex
//!
//! Maps the URL parameter surface onto a resolution plan and builds share
//! links that map back onto the same plan.
//!
//! ## Supported parameters
//!
//! - `chain` - preset key (`waxmainnet`) or network name (`WAX Mainnet`)
//! - `tx=<id>` - transaction
//! - `block=<height|id>` - block
//! - `code=<account>&table=<name>` plus optional `scope`, `lower_bound`,
//!   `upper_bound`, `reverse=true` - contract table
//! - `code=<account>&action=<name>` plus `field_<name>=<value>` - action form
//! - `account=<name>` - account
//!
//! When several targets are present the first match in the order above wins.
//!
//! ## Accepted input
//!
//! - bare query: `chain=waxmainnet&account=alice`
//! - with marker: `?chain=waxmainnet&account=alice`
//! - full URL: `https://host/?account=alice#frag`
//!
//! ## Example
//!
//! ```rust,ignore
//! use antelopex::router::{parse, LinkTarget};
//!
//! let plan = parse("?chain=waxmainnet&account=alice");
//! assert_eq!(plan.chain.as_deref(), Some("waxmainnet"));
//! assert!(matches!(plan.target, Some(LinkTarget::Account { .. })));
//! ```

use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::types::{EntityKind, EntityReference, ResolvedEntity, TableQuery};

pub const FIELD_PREFIX: &str = "field_";

const LINK_KEYS: [&str; 11] = [
    "chain",
    "account",
    "block",
    "tx",
    "code",
    "table",
    "scope",
    "lower_bound",
    "upper_bound",
    "reverse",
    "action",
];

/// Parameter names owned by the deep-link decoder.
pub fn is_deep_link_key(key: &str) -> bool {
    LINK_KEYS.contains(&key) || key.starts_with(FIELD_PREFIX)
}

/// Query component of `raw`: text after `?`, without the fragment.
fn query_part(raw: &str) -> &str {
    let s = raw.trim();
    let s = match s.find('?') {
        Some(pos) => &s[pos + 1..],
        None if s.contains("://") => "",
        None => s,
    };
    match s.find('#') {
        Some(pos) => &s[..pos],
        None => s,
    }
}

pub fn parse_params(raw: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query_part(raw).as_bytes())
        .into_owned()
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkTarget {
    Account {
        name: String,
    },
    Block {
        id_or_number: String,
    },
    Transaction {
        id: String,
    },
    Table(TableQuery),
    Action {
        code: String,
        action: String,
        fields: BTreeMap<String, String>,
    },
}

impl LinkTarget {
    pub fn kind(&self) -> EntityKind {
        match self {
            LinkTarget::Account { .. } => EntityKind::Account,
            LinkTarget::Block { .. } => EntityKind::Block,
            LinkTarget::Transaction { .. } => EntityKind::Transaction,
            LinkTarget::Table(_) => EntityKind::Table,
            LinkTarget::Action { .. } => EntityKind::Action,
        }
    }

    /// Contract account resolved ahead of a table or action target.
    pub fn owning_account(&self) -> Option<&str> {
        match self {
            LinkTarget::Table(query) => Some(&query.code),
            LinkTarget::Action { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn to_reference(&self) -> EntityReference {
        match self {
            LinkTarget::Account { name } => EntityReference::account(name.clone()),
            LinkTarget::Block { id_or_number } => EntityReference::Block {
                id_or_number: id_or_number.clone(),
            },
            LinkTarget::Transaction { id } => EntityReference::Transaction { id: id.clone() },
            LinkTarget::Table(query) => EntityReference::TableQuery(query.clone()),
            LinkTarget::Action {
                code,
                action,
                fields,
            } => EntityReference::ActionSchema {
                code: code.clone(),
                action_name: action.clone(),
                initial_field_values: if fields.is_empty() {
                    None
                } else {
                    Some(fields.clone())
                },
            },
        }
    }

    /// Link target for an entity on screen. Action links carry `fields` as
    /// initial values.
    pub fn from_entity(entity: &ResolvedEntity, fields: &BTreeMap<String, String>) -> Self {
        match entity {
            ResolvedEntity::Account(a) => LinkTarget::Account {
                name: a.account_name.clone(),
            },
            ResolvedEntity::Block(b) => LinkTarget::Block {
                id_or_number: b.block_num.to_string(),
            },
            ResolvedEntity::Transaction(t) => LinkTarget::Transaction { id: t.id.clone() },
            ResolvedEntity::Table(state) => LinkTarget::Table(state.query_spec()),
            ResolvedEntity::Action(schema) => LinkTarget::Action {
                code: schema.account_name.clone(),
                action: schema.action_name.clone(),
                fields: fields
                    .iter()
                    .filter(|(_, v)| !v.trim().is_empty())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeepLinkPlan {
    pub chain: Option<String>,
    pub target: Option<LinkTarget>,
    /// Recognized parameters in address order.
    pub params: Vec<(String, String)>,
}

impl DeepLinkPlan {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Identity of the parameter set, for the handled guard.
    pub fn key(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        ser.extend_pairs(self.params.iter());
        ser.finish()
    }
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Parse a query string or URL into a plan. Blank values count as absent.
pub fn parse(raw: &str) -> DeepLinkPlan {
    let params: Vec<(String, String)> = parse_params(raw)
        .into_iter()
        .filter(|(k, _)| is_deep_link_key(k))
        .collect();

    let get = |key: &str| {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let chain = get("chain");
    let target = if let Some(id) = get("tx") {
        Some(LinkTarget::Transaction { id })
    } else if let Some(id_or_number) = get("block") {
        Some(LinkTarget::Block { id_or_number })
    } else if let (Some(code), Some(table)) = (get("code"), get("table")) {
        Some(LinkTarget::Table(TableQuery {
            code,
            table,
            scope: get("scope"),
            lower_bound: get("lower_bound"),
            upper_bound: get("upper_bound"),
            reverse: get("reverse").is_some_and(|r| truthy(&r)),
        }))
    } else if let (Some(code), Some(action)) = (get("code"), get("action")) {
        let fields = params
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(FIELD_PREFIX)
                    .filter(|name| !name.is_empty())
                    .map(|name| (name.to_string(), v.clone()))
            })
            .collect();
        Some(LinkTarget::Action {
            code,
            action,
            fields,
        })
    } else {
        get("account").map(|name| LinkTarget::Account { name })
    };

    DeepLinkPlan {
        chain,
        target,
        params,
    }
}

/// Query string with every deep-link parameter removed; other parameters
/// keep their order.
pub fn strip_link_params(raw_query: &str) -> String {
    let kept: Vec<(String, String)> = parse_params(raw_query)
        .into_iter()
        .filter(|(k, _)| !is_deep_link_key(k))
        .collect();
    let mut ser = form_urlencoded::Serializer::new(String::new());
    ser.extend_pairs(kept.iter());
    ser.finish()
}

/// Shareable URL for `target` on `chain`. `base` is the page URL without a
/// query.
pub fn share_link(base: &str, chain: Option<&str>, target: &LinkTarget) -> String {
    let mut ser = form_urlencoded::Serializer::new(String::new());
    if let Some(chain) = chain.filter(|c| !c.is_empty()) {
        ser.append_pair("chain", chain);
    }
    match target {
        LinkTarget::Account { name } => {
            ser.append_pair("account", name);
        }
        LinkTarget::Block { id_or_number } => {
            ser.append_pair("block", id_or_number);
        }
        LinkTarget::Transaction { id } => {
            ser.append_pair("tx", id);
        }
        LinkTarget::Table(query) => {
            ser.append_pair("code", &query.code);
            ser.append_pair("table", &query.table);
            let scope = query.effective_scope();
            if scope != query.code {
                ser.append_pair("scope", scope);
            }
            if let Some(lb) = query.lower_bound.as_deref().filter(|v| !v.is_empty()) {
                ser.append_pair("lower_bound", lb);
            }
            if let Some(ub) = query.upper_bound.as_deref().filter(|v| !v.is_empty()) {
                ser.append_pair("upper_bound", ub);
            }
            if query.reverse {
                ser.append_pair("reverse", "true");
            }
        }
        LinkTarget::Action {
            code,
            action,
            fields,
        } => {
            ser.append_pair("code", code);
            ser.append_pair("action", action);
            for (name, value) in fields {
                ser.append_pair(&format!("{FIELD_PREFIX}{name}"), value);
            }
        }
    }
    format!("{}?{}", base.trim_end_matches('?'), ser.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_account() {
        let plan = parse("?chain=waxmainnet&account=alice");
        assert_eq!(plan.chain.as_deref(), Some("waxmainnet"));
        assert_eq!(
            plan.target,
            Some(LinkTarget::Account {
                name: "alice".to_string()
            })
        );
    }

    #[test]
    fn test_parse_full_url() {
        let plan = parse("https://explorer.example/?utm=x&block=12345#top");
        assert_eq!(
            plan.target,
            Some(LinkTarget::Block {
                id_or_number: "12345".to_string()
            })
        );
        assert_eq!(plan.params.len(), 1);
        assert!(parse("https://explorer.example/").is_empty());
    }

    #[test]
    fn test_parse_table() {
        let plan = parse("code=eosio.token&table=accounts&scope=alice&lower_bound=EOS&reverse=true");
        match plan.target {
            Some(LinkTarget::Table(q)) => {
                assert_eq!(q.code, "eosio.token");
                assert_eq!(q.effective_scope(), "alice");
                assert_eq!(q.lower_bound.as_deref(), Some("EOS"));
                assert!(q.reverse);
            }
            other => panic!("Expected table target, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_action_fields() {
        let plan = parse("code=eosio.token&action=transfer&field_to=bob&field_memo=hi%20there&field_=x");
        match plan.target {
            Some(LinkTarget::Action { code, action, fields }) => {
                assert_eq!(code, "eosio.token");
                assert_eq!(action, "transfer");
                assert_eq!(fields.len(), 2);
                assert_eq!(fields["memo"], "hi there");
            }
            other => panic!("Expected action target, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence() {
        let tx = "b".repeat(64);
        let plan = parse(&format!("account=alice&block=5&tx={tx}"));
        assert_eq!(plan.target.map(|t| t.kind()), Some(EntityKind::Transaction));
        let plan = parse("account=alice&code=eosio&table=producers&action=vote");
        assert_eq!(plan.target.map(|t| t.kind()), Some(EntityKind::Table));
        let plan = parse("account=alice&code=eosio");
        assert_eq!(plan.target.map(|t| t.kind()), Some(EntityKind::Account));
    }

    #[test]
    fn test_blank_values_are_absent() {
        let plan = parse("chain=&account=");
        assert!(plan.chain.is_none());
        assert!(plan.target.is_none());
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_strip_keeps_foreign_params() {
        assert_eq!(strip_link_params("?utm=1&account=alice&field_x=2&ref=abc"), "utm=1&ref=abc");
        assert_eq!(strip_link_params("account=alice"), "");
    }

    #[test]
    fn test_share_link_round_trip() {
        let mut query = TableQuery::new("eosio.token", "accounts");
        query.scope = Some("eosio.token".into());
        query.upper_bound = Some("WAX".into());
        query.reverse = true;
        let target = LinkTarget::Table(query);
        let link = share_link("https://explorer.example/", Some("waxmainnet"), &target);
        assert_eq!(
            link,
            "https://explorer.example/?chain=waxmainnet&code=eosio.token&table=accounts&upper_bound=WAX&reverse=true"
        );
        let plan = parse(&link);
        assert_eq!(plan.chain.as_deref(), Some("waxmainnet"));
        assert_eq!(plan.target.map(|t| t.kind()), Some(EntityKind::Table));
    }

    #[test]
    fn test_action_share_link_encodes_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("memo".to_string(), "a b&c".to_string());
        let target = LinkTarget::Action {
            code: "eosio.token".into(),
            action: "transfer".into(),
            fields,
        };
        let link = share_link("https://x", None, &target);
        assert_eq!(link, "https://x?code=eosio.token&action=transfer&field_memo=a+b%26c");
        assert_eq!(parse(&link).target, Some(target));
    }
}
