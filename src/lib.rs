//! antelopex - Antelope chain explorer core
//!
//! Resolves user-typed identifiers (account names, block numbers and ids,
//! transaction ids) and deep links into normalized entities
//! against a chain connection, and keeps the navigation state the UI renders.
//!
//! ## Architecture
//!
//! - `classify`: pure identifier classification
//! - `connection`: the single active chain connection and its session
//! - `resolver` / `pagination`: chain API (and Hyperion history) lookups
//! - `context`: the detail slot with last-intent-wins updates
//! - `router` / `deep_link`: link parsing, share links and link passes
//!
//! ## Usage
//!
//! Native CLI:
//! ```bash
//! cargo run -- --chain waxmainnet eosio.token
//! ```
//!
//! Lookup relay:
//! ```bash
//! cargo run --bin antelopex-proxy --features proxy
//! ```

// Core modules (available everywhere)
pub mod config;
pub mod error;
pub mod types;

// Identifier classification and link parsing
pub mod classify;
pub mod router;

// Chain access
pub mod net;
pub mod rpc_utils;
pub mod source;

// Session persistence (SQLite backend is native-only internally)
pub mod storage;

pub mod action_data;
pub mod app;
pub mod connection;
pub mod context;
pub mod deep_link;
pub mod lookup;
pub mod pagination;
pub mod resolver;
