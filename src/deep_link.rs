//! Deep-link decoder.
//!
//! A pass reads the address parameters, makes sure the right chain is
//! connected, then resolves the requested entity into the detail slot.
//! Parameters are stripped from the address only after the loading
//! placeholder is up, so a reload before that point retries the link. A
//! handled guard keyed on the parameter set makes repeated passes over the
//! same address no-ops.

use std::sync::Mutex;

use futures::future::join;

use crate::app::{Explorer, View};
use crate::classify::validate_reference;
use crate::connection::find_preset;
use crate::context::SetOptions;
use crate::error::ConnectError;
use crate::router::{parse, strip_link_params};
use crate::types::{EntityKind, ResolvedEntity};

/// The host's address bar. `replace_query` must not add a history entry.
pub trait AddressBar: Send + Sync {
    /// Current query string, with or without the leading `?`.
    fn query(&self) -> String;
    fn replace_query(&self, query: &str);
}

/// Address bar held in memory (CLI, tests).
#[derive(Debug, Default)]
pub struct MemoryAddressBar {
    query: Mutex<String>,
}

impl MemoryAddressBar {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Mutex::new(query.into()),
        }
    }
}

impl AddressBar for MemoryAddressBar {
    fn query(&self) -> String {
        self.query
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }

    fn replace_query(&self, query: &str) {
        if let Ok(mut q) = self.query.lock() {
            *q = query.to_string();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// No deep-link parameters in the address.
    Idle,
    AlreadyHandled,
    /// Connected to the chain named by the link; run another pass.
    SwitchingChain,
    /// The chain named by the link could not be connected.
    ChainSwitchFailed,
    /// No settled connection yet.
    AwaitingConnection,
    /// Malformed identifier; stripped without any request.
    Rejected,
    Resolved(EntityKind),
    /// Resolution failed; the placeholder stays.
    Unresolved(EntityKind),
    /// Connection switched or a newer navigation won while resolving.
    Stale,
    /// Only a `chain` parameter; nothing else to resolve.
    Connected,
}

#[derive(Debug, Default)]
pub struct DeepLinkDecoder {
    handled: Option<String>,
}

impl DeepLinkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn mark_handled(&mut self, key: String) {
        self.handled = Some(key);
    }

    /// One pass over the current address.
    pub async fn pass(&mut self, app: &Explorer, bar: &dyn AddressBar) -> PassOutcome {
        let query = bar.query();
        let plan = parse(&query);
        if plan.is_empty() {
            return PassOutcome::Idle;
        }
        let key = plan.key();
        if self.handled.as_deref() == Some(key.as_str()) {
            return PassOutcome::AlreadyHandled;
        }

        // 1. chain switch
        if let Some(chain) = plan.chain.as_deref() {
            match find_preset(chain) {
                Some(preset) if !app.connections().snapshot().targets(preset.name) => {
                    log::info!("🔗 link asks for {}; switching", preset.name);
                    return match app.connections().connect_preset(preset.key, None).await {
                        Ok(_) => PassOutcome::SwitchingChain,
                        Err(ConnectError::Superseded) => PassOutcome::AwaitingConnection,
                        Err(e) => {
                            log::warn!("link chain switch to {} failed: {e}", preset.name);
                            self.mark_handled(key);
                            PassOutcome::ChainSwitchFailed
                        }
                    };
                }
                Some(_) => {}
                None => log::warn!("unknown chain '{chain}' in link; using active connection"),
            }
        }

        // 2. wait for a settled connection
        let state = app.connections().snapshot();
        let conn = match (&state.connection, state.is_connecting()) {
            (Some(conn), false) => conn.clone(),
            _ => return PassOutcome::AwaitingConnection,
        };

        let Some(target) = plan.target.clone() else {
            self.mark_handled(key);
            bar.replace_query(&strip_link_params(&query));
            return PassOutcome::Connected;
        };
        let kind = target.kind();
        let reference = target.to_reference();
        if let Err(e) = validate_reference(&reference) {
            log::warn!("rejecting link {kind}: {e}");
            self.mark_handled(key);
            bar.replace_query(&strip_link_params(&query));
            return PassOutcome::Rejected;
        }

        // 3. guard, view, placeholder, then strip
        self.mark_handled(key);
        app.set_view(View::Chat);
        let token = app.detail().begin_intent();
        app.detail().set_loading(token, kind);
        bar.replace_query(&strip_link_params(&query));

        // 4. resolve
        let resolver = app.resolver();
        let generation = state.generation;
        let (owner, resolved) = match target.owning_account() {
            Some(owner) => {
                let (account, entity) =
                    join(resolver.account(&conn, owner), resolver.resolve(&reference, &conn)).await;
                (Some(account), entity)
            }
            None => (None, resolver.resolve(&reference, &conn).await),
        };

        if !app.connections().is_current(generation) {
            log::info!("dropping link {kind}: connection switched");
            return PassOutcome::Stale;
        }
        let entity = match resolved {
            Ok(entity) => entity,
            Err(e) => {
                log::warn!("link {kind} did not resolve: {e}");
                return PassOutcome::Unresolved(kind);
            }
        };

        // 5. composite links show the owning account first so back
        // navigation has a parent
        match owner {
            Some(Ok(account)) => {
                if !app
                    .detail()
                    .apply(token, ResolvedEntity::Account(account), SetOptions::expanded())
                {
                    return PassOutcome::Stale;
                }
            }
            Some(Err(e)) => log::debug!("owner of {kind} link did not resolve: {e}"),
            None => {}
        }
        if app.detail().apply(token, entity, SetOptions::expanded()) {
            log::info!("🔗 link resolved {kind}");
            PassOutcome::Resolved(kind)
        } else {
            PassOutcome::Stale
        }
    }

    /// Runs passes until one settles: re-runs right after a chain switch and
    /// waits for the next connection change while a connect is in flight.
    /// Without a connection and with nothing connecting it gives up with
    /// `AwaitingConnection`.
    pub async fn run(&mut self, app: &Explorer, bar: &dyn AddressBar) -> PassOutcome {
        let mut changes = app.connections().subscribe();
        loop {
            changes.borrow_and_update();
            match self.pass(app, bar).await {
                PassOutcome::SwitchingChain => continue,
                PassOutcome::AwaitingConnection => {
                    let idle = {
                        let state = changes.borrow();
                        state.connection.is_none() && !state.is_connecting()
                    };
                    if idle {
                        log::warn!("link needs a chain connection and none is in progress");
                        return PassOutcome::AwaitingConnection;
                    }
                    if changes.changed().await.is_err() {
                        return PassOutcome::AwaitingConnection;
                    }
                }
                other => return other,
            }
        }
    }
}
