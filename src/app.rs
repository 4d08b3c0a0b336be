use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::action_data::ActionForm;
use crate::classify::{classify_query, validate_reference};
use crate::connection::{preset_key_for, ChainStatus, ConnectionManager, ConnectionStatus};
use crate::context::{DetailContext, DetailStore, SetOptions};
use crate::error::ResolutionError;
use crate::pagination::{Paginator, QueryOverrides};
use crate::resolver::Resolver;
use crate::router::{share_link, LinkTarget};
use crate::source::ChainSource;
use crate::storage::SessionStorage;
use crate::types::{ContractAbi, EntityReference, ResolvedEntity, TableQuery};

/// Main area shown next to the sidebar.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Chat,
    Dashboard,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UiState {
    pub view: View,
    /// Failure of the last explicit user action.
    pub error: Option<String>,
}

/// Outcome of a navigation request that did not fail.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    Applied,
    /// A newer navigation or a connection switch won; the result was dropped.
    Superseded,
    /// Nothing to navigate from (e.g. drill-down without an account on screen).
    Ignored,
}

enum TableOp {
    LoadMore,
    Query(QueryOverrides),
}

/// Application state: one connection manager, one detail slot, and the
/// stateless services wired between them.
pub struct Explorer {
    connections: ConnectionManager,
    resolver: Arc<Resolver>,
    paginator: Paginator,
    detail: DetailStore,
    ui: watch::Sender<UiState>,
}

impl Explorer {
    pub fn new(
        source: Arc<dyn ChainSource>,
        storage: Arc<dyn SessionStorage>,
        table_limit: u32,
    ) -> Self {
        let resolver = Arc::new(Resolver::with_table_limit(source.clone(), table_limit));
        let (ui, _) = watch::channel(UiState::default());
        Self {
            connections: ConnectionManager::new(source, storage),
            paginator: Paginator::new(resolver.clone()),
            resolver,
            detail: DetailStore::new(),
            ui,
        }
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }
    pub fn detail(&self) -> &DetailStore {
        &self.detail
    }
    pub fn context(&self) -> DetailContext {
        self.detail.snapshot()
    }

    pub fn subscribe_ui(&self) -> watch::Receiver<UiState> {
        self.ui.subscribe()
    }
    pub fn ui(&self) -> UiState {
        self.ui.borrow().clone()
    }
    pub fn set_view(&self, view: View) {
        self.ui.send_if_modified(|ui| {
            let changed = ui.view != view;
            ui.view = view;
            changed
        });
    }
    pub fn clear_error(&self) {
        self.set_error(None);
    }

    fn set_error(&self, error: Option<String>) {
        self.ui.send_if_modified(|ui| {
            let changed = ui.error != error;
            ui.error = error;
            changed
        });
    }

    fn fail(&self, err: &ResolutionError) {
        log::warn!("navigation failed: {err}");
        self.set_error(Some(err.to_string()));
    }

    pub fn chain_status(&self) -> Option<ChainStatus> {
        self.connections.status()
    }

    /// Free text from the chat box.
    pub async fn lookup(&self, text: &str) -> Result<Navigation, ResolutionError> {
        match classify_query(text) {
            Ok(reference) => self.navigate(reference).await,
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Resolves `reference` against the settled connection and shows it.
    pub async fn navigate(&self, reference: EntityReference) -> Result<Navigation, ResolutionError> {
        if let Err(e) = validate_reference(&reference) {
            self.fail(&e);
            return Err(e);
        }
        let token = self.detail.begin_intent();
        let state = self.connections.wait_settled().await;
        let conn = match (&state.status, &state.connection) {
            (ConnectionStatus::Connected, Some(conn)) => conn.clone(),
            _ => {
                let e = ResolutionError::not_connected();
                self.fail(&e);
                return Err(e);
            }
        };

        match self.resolver.resolve(&reference, &conn).await {
            Ok(entity) => {
                if !self.connections.is_current(state.generation) {
                    log::info!("dropping {} from {}: connection switched", entity.kind(), conn.name);
                    return Ok(Navigation::Superseded);
                }
                if self.detail.apply(token, entity, SetOptions::expanded()) {
                    self.clear_error();
                    Ok(Navigation::Applied)
                } else {
                    Ok(Navigation::Superseded)
                }
            }
            Err(e) => {
                if !self.detail.is_current(token) || !self.connections.is_current(state.generation) {
                    log::debug!("ignoring stale failure: {e}");
                    return Ok(Navigation::Superseded);
                }
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Contract account behind the current view: the account itself, or
    /// the code of a table or action view.
    fn current_code(&self) -> Option<String> {
        let ctx = self.detail.snapshot();
        let entity = ctx.active_entity?;
        match &entity {
            ResolvedEntity::Account(a) => Some(a.account_name.clone()),
            other => other.owning_code().map(str::to_string),
        }
    }

    /// Drill from the account on screen into one of its tables.
    pub async fn open_table(&self, table: &str) -> Result<Navigation, ResolutionError> {
        let Some(code) = self.current_code() else {
            return Ok(Navigation::Ignored);
        };
        self.navigate(EntityReference::TableQuery(TableQuery::new(code, table)))
            .await
    }

    /// Drill from the account on screen into one of its actions.
    pub async fn open_action(&self, action: &str) -> Result<Navigation, ResolutionError> {
        let Some(code) = self.current_code() else {
            return Ok(Navigation::Ignored);
        };
        self.navigate(EntityReference::ActionSchema {
            code,
            action_name: action.to_string(),
            initial_field_values: None,
        })
        .await
    }

    /// From a table or action view: back to the parent account when there is
    /// one, otherwise a fresh lookup of the owning contract.
    pub async fn go_to_account(&self) -> Result<Navigation, ResolutionError> {
        if self.detail.back_to_account() {
            return Ok(Navigation::Applied);
        }
        let ctx = self.detail.snapshot();
        match ctx.active_entity.as_ref().and_then(ResolvedEntity::owning_code) {
            Some(code) => self.navigate(EntityReference::account(code)).await,
            None => Ok(Navigation::Ignored),
        }
    }

    pub fn back_to_account(&self) -> bool {
        self.detail.back_to_account()
    }

    pub fn toggle_expanded(&self) {
        self.detail.toggle_expanded();
    }

    pub fn clear_context(&self) {
        self.detail.clear_context();
    }

    /// Appends the next page to the table on screen.
    pub async fn load_more(&self) -> Navigation {
        self.update_table(TableOp::LoadMore).await
    }

    /// Re-runs the table on screen with edited scope, bounds or direction.
    pub async fn requery(&self, overrides: QueryOverrides) -> Navigation {
        self.update_table(TableOp::Query(overrides)).await
    }

    async fn update_table(&self, op: TableOp) -> Navigation {
        let ctx = self.detail.snapshot();
        let Some(ResolvedEntity::Table(state)) = ctx.active_entity else {
            return Navigation::Ignored;
        };
        let Some(conn) = self.connections.active() else {
            self.fail(&ResolutionError::not_connected());
            return Navigation::Ignored;
        };
        let token = self.detail.begin_intent();
        let generation = self.connections.generation();
        let next = match op {
            TableOp::LoadMore => self.paginator.load_more(&state, &conn).await,
            TableOp::Query(overrides) => self.paginator.query(&state, &overrides, &conn).await,
        };
        if !self.connections.is_current(generation) {
            return Navigation::Superseded;
        }
        match &next.error {
            Some(e) => self.set_error(Some(e.clone())),
            None => self.clear_error(),
        }
        if self.detail.apply(token, ResolvedEntity::Table(next), SetOptions::default()) {
            Navigation::Applied
        } else {
            Navigation::Superseded
        }
    }

    /// ABI summary of the account on screen. Best effort: failures are
    /// logged and yield `None` without touching the visible error.
    pub async fn account_abi(&self) -> Option<ContractAbi> {
        let ctx = self.detail.snapshot();
        let name = ctx.active_account()?.account_name.clone();
        let conn = self.connections.active()?;
        match self.resolver.contract_abi(&conn, &name).await {
            Ok(abi) => Some(abi),
            Err(e) => {
                log::debug!("abi prefetch for {name} failed: {e}");
                None
            }
        }
    }

    /// Form for the action on screen.
    pub fn action_form(&self) -> Option<ActionForm> {
        match self.detail.snapshot().active_entity {
            Some(ResolvedEntity::Action(schema)) => Some(ActionForm::from_schema(&schema)),
            _ => None,
        }
    }

    /// `cleos` preview for `form` against the active endpoint.
    pub fn cleos_command(&self, form: &ActionForm, signer: Option<(&str, &str)>) -> String {
        let endpoint = self.connections.active().map(|c| c.endpoint.clone());
        form.cleos_command(endpoint.as_deref(), signer)
    }

    /// Shareable link for the entity on screen. `fields` are the action
    /// form's raw values, ignored for other entities.
    pub fn share_link(&self, base: &str, fields: &BTreeMap<String, String>) -> Option<String> {
        let ctx = self.detail.snapshot();
        let entity = ctx.active_entity.as_ref()?;
        let chain = self
            .connections
            .active()
            .map(|c| preset_key_for(&c.name).map(str::to_string).unwrap_or_else(|| c.name.clone()));
        let target = LinkTarget::from_entity(entity, fields);
        Some(share_link(base, chain.as_deref(), &target))
    }
}
