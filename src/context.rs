//! Navigation context store: the single "currently displayed entity" slot.
//!
//! Every transition replaces the whole `DetailContext` inside one
//! `watch::Sender::send_if_modified` call, so subscribers never observe a
//! half-applied update. Asynchronous callers tag their work with an
//! `IntentToken`; a result whose token has been superseded by a newer
//! navigation is dropped instead of applied.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::watch;

use crate::types::{AccountSummary, EntityKind, ResolvedEntity};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DetailContext {
    /// `None` while empty or while a loading placeholder is shown.
    pub active_entity: Option<ResolvedEntity>,
    pub active_kind: Option<EntityKind>,
    /// Account a table or action view was drilled into from.
    pub parent_account: Option<AccountSummary>,
    pub expanded: bool,
    pub loading: bool,
}

impl DetailContext {
    pub fn is_placeholder(&self) -> bool {
        self.loading && self.active_entity.is_none()
    }

    pub fn active_account(&self) -> Option<&AccountSummary> {
        self.active_entity.as_ref().and_then(ResolvedEntity::as_account)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub expand: Option<bool>,
}

impl SetOptions {
    pub fn expanded() -> Self {
        Self { expand: Some(true) }
    }
}

/// Identifies one navigation intent. Only the most recent token may write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntentToken(u64);

/// Parent to keep when `incoming` replaces what `current` shows: the
/// account drilled down from, and only while `incoming` belongs to it.
fn next_parent(current: &DetailContext, incoming: &ResolvedEntity) -> Option<AccountSummary> {
    let code = incoming.owning_code()?;
    let candidate = match &current.active_entity {
        Some(ResolvedEntity::Account(account)) => Some(account),
        Some(ResolvedEntity::Table(_)) | Some(ResolvedEntity::Action(_)) => {
            current.parent_account.as_ref()
        }
        _ => None,
    };
    candidate.filter(|a| a.account_name == code).cloned()
}

/// Pure transition used by `apply`.
pub fn transition(current: &DetailContext, entity: ResolvedEntity, opts: SetOptions) -> DetailContext {
    let kind = entity.kind();
    DetailContext {
        parent_account: next_parent(current, &entity),
        active_kind: Some(kind),
        active_entity: Some(entity),
        expanded: opts.expand.unwrap_or(current.expanded),
        loading: false,
    }
}

pub struct DetailStore {
    state: watch::Sender<DetailContext>,
    intent: AtomicU64,
}

impl Default for DetailStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DetailStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(DetailContext::default());
        Self {
            state,
            intent: AtomicU64::new(0),
        }
    }

    /// Read-only accessor for the rendering layer.
    pub fn subscribe(&self) -> watch::Receiver<DetailContext> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> DetailContext {
        self.state.borrow().clone()
    }

    /// Starts a new navigation intent, superseding every earlier one.
    pub fn begin_intent(&self) -> IntentToken {
        IntentToken(self.intent.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: IntentToken) -> bool {
        self.intent.load(Ordering::SeqCst) == token.0
    }

    /// Untagged replacement for synchronous callers.
    pub fn set_context(&self, entity: ResolvedEntity, opts: SetOptions) {
        let token = self.begin_intent();
        self.apply(token, entity, opts);
    }

    /// Applies a resolved entity unless `token` went stale. Returns whether
    /// it was applied.
    pub fn apply(&self, token: IntentToken, entity: ResolvedEntity, opts: SetOptions) -> bool {
        let kind = entity.kind();
        let applied = self.state.send_if_modified(|ctx| {
            if !self.is_current(token) {
                return false;
            }
            *ctx = transition(ctx, entity, opts);
            true
        });
        if !applied {
            log::debug!("dropping stale {kind} result for intent {}", token.0);
        }
        applied
    }

    /// Shows a loading placeholder for `kind`. The placeholder has no parent;
    /// a later `apply` of the owning account provides one.
    pub fn set_loading(&self, token: IntentToken, kind: EntityKind) -> bool {
        self.state.send_if_modified(|ctx| {
            if !self.is_current(token) {
                return false;
            }
            *ctx = DetailContext {
                parent_account: None,
                active_entity: None,
                active_kind: Some(kind),
                expanded: ctx.expanded,
                loading: true,
            };
            true
        })
    }

    /// Restores the parent account. No-op (returns false) without a parent.
    pub fn back_to_account(&self) -> bool {
        let applied = self.state.send_if_modified(|ctx| {
            let Some(parent) = ctx.parent_account.take() else {
                return false;
            };
            *ctx = DetailContext {
                active_entity: Some(ResolvedEntity::Account(parent)),
                active_kind: Some(EntityKind::Account),
                parent_account: None,
                expanded: ctx.expanded,
                loading: false,
            };
            true
        });
        if applied {
            self.begin_intent();
        }
        applied
    }

    pub fn clear_context(&self) {
        self.begin_intent();
        self.state.send_modify(|ctx| {
            *ctx = DetailContext {
                expanded: ctx.expanded,
                ..DetailContext::default()
            };
        });
    }

    pub fn toggle_expanded(&self) {
        self.state.send_modify(|ctx| ctx.expanded = !ctx.expanded);
    }
}
