//! Pagination cursor engine for table rows.
//!
//! `query` replaces the loaded rows; `load_more` continues from the primary
//! key of the last loaded row. The node treats that bound as inclusive, so
//! the boundary row comes back again and is filtered out before appending.
//! Both return a new `TableQueryState` and never mutate the input.

use std::sync::Arc;

use serde_json::Value;

use crate::error::ResolutionError;
use crate::resolver::{Resolver, TablePage};
use crate::types::{ChainConnection, Row, TableQuery, TableQueryState, TableViewMode};

/// More columns than this switches the default view to cards.
pub const CARD_VIEW_COLUMN_THRESHOLD: usize = 4;
/// Rows per display page.
pub const DISPLAY_PAGE_SIZE: usize = 20;

/// User edits applied by `query`. `None` keeps the current value; an empty
/// string clears it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryOverrides {
    pub scope: Option<String>,
    pub lower_bound: Option<String>,
    pub upper_bound: Option<String>,
    pub reverse: Option<bool>,
}

/// String form of a key cell, as sent back to the node as a bound.
pub fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn columns_of(rows: &[Row]) -> Vec<String> {
    rows.first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

impl TableQueryState {
    pub fn from_page(query: &TableQuery, page: TablePage) -> Self {
        let columns = columns_of(&page.rows);
        let visible_columns = columns
            .iter()
            .take(CARD_VIEW_COLUMN_THRESHOLD)
            .cloned()
            .collect();
        let view_mode = if columns.len() > CARD_VIEW_COLUMN_THRESHOLD {
            TableViewMode::Cards
        } else {
            TableViewMode::Table
        };
        Self {
            code: query.code.clone(),
            table: query.table.clone(),
            scope: query.effective_scope().to_string(),
            lower_bound: query.lower_bound.clone(),
            upper_bound: query.upper_bound.clone(),
            reverse: query.reverse,
            rows: page.rows,
            has_more: page.more,
            columns,
            visible_columns,
            view_mode,
            page: 0,
            error: None,
        }
    }

    /// The query this state was loaded with.
    pub fn query_spec(&self) -> TableQuery {
        TableQuery {
            code: self.code.clone(),
            table: self.table.clone(),
            scope: Some(self.scope.clone()),
            lower_bound: self.lower_bound.clone(),
            upper_bound: self.upper_bound.clone(),
            reverse: self.reverse,
        }
    }

    /// First column of the first row.
    pub fn primary_key_column(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    pub fn last_primary_key(&self) -> Option<String> {
        let column = self.primary_key_column()?;
        let last = self.rows.last()?;
        Some(last.get(column).map(key_string).unwrap_or_default())
    }

    pub fn page_count(&self) -> usize {
        self.rows.len().div_ceil(DISPLAY_PAGE_SIZE)
    }

    pub fn page_rows(&self) -> &[Row] {
        let start = (self.page * DISPLAY_PAGE_SIZE).min(self.rows.len());
        let end = (start + DISPLAY_PAGE_SIZE).min(self.rows.len());
        &self.rows[start..end]
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.min(self.page_count().saturating_sub(1));
    }

    /// Show or hide a column; the last visible column cannot be hidden.
    pub fn toggle_column(&mut self, column: &str) {
        if let Some(idx) = self.visible_columns.iter().position(|c| c == column) {
            if self.visible_columns.len() > 1 {
                self.visible_columns.remove(idx);
            }
        } else if self.columns.iter().any(|c| c == column) {
            self.visible_columns.push(column.to_string());
            // keep declaration order
            let order = &self.columns;
            self.visible_columns
                .sort_by_key(|c| order.iter().position(|o| o == c));
        }
    }

    pub fn set_view_mode(&mut self, mode: TableViewMode) {
        self.view_mode = mode;
    }

    fn with_error(&self, err: &ResolutionError) -> Self {
        let mut next = self.clone();
        next.error = Some(err.to_string());
        next
    }
}

/// Appends `page` to `state`, dropping rows whose primary key equals the
/// inclusive `bound`. Display page and column choices are kept.
pub fn append_page(state: &TableQueryState, bound: &str, page: TablePage) -> TableQueryState {
    let mut next = state.clone();
    let before = next.rows.len();
    match state.primary_key_column() {
        Some(column) => {
            let column = column.to_string();
            next.rows.extend(page.rows.into_iter().filter(|row| {
                row.get(&column).map(key_string).unwrap_or_default() != bound
            }));
        }
        None => next.rows.extend(page.rows),
    }
    let appended = next.rows.len() - before;
    log::debug!(
        "load_more {}/{} bound={bound} appended={appended} more={}",
        state.code,
        state.table,
        page.more
    );
    // A page holding only the boundary row cannot advance the cursor.
    next.has_more = page.more && appended > 0;
    next.error = None;
    next
}

pub struct Paginator {
    resolver: Arc<Resolver>,
}

impl Paginator {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    /// Full reset with the given overrides applied.
    pub async fn query(
        &self,
        state: &TableQueryState,
        overrides: &QueryOverrides,
        conn: &ChainConnection,
    ) -> TableQueryState {
        let mut spec = state.query_spec();
        if let Some(scope) = &overrides.scope {
            spec.scope = Some(scope.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(lower) = &overrides.lower_bound {
            spec.lower_bound = Some(lower.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(upper) = &overrides.upper_bound {
            spec.upper_bound = Some(upper.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(reverse) = overrides.reverse {
            spec.reverse = reverse;
        }
        match self.resolver.table(conn, &spec).await {
            Ok(next) => next,
            Err(e) => {
                log::warn!("table query {}/{} failed: {e}", spec.code, spec.table);
                state.with_error(&e)
            }
        }
    }

    /// Next page after the last loaded row. Empty state is a no-op.
    pub async fn load_more(
        &self,
        state: &TableQueryState,
        conn: &ChainConnection,
    ) -> TableQueryState {
        let Some(bound) = state.last_primary_key() else {
            return state.clone();
        };
        let mut spec = state.query_spec();
        // Reverse scans walk downwards, so the cursor caps the top instead.
        if state.reverse {
            spec.upper_bound = Some(bound.clone());
        } else {
            spec.lower_bound = Some(bound.clone());
        }
        match self.resolver.fetch_table_page(conn, &spec).await {
            Ok(page) => append_page(state, &bound, page),
            Err(e) => {
                log::warn!("load_more {}/{} failed: {e}", state.code, state.table);
                state.with_error(&e)
            }
        }
    }
}
