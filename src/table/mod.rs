//! Server-driven data table engine.
//!
//! A [`Table`] owns the presentation state of one data grid (sorting,
//! filters, pagination, column order and visibility, selection, expansion)
//! and runs in one of two modes:
//!
//! - **Client mode** filters, sorts and paginates its rows in memory.
//! - **Server mode** renders the rows it was given verbatim and turns every
//!   query change into a [`FetchRequest`] handed to the caller's callback.
//!   Each request carries a sequence number; only the response to the latest
//!   one is applied.
//!
//! # Example
//!
//! ```ignore
//! use adminkit::table::{Column, Table};
//!
//! let mut table = Table::builder(vec![
//!     Column::new("name", "Name"),
//!     Column::new("email", "Email"),
//! ])
//! .server(Some(95), move |req| {
//!     let _ = tx.send(req.clone());
//! })
//! .build()?;
//!
//! table.set_global_filter("ada");      // dispatches page 0
//! table.apply(seq, rows, Some(3))?;    // response for the latest request
//! let view = table.view();
//! ```

pub mod column;
pub mod filter;
pub mod order;
pub mod persist;
pub mod sort;
pub mod state;
pub mod view;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::Table as TableConfig;
use crate::{Error, Result};

pub use column::{Column, EXPAND_COLUMN, SELECT_COLUMN, display_value, is_pseudo};
pub use filter::{Facet, FacetOption};
pub use order::Direction;
pub use persist::{FileStorage, MemoryStorage, Storage, VisibilityStore, visibility_key};
pub use state::{
    ColumnFilters, FetchRequest, Pagination, Query, SortDirection, SortKey, TableState,
};
pub use view::{Cell, FacetView, HeaderCell, PageInfo, TableView, ViewRow};

/// Callback receiving every server-mode query.
pub type FetchFn = Box<dyn Fn(&FetchRequest) + Send + Sync>;

/// Renders the expansion content for a row.
pub type ExpandFn<R> = Arc<dyn Fn(&R) -> String + Send + Sync>;

/// Derives a stable id for a row.
pub type RowIdFn<R> = Arc<dyn Fn(&R) -> String + Send + Sync>;

enum Mode {
    Client,
    Server(Server),
}

struct Server {
    total: Option<usize>,
    fetch: FetchFn,
    seq: u64,
    last_sent: Option<Query>,
}

/// Builder for [`Table`].
pub struct TableBuilder<R> {
    columns: Vec<Column<R>>,
    rows: Vec<R>,
    server: Option<(Option<usize>, FetchFn)>,
    facets: Vec<Facet>,
    expansion: Option<ExpandFn<R>>,
    selectable: bool,
    row_id: Option<RowIdFn<R>>,
    persist: Option<(String, Arc<dyn Storage>)>,
    config: TableConfig,
}

impl<R: Serialize> TableBuilder<R> {
    pub fn rows(mut self, rows: Vec<R>) -> Self {
        self.rows = rows;
        self
    }

    /// Switch to server mode with a known (or unknown) total row count.
    pub fn server<F>(mut self, total: Option<usize>, fetch: F) -> Self
    where
        F: Fn(&FetchRequest) + Send + Sync + 'static,
    {
        self.server = Some((total, Box::new(fetch)));
        self
    }

    pub fn facet(mut self, facet: Facet) -> Self {
        self.facets.push(facet);
        self
    }

    /// Enable row expansion with the given content renderer.
    pub fn expansion<F>(mut self, render: F) -> Self
    where
        F: Fn(&R) -> String + Send + Sync + 'static,
    {
        self.expansion = Some(Arc::new(render));
        self
    }

    /// Add the row-selection checkbox column.
    pub fn selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    pub fn row_id<F>(mut self, f: F) -> Self
    where
        F: Fn(&R) -> String + Send + Sync + 'static,
    {
        self.row_id = Some(Arc::new(f));
        self
    }

    /// Persist column visibility for this route in `storage`.
    pub fn persist(mut self, route: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        self.persist = Some((route.into(), storage));
        self
    }

    pub fn config(mut self, config: &TableConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Assemble the table, rehydrate persisted visibility and, in server
    /// mode, dispatch the initial query.
    pub fn build(self) -> Result<Table<R>> {
        let mut columns = Vec::with_capacity(self.columns.len() + 2);
        if self.selectable {
            columns.push(Column::pseudo(SELECT_COLUMN));
        }
        if self.expansion.is_some() {
            columns.push(Column::pseudo(EXPAND_COLUMN));
        }

        let mut seen = BTreeSet::new();
        for column in self.columns {
            if is_pseudo(column.id()) {
                return Err(Error::InvalidColumnOrder(format!(
                    "`{}` is a reserved column id",
                    column.id()
                )));
            }
            if !seen.insert(column.id().to_string()) {
                return Err(Error::InvalidColumnOrder(format!(
                    "duplicate column id `{}`",
                    column.id()
                )));
            }
            columns.push(column);
        }
        if let Some(facet) = self.facets.iter().find(|f| !seen.contains(&f.column_id)) {
            return Err(Error::UnknownColumn(facet.column_id.clone()));
        }

        let page_size = self.config.default_page_size;
        if page_size == 0 {
            return Err(Error::InvalidPageSize(page_size));
        }

        let column_ids: Vec<String> = columns.iter().map(|c| c.id().to_string()).collect();
        let mut state = TableState {
            pagination: Pagination {
                page_index: 0,
                page_size,
            },
            column_order: column_ids.clone(),
            column_visibility: columns
                .iter()
                .filter(|c| c.is_hideable())
                .map(|c| (c.id().to_string(), true))
                .collect(),
            ..Default::default()
        };

        let store = self.persist.map(|(route, storage)| {
            VisibilityStore::new(storage, &self.config.storage_namespace, &route, &column_ids)
        });
        if let Some(stored) = store.as_ref().and_then(VisibilityStore::load) {
            for (id, visible) in stored {
                // Only columns that still exist and may be hidden
                if let Some(slot) = state.column_visibility.get_mut(&id) {
                    *slot = visible;
                }
            }
        }

        let mode = match self.server {
            Some((total, fetch)) => Mode::Server(Server {
                total,
                fetch,
                seq: 0,
                last_sent: None,
            }),
            None => Mode::Client,
        };

        let mut table = Table {
            columns,
            column_ids,
            rows: self.rows,
            state,
            mode,
            facets: self.facets,
            expansion: self.expansion,
            row_id: self.row_id,
            loading: false,
            store,
            page_size_options: self.config.page_size_options,
        };
        table.dispatch(false);
        Ok(table)
    }
}

/// A data grid over rows of type `R`.
pub struct Table<R> {
    columns: Vec<Column<R>>,
    /// Leaf column ids in construction order.
    column_ids: Vec<String>,
    rows: Vec<R>,
    state: TableState,
    mode: Mode,
    facets: Vec<Facet>,
    expansion: Option<ExpandFn<R>>,
    row_id: Option<RowIdFn<R>>,
    loading: bool,
    store: Option<VisibilityStore>,
    page_size_options: Vec<usize>,
}

impl<R: Serialize> Table<R> {
    pub fn builder(columns: Vec<Column<R>>) -> TableBuilder<R> {
        TableBuilder {
            columns,
            rows: Vec::new(),
            server: None,
            facets: Vec::new(),
            expansion: None,
            selectable: false,
            row_id: None,
            persist: None,
            config: TableConfig::default(),
        }
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn columns(&self) -> &[Column<R>] {
        &self.columns
    }

    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    pub fn page_size_options(&self) -> &[usize] {
        &self.page_size_options
    }

    pub fn is_server(&self) -> bool {
        matches!(self.mode, Mode::Server(_))
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn query(&self) -> Query {
        self.state.query()
    }

    fn column(&self, id: &str) -> Result<&Column<R>> {
        self.columns
            .iter()
            .find(|c| c.id() == id)
            .ok_or_else(|| Error::UnknownColumn(id.to_string()))
    }

    fn data_column(&self, id: &str) -> Result<&Column<R>> {
        if is_pseudo(id) {
            return Err(Error::UnknownColumn(id.to_string()));
        }
        self.column(id)
    }

    // ------------------------------------------------------------------
    // Query state: every change returns to the first page
    // ------------------------------------------------------------------

    pub fn set_global_filter(&mut self, value: impl Into<String>) {
        let value = value.into();
        if self.state.global_filter == value {
            return;
        }
        self.state.global_filter = value;
        self.query_changed();
    }

    /// Replace a column's selected values; an empty set clears the filter.
    pub fn set_column_filter<I, S>(&mut self, column_id: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_column(column_id)?;
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if self.state.column_filters.get(column_id).cloned().unwrap_or_default() == values {
            return Ok(());
        }
        if values.is_empty() {
            self.state.column_filters.remove(column_id);
        } else {
            self.state.column_filters.insert(column_id.to_string(), values);
        }
        self.query_changed();
        Ok(())
    }

    /// Click on a facet option: toggles membership, honoring single-select.
    pub fn toggle_filter_value(&mut self, column_id: &str, value: &str) -> Result<()> {
        let current = self
            .state
            .column_filters
            .get(column_id)
            .cloned()
            .unwrap_or_default();
        let next = match self.facets.iter().find(|f| f.column_id == column_id) {
            Some(facet) => facet.toggle(&current, value),
            None => Facet::new(column_id, "").toggle(&current, value),
        };
        self.set_column_filter(column_id, next)
    }

    /// Clear the global filter and every column filter.
    pub fn reset_filters(&mut self) {
        if self.state.global_filter.is_empty() && self.state.column_filters.is_empty() {
            return;
        }
        self.state.global_filter.clear();
        self.state.column_filters.clear();
        self.query_changed();
    }

    /// Cycle a column through asc -> desc -> unsorted.
    ///
    /// Unsortable columns are ignored.
    pub fn toggle_sort(&mut self, column_id: &str, multi: bool) -> Result<()> {
        if !self.data_column(column_id)?.is_sortable() {
            return Ok(());
        }
        self.state.sorting = sort::toggle(&self.state.sorting, column_id, multi);
        self.query_changed();
        Ok(())
    }

    pub fn set_sorting(&mut self, sorting: Vec<SortKey>) -> Result<()> {
        for key in &sorting {
            if !self.data_column(&key.column_id)?.is_sortable() {
                return Err(Error::UnknownColumn(key.column_id.clone()));
            }
        }
        if self.state.sorting == sorting {
            return Ok(());
        }
        self.state.sorting = sorting;
        self.query_changed();
        Ok(())
    }

    fn query_changed(&mut self) {
        self.state.pagination.page_index = 0;
        self.dispatch(false);
    }

    // ------------------------------------------------------------------
    // Pagination
    // ------------------------------------------------------------------

    /// Rows matching the current query (client mode) or the server's total.
    pub fn total(&self) -> Option<usize> {
        match &self.mode {
            Mode::Client => Some(self.matching_indices(&self.serialize_rows()).len()),
            Mode::Server(server) => server.total,
        }
    }

    fn page_info(&self, total: Option<usize>) -> PageInfo {
        let Pagination {
            page_index,
            page_size,
        } = self.state.pagination;
        let page_count = total.map(|t| t.div_ceil(page_size).max(1));
        let can_next = match page_count {
            Some(count) => page_index + 1 < count,
            // Unknown total: a full page suggests there is more
            None => self.rows.len() >= page_size,
        };
        PageInfo {
            page_index,
            page_size,
            page_count,
            total,
            can_previous: page_index > 0,
            can_next,
            can_last: page_count.is_some_and(|count| page_index + 1 < count),
        }
    }

    pub fn page(&self) -> PageInfo {
        self.page_info(self.total())
    }

    /// `max(1, ceil(total / page_size))`, unknown without a total.
    pub fn page_count(&self) -> Option<usize> {
        self.page().page_count
    }

    pub fn set_page_index(&mut self, index: usize) -> Result<()> {
        if let Some(page_count) = self.page_count()
            && index >= page_count
        {
            return Err(Error::PageOutOfRange { index, page_count });
        }
        if self.state.pagination.page_index != index {
            self.state.pagination.page_index = index;
            self.dispatch(false);
        }
        Ok(())
    }

    pub fn next_page(&mut self) -> bool {
        if !self.page().can_next {
            return false;
        }
        self.state.pagination.page_index += 1;
        self.dispatch(false);
        true
    }

    pub fn previous_page(&mut self) -> bool {
        if self.state.pagination.page_index == 0 {
            return false;
        }
        self.state.pagination.page_index -= 1;
        self.dispatch(false);
        true
    }

    pub fn first_page(&mut self) -> bool {
        if self.state.pagination.page_index == 0 {
            return false;
        }
        self.state.pagination.page_index = 0;
        self.dispatch(false);
        true
    }

    /// Jump to the last page; disabled while the page count is unknown.
    pub fn last_page(&mut self) -> bool {
        let page = self.page();
        match page.page_count {
            Some(count) if page.can_last => {
                self.state.pagination.page_index = count - 1;
                self.dispatch(false);
                true
            }
            _ => false,
        }
    }

    /// Change the page size, keeping the page index while it stays valid.
    pub fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        if page_size == 0 {
            return Err(Error::InvalidPageSize(page_size));
        }
        if self.state.pagination.page_size == page_size {
            return Ok(());
        }
        self.state.pagination.page_size = page_size;
        self.clamp_page_index();
        self.dispatch(false);
        Ok(())
    }

    /// Pull the page index back inside the page count; true when it moved.
    fn clamp_page_index(&mut self) -> bool {
        match self.page_count() {
            Some(count) if self.state.pagination.page_index >= count => {
                self.state.pagination.page_index = count - 1;
                true
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Columns
    // ------------------------------------------------------------------

    /// Show or hide a column and persist the full visibility map.
    ///
    /// Columns that are not hideable are ignored.
    pub fn set_column_visibility(&mut self, column_id: &str, visible: bool) -> Result<()> {
        if !self.column(column_id)?.is_hideable() {
            return Ok(());
        }
        if self.state.is_visible(column_id) == visible {
            return Ok(());
        }
        self.state
            .column_visibility
            .insert(column_id.to_string(), visible);
        if let Some(store) = &self.store {
            store.save(&self.state.column_visibility);
        }
        Ok(())
    }

    pub fn toggle_column_visibility(&mut self, column_id: &str) -> Result<()> {
        let visible = self.state.is_visible(column_id);
        self.set_column_visibility(column_id, !visible)
    }

    /// Visible leaf column ids in display order.
    pub fn visible_column_ids(&self) -> Vec<&str> {
        self.state
            .column_order
            .iter()
            .filter(|id| self.state.is_visible(id))
            .map(String::as_str)
            .collect()
    }

    /// Drop `active` onto `over`.
    pub fn reorder_columns(&mut self, active: &str, over: &str) -> Result<()> {
        self.state.column_order = order::reorder(&self.state.column_order, active, over)?;
        Ok(())
    }

    /// Keyboard reorder by one slot.
    pub fn move_column(&mut self, column_id: &str, direction: Direction) -> Result<()> {
        self.state.column_order = order::shift(&self.state.column_order, column_id, direction)?;
        Ok(())
    }

    pub fn set_column_order(&mut self, column_order: Vec<String>) -> Result<()> {
        order::validate(&column_order, &self.column_ids)?;
        self.state.column_order = column_order;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Selection and expansion
    // ------------------------------------------------------------------

    pub fn toggle_row_selected(&mut self, row_id: &str) {
        if !self.state.row_selection.remove(row_id) {
            self.state.row_selection.insert(row_id.to_string());
        }
    }

    pub fn is_row_selected(&self, row_id: &str) -> bool {
        self.state.row_selection.contains(row_id)
    }

    /// Select or deselect every row on the current page.
    pub fn set_page_selected(&mut self, selected: bool) {
        let serialized = self.serialize_rows();
        let (page_rows, _) = self.page_indices(&serialized);
        for i in page_rows {
            let id = self.row_key(i, &serialized[i]);
            if selected {
                self.state.row_selection.insert(id);
            } else {
                self.state.row_selection.remove(&id);
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.state.row_selection.clear();
    }

    /// Loaded rows whose id is selected.
    pub fn selected_rows(&self) -> Vec<&R> {
        let serialized = self.serialize_rows();
        self.rows
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                self.state
                    .row_selection
                    .contains(&self.row_key(*i, &serialized[*i]))
            })
            .map(|(_, row)| row)
            .collect()
    }

    /// Flip a row's expansion; returns the new state.
    pub fn toggle_expanded(&mut self, row_id: &str) -> bool {
        if self.state.expanded.remove(row_id) {
            false
        } else {
            self.state.expanded.insert(row_id.to_string());
            true
        }
    }

    pub fn set_expanded(&mut self, row_id: &str, expanded: bool) {
        if expanded {
            self.state.expanded.insert(row_id.to_string());
        } else {
            self.state.expanded.remove(row_id);
        }
    }

    // ------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------

    /// Replace the rows (the client-mode data source, or a server-mode
    /// props update outside the request cycle).
    pub fn set_rows(&mut self, rows: Vec<R>) {
        self.rows = rows;
        if let Mode::Client = self.mode {
            self.clamp_page_index();
        }
    }

    /// Update the server total; a shrunken total refetches the new last page.
    pub fn set_total(&mut self, total: Option<usize>) {
        if let Mode::Server(server) = &mut self.mode {
            server.total = total;
            if self.clamp_page_index() {
                self.dispatch(false);
            }
        }
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Apply the response to request `seq`.
    ///
    /// Responses to superseded requests are rejected with
    /// [`Error::StaleResponse`] and leave the table untouched.
    pub fn apply(&mut self, seq: u64, rows: Vec<R>, total: Option<usize>) -> Result<()> {
        let Mode::Server(server) = &mut self.mode else {
            self.set_rows(rows);
            self.loading = false;
            return Ok(());
        };
        if seq != server.seq {
            debug!(seq, latest = server.seq, "Ignoring stale table response");
            return Err(Error::StaleResponse { seq });
        }
        server.total = total;
        self.rows = rows;
        self.loading = false;
        if self.clamp_page_index() {
            debug!(
                page = self.state.pagination.page_index,
                "Total shrank below the current page, refetching"
            );
            self.dispatch(false);
        }
        Ok(())
    }

    /// Request `seq` failed: stop loading and keep the last rows.
    pub fn fail(&mut self, seq: u64) {
        if let Mode::Server(server) = &self.mode
            && server.seq == seq
        {
            self.loading = false;
        }
    }

    /// Re-send the current query even if it was already sent.
    pub fn refresh(&mut self) {
        self.dispatch(true);
    }

    fn dispatch(&mut self, force: bool) {
        let query = self.state.query();
        let Mode::Server(server) = &mut self.mode else {
            return;
        };
        if !force && server.last_sent.as_ref() == Some(&query) {
            return;
        }
        server.seq += 1;
        let request = FetchRequest {
            seq: server.seq,
            query: query.clone(),
        };
        server.last_sent = Some(query);
        self.loading = true;

        debug!(
            seq = request.seq,
            page = request.query.pagination.page_index,
            "Dispatching table query"
        );
        (server.fetch)(&request);
    }

    // ------------------------------------------------------------------
    // Row processing
    // ------------------------------------------------------------------

    fn serialize_rows(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| serde_json::to_value(row).unwrap_or(Value::Null))
            .collect()
    }

    fn row_key(&self, index: usize, serialized: &Value) -> String {
        if let Some(row_id) = &self.row_id {
            return row_id(&self.rows[index]);
        }
        match serialized.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => match self.mode {
                // Server rows restart at zero on every page
                Mode::Server(_) => {
                    let Pagination {
                        page_index,
                        page_size,
                    } = self.state.pagination;
                    (page_index * page_size + index).to_string()
                }
                Mode::Client => index.to_string(),
            },
        }
    }

    /// Indices of rows passing the filters, in sorted order.
    fn matching_indices(&self, serialized: &[Value]) -> Vec<usize> {
        if self.is_server() {
            return (0..self.rows.len()).collect();
        }

        let filters: Vec<(&Column<R>, &BTreeSet<String>)> = self
            .state
            .column_filters
            .iter()
            .filter_map(|(id, selected)| self.column(id).ok().map(|c| (c, selected)))
            .collect();

        let mut indices: Vec<usize> = (0..self.rows.len())
            .filter(|&i| {
                filter::matches_global(&serialized[i], &self.state.global_filter)
                    && filters.iter().all(|(column, selected)| {
                        filter::matches_column(&column.value(&self.rows[i], &serialized[i]), selected)
                    })
            })
            .collect();

        let keys: Vec<(&Column<R>, SortDirection)> = self
            .state
            .sorting
            .iter()
            .filter_map(|key| self.column(&key.column_id).ok().map(|c| (c, key.direction)))
            .collect();
        if keys.is_empty() {
            return indices;
        }

        let sort_values: BTreeMap<usize, Vec<Value>> = indices
            .iter()
            .map(|&i| {
                let values = keys
                    .iter()
                    .map(|(column, _)| column.value(&self.rows[i], &serialized[i]))
                    .collect();
                (i, values)
            })
            .collect();

        indices.sort_by(|a, b| {
            let (va, vb) = (&sort_values[a], &sort_values[b]);
            keys.iter()
                .enumerate()
                .map(|(k, (_, direction))| sort::compare_cells(&va[k], &vb[k], *direction))
                .find(|ord| ord.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        indices
    }

    /// Rows on the current page, plus the total used for pagination.
    fn page_indices(&self, serialized: &[Value]) -> (Vec<usize>, Option<usize>) {
        let indices = self.matching_indices(serialized);
        match &self.mode {
            Mode::Server(server) => (indices, server.total),
            Mode::Client => {
                let total = indices.len();
                let Pagination {
                    page_index,
                    page_size,
                } = self.state.pagination;
                let page = indices
                    .into_iter()
                    .skip(page_index * page_size)
                    .take(page_size)
                    .collect();
                (page, Some(total))
            }
        }
    }

    fn facet_views(&self, serialized: &[Value]) -> Vec<FacetView> {
        self.facets
            .iter()
            .map(|facet| {
                let cells: Vec<Value> = match self.column(&facet.column_id) {
                    Ok(column) => self
                        .rows
                        .iter()
                        .zip(serialized)
                        .map(|(row, ser)| column.value(row, ser))
                        .collect(),
                    Err(_) => Vec::new(),
                };
                let counts = filter::value_counts(&cells);
                let mut options = filter::facet_options(facet, Some(&counts));
                if self.is_server() {
                    // Counts over a single page would mislead
                    for option in &mut options {
                        option.count = None;
                    }
                }
                FacetView {
                    column_id: facet.column_id.clone(),
                    title: facet.title.clone(),
                    options,
                    selected: self
                        .state
                        .column_filters
                        .get(&facet.column_id)
                        .cloned()
                        .unwrap_or_default(),
                    multiple: facet.multiple,
                }
            })
            .collect()
    }

    /// Render-ready snapshot of the current page.
    pub fn view(&self) -> TableView {
        let serialized = self.serialize_rows();
        let (page_rows, total) = self.page_indices(&serialized);

        let visible: Vec<&Column<R>> = self
            .state
            .column_order
            .iter()
            .filter(|id| self.state.is_visible(id))
            .filter_map(|id| self.column(id).ok())
            .collect();

        let headers = visible
            .iter()
            .map(|column| HeaderCell {
                id: column.id().to_string(),
                label: column.header().to_string(),
                sortable: column.is_sortable(),
                sorted: sort::direction_of(&self.state.sorting, column.id()),
                draggable: !is_pseudo(column.id()),
                hideable: column.is_hideable(),
            })
            .collect();

        let mut rows = Vec::with_capacity(page_rows.len());
        for &i in &page_rows {
            let id = self.row_key(i, &serialized[i]);
            let selected = self.state.row_selection.contains(&id);
            let expanded = self.state.expanded.contains(&id);

            let cells = visible
                .iter()
                .map(|column| {
                    let (text, value) = match column.id() {
                        SELECT_COLUMN => (String::new(), Value::Bool(selected)),
                        EXPAND_COLUMN => (String::new(), Value::Bool(expanded)),
                        _ => {
                            let value = column.value(&self.rows[i], &serialized[i]);
                            (column.render(&value), value)
                        }
                    };
                    Cell {
                        column_id: column.id().to_string(),
                        text,
                        value,
                    }
                })
                .collect();

            rows.push(ViewRow::Data {
                id: id.clone(),
                cells,
                selected,
                expanded,
            });

            if expanded && let Some(render) = &self.expansion {
                rows.push(ViewRow::Expansion {
                    id,
                    colspan: visible.len(),
                    content: render(&self.rows[i]),
                });
            }
        }

        TableView {
            headers,
            empty: page_rows.is_empty(),
            rows,
            loading: self.loading,
            page: self.page_info(total),
            facets: self.facet_views(&serialized),
        }
    }
}
