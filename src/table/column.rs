//! Column definitions.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Row-selection checkbox column.
pub const SELECT_COLUMN: &str = "select";

/// Row-expansion toggle column.
pub const EXPAND_COLUMN: &str = "expand";

/// Structural columns: never draggable, sortable or hideable.
pub fn is_pseudo(id: &str) -> bool {
    id == SELECT_COLUMN || id == EXPAND_COLUMN
}

/// Extracts a cell value from a row.
pub type Accessor<R> = Arc<dyn Fn(&R) -> Value + Send + Sync>;

/// Turns a cell value into display text.
pub type Formatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// One leaf column of a table.
pub struct Column<R> {
    id: String,
    header: String,
    accessor: Option<Accessor<R>>,
    cell: Option<Formatter>,
    sortable: bool,
    hideable: bool,
}

impl<R> Clone for Column<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            header: self.header.clone(),
            accessor: self.accessor.clone(),
            cell: self.cell.clone(),
            sortable: self.sortable,
            hideable: self.hideable,
        }
    }
}

impl<R> fmt::Debug for Column<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("id", &self.id)
            .field("header", &self.header)
            .field("sortable", &self.sortable)
            .field("hideable", &self.hideable)
            .finish_non_exhaustive()
    }
}

impl<R> Column<R> {
    /// A sortable, hideable column reading the row field named `id`.
    pub fn new(id: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            header: header.into(),
            accessor: None,
            cell: None,
            sortable: true,
            hideable: true,
        }
    }

    pub(crate) fn pseudo(id: &str) -> Self {
        Self {
            id: id.to_string(),
            header: String::new(),
            accessor: None,
            cell: None,
            sortable: false,
            hideable: false,
        }
    }

    pub fn accessor<F>(mut self, f: F) -> Self
    where
        F: Fn(&R) -> Value + Send + Sync + 'static,
    {
        self.accessor = Some(Arc::new(f));
        self
    }

    pub fn cell<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.cell = Some(Arc::new(f));
        self
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn hideable(mut self, hideable: bool) -> Self {
        self.hideable = hideable;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn is_sortable(&self) -> bool {
        self.sortable
    }

    pub fn is_hideable(&self) -> bool {
        self.hideable
    }

    /// Cell value for `row`, given the row's serde serialization.
    pub fn value(&self, row: &R, serialized: &Value) -> Value {
        match &self.accessor {
            Some(accessor) => accessor(row),
            None => serialized.get(&self.id).cloned().unwrap_or(Value::Null),
        }
    }

    pub fn render(&self, value: &Value) -> String {
        match &self.cell {
            Some(cell) => cell(value),
            None => display_value(value),
        }
    }
}

/// Plain-text form of a JSON value, as a user would read it.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}
