//! Render-ready output of a table.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use super::filter::FacetOption;
use super::state::SortDirection;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderCell {
    pub id: String,
    pub label: String,
    pub sortable: bool,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "direction")]
    pub sorted: Option<SortDirection>,
    pub draggable: bool,
    pub hideable: bool,
}

fn direction<S: serde::Serializer>(
    value: &Option<SortDirection>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_str(d.as_str()),
        None => serializer.serialize_none(),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub column_id: String,
    pub text: String,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ViewRow {
    #[serde(rename_all = "camelCase")]
    Data {
        id: String,
        cells: Vec<Cell>,
        selected: bool,
        expanded: bool,
    },
    /// Full-width row inserted below an expanded data row.
    #[serde(rename_all = "camelCase")]
    Expansion {
        id: String,
        colspan: usize,
        content: String,
    },
}

impl ViewRow {
    pub fn id(&self) -> &str {
        match self {
            ViewRow::Data { id, .. } | ViewRow::Expansion { id, .. } => id,
        }
    }

    pub fn is_expansion(&self) -> bool {
        matches!(self, ViewRow::Expansion { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page_index: usize,
    pub page_size: usize,
    /// Unknown when a server-mode table has no total.
    pub page_count: Option<usize>,
    pub total: Option<usize>,
    pub can_previous: bool,
    pub can_next: bool,
    pub can_last: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetView {
    pub column_id: String,
    pub title: String,
    pub options: Vec<FacetOption>,
    pub selected: BTreeSet<String>,
    pub multiple: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<ViewRow>,
    /// No rows to show: render the empty state instead of a body.
    pub empty: bool,
    /// Overlay a loading indicator on top of `rows`.
    pub loading: bool,
    pub page: PageInfo,
    pub facets: Vec<FacetView>,
}
