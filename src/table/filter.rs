//! Global and faceted column filtering.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use super::column::display_value;

/// Case-insensitive substring match over every scalar in `serialized`.
///
/// Only an empty needle matches everything; whitespace is matched literally.
pub fn matches_global(serialized: &Value, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    contains_text(serialized, &needle.to_lowercase())
}

fn contains_text(value: &Value, needle: &str) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => items.iter().any(|v| contains_text(v, needle)),
        Value::Object(map) => map.values().any(|v| contains_text(v, needle)),
        scalar => display_value(scalar).to_lowercase().contains(needle),
    }
}

/// Whether a cell passes a column's value-set filter.
///
/// The set is an OR; array cells pass when any element is selected.
pub fn matches_column(cell: &Value, selected: &BTreeSet<String>) -> bool {
    if selected.is_empty() {
        return true;
    }
    match cell {
        Value::Array(items) => items.iter().any(|v| selected.contains(&display_value(v))),
        other => selected.contains(&display_value(other)),
    }
}

/// One choice in a facet dropdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FacetOption {
    pub label: String,
    pub value: String,
    /// Rows carrying this value; only known when rows are local.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl FacetOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            count: None,
        }
    }
}

/// A filterable dimension on a column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Facet {
    pub column_id: String,
    pub title: String,
    /// Fixed options; derived from the rows when absent.
    pub options: Option<Vec<FacetOption>>,
    pub multiple: bool,
}

impl Facet {
    pub fn new(column_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            title: title.into(),
            options: None,
            multiple: true,
        }
    }

    pub fn options(mut self, options: Vec<FacetOption>) -> Self {
        self.options = Some(options);
        self
    }

    /// Allow only one selected value at a time.
    pub fn single(mut self) -> Self {
        self.multiple = false;
        self
    }

    /// Selected set after the user clicks `value`.
    pub fn toggle(&self, selected: &BTreeSet<String>, value: &str) -> BTreeSet<String> {
        let mut next = if self.multiple {
            selected.clone()
        } else {
            selected
                .iter()
                .filter(|v| v.as_str() == value)
                .cloned()
                .collect()
        };
        if !next.remove(value) {
            next.insert(value.to_string());
        }
        next
    }
}

/// Count distinct display values across `cells`; arrays count per element.
pub fn value_counts<'a>(cells: impl IntoIterator<Item = &'a Value>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for cell in cells {
        match cell {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|v| !v.is_null()) {
                    *counts.entry(display_value(item)).or_insert(0) += 1;
                }
            }
            other => *counts.entry(display_value(other)).or_insert(0) += 1,
        }
    }
    counts
}

/// Options for a facet: fixed ones annotated with counts, or derived ones.
pub fn facet_options(facet: &Facet, counts: Option<&BTreeMap<String, usize>>) -> Vec<FacetOption> {
    match (&facet.options, counts) {
        (Some(fixed), counts) => fixed
            .iter()
            .map(|opt| FacetOption {
                count: counts.map(|c| c.get(&opt.value).copied().unwrap_or(0)),
                ..opt.clone()
            })
            .collect(),
        (None, Some(counts)) => counts
            .iter()
            .map(|(value, count)| FacetOption {
                label: value.clone(),
                value: value.clone(),
                count: Some(*count),
            })
            .collect(),
        (None, None) => Vec::new(),
    }
}
