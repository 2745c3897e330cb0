//! Table state and the query descriptor sent to the backend.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// Current page position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: 10,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// One sort criterion.
///
/// On the wire this is the string `"columnId,asc"` or `"columnId,desc"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub column_id: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            direction: SortDirection::Desc,
        }
    }

    pub fn is_ascending(&self) -> bool {
        self.direction == SortDirection::Asc
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.column_id, self.direction.as_str())
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Column ids may themselves contain commas; the direction never does
        let (column_id, direction) = s
            .rsplit_once(',')
            .ok_or_else(|| Error::Internal(format!("invalid sort key `{s}`")))?;
        let direction = match direction.trim().to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => return Err(Error::Internal(format!("invalid sort direction `{other}`"))),
        };
        if column_id.is_empty() {
            return Err(Error::Internal(format!("invalid sort key `{s}`")));
        }
        Ok(SortKey {
            column_id: column_id.to_string(),
            direction,
        })
    }
}

impl Serialize for SortKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SortKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Column id to the set of selected filter values.
pub type ColumnFilters = BTreeMap<String, BTreeSet<String>>;

/// Everything a server-mode backend needs to produce one page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub pagination: Pagination,
    pub sorting: Vec<SortKey>,
    pub global_filter: String,
    pub column_filters: ColumnFilters,
}

impl Query {
    /// Sort criteria as request parameters, in priority order.
    pub fn sort_params(&self) -> Vec<String> {
        self.sorting.iter().map(SortKey::to_string).collect()
    }
}

/// A dispatched server-mode query, tagged so late responses can be dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub seq: u64,
    pub query: Query,
}

/// Locally owned presentation state of one table instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableState {
    pub pagination: Pagination,
    pub sorting: Vec<SortKey>,
    pub column_filters: ColumnFilters,
    pub global_filter: String,
    pub column_visibility: BTreeMap<String, bool>,
    pub column_order: Vec<String>,
    pub row_selection: BTreeSet<String>,
    pub expanded: BTreeSet<String>,
}

impl TableState {
    pub fn query(&self) -> Query {
        Query {
            pagination: self.pagination,
            sorting: self.sorting.clone(),
            global_filter: self.global_filter.clone(),
            column_filters: self.column_filters.clone(),
        }
    }

    pub fn is_visible(&self, column_id: &str) -> bool {
        self.column_visibility
            .get(column_id)
            .copied()
            .unwrap_or(true)
    }
}
