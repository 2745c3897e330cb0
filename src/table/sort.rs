//! Sort toggling and client-side value ordering.

use std::cmp::Ordering;

use serde_json::Value;

use super::column::display_value;
use super::state::{SortDirection, SortKey};

/// Advance `column_id` through asc -> desc -> unsorted.
///
/// With `multi`, other criteria are kept and a new criterion is appended;
/// otherwise the result holds at most the toggled column.
pub fn toggle(sorting: &[SortKey], column_id: &str, multi: bool) -> Vec<SortKey> {
    let position = sorting.iter().position(|k| k.column_id == column_id);
    let next = match position.map(|i| sorting[i].direction) {
        None => Some(SortDirection::Asc),
        Some(SortDirection::Asc) => Some(SortDirection::Desc),
        Some(SortDirection::Desc) => None,
    };

    if !multi {
        return next
            .map(|direction| {
                vec![SortKey {
                    column_id: column_id.to_string(),
                    direction,
                }]
            })
            .unwrap_or_default();
    }

    let mut sorting = sorting.to_vec();
    match (position, next) {
        (Some(i), Some(direction)) => sorting[i].direction = direction,
        (Some(i), None) => {
            sorting.remove(i);
        }
        (None, Some(direction)) => sorting.push(SortKey {
            column_id: column_id.to_string(),
            direction,
        }),
        (None, None) => {}
    }
    sorting
}

/// Current direction of `column_id`, if it is sorted.
pub fn direction_of(sorting: &[SortKey], column_id: &str) -> Option<SortDirection> {
    sorting
        .iter()
        .find(|k| k.column_id == column_id)
        .map(|k| k.direction)
}

/// Order two non-null cell values.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => compare_text(x, y),
        _ => compare_text(&display_value(a), &display_value(b)),
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Order two cells under `direction`; nulls sort last either way.
pub fn compare_cells(a: &Value, b: &Value, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = compare_values(a, b);
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        }
    }
}
