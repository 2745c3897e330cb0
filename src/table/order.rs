//! Column reordering as pure permutations.
//!
//! Drag-and-drop and keyboard moves both end up here, decoupled from any
//! event plumbing. Pseudo-columns keep their slots; only the draggable ids
//! between them are permuted.

use std::collections::BTreeSet;

use super::column::is_pseudo;
use crate::{Error, Result};

/// Keyboard move direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Move `active` to the slot currently held by `over`.
///
/// Dropping on itself, or involving a pinned column, returns the order
/// unchanged. Ids missing from `order` are rejected before anything moves.
pub fn reorder(order: &[String], active: &str, over: &str) -> Result<Vec<String>> {
    for id in [active, over] {
        if !order.iter().any(|c| c == id) {
            return Err(Error::UnknownColumn(id.to_string()));
        }
    }
    if active == over || is_pseudo(active) || is_pseudo(over) {
        return Ok(order.to_vec());
    }

    let mut draggable: Vec<&String> = order.iter().filter(|id| !is_pseudo(id)).collect();
    let from = draggable.iter().position(|id| *id == active);
    let to = draggable.iter().position(|id| *id == over);
    let (Some(from), Some(to)) = (from, to) else {
        return Ok(order.to_vec());
    };

    let moved = draggable.remove(from);
    draggable.insert(to, moved);

    let mut draggable = draggable.into_iter();
    Ok(order
        .iter()
        .map(|id| {
            if is_pseudo(id) {
                id.clone()
            } else {
                // Same count of draggable slots as draggable ids
                draggable.next().unwrap_or(id).clone()
            }
        })
        .collect())
}

/// Move `id` one draggable slot in `direction`; edges are no-ops.
pub fn shift(order: &[String], id: &str, direction: Direction) -> Result<Vec<String>> {
    let position = order
        .iter()
        .position(|c| c == id)
        .ok_or_else(|| Error::UnknownColumn(id.to_string()))?;
    if is_pseudo(id) {
        return Ok(order.to_vec());
    }

    let neighbor = match direction {
        Direction::Left => order[..position].iter().rev().find(|c| !is_pseudo(c)),
        Direction::Right => order[position + 1..].iter().find(|c| !is_pseudo(c)),
    };
    match neighbor {
        Some(over) => reorder(order, id, over),
        None => Ok(order.to_vec()),
    }
}

/// Check that `order` is a permutation of `expected` with pseudo-columns in
/// their original slots.
pub fn validate(order: &[String], expected: &[String]) -> Result<()> {
    if order.len() != expected.len() {
        return Err(Error::InvalidColumnOrder(format!(
            "expected {} columns, got {}",
            expected.len(),
            order.len()
        )));
    }
    let seen: BTreeSet<&String> = order.iter().collect();
    if seen.len() != order.len() {
        return Err(Error::InvalidColumnOrder("duplicate column id".into()));
    }
    if let Some(unknown) = order.iter().find(|id| !expected.contains(id)) {
        return Err(Error::UnknownColumn(unknown.clone()));
    }
    for (slot, id) in expected.iter().enumerate() {
        if is_pseudo(id) && order[slot] != *id {
            return Err(Error::InvalidColumnOrder(format!("`{id}` cannot be moved")));
        }
    }
    Ok(())
}
