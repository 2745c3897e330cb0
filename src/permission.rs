//! Route-exact CRUD permissions.
//!
//! A [`PageAccessList`] maps canonical route paths to per-role CRUD grants.
//! Resolution is an exact lookup on the normalized path followed by a union
//! of the grants held by each of the user's roles. A path without an entry
//! grants nothing.
//!
//! # Example
//!
//! ```ignore
//! use adminkit::permission::{Action, PageAccessList};
//!
//! let list = PageAccessList::from_json(&payload);
//! let perms = list.resolve("/users/", &["ROLE_ADMIN".to_string()]);
//! assert!(perms.allows(Action::Read));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// One of the four page actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(Error::Internal(format!("unknown action `{other}`"))),
        }
    }
}

/// CRUD record: one role's allowed actions on one route, or an aggregate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Crud {
    pub create: bool,
    pub read: bool,
    pub update: bool,
    pub delete: bool,
}

impl Crud {
    pub const NONE: Crud = Crud {
        create: false,
        read: false,
        update: false,
        delete: false,
    };

    pub const ALL: Crud = Crud {
        create: true,
        read: true,
        update: true,
        delete: true,
    };

    /// Per-field OR.
    pub fn union(self, other: Crud) -> Crud {
        Crud {
            create: self.create || other.create,
            read: self.read || other.read,
            update: self.update || other.update,
            delete: self.delete || other.delete,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Create => self.create,
            Action::Read => self.read,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }

    pub fn is_none(&self) -> bool {
        *self == Crud::NONE
    }

    /// Read a CRUD record from loosely typed JSON; anything but `true` is false.
    fn from_loose(value: &Value) -> Option<Crud> {
        let obj = value.as_object()?;
        let flag = |name: &str| obj.get(name).and_then(Value::as_bool).unwrap_or(false);
        Some(Crud {
            create: flag("create"),
            read: flag("read"),
            update: flag("update"),
            delete: flag("delete"),
        })
    }
}

/// Access grants for one protected route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAccessEntry {
    pub url: String,
    #[serde(rename = "rolePermissions", alias = "role_permissions", default)]
    pub role_permissions: BTreeMap<String, Crud>,
}

impl PageAccessEntry {
    /// Duck-type one element of the endpoint payload.
    ///
    /// Returns `None` when `url` is missing or `rolePermissions` is not an
    /// object. Role grants that are not objects are dropped individually.
    pub fn from_loose(value: &Value) -> Option<PageAccessEntry> {
        let obj = value.as_object()?;
        let url = obj.get("url")?.as_str()?;
        let grants = obj
            .get("rolePermissions")
            .or_else(|| obj.get("role_permissions"))?
            .as_object()?;

        let role_permissions = grants
            .iter()
            .filter_map(|(role, crud)| {
                let role = role.trim();
                if role.is_empty() {
                    return None;
                }
                Crud::from_loose(crud).map(|c| (role.to_string(), c))
            })
            .collect();

        Some(PageAccessEntry {
            url: url.to_string(),
            role_permissions,
        })
    }

    /// Union of the grants held by any of `roles`.
    pub fn aggregate<S: AsRef<str>>(&self, roles: &[S]) -> Crud {
        roles
            .iter()
            .filter_map(|role| self.role_permissions.get(role.as_ref()))
            .fold(Crud::NONE, |acc, crud| acc.union(*crud))
    }
}

/// Canonical form of a route path: no query, no hash, no trailing slash
/// (except the root itself).
pub fn normalize_url(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = url[..end].trim();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parent of a normalized path (`/a/b` -> `/a`), `None` for the root.
fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(i) => Some(&path[..i]),
        None => None,
    }
}

/// The page-access list with an exact-match index.
#[derive(Clone, Debug, Default)]
pub struct PageAccessList {
    entries: Vec<PageAccessEntry>,
    index: HashMap<String, usize>,
    dynamic_parents: Vec<String>,
    skipped: usize,
}

impl PageAccessList {
    pub fn new(entries: Vec<PageAccessEntry>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            // First match wins on duplicate URLs
            index.entry(normalize_url(&entry.url)).or_insert(i);
        }
        Self {
            entries,
            index,
            dynamic_parents: Vec::new(),
            skipped: 0,
        }
    }

    /// Build from the endpoint payload.
    ///
    /// Accepts a bare array or an object wrapping the array under `data`.
    /// Malformed elements are skipped; anything else yields an empty list.
    pub fn from_json(payload: &Value) -> Self {
        let items = match payload {
            Value::Array(items) => items.as_slice(),
            Value::Object(obj) => match obj.get("data") {
                Some(Value::Array(items)) => items.as_slice(),
                _ => &[],
            },
            _ => &[],
        };

        let entries: Vec<PageAccessEntry> =
            items.iter().filter_map(PageAccessEntry::from_loose).collect();
        let skipped = items.len() - entries.len();

        let mut list = Self::new(entries);
        list.skipped = skipped;
        list
    }

    /// Opt routes in to parent fallback for their single-segment children.
    pub fn with_dynamic_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dynamic_parents = parents
            .into_iter()
            .map(|p| normalize_url(p.as_ref()))
            .collect();
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of payload elements dropped as malformed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn entries(&self) -> &[PageAccessEntry] {
        &self.entries
    }

    /// Exact lookup on the normalized URL.
    pub fn entry(&self, url: &str) -> Option<&PageAccessEntry> {
        self.index
            .get(&normalize_url(url))
            .map(|&i| &self.entries[i])
    }

    /// The entry that governs `url`: exact match, then an opted-in parent.
    pub fn governing_entry(&self, url: &str) -> Option<&PageAccessEntry> {
        let path = normalize_url(url);
        if let Some(&i) = self.index.get(&path) {
            return Some(&self.entries[i]);
        }
        let parent = parent_path(&path)?;
        if self.dynamic_parents.iter().any(|p| p == parent) {
            return self.index.get(parent).map(|&i| &self.entries[i]);
        }
        None
    }

    /// Effective permissions for `roles` on `url`.
    pub fn resolve<S: AsRef<str>>(&self, url: &str, roles: &[S]) -> Crud {
        self.governing_entry(url)
            .map(|entry| entry.aggregate(roles))
            .unwrap_or(Crud::NONE)
    }
}
