//! Natural naming over flat dotted-name maps
//!
//! A `Namespace` is a read-only projection of a trajectory's parameter or
//! result map rooted at a dotted prefix. Nothing is indexed: every lookup and
//! iteration is a linear scan of the keys, which is fine for the hundreds to
//! low thousands of items a trajectory typically holds.

use std::collections::BTreeMap;

use super::Leaf;
use crate::{Error, Result};

/// Result of resolving a path inside a namespace.
#[derive(Debug, Clone)]
pub enum Node<'a> {
    /// Exact key match
    Leaf(&'a Leaf),
    /// Sub-namespace for a group prefix
    Group(Namespace<'a>),
}

impl<'a> Node<'a> {
    /// The leaf, if this node is one.
    #[must_use]
    pub const fn as_leaf(&self) -> Option<&'a Leaf> {
        match self {
            Self::Leaf(leaf) => Some(*leaf),
            Self::Group(_) => None,
        }
    }

    /// The group, if this node is one.
    #[must_use]
    pub const fn as_group(&self) -> Option<&Namespace<'a>> {
        match self {
            Self::Leaf(_) => None,
            Self::Group(ns) => Some(ns),
        }
    }
}

/// Lazy tree-shaped view over a flat map of dotted names.
#[derive(Debug, Clone)]
pub struct Namespace<'a> {
    items: &'a BTreeMap<String, Leaf>,
    prefix: String,
    space: &'static str,
}

impl<'a> Namespace<'a> {
    pub(crate) fn root(items: &'a BTreeMap<String, Leaf>, space: &'static str) -> Self {
        Self {
            items,
            prefix: String::new(),
            space,
        }
    }

    /// Dotted prefix this view is rooted at (empty at the root).
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_name(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}.{path}", self.prefix)
        }
    }

    /// Resolve `path` relative to this namespace.
    ///
    /// Exact key → leaf; otherwise any key under `path.` → group; otherwise a
    /// lookup failure.
    ///
    /// # Errors
    /// Returns `Error::Lookup` when nothing matches
    pub fn get(&self, path: &str) -> Result<Node<'a>> {
        let full = self.full_name(path);
        if let Some(leaf) = self.items.get(&full) {
            return Ok(Node::Leaf(leaf));
        }
        let dotted = format!("{full}.");
        if self.items.keys().any(|k| k.starts_with(&dotted)) {
            Ok(Node::Group(Namespace {
                items: self.items,
                prefix: full,
                space: self.space,
            }))
        } else {
            Err(Error::lookup(self.space, full))
        }
    }

    /// Resolve `path` to a leaf.
    ///
    /// # Errors
    /// Returns `Error::Lookup` if the path is unknown or names a group
    pub fn leaf(&self, path: &str) -> Result<&'a Leaf> {
        match self.get(path)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Group(_) => Err(Error::lookup(self.space, self.full_name(path))),
        }
    }

    /// Names visible under this namespace.
    ///
    /// At the root every key is yielded. Under prefix `P`, a key equal to `P`
    /// is yielded unchanged and keys starting with `P.` are yielded with that
    /// prefix stripped; everything else is skipped.
    pub fn keys(&self) -> impl Iterator<Item = &'a str> + 'a {
        let prefix = self.prefix.clone();
        self.items
            .keys()
            .filter_map(move |k| children_under(&prefix, k))
    }

    /// `(relative name, leaf)` pairs visible under this namespace.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Leaf)> + 'a {
        let prefix = self.prefix.clone();
        self.items
            .iter()
            .filter_map(move |(k, v)| children_under(&prefix, k).map(|rel| (rel, v)))
    }

    /// True if `path` resolves to a leaf or a group.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    /// Number of visible names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys().count()
    }

    /// True if nothing is visible under this namespace.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys().next().is_none()
    }
}

/// Relative name of `key` under `prefix`, per the natural-naming iteration rule.
#[must_use]
pub fn children_under<'k>(prefix: &str, key: &'k str) -> Option<&'k str> {
    if prefix.is_empty() || key == prefix {
        return Some(key);
    }
    key.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('.'))
}
