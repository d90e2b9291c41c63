//! Named leaf items: parameters and results

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A named, typed leaf with an optional comment.
///
/// `value` is `None` only for skeleton items produced by a partial load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    name: String,
    value: Option<Value>,
    comment: Option<String>,
}

/// Simulation input.
pub type Parameter = Leaf;

/// Simulation output.
pub type ResultItem = Leaf;

impl Leaf {
    /// Create a leaf holding `value`.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            comment: None,
        }
    }

    /// Create a skeleton leaf: the item exists but its value is unset.
    #[must_use]
    pub fn skeleton(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            comment: None,
        }
    }

    /// Attach a comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Replace the comment.
    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }

    /// Fully qualified dotted name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value, `None` for skeletons.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Replace the value.
    pub fn set_value(&mut self, value: Value) {
        self.value = Some(value);
    }

    /// Comment, if any.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// True for skeleton items.
    #[must_use]
    pub const fn is_skeleton(&self) -> bool {
        self.value.is_none()
    }
}
