//! Parameter space exploration (cartesian product)
//!
//! A [`ParameterSpace`] keeps its axes in declaration order. Iteration is
//! standard product order: the last declared axis varies fastest, the first
//! slowest. An empty space yields zero combinations, not one empty one.
//!
//! ```rust
//! use paramsweep::exploration::ParameterSpace;
//!
//! let space = ParameterSpace::new()
//!     .axis("x", [1, 2])
//!     .axis("y", [10, 20]);
//!
//! let xy: Vec<(i64, i64)> = space
//!     .iter()
//!     .map(|c| (c["x"].as_i64().unwrap(), c["y"].as_i64().unwrap()))
//!     .collect();
//! assert_eq!(xy, vec![(1, 10), (1, 20), (2, 10), (2, 20)]);
//! ```

use crate::trajectory::Snapshot;
use crate::value::Value;
use crate::{Error, Result};

/// One point of the explored space: varied name → chosen value.
pub type Combination = Snapshot;

/// Ordered mapping from parameter name to candidate values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSpace {
    axes: Vec<(String, Vec<Value>)>,
}

impl ParameterSpace {
    /// Empty space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis. Re-declaring a name replaces its values in place, keeping
    /// its original position.
    #[must_use]
    pub fn axis<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let name = name.into();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        match self.axes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = values,
            None => self.axes.push((name, values)),
        }
        self
    }

    /// Varied names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|(n, _)| n.as_str())
    }

    /// True when no axis is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Number of combinations: product of axis sizes, zero for an empty space.
    ///
    /// # Errors
    /// Returns `Error::Configuration` if the product overflows `usize`
    pub fn try_len(&self) -> Result<usize> {
        if self.axes.is_empty() {
            return Ok(0);
        }
        self.axes
            .iter()
            .try_fold(1usize, |acc, (_, v)| acc.checked_mul(v.len()))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "parameter space over {} axes has more than {} combinations",
                    self.axes.len(),
                    usize::MAX
                ))
            })
    }

    /// Lazy iterator over all combinations. Restartable: call again for a fresh pass.
    ///
    /// The reported length saturates at `usize::MAX`; iteration itself always
    /// visits every combination.
    #[must_use]
    pub fn iter(&self) -> CartesianProduct<'_> {
        let exhausted = self.axes.is_empty() || self.axes.iter().any(|(_, v)| v.is_empty());
        let remaining = if exhausted {
            0
        } else {
            self.axes
                .iter()
                .fold(1usize, |acc, (_, v)| acc.saturating_mul(v.len()))
        };
        CartesianProduct {
            space: self,
            counters: vec![0; self.axes.len()],
            remaining,
            exhausted,
        }
    }
}

impl<'a> IntoIterator for &'a ParameterSpace {
    type Item = Combination;
    type IntoIter = CartesianProduct<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Cartesian product of a [`ParameterSpace`].
pub fn cartesian_product(space: &ParameterSpace) -> CartesianProduct<'_> {
    space.iter()
}

/// Iterator returned by [`ParameterSpace::iter`].
#[derive(Debug, Clone)]
pub struct CartesianProduct<'a> {
    space: &'a ParameterSpace,
    counters: Vec<usize>,
    remaining: usize,
    exhausted: bool,
}

impl Iterator for CartesianProduct<'_> {
    type Item = Combination;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let combo = self
            .space
            .axes
            .iter()
            .zip(&self.counters)
            .map(|((name, values), &i)| (name.clone(), values[i].clone()))
            .collect();

        self.remaining = self.remaining.saturating_sub(1);
        // odometer: last axis fastest; a carry out of the first axis ends the product
        self.exhausted = true;
        for (axis, counter) in self.counters.iter_mut().enumerate().rev() {
            *counter += 1;
            if *counter < self.space.axes[axis].1.len() {
                self.exhausted = false;
                break;
            }
            *counter = 0;
        }
        Some(combo)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for CartesianProduct<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(c: &Combination, names: &[&str]) -> Vec<i64> {
        names.iter().map(|n| c[*n].as_i64().unwrap()).collect()
    }

    #[test]
    fn test_last_axis_fastest() {
        let space = ParameterSpace::new().axis("x", [1, 2]).axis("y", [10, 20]);
        let got: Vec<Vec<i64>> = space.iter().map(|c| ints(&c, &["x", "y"])).collect();
        assert_eq!(got, vec![vec![1, 10], vec![1, 20], vec![2, 10], vec![2, 20]]);
    }

    #[test]
    fn test_declaration_order_not_name_order() {
        // "b" declared first varies slowest even though "a" sorts first
        let space = ParameterSpace::new().axis("b", [1, 2]).axis("a", [7, 8]);
        let got: Vec<Vec<i64>> = space.iter().map(|c| ints(&c, &["b", "a"])).collect();
        assert_eq!(got, vec![vec![1, 7], vec![1, 8], vec![2, 7], vec![2, 8]]);
    }

    #[test]
    fn test_empty_space_yields_nothing() {
        let space = ParameterSpace::new();
        assert_eq!(space.try_len().unwrap(), 0);
        assert_eq!(space.iter().count(), 0);
    }

    #[test]
    fn test_empty_axis_yields_nothing() {
        let space = ParameterSpace::new().axis("x", [1, 2]).axis("y", Vec::<i64>::new());
        assert_eq!(space.iter().count(), 0);
    }

    #[test]
    fn test_restartable_and_exact_size() {
        let space = ParameterSpace::new().axis("x", [1, 2, 3, 4]).axis("y", [6, 7, 8]);
        let it = space.iter();
        assert_eq!(it.len(), 12);
        assert_eq!(space.iter().count(), 12);
        assert_eq!(cartesian_product(&space).count(), 12);
    }

    #[test]
    fn test_redeclared_axis_keeps_position() {
        let space = ParameterSpace::new()
            .axis("x", [1])
            .axis("y", [2])
            .axis("x", [5, 6]);
        assert_eq!(space.names().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(space.try_len().unwrap(), 2);
    }

    #[test]
    fn test_overflowing_space_is_configuration_error() {
        let wide: Vec<i64> = (0..256).collect();
        let space = (0..9).fold(ParameterSpace::new(), |space, i| {
            space.axis(format!("p{i}"), wide.iter().copied())
        });
        assert!(matches!(space.try_len(), Err(Error::Configuration(_))));

        let mut it = space.iter();
        assert_eq!(it.len(), usize::MAX);
        let first = it.next().unwrap();
        assert_eq!(first["p8"].as_i64(), Some(0));
        assert_eq!(it.next().unwrap()["p8"].as_i64(), Some(1));
    }
}
