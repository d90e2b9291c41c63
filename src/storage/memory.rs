//! In-memory trajectory store using `DashMap`.
//!
//! Nothing is written to disk; contents are lost when the store is dropped.
//! Useful for tests and for sweeps that only need the merge/query API.

use super::StorageService;
use crate::trajectory::Trajectory;
use crate::{Error, Result};
use dashmap::DashMap;

/// In-memory trajectory store.
///
/// Thread-safe; saved trajectories are cloned in and out, so later edits to
/// the caller's copy never leak into the stored one.
///
/// # Example
///
/// ```rust
/// use paramsweep::storage::{MemoryStorage, StorageService};
/// use paramsweep::trajectory::{Parameter, Trajectory};
///
/// # fn example() -> paramsweep::Result<()> {
/// let store = MemoryStorage::new();
/// let mut traj = Trajectory::new("demo");
/// traj.add_parameter(Parameter::new("x", 1));
/// store.save(&traj)?;
///
/// let loaded = store.load("demo")?;
/// assert_eq!(loaded.parameter_value("x")?.as_i64(), Some(1));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct MemoryStorage {
    store: DashMap<String, Trajectory>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    /// Create with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: DashMap::with_capacity(capacity),
        }
    }

    /// Get the number of stored trajectories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Remove every stored trajectory.
    pub fn clear(&self) {
        self.store.clear();
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageService for MemoryStorage {
    fn save(&self, trajectory: &Trajectory) -> Result<()> {
        self.store
            .insert(trajectory.name().to_string(), trajectory.clone());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Trajectory> {
        self.store
            .get(name)
            .map(|t| t.value().clone())
            .ok_or_else(|| Error::lookup("trajectory", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::Parameter;

    #[test]
    fn test_save_replaces() {
        let store = MemoryStorage::new();
        let mut traj = Trajectory::new("t");
        traj.add_parameter(Parameter::new("x", 1));
        store.save(&traj).unwrap();
        traj.add_parameter(Parameter::new("x", 2));
        store.save(&traj).unwrap();

        assert_eq!(store.len(), 1);
        let loaded = store.load("t").unwrap();
        assert_eq!(loaded.parameter_value("x").unwrap().as_i64(), Some(2));
    }

    #[test]
    fn test_unknown_trajectory() {
        let store = MemoryStorage::default();
        assert!(store.load("missing").unwrap_err().is_lookup());
        store.clear();
        assert!(store.is_empty());
    }
}
