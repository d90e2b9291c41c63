//! Storage backends for trajectories
//!
//! Persisted layout (structure, not byte format):
//!
//! ```text
//! <root>/trajectories/<trajectory>/
//!     parameters/<item>/   attrs.json (+ data.bin for ndarray)
//!     results/<item>/      attrs.json (+ data.bin for ndarray)
//!     runs/<run_id>/       attrs.json (params snapshot, timestamp)
//! ```
//!
//! Every item node carries a `kind` tag chosen from the runtime kind of its
//! value (`scalar`, `ndarray`, `series`, `frame`) and an optional comment.
//! Run nodes do not duplicate results: they are re-joined at load time from
//! the `by_run.<run_id>.<name>` mirror entries.
//!
//! Write pattern: [`StorageService::save`] replaces a whole trajectory, so no
//! stale node from an earlier save survives. Incremental persistence of one
//! freshly computed artifact goes through [`FileStorage::store_result`] /
//! [`FileStorage::store_parameter`].

mod codec;
mod dataset;
mod file;
mod memory;

pub use codec::{NodeAttrs, RunAttrs};
pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::trajectory::Trajectory;
use crate::{Error, Result};

/// Top-level group holding all trajectories.
pub const ROOT_GROUP: &str = "trajectories";
/// Group holding parameter nodes.
pub const PARAMETERS_GROUP: &str = "parameters";
/// Group holding result nodes.
pub const RESULTS_GROUP: &str = "results";
/// Group holding run metadata nodes.
pub const RUNS_GROUP: &str = "runs";

/// Persistence backend for whole trajectories.
pub trait StorageService: Send + Sync {
    /// Persist `trajectory`, replacing any trajectory of the same name.
    ///
    /// # Errors
    /// Returns `Error::Storage` on backend failure
    fn save(&self, trajectory: &Trajectory) -> Result<()>;

    /// Load a trajectory by name.
    ///
    /// # Errors
    /// Returns `Error::Lookup` for unknown names, `Error::Storage` on decode failure
    fn load(&self, name: &str) -> Result<Trajectory>;
}

impl<S: StorageService + ?Sized> StorageService for std::sync::Arc<S> {
    fn save(&self, trajectory: &Trajectory) -> Result<()> {
        (**self).save(trajectory)
    }

    fn load(&self, name: &str) -> Result<Trajectory> {
        (**self).load(name)
    }
}

/// Fidelity of a partial load for one item space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LoadLevel {
    /// Do not create the items at all (`0`)
    Omit,
    /// Create the items with unset values (`1`)
    Skeleton,
    /// Decode the values (`2`)
    #[default]
    Full,
}

impl TryFrom<u8> for LoadLevel {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        match level {
            0 => Ok(Self::Omit),
            1 => Ok(Self::Skeleton),
            2 => Ok(Self::Full),
            other => Err(Error::Configuration(format!(
                "load level must be 0, 1 or 2, got {other}"
            ))),
        }
    }
}

/// Options for [`FileStorage::load_partial`].
///
/// `load_only` restricts which *result* names are materialized at
/// [`LoadLevel::Full`]; excluded names are omitted at that level. At
/// [`LoadLevel::Skeleton`] every result still gets a skeleton entry.
///
/// Run metadata is always rebuilt, but a run's joined results only contain
/// the `by_run.*` leaves materialized by this call, so they can be empty even
/// though the run produced results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Fidelity for parameters
    pub parameters: LoadLevel,
    /// Fidelity for results
    pub results: LoadLevel,
    /// Result names to materialize at full fidelity (`None` = all)
    pub load_only: Option<Vec<String>>,
}

impl LoadOptions {
    /// Options with explicit levels for both spaces.
    #[must_use]
    pub const fn new(parameters: LoadLevel, results: LoadLevel) -> Self {
        Self {
            parameters,
            results,
            load_only: None,
        }
    }

    /// Options from numeric levels (`0` omit, `1` skeleton, `2` full).
    ///
    /// # Errors
    /// Returns `Error::Configuration` for levels above 2
    pub fn from_levels(parameters: u8, results: u8) -> Result<Self> {
        Ok(Self::new(parameters.try_into()?, results.try_into()?))
    }

    /// Restrict full result materialization to `names`.
    #[must_use]
    pub fn load_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.load_only = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Whether result `name` is materialized at full fidelity.
    pub(crate) fn wants_result(&self, name: &str) -> bool {
        self.load_only
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| n == name))
    }
}
