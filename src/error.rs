//! Error types for paramsweep
//!
//! Four families cover everything the crate reports: invalid setup
//! (configuration), backend read/write failures (storage), unknown names
//! (lookup) and kind mismatches. Callback failures carry the run id they
//! aborted.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Paramsweep error types
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or conflicting setup (e.g. zero workers, malformed shape)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Storage backend failure (missing node, corrupt attribute, bad dataset)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unknown parameter, result, run, column or trajectory name
    #[error("Unknown {what} `{name}`")]
    Lookup {
        /// What kind of thing was looked up
        what: &'static str,
        /// The name that could not be resolved
        name: String,
    },

    /// Stored or in-memory value has a different kind than requested
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected kind
        expected: String,
        /// Kind actually present
        found: String,
    },

    /// Simulation callback failed; exploration was aborted
    #[error("Simulation callback failed in run {run_id}: {source}")]
    Callback {
        /// Run that was being executed
        run_id: String,
        /// Error returned by the callback
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// Worker process protocol failure (spawn, broken pipe, malformed reply)
    #[error("Worker error: {0}")]
    Worker(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a lookup failure.
    pub fn lookup(what: &'static str, name: impl Into<String>) -> Self {
        Self::Lookup {
            what,
            name: name.into(),
        }
    }

    /// Build a type mismatch.
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Wrap a callback failure with the run it aborted.
    pub fn callback(run_id: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Callback {
            run_id: run_id.into(),
            source: source.into(),
        }
    }

    /// True for the lookup family.
    #[must_use]
    pub const fn is_lookup(&self) -> bool {
        matches!(self, Self::Lookup { .. })
    }
}
