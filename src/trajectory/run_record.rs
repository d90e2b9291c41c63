//! Run Record - one executed combination of an exploration

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::Value;

/// Parameter or result snapshot keyed by fully qualified name.
pub type Snapshot = BTreeMap<String, Value>;

/// Width of zero-padded run ids.
pub const RUN_ID_WIDTH: usize = 5;

/// Zero-padded run id for iteration index `index` (`0` → `"00000"`).
///
/// Indices of 100 000 and above produce wider ids; ids are unique only below
/// that bound.
#[must_use]
pub fn run_id_for(index: usize) -> String {
    format!("{index:0width$}", width = RUN_ID_WIDTH)
}

/// Run Record represents a single execution of the simulation callback.
///
/// Records are append-only: once pushed onto a trajectory they are never
/// mutated, including during merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    run_id: String,
    params: Snapshot,
    results: Snapshot,
    timestamp: DateTime<Utc>,
}

impl RunRecord {
    /// Create a new run record stamped with the current time.
    ///
    /// # Arguments
    ///
    /// * `run_id` - Zero-padded run id
    /// * `params` - Full parameter snapshot at call time
    /// * `results` - Results produced by this run
    #[must_use]
    pub fn new(run_id: impl Into<String>, params: Snapshot, results: Snapshot) -> Self {
        Self {
            run_id: run_id.into(),
            params,
            results,
            timestamp: Utc::now(),
        }
    }

    /// Create a builder for constructing a run record with optional fields.
    #[must_use]
    pub fn builder(run_id: impl Into<String>) -> RunRecordBuilder {
        RunRecordBuilder::new(run_id)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parameter snapshot.
    #[must_use]
    pub const fn params(&self) -> &Snapshot {
        &self.params
    }

    /// Get the results produced by this run.
    #[must_use]
    pub const fn results(&self) -> &Snapshot {
        &self.results
    }

    /// Get the timestamp when the run was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// ISO-8601 UTC rendering of the timestamp.
    #[must_use]
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

/// Builder for `RunRecord`.
#[derive(Debug)]
pub struct RunRecordBuilder {
    run_id: String,
    params: Snapshot,
    results: Snapshot,
    timestamp: DateTime<Utc>,
}

impl RunRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            params: Snapshot::new(),
            results: Snapshot::new(),
            timestamp: Utc::now(),
        }
    }

    /// Set the parameter snapshot.
    #[must_use]
    pub fn params(mut self, params: Snapshot) -> Self {
        self.params = params;
        self
    }

    /// Set the run results.
    #[must_use]
    pub fn results(mut self, results: Snapshot) -> Self {
        self.results = results;
        self
    }

    /// Set a custom timestamp (used when reloading persisted runs).
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build the `RunRecord`.
    #[must_use]
    pub fn build(self) -> RunRecord {
        RunRecord {
            run_id: self.run_id,
            params: self.params,
            results: self.results,
            timestamp: self.timestamp,
        }
    }
}
