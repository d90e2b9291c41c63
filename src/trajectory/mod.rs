//! Trajectory - parameters, results and run records of one sweep
//!
//! ## Layout
//!
//! ```text
//! Trajectory
//!   ├── parameters: name → Parameter      (flat, dotted names)
//!   ├── results:    name → ResultItem     (flat, dotted names)
//!   │     └── by_run.<run_id>.<name>      (mirror of every run result)
//!   └── runs: [RunRecord]                 (append-only, run id order)
//! ```
//!
//! Dots are a presentation-layer grouping exposed through [`Namespace`]; the
//! maps themselves are flat.
//!
//! ## Usage
//!
//! ```rust
//! use paramsweep::trajectory::{Parameter, ResultItem, Trajectory};
//!
//! let mut traj = Trajectory::new("demo");
//! traj.add_parameter(Parameter::new("traffic.ncars", 42));
//! traj.add_result(ResultItem::new("traffic.jams", 3));
//!
//! let traffic = traj.parameters().get("traffic").unwrap();
//! let ncars = traffic.as_group().unwrap().leaf("ncars").unwrap();
//! assert_eq!(ncars.value().and_then(|v| v.as_i64()), Some(42));
//! ```

mod leaf;
mod namespace;
mod run_record;

pub use leaf::{Leaf, Parameter, ResultItem};
pub use namespace::{children_under, Namespace, Node};
pub use run_record::{run_id_for, RunRecord, RunRecordBuilder, Snapshot, RUN_ID_WIDTH};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::value::Value;
use crate::{Error, Result};

/// Prefix of the synthetic result keys mirroring run results.
pub const BY_RUN_PREFIX: &str = "by_run";

/// Mirror key for `result` produced by `run_id` (`by_run.<run_id>.<result>`).
#[must_use]
pub fn by_run_key(run_id: &str, result: &str) -> String {
    format!("{BY_RUN_PREFIX}.{run_id}.{result}")
}

/// Split a mirror key into `(run_id, result_name)`.
#[must_use]
pub fn parse_by_run_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix(BY_RUN_PREFIX)?.strip_prefix('.')?;
    rest.split_once('.')
}

/// Aggregate root holding one experiment's parameters, results and runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trajectory {
    name: String,
    parameters: BTreeMap<String, Parameter>,
    results: BTreeMap<String, ResultItem>,
    runs: Vec<RunRecord>,
    #[serde(skip)]
    touched: Option<BTreeSet<String>>,
}

impl Trajectory {
    /// Create an empty trajectory.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Isolated copy for a pooled task: baseline values overridden by `combination`.
    #[must_use]
    pub fn isolated(name: impl Into<String>, baseline: &Snapshot, combination: &Snapshot) -> Self {
        let mut traj = Self::new(name);
        traj.set_parameter_values(baseline.clone());
        traj.set_parameter_values(combination.clone());
        traj
    }

    /// Trajectory name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    // --- Parameters ---

    /// Register a parameter, overwriting any existing one with the same name.
    pub fn add_parameter(&mut self, parameter: Parameter) {
        self.parameters
            .insert(parameter.name().to_string(), parameter);
    }

    /// Set parameter values by fully qualified name, creating missing ones.
    pub fn set_parameter_values<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (name, value) in values {
            match self.parameters.get_mut(&name) {
                Some(param) => param.set_value(value),
                None => {
                    let param = Parameter::new(name.clone(), value);
                    self.parameters.insert(name, param);
                }
            }
        }
    }

    /// Parameter by fully qualified name.
    ///
    /// # Errors
    /// Returns `Error::Lookup` for unknown names
    pub fn parameter(&self, name: &str) -> Result<&Parameter> {
        self.parameters
            .get(name)
            .ok_or_else(|| Error::lookup("parameter", name))
    }

    /// Materialized value of a parameter.
    ///
    /// # Errors
    /// Returns `Error::Lookup` for unknown names or skeleton parameters
    pub fn parameter_value(&self, name: &str) -> Result<&Value> {
        self.parameter(name)?
            .value()
            .ok_or_else(|| Error::lookup("parameter value", name))
    }

    /// Natural-naming view over the parameters.
    #[must_use]
    pub fn parameters(&self) -> Namespace<'_> {
        Namespace::root(&self.parameters, "parameter")
    }

    /// Snapshot of every materialized parameter value.
    #[must_use]
    pub fn parameter_values(&self) -> Snapshot {
        self.parameters
            .iter()
            .filter_map(|(name, p)| p.value().map(|v| (name.clone(), v.clone())))
            .collect()
    }

    // --- Results ---

    /// Attach a result, overwriting any existing one with the same name.
    pub fn add_result(&mut self, result: ResultItem) {
        if let Some(touched) = self.touched.as_mut() {
            touched.insert(result.name().to_string());
        }
        self.results.insert(result.name().to_string(), result);
    }

    /// Set a result value by name, keeping an existing item's comment.
    pub(crate) fn set_result_value(&mut self, name: String, value: Value) {
        match self.results.get_mut(&name) {
            Some(result) => result.set_value(value),
            None => {
                let result = ResultItem::new(name.clone(), value);
                self.results.insert(name, result);
            }
        }
    }

    /// Result by fully qualified name.
    ///
    /// # Errors
    /// Returns `Error::Lookup` for unknown names
    pub fn result(&self, name: &str) -> Result<&ResultItem> {
        self.results
            .get(name)
            .ok_or_else(|| Error::lookup("result", name))
    }

    /// Natural-naming view over the results.
    #[must_use]
    pub fn results(&self) -> Namespace<'_> {
        Namespace::root(&self.results, "result")
    }

    /// Start recording the names of results written through [`add_result`](Self::add_result).
    pub(crate) fn begin_tracking(&mut self) {
        self.touched = Some(BTreeSet::new());
    }

    /// Stop recording and return every result written since `begin_tracking`
    /// with its current value.
    pub(crate) fn take_touched(&mut self) -> Snapshot {
        let touched = self.touched.take().unwrap_or_default();
        touched
            .into_iter()
            .filter_map(|name| {
                let value = self.results.get(&name)?.value()?.clone();
                Some((name, value))
            })
            .collect()
    }

    // --- Runs ---

    /// Append a run record and mirror its results under `by_run.<run_id>.*`.
    pub fn record_run(&mut self, run_id: impl Into<String>, params: Snapshot, results: Snapshot) {
        self.push_run(RunRecord::new(run_id, params, results));
    }

    /// Append an already built record, mirroring its results.
    pub(crate) fn push_run(&mut self, record: RunRecord) {
        for (name, value) in record.results() {
            let key = by_run_key(record.run_id(), name);
            self.results.insert(key.clone(), ResultItem::new(key, value.clone()));
        }
        self.runs.push(record);
    }

    /// Append a reloaded record without touching the results map.
    pub(crate) fn restore_run(&mut self, record: RunRecord) {
        self.runs.push(record);
    }

    /// All run records in append order.
    #[must_use]
    pub fn run_records(&self) -> &[RunRecord] {
        &self.runs
    }

    /// Get the number of recorded runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Run ids in append order.
    #[must_use]
    pub fn list_runs(&self) -> Vec<&str> {
        self.runs.iter().map(RunRecord::run_id).collect()
    }

    /// True if a run with this id has been recorded.
    #[must_use]
    pub fn has_run(&self, run_id: &str) -> bool {
        self.runs.iter().any(|r| r.run_id() == run_id)
    }

    /// Run record by id.
    ///
    /// # Errors
    /// Returns `Error::Lookup` for unknown run ids
    pub fn run(&self, run_id: &str) -> Result<&RunRecord> {
        self.runs
            .iter()
            .find(|r| r.run_id() == run_id)
            .ok_or_else(|| Error::lookup("run", run_id))
    }

    /// Parameter snapshot of a run.
    ///
    /// # Errors
    /// Returns `Error::Lookup` for unknown run ids
    pub fn get_run_params(&self, run_id: &str) -> Result<&Snapshot> {
        self.run(run_id).map(RunRecord::params)
    }

    /// Results of a run.
    ///
    /// For trajectories rebuilt by a partial load this only contains the
    /// mirrored leaves that were actually materialized.
    ///
    /// # Errors
    /// Returns `Error::Lookup` for unknown run ids
    pub fn get_run_results(&self, run_id: &str) -> Result<&Snapshot> {
        self.run(run_id).map(RunRecord::results)
    }

    /// Ids of runs whose parameter snapshot satisfies `predicate`, in run order.
    pub fn find_runs<P>(&self, mut predicate: P) -> Vec<String>
    where
        P: FnMut(&Snapshot) -> bool,
    {
        self.runs
            .iter()
            .filter(|r| predicate(r.params()))
            .map(|r| r.run_id().to_string())
            .collect()
    }

    /// Values of result `name` across runs, in run order, read from the by-run mirror.
    ///
    /// Runs that did not produce `name` (or whose mirror was not loaded) are skipped.
    #[must_use]
    pub fn collect_runs(&self, name: &str) -> Vec<Value> {
        self.runs
            .iter()
            .filter_map(|r| {
                self.results
                    .get(&by_run_key(r.run_id(), name))
                    .and_then(Leaf::value)
                    .cloned()
            })
            .collect()
    }
}
