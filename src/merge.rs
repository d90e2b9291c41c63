//! Trajectory merge with duplicate-run elimination
//!
//! Merging folds a `source` trajectory into a `target`:
//!
//! - parameters and results are unioned by name; on a name collision the
//!   target's item is kept and the source's is dropped
//! - `by_run.*` mirror entries are not copied directly, they are rebuilt
//!   when the source's runs are replayed
//! - source runs are replayed in order under fresh ids continuing the
//!   target's numbering; with `remove_duplicates`, a run whose parameter
//!   signature is already present (in the target, or earlier in the same
//!   source) is skipped
//!
//! ```rust
//! use paramsweep::merge::{merge_trajectories, MergeOptions};
//! use paramsweep::trajectory::{Snapshot, Trajectory};
//! use paramsweep::value::Value;
//!
//! let params = |x: i64| Snapshot::from([("x".to_string(), Value::from(x))]);
//! let mut a = Trajectory::new("a");
//! a.record_run("00000", params(1), Snapshot::new());
//! let mut b = Trajectory::new("b");
//! b.record_run("00000", params(1), Snapshot::new());
//! b.record_run("00001", params(2), Snapshot::new());
//!
//! let report = merge_trajectories(&mut a, &b, &MergeOptions::default());
//! assert_eq!((report.appended, report.skipped), (1, 1));
//! assert_eq!(a.list_runs(), vec!["00000", "00001"]);
//! ```

use rustc_hash::FxHashSet;
use tracing::{debug, info, instrument};

use crate::trajectory::{run_id_for, Snapshot, Trajectory, BY_RUN_PREFIX};

/// Merge behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Skip source runs whose parameter signature is already present
    pub remove_duplicates: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            remove_duplicates: true,
        }
    }
}

impl MergeOptions {
    /// Options with duplicate removal switched on or off.
    #[must_use]
    pub const fn remove_duplicates(remove_duplicates: bool) -> Self {
        Self { remove_duplicates }
    }
}

/// Outcome of [`merge_trajectories`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Source runs appended to the target
    pub appended: usize,
    /// Source runs skipped as duplicates
    pub skipped: usize,
}

/// Canonical text of a parameter snapshot, independent of insertion order.
///
/// Keys are sorted; values use their JSON form, with non-finite floats
/// spelled out so NaN and the infinities stay distinct. Serializing a
/// snapshot does not fail for any value this crate can hold; the `Debug`
/// rendering (also key-sorted) only stands in should that ever change.
#[must_use]
pub fn params_signature(params: &Snapshot) -> String {
    serde_json::to_string(params).unwrap_or_else(|_| format!("{params:?}"))
}

/// Fold `source` into `target`.
#[instrument(skip_all, fields(target = target.name(), source = source.name()))]
pub fn merge_trajectories(
    target: &mut Trajectory,
    source: &Trajectory,
    options: &MergeOptions,
) -> MergeReport {
    for (name, param) in source.parameters().iter() {
        if target.parameter(name).is_err() {
            target.add_parameter(param.clone());
        }
    }

    let mirror = format!("{BY_RUN_PREFIX}.");
    for (name, result) in source.results().iter() {
        if name.starts_with(&mirror) {
            continue;
        }
        if target.result(name).is_err() {
            target.add_result(result.clone());
        }
    }

    let mut seen: FxHashSet<String> = target
        .run_records()
        .iter()
        .map(|r| params_signature(r.params()))
        .collect();

    let mut report = MergeReport::default();
    for record in source.run_records() {
        let signature = params_signature(record.params());
        if options.remove_duplicates && seen.contains(&signature) {
            debug!(run_id = record.run_id(), "Skipping duplicate run");
            report.skipped += 1;
            continue;
        }
        let run_id = run_id_for(target.run_count());
        target.record_run(run_id, record.params().clone(), record.results().clone());
        seen.insert(signature);
        report.appended += 1;
    }

    info!(
        appended = report.appended,
        skipped = report.skipped,
        "Merged trajectories"
    );
    report
}
