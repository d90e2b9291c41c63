//! Strategy-independent steps of an exploration
//!
//! Every strategy plans the same tasks, computes result deltas the same way
//! and commits outcomes through [`commit`], so run ids, parameter snapshots
//! and by-run mirrors are identical whichever strategy executed the callback.

use tracing::debug;

use super::Outputs;
use crate::exploration::{Combination, ParameterSpace};
use crate::trajectory::{run_id_for, Snapshot, Trajectory};
use crate::{Error, Result};

/// One scheduled callback invocation.
#[derive(Debug, Clone)]
pub(crate) struct Task {
    pub run_id: String,
    pub combination: Combination,
}

/// Tasks to execute plus the number skipped because they already ran.
#[derive(Debug, Default)]
pub(crate) struct Plan {
    pub tasks: Vec<Task>,
    pub skipped: usize,
}

/// Assign run ids by iteration index and drop already recorded ones when resuming.
pub(crate) fn plan(trajectory: &Trajectory, space: &ParameterSpace, resume: bool) -> Result<Plan> {
    space.try_len()?;
    let mut plan = Plan::default();
    for (index, combination) in space.iter().enumerate() {
        let run_id = run_id_for(index);
        if resume && trajectory.has_run(&run_id) {
            debug!(%run_id, "Skipping recorded run");
            plan.skipped += 1;
            continue;
        }
        plan.tasks.push(Task {
            run_id,
            combination,
        });
    }
    Ok(plan)
}

/// Invoke `sim` on `trajectory` and return its result delta.
///
/// The delta is every result written through `add_result` during the call,
/// overlaid with the returned mapping (returned values win).
pub(crate) fn invoke<F>(trajectory: &mut Trajectory, sim: F) -> anyhow::Result<Snapshot>
where
    F: FnOnce(&mut Trajectory) -> anyhow::Result<Option<Outputs>>,
{
    trajectory.begin_tracking();
    let returned = sim(trajectory);
    let mut delta = trajectory.take_touched();
    if let Some(outputs) = returned? {
        delta.extend(outputs);
    }
    Ok(delta)
}

/// Run `sim` against a fresh trajectory seeded with `baseline` overridden by `combination`.
pub(crate) fn run_isolated<F>(
    sim: &F,
    name: &str,
    baseline: &Snapshot,
    combination: &Combination,
) -> anyhow::Result<Snapshot>
where
    F: Fn(&mut Trajectory) -> anyhow::Result<Option<Outputs>>,
{
    let mut isolated = Trajectory::isolated(name, baseline, combination);
    invoke(&mut isolated, sim)
}

/// Fold one finished task into the live trajectory.
pub(crate) fn commit(trajectory: &mut Trajectory, task: &Task, results: Snapshot) {
    trajectory.set_parameter_values(task.combination.clone());
    for (name, value) in &results {
        trajectory.set_result_value(name.clone(), value.clone());
    }
    let params = trajectory.parameter_values();
    trajectory.record_run(task.run_id.clone(), params, results);
}

/// Commit outcomes in submission order, stopping at the first failure.
///
/// `outcomes` lines up with `tasks` and may be shorter when execution stopped early.
pub(crate) fn merge_back(
    trajectory: &mut Trajectory,
    tasks: &[Task],
    outcomes: Vec<Result<Snapshot>>,
) -> Result<()> {
    for (task, outcome) in tasks.iter().zip(outcomes) {
        commit(trajectory, task, outcome?);
    }
    Ok(())
}

/// Order outcomes of a pooled run for [`merge_back`].
///
/// Entries are `None` for tasks cancelled after another task failed. The
/// returned list keeps every success up to the first gap and ends with the
/// earliest failure, if any.
pub(crate) fn settle(
    tasks: &[Task],
    outcomes: Vec<Option<anyhow::Result<Snapshot>>>,
) -> Vec<Result<Snapshot>> {
    let mut settled = Vec::with_capacity(outcomes.len());
    let mut failure = None;
    let mut complete = true;
    for (task, outcome) in tasks.iter().zip(outcomes) {
        match outcome {
            Some(Ok(results)) if complete => settled.push(Ok(results)),
            Some(Err(e)) if failure.is_none() => {
                failure = Some(Error::callback(&task.run_id, e));
                complete = false;
            }
            _ => complete = false,
        }
    }
    if let Some(e) = failure {
        settled.push(Err(e));
    }
    settled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::{Parameter, ResultItem};
    use crate::value::Value;

    #[test]
    fn test_plan_skips_recorded_runs_when_resuming() {
        let mut traj = Trajectory::new("t");
        traj.record_run("00001", Snapshot::new(), Snapshot::new());
        let space = ParameterSpace::new().axis("x", [1, 2, 3]);

        let fresh = plan(&traj, &space, false).unwrap();
        assert_eq!(fresh.tasks.len(), 3);

        let resumed = plan(&traj, &space, true).unwrap();
        let ids: Vec<&str> = resumed.tasks.iter().map(|t| t.run_id.as_str()).collect();
        assert_eq!(ids, vec!["00000", "00002"]);
        assert_eq!(resumed.skipped, 1);
    }

    #[test]
    fn test_returned_values_win_over_writes() {
        let mut traj = Trajectory::new("t");
        let delta = invoke(&mut traj, |t| {
            t.add_result(ResultItem::new("z", 1));
            t.add_result(ResultItem::new("w", 5));
            Ok(Some(Snapshot::from([("z".to_string(), Value::from(2))])))
        })
        .unwrap();
        assert_eq!(delta["z"].as_i64(), Some(2));
        assert_eq!(delta["w"].as_i64(), Some(5));
    }

    #[test]
    fn test_commit_keeps_result_comment() {
        let mut traj = Trajectory::new("t");
        traj.add_parameter(Parameter::new("x", 0));
        traj.add_result(ResultItem::new("z", 0).with_comment("output"));
        let task = Task {
            run_id: "00000".into(),
            combination: Snapshot::from([("x".to_string(), Value::from(4))]),
        };
        commit(&mut traj, &task, Snapshot::from([("z".to_string(), Value::from(8))]));

        let z = traj.result("z").unwrap();
        assert_eq!(z.comment(), Some("output"));
        assert_eq!(z.value().and_then(Value::as_i64), Some(8));
        assert_eq!(traj.get_run_params("00000").unwrap()["x"].as_i64(), Some(4));
    }

    #[test]
    fn test_settle_reports_earliest_failure() {
        let tasks: Vec<Task> = (0..4)
            .map(|i| Task {
                run_id: run_id_for(i),
                combination: Snapshot::new(),
            })
            .collect();
        let outcomes = vec![
            Some(Ok(Snapshot::new())),
            None,
            Some(Err(anyhow::anyhow!("boom"))),
            Some(Ok(Snapshot::new())),
        ];
        let settled = settle(&tasks, outcomes);
        assert_eq!(settled.len(), 2);
        assert!(settled[0].is_ok());
        assert!(matches!(&settled[1], Err(Error::Callback { run_id, .. }) if run_id == "00002"));
    }
}
