//! Thread-pool strategy (rayon)

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::debug;

use super::engine::{self, Task};
use super::Outputs;
use crate::trajectory::{Snapshot, Trajectory};
use crate::{Error, Result};

/// Run every task on a dedicated pool of `workers` threads.
///
/// Outcomes come back in task order regardless of completion order. Once a
/// task fails, later tasks that have not started yet are cancelled; every
/// task before the earliest failure still runs to completion.
pub(crate) fn execute<F>(
    sim: &F,
    name: &str,
    baseline: &Snapshot,
    tasks: &[Task],
    workers: usize,
) -> Result<Vec<Result<Snapshot>>>
where
    F: Fn(&mut Trajectory) -> anyhow::Result<Option<Outputs>> + Send + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("sweep-worker-{i}"))
        .build()
        .map_err(|e| Error::Configuration(format!("Failed to build thread pool: {e}")))?;

    let first_failure = AtomicUsize::new(usize::MAX);
    let outcomes: Vec<Option<anyhow::Result<Snapshot>>> = pool.install(|| {
        tasks
            .par_iter()
            .enumerate()
            .map(|(i, task)| {
                if i > first_failure.load(Ordering::Acquire) {
                    return None;
                }
                debug!(run_id = %task.run_id, "Dispatching run");
                let outcome = engine::run_isolated(sim, name, baseline, &task.combination);
                if outcome.is_err() {
                    first_failure.fetch_min(i, Ordering::AcqRel);
                }
                Some(outcome)
            })
            .collect()
    });

    Ok(engine::settle(tasks, outcomes))
}
