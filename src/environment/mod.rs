//! Execution environment: runs a simulation callback over a parameter space
//!
//! Three strategies share one pipeline:
//!
//! 1. Enumerate combinations; run `i` gets id [`run_id_for(i)`](crate::trajectory::run_id_for).
//! 2. With [`ExploreOptions::resume`], skip ids already recorded.
//! 3. Capture the baseline parameter values once.
//! 4. Execute: on the live trajectory (sequential), or on an isolated copy per
//!    task (threads, processes).
//! 5. Merge outcomes back in submission order and record each run.
//! 6. Persist the trajectory if a storage backend is attached.
//!
//! A callback error aborts the exploration; runs recorded before it stay in
//! the trajectory, and a second call with `resume` picks up where it stopped.
//!
//! ```rust
//! use paramsweep::environment::{Environment, ExploreOptions};
//! use paramsweep::exploration::ParameterSpace;
//! use paramsweep::trajectory::{Parameter, ResultItem};
//!
//! # fn example() -> paramsweep::Result<()> {
//! let mut env = Environment::new("demo");
//! env.trajectory_mut().add_parameter(Parameter::new("x", 0));
//!
//! let space = ParameterSpace::new().axis("x", [1, 2, 3]);
//! let report = env.run_exploration(
//!     |traj| {
//!         let x = traj.parameter_value("x")?.as_i64().unwrap_or_default();
//!         traj.add_result(ResultItem::new("sq", x * x));
//!         Ok(None)
//!     },
//!     &space,
//!     &ExploreOptions::new(),
//! )?;
//!
//! assert_eq!(report.executed, 3);
//! assert_eq!(env.trajectory().list_runs(), vec!["00000", "00001", "00002"]);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! Shared state between runs (counters, collected samples) belongs to the
//! caller: capture a channel sender or an `Arc<Mutex<_>>` in the closure.
//! Nothing in the environment owns or globalizes it.

pub(crate) mod engine;
#[cfg(feature = "tokio")]
mod processes;
#[cfg(feature = "rayon")]
mod threads;

#[cfg(feature = "tokio")]
pub use processes::ProcessPool;

use tracing::{info, instrument};

use crate::exploration::ParameterSpace;
use crate::storage::StorageService;
use crate::trajectory::{Snapshot, Trajectory};
use crate::{Error, Result};

/// Name → value mapping a callback may return in addition to the results it
/// writes. Returned values win over written ones.
pub type Outputs = Snapshot;

/// Options shared by all exploration strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExploreOptions {
    resume: bool,
    workers: usize,
}

impl Default for ExploreOptions {
    fn default() -> Self {
        Self {
            resume: false,
            workers: std::thread::available_parallelism().map_or(1, usize::from),
        }
    }
}

impl ExploreOptions {
    /// Defaults: no resume, one worker per available CPU.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip run ids already recorded on the trajectory.
    #[must_use]
    pub const fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Pool size for the thread and process strategies.
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Whether resume mode is on.
    #[must_use]
    pub const fn is_resume(&self) -> bool {
        self.resume
    }

    /// Configured pool size.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.workers
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Configuration(
                "worker count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// What an exploration did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplorationReport {
    /// Runs executed and recorded
    pub executed: usize,
    /// Runs skipped because they were already recorded
    pub skipped: usize,
}

/// Owns the live trajectory and an optional storage backend.
pub struct Environment {
    trajectory: Trajectory,
    storage: Option<Box<dyn StorageService>>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("trajectory", &self.trajectory.name())
            .field("storage", &self.storage.is_some())
            .finish()
    }
}

impl Environment {
    /// Environment around an empty trajectory, without storage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(Trajectory::new(name)).build()
    }

    /// Builder around an existing trajectory.
    #[must_use]
    pub fn builder(trajectory: Trajectory) -> EnvironmentBuilder {
        EnvironmentBuilder::new(trajectory)
    }

    /// Live trajectory.
    #[must_use]
    pub const fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// Mutable live trajectory, for registering parameters before exploring.
    pub fn trajectory_mut(&mut self) -> &mut Trajectory {
        &mut self.trajectory
    }

    /// Consume the environment and return its trajectory.
    #[must_use]
    pub fn into_trajectory(self) -> Trajectory {
        self.trajectory
    }

    /// Attached storage backend.
    #[must_use]
    pub fn storage(&self) -> Option<&dyn StorageService> {
        self.storage.as_deref()
    }

    /// Run `sim` once against the live trajectory, then persist.
    ///
    /// No run record is created. Values returned by `sim` are added as results.
    ///
    /// # Errors
    /// Returns `Error::Callback` if `sim` fails, or the storage error on save
    pub fn run<F>(&mut self, sim: F) -> Result<()>
    where
        F: FnOnce(&mut Trajectory) -> anyhow::Result<Option<Outputs>>,
    {
        let results = engine::invoke(&mut self.trajectory, sim)
            .map_err(|e| Error::callback("single", e))?;
        for (name, value) in results {
            self.trajectory.set_result_value(name, value);
        }
        self.persist()
    }

    /// Explore `space` sequentially on the live trajectory.
    ///
    /// Each combination is written onto the live parameters before `sim`
    /// runs, so later runs see earlier runs' results.
    ///
    /// # Errors
    /// Returns `Error::Callback` for the first failing run, or the storage
    /// error on save
    #[instrument(skip_all, fields(trajectory = self.trajectory.name(), combinations = space.iter().len()))]
    pub fn run_exploration<F>(
        &mut self,
        mut sim: F,
        space: &ParameterSpace,
        options: &ExploreOptions,
    ) -> Result<ExplorationReport>
    where
        F: FnMut(&mut Trajectory) -> anyhow::Result<Option<Outputs>>,
    {
        options.validate()?;
        let plan = engine::plan(&self.trajectory, space, options.resume)?;
        for task in &plan.tasks {
            self.trajectory
                .set_parameter_values(task.combination.clone());
            let results = engine::invoke(&mut self.trajectory, &mut sim)
                .map_err(|e| Error::callback(&task.run_id, e))?;
            engine::commit(&mut self.trajectory, task, results);
        }
        self.finish(plan.tasks.len(), plan.skipped)
    }

    /// Explore `space` on a pool of `options` worker threads.
    ///
    /// Every task runs on an isolated trajectory holding the baseline
    /// parameters overridden by its combination; it does not see other runs'
    /// results. Outcomes are recorded in run id order.
    ///
    /// # Errors
    /// Returns `Error::Configuration` for zero workers, `Error::Callback` for
    /// the first failing run, or the storage error on save
    #[cfg(feature = "rayon")]
    #[instrument(skip_all, fields(trajectory = self.trajectory.name(), combinations = space.iter().len()))]
    pub fn run_exploration_parallel<F>(
        &mut self,
        sim: F,
        space: &ParameterSpace,
        options: &ExploreOptions,
    ) -> Result<ExplorationReport>
    where
        F: Fn(&mut Trajectory) -> anyhow::Result<Option<Outputs>> + Send + Sync,
    {
        options.validate()?;
        let plan = engine::plan(&self.trajectory, space, options.resume)?;
        let baseline = self.trajectory.parameter_values();
        let outcomes = threads::execute(
            &sim,
            self.trajectory.name(),
            &baseline,
            &plan.tasks,
            options.workers,
        )?;
        engine::merge_back(&mut self.trajectory, &plan.tasks, outcomes)?;
        self.finish(plan.tasks.len(), plan.skipped)
    }

    /// Explore `space` on a pool of worker processes running `pool`'s program.
    ///
    /// Same isolation and ordering as [`run_exploration_parallel`](Self::run_exploration_parallel);
    /// parameter values cross the process boundary as JSON. Must not be
    /// called from inside an async runtime.
    ///
    /// # Errors
    /// Returns `Error::Worker` if a worker cannot be spawned or breaks the
    /// protocol, `Error::Callback` for the first failing run, or the storage
    /// error on save
    #[cfg(feature = "tokio")]
    #[instrument(skip_all, fields(trajectory = self.trajectory.name(), combinations = space.iter().len()))]
    pub fn run_exploration_processes(
        &mut self,
        pool: &ProcessPool,
        space: &ParameterSpace,
        options: &ExploreOptions,
    ) -> Result<ExplorationReport> {
        options.validate()?;
        let plan = engine::plan(&self.trajectory, space, options.resume)?;
        let baseline = self.trajectory.parameter_values();
        let requests = plan
            .tasks
            .iter()
            .map(|task| {
                let mut params = baseline.clone();
                params.extend(task.combination.clone());
                crate::worker::WorkerRequest {
                    run_id: task.run_id.clone(),
                    trajectory: self.trajectory.name().to_string(),
                    params,
                }
            })
            .collect();
        let outcomes = processes::execute(pool, requests, options.workers)?;
        engine::merge_back(&mut self.trajectory, &plan.tasks, outcomes)?;
        self.finish(plan.tasks.len(), plan.skipped)
    }

    fn finish(&self, executed: usize, skipped: usize) -> Result<ExplorationReport> {
        self.persist()?;
        info!(executed, skipped, "Exploration finished");
        Ok(ExplorationReport { executed, skipped })
    }

    fn persist(&self) -> Result<()> {
        match &self.storage {
            Some(storage) => storage.save(&self.trajectory),
            None => Ok(()),
        }
    }
}

/// Builder for [`Environment`].
pub struct EnvironmentBuilder {
    trajectory: Trajectory,
    storage: Option<Box<dyn StorageService>>,
}

impl EnvironmentBuilder {
    /// Builder around `trajectory`.
    #[must_use]
    pub fn new(trajectory: Trajectory) -> Self {
        Self {
            trajectory,
            storage: None,
        }
    }

    /// Persist the trajectory to `storage` after every run or exploration.
    #[must_use]
    pub fn storage(mut self, storage: impl StorageService + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    /// Build the environment.
    #[must_use]
    pub fn build(self) -> Environment {
        Environment {
            trajectory: self.trajectory,
            storage: self.storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::trajectory::{Parameter, ResultItem};
    use std::sync::Arc;

    #[test]
    fn test_zero_workers_rejected() {
        let mut env = Environment::new("t");
        let space = ParameterSpace::new().axis("x", [1]);
        let err = env
            .run_exploration(|_| Ok(None), &space, &ExploreOptions::new().workers(0))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(env.trajectory().run_count(), 0);
    }

    #[test]
    fn test_run_saves_without_recording() {
        let storage = Arc::new(MemoryStorage::new());
        let mut env = Environment::builder(Trajectory::new("t"))
            .storage(Arc::clone(&storage))
            .build();
        env.trajectory_mut().add_parameter(Parameter::new("x", 2));
        env.run(|traj| {
            let x = traj.parameter_value("x")?.as_i64().unwrap_or_default();
            traj.add_result(ResultItem::new("y", x + 1));
            Ok(None)
        })
        .unwrap();

        assert_eq!(env.trajectory().run_count(), 0);
        let saved = storage.load("t").unwrap();
        assert_eq!(saved.result("y").unwrap().value().and_then(|v| v.as_i64()), Some(3));
    }

    #[test]
    fn test_sequential_runs_see_earlier_results() {
        let mut env = Environment::new("t");
        let space = ParameterSpace::new().axis("x", [1, 2, 3]);
        env.run_exploration(
            |traj| {
                let prev = traj
                    .result("acc")
                    .ok()
                    .and_then(|r| r.value())
                    .and_then(|v| v.as_i64())
                    .unwrap_or_default();
                let x = traj.parameter_value("x")?.as_i64().unwrap_or_default();
                traj.add_result(ResultItem::new("acc", prev + x));
                Ok(None)
            },
            &space,
            &ExploreOptions::new(),
        )
        .unwrap();
        let acc: Vec<i64> = env
            .trajectory()
            .collect_runs("acc")
            .iter()
            .filter_map(|v| v.as_i64())
            .collect();
        assert_eq!(acc, vec![1, 3, 6]);
    }
}
