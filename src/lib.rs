//! # paramsweep: parameter sweep orchestration
//!
//! Run a simulation callback once per point of a cartesian parameter space,
//! keep every run's parameters and results on a [`Trajectory`], persist it
//! with selective reloading, and merge trajectories from separate sweeps
//! without duplicating runs.
//!
//! ## Building blocks
//!
//! - [`trajectory`]: parameters, results and run records, with dotted
//!   "natural naming" access (`traj.parameters().get("traffic.ncars")`)
//! - [`exploration`]: lazy cartesian product over declared axes
//! - [`environment`]: sequential, thread-pool and process-pool execution with
//!   resume
//! - [`merge`]: trajectory merge with signature-based run deduplication
//! - [`storage`]: file and in-memory backends, partial loads, array and frame
//!   slices
//! - [`value`]: scalar, n-d array, series and frame payloads
//!
//! ## Example
//!
//! ```rust
//! use paramsweep::environment::{Environment, ExploreOptions};
//! use paramsweep::exploration::ParameterSpace;
//! use paramsweep::storage::{FileStorage, StorageService};
//! use paramsweep::trajectory::{Parameter, ResultItem, Trajectory};
//!
//! # fn main() -> paramsweep::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let mut traj = Trajectory::new("sweep");
//! traj.add_parameter(Parameter::new("x", 0));
//! traj.add_parameter(Parameter::new("y", 0));
//!
//! let mut env = Environment::builder(traj)
//!     .storage(FileStorage::new(dir.path()))
//!     .build();
//! let space = ParameterSpace::new().axis("x", [1, 2]).axis("y", [10, 20]);
//! env.run_exploration(
//!     |traj| {
//!         let x = traj.parameter_value("x")?.as_i64().unwrap_or_default();
//!         let y = traj.parameter_value("y")?.as_i64().unwrap_or_default();
//!         traj.add_result(ResultItem::new("z", x * y));
//!         Ok(None)
//!     },
//!     &space,
//!     &ExploreOptions::new(),
//! )?;
//!
//! let loaded = FileStorage::new(dir.path()).load("sweep")?;
//! assert_eq!(loaded.run_count(), 4);
//! assert_eq!(loaded.results().leaf("by_run.00003.z")?.value().and_then(|v| v.as_i64()), Some(40));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod environment;
pub mod error;
pub mod exploration;
pub mod logging;
pub mod merge;
pub mod storage;
pub mod trajectory;
pub mod value;
pub mod worker;

pub use error::{Error, Result};
pub use trajectory::Trajectory;
