//! Worker side of the process-pool strategy
//!
//! A worker program hosts the simulation callback and talks to the
//! orchestrator over its standard streams, one JSON document per line:
//!
//! ```text
//! orchestrator → worker   {"run_id":"00003","trajectory":"sweep","params":{...}}
//! worker → orchestrator   {"status":"completed","run_id":"00003","results":{...}}
//!                         {"status":"failed","run_id":"00003","message":"..."}
//! ```
//!
//! Stdout is reserved for replies, so workers must log to stderr. A callback
//! failure is reported back and the worker keeps serving.
//!
//! ```rust,no_run
//! use paramsweep::trajectory::ResultItem;
//!
//! fn main() -> paramsweep::Result<()> {
//!     paramsweep::worker::serve(|traj| {
//!         let x = traj.parameter_value("x")?.as_i64().unwrap_or_default();
//!         traj.add_result(ResultItem::new("double", x * 2));
//!         Ok(None)
//!     })
//! }
//! ```

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::environment::{engine, Outputs};
use crate::trajectory::{Snapshot, Trajectory};
use crate::Result;

/// One run to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// Run id assigned by the orchestrator
    pub run_id: String,
    /// Name of the trajectory being explored
    pub trajectory: String,
    /// Baseline parameter values with the combination already applied
    pub params: Snapshot,
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerReply {
    /// The callback returned normally
    Completed {
        /// Run id echoed from the request
        run_id: String,
        /// Result delta of the run
        results: Snapshot,
    },
    /// The callback returned an error
    Failed {
        /// Run id echoed from the request
        run_id: String,
        /// Rendered error chain
        message: String,
    },
}

impl WorkerReply {
    /// Run id this reply answers.
    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            Self::Completed { run_id, .. } | Self::Failed { run_id, .. } => run_id,
        }
    }
}

/// Execute one request against a fresh trajectory.
pub fn handle<F>(sim: &F, request: WorkerRequest) -> WorkerReply
where
    F: Fn(&mut Trajectory) -> anyhow::Result<Option<Outputs>>,
{
    let mut traj = Trajectory::isolated(request.trajectory, &request.params, &Snapshot::new());
    match engine::invoke(&mut traj, sim) {
        Ok(results) => WorkerReply::Completed {
            run_id: request.run_id,
            results,
        },
        Err(e) => {
            warn!(run_id = %request.run_id, error = %e, "Run failed");
            WorkerReply::Failed {
                run_id: request.run_id,
                message: format!("{e:#}"),
            }
        }
    }
}

/// Serve requests from stdin until it closes.
///
/// # Errors
/// Returns `Error::Io` if a stream breaks and `Error::Json` for a malformed request
pub fn serve<F>(sim: F) -> Result<()>
where
    F: Fn(&mut Trajectory) -> anyhow::Result<Option<Outputs>>,
{
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let request: WorkerRequest = serde_json::from_str(&line)?;
        debug!(run_id = %request.run_id, "Received run");
        let reply = handle(&sim, request);
        serde_json::to_writer(&mut stdout, &reply)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::ResultItem;
    use crate::value::{ArrayData, NdArray, Value};

    fn request(x: i64) -> WorkerRequest {
        WorkerRequest {
            run_id: "00004".into(),
            trajectory: "t".into(),
            params: Snapshot::from([("x".to_string(), Value::from(x))]),
        }
    }

    fn square(traj: &mut Trajectory) -> anyhow::Result<Option<Outputs>> {
        let x = traj.parameter_value("x")?.as_i64().unwrap_or_default();
        anyhow::ensure!(x >= 0, "negative input {x}");
        traj.add_result(ResultItem::new("sq", x * x));
        Ok(None)
    }

    #[test]
    fn test_handle_completed() {
        match handle(&square, request(3)) {
            WorkerReply::Completed { run_id, results } => {
                assert_eq!(run_id, "00004");
                assert_eq!(results["sq"].as_i64(), Some(9));
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_handle_failed_keeps_message() {
        let reply = handle(&square, request(-1));
        assert_eq!(reply.run_id(), "00004");
        assert!(matches!(reply, WorkerReply::Failed { ref message, .. } if message.contains("negative input")));
    }

    #[test]
    fn test_reply_carries_non_finite_arrays() {
        let reply = handle(
            &|traj: &mut Trajectory| -> anyhow::Result<Option<Outputs>> {
                let values = vec![f64::NAN, f64::NEG_INFINITY];
                traj.add_result(ResultItem::new("a", NdArray::from_f64(values)));
                Ok(None)
            },
            request(1),
        );
        let line = serde_json::to_string(&reply).unwrap();
        let WorkerReply::Completed { results, .. } = serde_json::from_str(&line).unwrap() else {
            panic!("expected a completed reply: {line}");
        };
        match results["a"].as_array().map(NdArray::data) {
            Some(ArrayData::Float64(v)) => {
                assert!(v[0].is_nan());
                assert_eq!(v[1], f64::NEG_INFINITY);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_reply_wire_format() {
        let reply = WorkerReply::Failed {
            run_id: "00000".into(),
            message: "boom".into(),
        };
        let line = serde_json::to_string(&reply).unwrap();
        assert!(line.contains(r#""status":"failed""#));
        assert_eq!(serde_json::from_str::<WorkerReply>(&line).unwrap(), reply);
    }
}
