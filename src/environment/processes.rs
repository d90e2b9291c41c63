//! Process-pool strategy (tokio child processes)
//!
//! Each pool slot is a long-lived worker process speaking the line protocol
//! of [`crate::worker`]. Jobs are pulled from a shared queue, so a slow run
//! never blocks the others; replies are awaited in submission order.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

use crate::trajectory::Snapshot;
use crate::worker::{WorkerReply, WorkerRequest};
use crate::{Error, Result};

/// Worker program used by [`Environment::run_exploration_processes`](super::Environment::run_exploration_processes).
///
/// The program must call [`crate::worker::serve`] with the simulation callback.
#[derive(Debug, Clone)]
pub struct ProcessPool {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl ProcessPool {
    /// Pool running `program` with no extra arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for every worker.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Worker program path.
    #[must_use]
    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    fn spawn(&self) -> Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Worker(format!(
                    "Failed to spawn {}: {e}",
                    self.program.display()
                ))
            })
    }
}

struct Job {
    request: WorkerRequest,
    reply: oneshot::Sender<Result<Snapshot>>,
}

type JobQueue = Arc<Mutex<mpsc::UnboundedReceiver<Job>>>;

/// Run `requests` on up to `workers` worker processes.
///
/// Outcomes are in request order and end at the first failure.
pub(crate) fn execute(
    pool: &ProcessPool,
    requests: Vec<WorkerRequest>,
    workers: usize,
) -> Result<Vec<Result<Snapshot>>> {
    if requests.is_empty() {
        return Ok(Vec::new());
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Worker(format!("Failed to start runtime: {e}")))?;
    runtime.block_on(dispatch(pool, requests, workers))
}

async fn dispatch(
    pool: &ProcessPool,
    requests: Vec<WorkerRequest>,
    workers: usize,
) -> Result<Vec<Result<Snapshot>>> {
    let (queue, jobs) = mpsc::unbounded_channel::<Job>();
    let jobs: JobQueue = Arc::new(Mutex::new(jobs));

    let mut slots = Vec::new();
    for slot in 0..workers.min(requests.len()) {
        let child = pool.spawn()?;
        debug!(slot, pid = ?child.id(), "Spawned worker");
        slots.push(tokio::spawn(serve_slot(slot, child, Arc::clone(&jobs))));
    }

    let mut pending = Vec::with_capacity(requests.len());
    for request in requests {
        let (reply, outcome) = oneshot::channel();
        queue
            .send(Job { request, reply })
            .map_err(|_| Error::Worker("job queue closed".to_string()))?;
        pending.push(outcome);
    }
    drop(queue);

    let mut outcomes = Vec::with_capacity(pending.len());
    let mut failed = false;
    for outcome in pending {
        let outcome = outcome.await.unwrap_or_else(|_| {
            Err(Error::Worker("worker exited before replying".to_string()))
        });
        failed = outcome.is_err();
        outcomes.push(outcome);
        if failed {
            break;
        }
    }

    if failed {
        // dropping the children kills them
        for slot in &slots {
            slot.abort();
        }
    } else {
        for slot in slots {
            if let Err(e) = slot.await {
                warn!(error = %e, "Worker slot ended abnormally");
            }
        }
    }
    Ok(outcomes)
}

async fn serve_slot(slot: usize, mut child: Child, jobs: JobQueue) {
    let (Some(mut stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
        warn!(slot, "Worker has no piped stdio");
        return;
    };
    let mut replies = BufReader::new(stdout).lines();

    loop {
        let job = jobs.lock().await.recv().await;
        let Some(job) = job else { break };
        let outcome = exchange(&mut stdin, &mut replies, &job.request).await;
        let broken = matches!(outcome, Err(Error::Worker(_)));
        // the orchestrator may have stopped listening after a failure
        let _ = job.reply.send(outcome);
        if broken {
            break;
        }
    }

    drop(stdin);
    match child.wait().await {
        Ok(status) if !status.success() => warn!(slot, %status, "Worker exited with failure"),
        Ok(_) => debug!(slot, "Worker exited"),
        Err(e) => warn!(slot, error = %e, "Failed to reap worker"),
    }
}

async fn exchange(
    stdin: &mut ChildStdin,
    replies: &mut Lines<BufReader<ChildStdout>>,
    request: &WorkerRequest,
) -> Result<Snapshot> {
    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| Error::Worker(format!("Failed to send run {}: {e}", request.run_id)))?;
    stdin
        .flush()
        .await
        .map_err(|e| Error::Worker(format!("Failed to send run {}: {e}", request.run_id)))?;

    let reply = replies
        .next_line()
        .await
        .map_err(|e| Error::Worker(format!("Failed to read reply: {e}")))?
        .ok_or_else(|| {
            Error::Worker(format!("worker closed its output during run {}", request.run_id))
        })?;
    let reply: WorkerReply = serde_json::from_str(&reply)
        .map_err(|e| Error::Worker(format!("Malformed worker reply: {e}")))?;

    if reply.run_id() != request.run_id {
        return Err(Error::Worker(format!(
            "reply for run {} does not answer run {}",
            reply.run_id(),
            request.run_id
        )));
    }
    match reply {
        WorkerReply::Completed { results, .. } => Ok(results),
        WorkerReply::Failed { run_id, message } => {
            Err(Error::callback(run_id, anyhow::anyhow!(message)))
        }
    }
}
