//! Hierarchical on-disk storage
//!
//! One directory per trajectory, one directory per item. Item attributes are
//! JSON (`attrs.json`); arrays are kept in a binary dataset next to them so
//! they can be sliced without a full read.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, instrument};

use super::codec::{self, NodeAttrs, RunAttrs};
use super::dataset;
use super::{
    LoadLevel, LoadOptions, StorageService, PARAMETERS_GROUP, RESULTS_GROUP, ROOT_GROUP,
    RUNS_GROUP,
};
use crate::trajectory::{parse_by_run_key, Leaf, RunRecord, Snapshot, Trajectory};
use crate::value::{AxisSlice, Frame, NdArray, Value, ValueKind};
use crate::{Error, Result};

const ATTRS_FILE: &str = "attrs.json";
const DATASET_FILE: &str = "data.bin";

/// File-backed [`StorageService`].
///
/// # Example
///
/// ```rust
/// use paramsweep::storage::{FileStorage, StorageService};
/// use paramsweep::trajectory::{Parameter, Trajectory};
///
/// # fn example() -> paramsweep::Result<()> {
/// let dir = tempfile::tempdir()?;
/// let storage = FileStorage::new(dir.path());
///
/// let mut traj = Trajectory::new("demo");
/// traj.add_parameter(Parameter::new("x", 3).with_comment("input"));
/// storage.save(&traj)?;
///
/// let loaded = storage.load("demo")?;
/// assert_eq!(loaded.parameter("x")?.comment(), Some("input"));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `root`. Nothing is created until the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of all stored trajectories, sorted.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the root group cannot be listed
    pub fn list_trajectories(&self) -> Result<Vec<String>> {
        let group = self.root.join(ROOT_GROUP);
        if !group.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = child_dirs(&group)?;
        names.sort();
        Ok(names)
    }

    /// True if a trajectory named `name` has been saved.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.trajectory_dir(name).map_or(false, |dir| dir.is_dir())
    }

    /// Load a trajectory at reduced fidelity.
    ///
    /// Parameters and results are each omitted, loaded as skeletons or fully
    /// decoded according to `options`. Run metadata is always rebuilt; a
    /// run's results are re-joined from whichever `by_run.<run_id>.*` leaves
    /// this call materialized.
    ///
    /// # Errors
    /// Returns `Error::Lookup` for unknown trajectories and `Error::Storage`
    /// for unreadable nodes
    #[instrument(skip(self, options), fields(root = %self.root.display()))]
    pub fn load_partial(&self, name: &str, options: &LoadOptions) -> Result<Trajectory> {
        let dir = self.existing_trajectory_dir(name)?;
        let mut traj = Trajectory::new(name);

        if options.parameters != LoadLevel::Omit {
            for item in sorted_children(&dir.join(PARAMETERS_GROUP))? {
                let node = dir.join(PARAMETERS_GROUP).join(&item);
                traj.add_parameter(read_leaf(&node, item, options.parameters)?);
            }
        }

        let mut joined: BTreeMap<String, Snapshot> = BTreeMap::new();
        if options.results != LoadLevel::Omit {
            for item in sorted_children(&dir.join(RESULTS_GROUP))? {
                let level = match options.results {
                    LoadLevel::Full if !options.wants_result(&item) => continue,
                    level => level,
                };
                let node = dir.join(RESULTS_GROUP).join(&item);
                let leaf = read_leaf(&node, item, level)?;
                if let (Some((run_id, result)), Some(value)) =
                    (parse_by_run_key(leaf.name()), leaf.value())
                {
                    joined
                        .entry(run_id.to_string())
                        .or_default()
                        .insert(result.to_string(), value.clone());
                }
                traj.add_result(leaf);
            }
        }

        let runs_dir = dir.join(RUNS_GROUP);
        let mut run_ids = sorted_children(&runs_dir)?;
        run_ids.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        for run_id in run_ids {
            let attrs: RunAttrs = read_json(&runs_dir.join(&run_id).join(ATTRS_FILE))?;
            let timestamp = DateTime::parse_from_rfc3339(&attrs.timestamp)
                .map_err(|e| {
                    Error::Storage(format!("run {run_id} has a bad timestamp: {e}"))
                })?
                .with_timezone(&Utc);
            let results = joined.remove(&run_id).unwrap_or_default();
            let record = RunRecord::builder(run_id)
                .params(codec::decode_snapshot(&attrs.params)?)
                .results(results)
                .timestamp(timestamp)
                .build();
            traj.restore_run(record);
        }

        info!(
            parameters = traj.parameters().len(),
            results = traj.results().len(),
            runs = traj.run_count(),
            "Loaded trajectory"
        );
        Ok(traj)
    }

    /// Write (or overwrite) one parameter without rewriting the trajectory.
    ///
    /// # Errors
    /// Returns `Error::Lookup` if `trajectory` has no such parameter and
    /// `Error::Storage` on write failure
    pub fn store_parameter(&self, trajectory: &Trajectory, name: &str) -> Result<()> {
        let leaf = trajectory.parameter(name)?;
        let dir = self.trajectory_dir(trajectory.name())?;
        write_leaf(&dir.join(PARAMETERS_GROUP).join(item_dir(name)?), leaf)
    }

    /// Write (or overwrite) one result without rewriting the trajectory.
    ///
    /// # Errors
    /// Returns `Error::Lookup` if `trajectory` has no such result and
    /// `Error::Storage` on write failure
    pub fn store_result(&self, trajectory: &Trajectory, name: &str) -> Result<()> {
        let leaf = trajectory.result(name)?;
        let dir = self.trajectory_dir(trajectory.name())?;
        write_leaf(&dir.join(RESULTS_GROUP).join(item_dir(name)?), leaf)
    }

    /// Read a sub-region of a stored array parameter.
    ///
    /// # Errors
    /// Returns `Error::TypeMismatch` if the parameter is not an ndarray,
    /// `Error::Lookup` if it does not exist
    pub fn load_parameter_array_slice(
        &self,
        name: &str,
        parameter: &str,
        index: &[AxisSlice],
    ) -> Result<NdArray> {
        let node = self.item_node(name, PARAMETERS_GROUP, parameter, "parameter")?;
        read_array_slice(&node, index)
    }

    /// Read a sub-region of a stored array result.
    ///
    /// # Errors
    /// Returns `Error::TypeMismatch` if the result is not an ndarray,
    /// `Error::Lookup` if it does not exist
    pub fn load_result_array_slice(
        &self,
        name: &str,
        result: &str,
        index: &[AxisSlice],
    ) -> Result<NdArray> {
        let node = self.item_node(name, RESULTS_GROUP, result, "result")?;
        read_array_slice(&node, index)
    }

    /// Rows `rows` (clamped) and optionally a subset of columns of a stored frame result.
    ///
    /// The whole frame is decoded before selecting.
    ///
    /// # Errors
    /// Returns `Error::TypeMismatch` if the result is not a frame,
    /// `Error::Lookup` for unknown results or columns
    pub fn load_result_frame_slice(
        &self,
        name: &str,
        result: &str,
        rows: Range<usize>,
        columns: Option<&[&str]>,
    ) -> Result<Frame> {
        let node = self.item_node(name, RESULTS_GROUP, result, "result")?;
        let attrs: NodeAttrs = read_json(&node.join(ATTRS_FILE))?;
        match attrs.kind()? {
            ValueKind::Frame => match codec::decode(&attrs)? {
                Value::Frame(frame) => frame.select(rows, columns),
                other => Err(Error::type_mismatch("frame", other.kind().as_str())),
            },
            kind => Err(Error::type_mismatch("frame", kind.as_str())),
        }
    }

    fn trajectory_dir(&self, name: &str) -> Result<PathBuf> {
        Ok(self.root.join(ROOT_GROUP).join(item_dir(name)?))
    }

    fn existing_trajectory_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.trajectory_dir(name)?;
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(Error::lookup("trajectory", name))
        }
    }

    fn item_node(
        &self,
        name: &str,
        group: &str,
        item: &str,
        what: &'static str,
    ) -> Result<PathBuf> {
        let node = self
            .existing_trajectory_dir(name)?
            .join(group)
            .join(item_dir(item)?);
        if node.join(ATTRS_FILE).is_file() {
            Ok(node)
        } else {
            Err(Error::lookup(what, item))
        }
    }
}

impl StorageService for FileStorage {
    #[instrument(skip(self, trajectory), fields(name = trajectory.name()))]
    fn save(&self, trajectory: &Trajectory) -> Result<()> {
        let dir = self.trajectory_dir(trajectory.name())?;
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| {
                Error::Storage(format!("Failed to clear {}: {e}", dir.display()))
            })?;
        }
        for group in [PARAMETERS_GROUP, RESULTS_GROUP, RUNS_GROUP] {
            create_dir(&dir.join(group))?;
        }

        for (name, leaf) in trajectory.parameters().iter() {
            write_leaf(&dir.join(PARAMETERS_GROUP).join(item_dir(name)?), leaf)?;
        }
        for (name, leaf) in trajectory.results().iter() {
            write_leaf(&dir.join(RESULTS_GROUP).join(item_dir(name)?), leaf)?;
        }
        for run in trajectory.run_records() {
            let node = dir.join(RUNS_GROUP).join(item_dir(run.run_id())?);
            create_dir(&node)?;
            let attrs = RunAttrs {
                params: codec::encode_snapshot(run.params())?,
                timestamp: run.timestamp_iso(),
            };
            write_json(&node.join(ATTRS_FILE), &attrs)?;
        }

        info!(runs = trajectory.run_count(), "Saved trajectory");
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Trajectory> {
        self.load_partial(name, &LoadOptions::default())
    }
}

/// Validate a name used as a single path component.
fn item_dir(name: &str) -> Result<&str> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(Error::Storage(format!(
            "`{name}` cannot be used as a storage node name"
        )));
    }
    Ok(name)
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|e| Error::Storage(format!("Failed to create {}: {e}", dir.display())))
}

fn child_dirs(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::Storage(format!("Failed to list {}: {e}", dir.display())))?;
    let listing = |e: std::io::Error| Error::Storage(format!("Failed to list {}: {e}", dir.display()));
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(listing)?;
        if entry.file_type().map_err(listing)?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Child node names in lexical order; a missing group has no children.
fn sorted_children(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = child_dirs(dir)?;
    names.sort();
    Ok(names)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::Storage(format!("Failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| Error::Storage(format!("Malformed attributes in {}: {e}", path.display())))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage(format!("{} has no parent", path.display())))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| Error::Storage(format!("Failed to create attribute file: {e}")))?;
    serde_json::to_writer_pretty(&mut tmp, value)
        .map_err(|e| Error::Storage(format!("Failed to encode {}: {e}", path.display())))?;
    tmp.flush()
        .map_err(|e| Error::Storage(format!("Failed to write {}: {e}", path.display())))?;
    tmp.persist(path)
        .map_err(|e| Error::Storage(format!("Failed to persist {}: {e}", path.display())))?;
    Ok(())
}

/// Write one item node, replacing whatever was there.
fn write_leaf(node: &Path, leaf: &Leaf) -> Result<()> {
    let value = leaf.value().ok_or_else(|| {
        Error::Storage(format!(
            "`{}` has no value (skeleton items cannot be stored)",
            leaf.name()
        ))
    })?;
    let encoded = codec::encode(value, leaf.comment())?;

    create_dir(node)?;
    // a previous array payload must not outlive a kind change
    let stale = node.join(DATASET_FILE);
    if stale.exists() {
        fs::remove_file(&stale).map_err(|e| {
            Error::Storage(format!("Failed to remove {}: {e}", stale.display()))
        })?;
    }
    if let Some(array) = encoded.dataset {
        dataset::write(&stale, array)?;
    }
    write_json(&node.join(ATTRS_FILE), &encoded.attrs)?;
    debug!(item = leaf.name(), kind = %encoded.attrs.kind, "Stored node");
    Ok(())
}

fn read_leaf(node: &Path, name: String, level: LoadLevel) -> Result<Leaf> {
    let attrs: NodeAttrs = read_json(&node.join(ATTRS_FILE))?;
    let mut leaf = match level {
        LoadLevel::Full => {
            let value = match attrs.kind()? {
                ValueKind::NdArray => Value::Array(dataset::read(&node.join(DATASET_FILE))?),
                _ => codec::decode(&attrs)?,
            };
            Leaf::new(name, value)
        }
        _ => Leaf::skeleton(name),
    };
    leaf.set_comment(attrs.comment);
    Ok(leaf)
}

fn read_array_slice(node: &Path, index: &[AxisSlice]) -> Result<NdArray> {
    let attrs: NodeAttrs = read_json(&node.join(ATTRS_FILE))?;
    match attrs.kind()? {
        ValueKind::NdArray => dataset::read_slice(&node.join(DATASET_FILE), index),
        kind => Err(Error::type_mismatch("ndarray", kind.as_str())),
    }
}
