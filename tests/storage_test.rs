//! Storage backend tests
//!
//! Round trips every value kind through `FileStorage`, then exercises partial
//! loads, single-item upserts and the array/frame slice readers.

use paramsweep::environment::{Environment, ExploreOptions};
use paramsweep::exploration::ParameterSpace;
use paramsweep::storage::{FileStorage, LoadLevel, LoadOptions, MemoryStorage, StorageService};
use paramsweep::trajectory::{Parameter, ResultItem, Snapshot, Trajectory};
use paramsweep::value::{ArrayData, AxisSlice, Column, Frame, NdArray, Series, Value};
use paramsweep::Error;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

fn storage() -> (TempDir, FileStorage) {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());
    (dir, storage)
}

fn labeled_series() -> Series {
    Series::new(
        Some("speed".into()),
        vec![json!("a"), json!("b"), json!("c")],
        Column::Float64(vec![1.5, -2.25, 1e-3]),
    )
    .unwrap()
}

fn labeled_frame() -> Frame {
    Frame::with_index(
        vec![json!("r0"), json!("r1"), json!("r2"), json!("r3")],
        vec![
            ("id".into(), Column::Int64(vec![1, 2, 3, 4])),
            ("score".into(), Column::Float64(vec![10.0, 20.5, 30.0, 40.25])),
            ("ok".into(), Column::Bool(vec![true, false, true, true])),
            (
                "label".into(),
                Column::Str(vec!["w".into(), "x".into(), "y".into(), "z".into()]),
            ),
        ],
    )
    .unwrap()
}

fn grid() -> NdArray {
    NdArray::arange(vec![10, 10]).unwrap()
}

fn full_trajectory() -> Trajectory {
    let mut traj = Trajectory::new("full");
    traj.add_parameter(Parameter::new("sim.dt", 0.01).with_comment("step size"));
    traj.add_parameter(Parameter::new("sim.label", "baseline"));
    traj.add_parameter(Parameter::new(
        "sim.weights",
        NdArray::new(vec![3], ArrayData::Float32(vec![0.5, 0.25, 0.125])).unwrap(),
    ));
    traj.add_result(ResultItem::new("meta", json!({"tags": ["a", "b"], "n": 3})).with_comment("free form"));
    traj.add_result(ResultItem::new("grid", grid()).with_comment("10x10 ramp"));
    traj.add_result(
        ResultItem::new(
            "mask",
            NdArray::new(vec![2, 2], ArrayData::Bool(vec![true, false, false, true])).unwrap(),
        ),
    );
    traj.add_result(ResultItem::new("series", labeled_series()));
    traj.add_result(ResultItem::new("frame", labeled_frame()).with_comment("table"));
    traj
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn test_round_trip_every_kind() {
    let (_dir, storage) = storage();
    let traj = full_trajectory();
    storage.save(&traj).unwrap();
    let loaded = storage.load("full").unwrap();

    for (name, item) in traj.parameters().iter() {
        assert_eq!(loaded.parameter(name).unwrap(), item, "parameter {name}");
    }
    for (name, item) in traj.results().iter() {
        assert_eq!(loaded.result(name).unwrap(), item, "result {name}");
    }
    assert_eq!(loaded.results().len(), traj.results().len());

    let weights = loaded.parameter_value("sim.weights").unwrap().as_array().unwrap();
    assert_eq!(weights.dtype().as_str(), "float32");
    let frame = loaded.result("frame").unwrap().value().unwrap().as_frame().unwrap();
    assert_eq!(frame.column("score").unwrap().dtype(), "float64");
    assert_eq!(frame.column("label").unwrap().dtype(), "object");
}

#[test]
fn test_runs_survive_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut traj = Trajectory::new("runs");
    traj.add_parameter(Parameter::new("x", 0));
    let mut env = Environment::builder(traj)
        .storage(FileStorage::new(dir.path()))
        .build();
    let space = ParameterSpace::new().axis("x", [1, 2, 3]);
    env.run_exploration(
        |traj| {
            let x = traj.parameter_value("x")?.as_i64().unwrap_or_default();
            traj.add_result(ResultItem::new("sq", x * x));
            Ok(None)
        },
        &space,
        &ExploreOptions::new(),
    )
    .unwrap();

    let loaded = FileStorage::new(dir.path()).load("runs").unwrap();
    assert_eq!(loaded.list_runs(), env.trajectory().list_runs());
    for (saved, reloaded) in env.trajectory().run_records().iter().zip(loaded.run_records()) {
        assert_eq!(saved.params(), reloaded.params());
        assert_eq!(saved.results(), reloaded.results());
        assert_eq!(saved.timestamp_iso(), reloaded.timestamp_iso());
    }
    let squares: Vec<i64> = loaded.collect_runs("sq").iter().filter_map(Value::as_i64).collect();
    assert_eq!(squares, vec![1, 4, 9]);
}

#[test]
fn test_non_finite_array_in_run_params_round_trips() {
    let (_dir, storage) = storage();
    let mut traj = Trajectory::new("nan");
    let params = Snapshot::from([(
        "a".to_string(),
        Value::from(NdArray::from_f64(vec![f64::NAN, 1.0])),
    )]);
    traj.record_run("00000", params, Snapshot::new());
    storage.save(&traj).unwrap();

    let loaded = storage.load("nan").unwrap();
    let a = loaded.get_run_params("00000").unwrap()["a"].as_array().unwrap();
    match a.data() {
        ArrayData::Float64(v) => {
            assert!(v[0].is_nan());
            assert_eq!(v[1], 1.0);
        }
        other => panic!("unexpected data {other:?}"),
    }
}

#[test]
fn test_infinite_series_and_frame_round_trip() {
    let (_dir, storage) = storage();
    let series = Series::with_default_index(None, Column::Float64(vec![f64::INFINITY, 2.0]));
    let frame = Frame::new(vec![(
        "v".into(),
        Column::Float64(vec![f64::NEG_INFINITY, 0.5, f64::INFINITY]),
    )])
    .unwrap();
    let mut traj = Trajectory::new("inf");
    traj.add_result(ResultItem::new("series", series.clone()));
    traj.add_result(ResultItem::new("frame", frame.clone()));
    traj.record_run(
        "00000",
        Snapshot::new(),
        Snapshot::from([("series".to_string(), Value::from(series.clone()))]),
    );
    storage.save(&traj).unwrap();

    let loaded = storage.load("inf").unwrap();
    assert_eq!(loaded.result("series").unwrap().value().unwrap().as_series(), Some(&series));
    assert_eq!(loaded.result("frame").unwrap().value().unwrap().as_frame(), Some(&frame));
    assert_eq!(
        loaded.get_run_results("00000").unwrap()["series"].as_series(),
        Some(&series)
    );
}

#[test]
fn test_corrupt_attributes_are_storage_errors() {
    let (dir, storage) = storage();
    let mut traj = Trajectory::new("broken");
    traj.add_result(ResultItem::new("series", labeled_series()));
    storage.save(&traj).unwrap();

    let attrs = dir.path().join("trajectories/broken/results/series/attrs.json");
    std::fs::write(&attrs, r#"{"kind": "series", "value": "{\"data\": [1,"}"#).unwrap();
    assert!(matches!(storage.load("broken"), Err(Error::Storage(_))));

    std::fs::write(&attrs, "not json").unwrap();
    assert!(matches!(storage.load("broken"), Err(Error::Storage(_))));
}

#[test]
fn test_memory_storage_round_trip() {
    let storage = MemoryStorage::new();
    let traj = full_trajectory();
    storage.save(&traj).unwrap();
    let loaded = storage.load("full").unwrap();
    assert_eq!(loaded.result("frame").unwrap(), traj.result("frame").unwrap());
    assert!(storage.load("other").unwrap_err().is_lookup());
}

// ============================================================================
// Partial loads
// ============================================================================

fn swept_storage() -> (TempDir, FileStorage) {
    let (dir, storage) = storage();
    let mut traj = full_trajectory();
    traj.record_run(
        "00000",
        traj.parameter_values(),
        [("a".to_string(), Value::from(1)), ("b".to_string(), Value::from(2))].into(),
    );
    storage.save(&traj).unwrap();
    (dir, storage)
}

#[test]
fn test_skeleton_load_keeps_names_only() {
    let (_dir, storage) = swept_storage();
    let loaded = storage
        .load_partial("full", &LoadOptions::from_levels(1, 1).unwrap())
        .unwrap();

    for name in ["sim.dt", "sim.label", "sim.weights"] {
        assert!(loaded.parameter(name).unwrap().is_skeleton(), "{name}");
    }
    assert_eq!(loaded.parameter("sim.dt").unwrap().comment(), Some("step size"));
    assert!(loaded.results().iter().all(|(_, leaf)| leaf.is_skeleton()));
    assert!(loaded.results().contains("by_run.00000.a"));
    assert!(loaded.parameter_value("sim.dt").unwrap_err().is_lookup());

    // run metadata is rebuilt but its joined results only cover loaded leaves
    assert_eq!(loaded.list_runs(), vec!["00000"]);
    assert_eq!(loaded.get_run_params("00000").unwrap()["sim.label"].as_str(), Some("baseline"));
    assert!(loaded.get_run_results("00000").unwrap().is_empty());
}

#[test]
fn test_load_only_materializes_named_results() {
    let (_dir, storage) = swept_storage();
    let options = LoadOptions::new(LoadLevel::Omit, LoadLevel::Full).load_only(["meta"]);
    let loaded = storage.load_partial("full", &options).unwrap();

    assert!(loaded.parameters().is_empty());
    assert_eq!(loaded.results().keys().collect::<Vec<_>>(), vec!["meta"]);
    assert!(loaded.result("grid").unwrap_err().is_lookup());
    assert!(loaded.get_run_results("00000").unwrap().is_empty());
}

#[test]
fn test_load_only_by_run_rejoins_that_result() {
    let (_dir, storage) = swept_storage();
    let options = LoadOptions::new(LoadLevel::Omit, LoadLevel::Full).load_only(["by_run.00000.a"]);
    let loaded = storage.load_partial("full", &options).unwrap();
    let results = loaded.get_run_results("00000").unwrap();
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["a"]);
}

#[test]
fn test_invalid_level() {
    assert!(matches!(LoadOptions::from_levels(2, 3), Err(Error::Configuration(_))));
}

// ============================================================================
// Upsert
// ============================================================================

#[test]
fn test_store_result_upserts_single_item() {
    let (_dir, storage) = storage();
    let mut traj = full_trajectory();
    storage.save(&traj).unwrap();

    traj.add_result(ResultItem::new("grid", labeled_series()).with_comment("replaced"));
    traj.add_result(ResultItem::new("late", 42));
    storage.store_result(&traj, "grid").unwrap();
    storage.store_result(&traj, "late").unwrap();
    traj.add_parameter(Parameter::new("sim.dt", 0.02));
    storage.store_parameter(&traj, "sim.dt").unwrap();

    let loaded = storage.load("full").unwrap();
    assert_eq!(loaded.result("grid").unwrap(), traj.result("grid").unwrap());
    assert_eq!(loaded.result("late").unwrap().value().and_then(Value::as_i64), Some(42));
    assert_eq!(loaded.parameter_value("sim.dt").unwrap().as_f64(), Some(0.02));
    // untouched items are still there
    assert_eq!(loaded.result("frame").unwrap(), traj.result("frame").unwrap());
    assert!(storage.store_result(&traj, "missing").unwrap_err().is_lookup());
}

// ============================================================================
// Slices
// ============================================================================

#[test]
fn test_array_slice_matches_in_memory() {
    let (_dir, storage) = storage();
    storage.save(&full_trajectory()).unwrap();

    let cases: Vec<Vec<AxisSlice>> = vec![
        vec![AxisSlice::from(2..5), AxisSlice::from(3..7)],
        vec![AxisSlice::Index(4)],
        vec![AxisSlice::Full, AxisSlice::Index(9)],
        vec![],
    ];
    for index in cases {
        let sliced = storage.load_result_array_slice("full", "grid", &index).unwrap();
        assert_eq!(sliced, grid().slice(&index).unwrap(), "index {index:?}");
    }

    let weights = storage
        .load_parameter_array_slice("full", "sim.weights", &[AxisSlice::from(1..3)])
        .unwrap();
    assert_eq!(weights.data(), &ArrayData::Float32(vec![0.25, 0.125]));
}

#[test]
fn test_array_slice_of_non_array_is_type_mismatch() {
    let (_dir, storage) = storage();
    storage.save(&full_trajectory()).unwrap();
    let err = storage
        .load_result_array_slice("full", "meta", &[AxisSlice::Index(0)])
        .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref expected, ref found } if expected == "ndarray" && found == "scalar"));
    assert!(storage
        .load_result_array_slice("full", "nope", &[])
        .unwrap_err()
        .is_lookup());
}

#[test]
fn test_array_slice_out_of_bounds() {
    let (_dir, storage) = storage();
    storage.save(&full_trajectory()).unwrap();
    let err = storage
        .load_result_array_slice("full", "grid", &[AxisSlice::from(5..11)])
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_frame_slice() {
    let (_dir, storage) = storage();
    storage.save(&full_trajectory()).unwrap();

    let sub = storage
        .load_result_frame_slice("full", "frame", 1..3, Some(&["label", "id"][..]))
        .unwrap();
    assert_eq!(sub.num_rows(), 2);
    assert_eq!(sub.index(), &[json!("r1"), json!("r2")][..]);
    let names: Vec<&str> = sub.columns().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["label", "id"]);
    assert_eq!(sub.column("id"), Some(&Column::Int64(vec![2, 3])));

    let all_columns = storage
        .load_result_frame_slice("full", "frame", 2..100, None)
        .unwrap();
    assert_eq!(all_columns.num_rows(), 2);
    assert_eq!(all_columns.columns().len(), 4);

    let err = storage
        .load_result_frame_slice("full", "frame", 0..1, Some(&["missing"][..]))
        .unwrap_err();
    assert!(err.is_lookup());
    let err = storage
        .load_result_frame_slice("full", "grid", 0..1, None)
        .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}
