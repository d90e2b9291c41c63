//! Tests for error types

use std::error::Error as _;

use paramsweep::storage::LoadLevel;
use paramsweep::trajectory::Trajectory;
use paramsweep::value::{ArrayData, NdArray};
use paramsweep::Error;

#[test]
fn test_configuration_error() {
    let error = NdArray::new(vec![2, 3], ArrayData::Int64(vec![1, 2])).unwrap_err();
    let error_str = format!("{error}");
    assert!(error_str.contains("Configuration error"));
    assert!(matches!(error, Error::Configuration(_)));
}

#[test]
fn test_storage_error() {
    let error = Error::Storage("dataset is truncated".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Storage error"));
    assert!(error_str.contains("dataset is truncated"));
}

#[test]
fn test_lookup_error_names_the_item() {
    let traj = Trajectory::new("t");
    let error = traj.parameter("traffic.ncars").unwrap_err();
    assert!(error.is_lookup());
    assert_eq!(format!("{error}"), "Unknown parameter `traffic.ncars`");

    let error = traj.run("00007").unwrap_err();
    assert_eq!(format!("{error}"), "Unknown run `00007`");
}

#[test]
fn test_type_mismatch_error() {
    let error = Error::type_mismatch("ndarray", "frame");
    let error_str = format!("{error}");
    assert!(error_str.contains("expected ndarray"));
    assert!(error_str.contains("found frame"));
    assert!(!error.is_lookup());
}

#[test]
fn test_callback_error_keeps_source() {
    let cause = anyhow::anyhow!("disk full").context("writing checkpoint");
    let error = Error::callback("00003", cause);
    let error_str = format!("{error}");
    assert!(error_str.contains("run 00003"));
    assert!(error_str.contains("writing checkpoint"));
    assert!(error.source().is_some());
}

#[test]
fn test_load_level_out_of_range() {
    let error = LoadLevel::try_from(7).unwrap_err();
    assert!(format!("{error}").contains("0, 1 or 2"));
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let error: Error = io.into();
    assert!(format!("{error}").contains("IO error"));
}

#[test]
fn test_json_error_conversion() {
    let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json.into();
    assert!(matches!(error, Error::Json(_)));
}
