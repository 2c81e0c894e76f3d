//! CLI Integration Tests
//!
//! File-driven runs of the command functions:
//! - config loading and validation
//! - settings persistence through a data directory
//! - detection replay and reconciliation from files
//! - frame plans with a landmarks file

use std::fs;

use camdeck_cli::commands::{self, PlanOptions, TrackOptions};
use camdeck_cli::FrameArgs;
use camdeck_core::{CameraSettings, StudioConfig};
use serde_json::json;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_missing_config_uses_defaults() {
    let config = commands::load_config(None).expect("defaults");
    assert_eq!(config, StudioConfig::default());
}

#[test]
fn test_partial_config_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(&dir, "config.json", r#"{"cadence": {"segmentation_interval_ms": 40}}"#);
    let config = commands::load_config(Some(&path)).expect("load");
    assert!((config.cadence.segmentation_interval_ms - 40.0).abs() < f64::EPSILON);
    assert_eq!(config.tracking, StudioConfig::default().tracking);
}

#[test]
fn test_invalid_config_is_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = write(&dir, "config.json", "{not json");
    assert!(commands::load_config(Some(&path)).is_err());
}

// ============================================================================
// Settings persistence
// ============================================================================

#[test]
fn test_settings_survive_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let settings = write(&dir, "settings.json", r#"{"brightness": 200, "mirrorH": true}"#);

    let store = commands::open_store(Some(dir.path()), "cam").expect("open");
    let merged = commands::merge_settings_file(&store, "cam", Some(&settings)).expect("merge");
    assert!((merged.brightness - 200.0).abs() < f64::EPSILON);
    drop(store);

    let reopened = commands::open_store(Some(dir.path()), "cam").expect("reopen");
    let loaded = reopened.get_or_create("cam");
    assert!((loaded.brightness - 200.0).abs() < f64::EPSILON);
    assert!(loaded.mirror_h);
}

#[test]
fn test_no_settings_file_gives_defaults() {
    let store = commands::open_store(None, "cam").expect("open");
    let settings = commands::merge_settings_file(&store, "cam", None).expect("merge");
    assert_eq!(settings, CameraSettings::default());
}

// ============================================================================
// Track and reconcile from files
// ============================================================================

#[test]
fn test_track_files_defaults_ticks_to_frames() {
    let dir = TempDir::new().expect("tempdir");
    let face = json!({"boundingBox": {"originX": 540, "originY": 260, "width": 200, "height": 200}});
    let detections = write(
        &dir,
        "detections.json",
        &json!([[face], [], [face]]).to_string(),
    );

    let store = commands::open_store(None, "cam").expect("open");
    let value = commands::track_files(
        &StudioConfig::default(),
        &store,
        "cam",
        &detections,
        None,
        None,
        TrackOptions {
            ticks: 0,
            frame_interval_ms: 100.0,
            video_width: 1280.0,
            video_height: 720.0,
        },
    )
    .expect("track");
    assert_eq!(value["ticks"], json!(3));
    assert_eq!(value["adjustments"].as_array().expect("array").len(), 2);
    assert_eq!(value["noFace"], json!(1));
}

#[test]
fn test_track_files_rejects_bad_shape() {
    let dir = TempDir::new().expect("tempdir");
    let detections = write(&dir, "detections.json", r#"{"detections": []}"#);
    let store = commands::open_store(None, "cam").expect("open");
    let result = commands::track_files(
        &StudioConfig::default(),
        &store,
        "cam",
        &detections,
        None,
        None,
        TrackOptions {
            ticks: 0,
            frame_interval_ms: 100.0,
            video_width: 1280.0,
            video_height: 720.0,
        },
    );
    assert!(result.is_err());
}

#[test]
fn test_reconcile_files_writes_corrections() {
    let dir = TempDir::new().expect("tempdir");
    let settings = write(&dir, "settings.json", r#"{"zoom": 300}"#);
    let capabilities = write(
        &dir,
        "caps.json",
        r#"{"zoom": {"min": 1, "max": 2, "step": 0.1}, "focusMode": ["continuous"]}"#,
    );

    let store = commands::open_store(None, "cam").expect("open");
    let value = commands::reconcile_files(&store, "cam", &settings, &capabilities, &[]).expect("reconcile");
    assert!((store.get_or_create("cam").zoom - 200.0).abs() < 1e-9);
    let reported = value["settings"]["zoom"].as_f64().expect("zoom");
    assert!((reported - 200.0).abs() < 1e-9);
}

// ============================================================================
// Plan with landmarks
// ============================================================================

fn mesh_points() -> serde_json::Value {
    let points: Vec<_> = (0..468)
        .map(|i| {
            let f = f64::from(i) / 467.0;
            json!({"x": 0.3 + f * 0.4, "y": 0.25 + f * 0.5, "z": 0.0})
        })
        .collect();
    json!(points)
}

#[test]
fn test_read_landmarks_accepts_both_shapes() {
    let dir = TempDir::new().expect("tempdir");
    let bare = write(&dir, "bare.json", &mesh_points().to_string());
    let result = write(
        &dir,
        "result.json",
        &json!({"faceLandmarks": [mesh_points()]}).to_string(),
    );

    assert_eq!(commands::read_landmarks(&bare).expect("bare").len(), 468);
    assert_eq!(commands::read_landmarks(&result).expect("result").len(), 468);
}

#[test]
fn test_read_landmarks_rejects_empty() {
    let dir = TempDir::new().expect("tempdir");
    let empty = write(&dir, "empty.json", r#"{"faceLandmarks": []}"#);
    assert!(commands::read_landmarks(&empty).is_err());
}

#[test]
fn test_plan_from_landmarks_file_draws_face_effects() {
    let dir = TempDir::new().expect("tempdir");
    let settings = write(&dir, "settings.json", r#"{"faceSmoothing": 30, "portraitLighting": 50}"#);
    let mesh = write(&dir, "mesh.json", &mesh_points().to_string());

    let store = commands::open_store(None, "cam").expect("open");
    let settings = commands::merge_settings_file(&store, "cam", Some(&settings)).expect("merge");
    let options = PlanOptions {
        landmarks: Some(commands::read_landmarks(&mesh).expect("landmarks")),
        ..PlanOptions::default()
    };
    let frame = FrameArgs {
        video_width: 1280.0,
        video_height: 720.0,
        canvas_width: 1280.0,
        canvas_height: 720.0,
    };
    let value = commands::plan(&StudioConfig::default(), &settings, frame, &options);

    let ops = value["ops"].as_array().expect("array");
    assert!(ops.iter().any(|op| op["op"] == json!("clip")));
    assert!(ops.iter().any(|op| op["op"] == json!("gradient")));
}
