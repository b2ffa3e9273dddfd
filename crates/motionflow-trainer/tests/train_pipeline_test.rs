//! End-to-end tests for the training pipeline
//!
//! Recorder JSON on disk -> train -> model directory -> browser export.

use std::path::Path;

use motionflow_core::artifact::{HISTORY_FILE, MANIFEST_FILE, WEIGHTS_FILE};
use motionflow_core::{MotionflowError, Sample, DATASET_FORMAT, FEATURE_WIDTH, LABELS_FILE};
use motionflow_export::{export_model, ExportOptions, MODEL_JSON};
use motionflow_trainer::{run_training, FitOptions, TrainingOptions};
use serde_json::json;

/// Writes one recorder file with `count` samples of `frames` frames each.
fn write_recording(path: &Path, label: &str, count: usize, frames: usize, level: f32) {
    let samples: Vec<Sample> = (0..count)
        .map(|i| {
            let value = level + i as f32 * 0.01;
            Sample::new(label, vec![vec![value; FEATURE_WIDTH]; frames])
        })
        .collect();
    let doc = json!({ "format": DATASET_FORMAT, "samples": samples });
    std::fs::write(path, doc.to_string()).unwrap();
}

fn quick_options(data_dir: &Path, output: &Path) -> TrainingOptions {
    TrainingOptions {
        data: format!("{}/*.json", data_dir.display()),
        output: output.to_path_buf(),
        fit: FitOptions {
            epochs: 1,
            batch_size: 4,
            ..FitOptions::default()
        },
    }
}

#[test]
fn trains_and_writes_model_directory() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("raw");
    std::fs::create_dir_all(&data).unwrap();
    write_recording(&data.join("left.json"), "swipe_left", 5, 20, -1.0);
    write_recording(&data.join("right.json"), "swipe_right", 5, 20, 1.0);

    let output = dir.path().join("models").join("saved_model");
    let report = run_training(&quick_options(&data, &output)).unwrap();

    assert_eq!(report.sample_count, 10);
    assert_eq!(report.labels, ["swipe_left", "swipe_right"]);
    assert_eq!(report.history.epochs.len(), 1);

    for file in [WEIGHTS_FILE, MANIFEST_FILE, LABELS_FILE, HISTORY_FILE] {
        assert!(output.join(file).is_file(), "missing {file}");
    }
    let labels: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join(LABELS_FILE)).unwrap())
            .unwrap();
    assert_eq!(labels, json!({ "labels": ["swipe_left", "swipe_right"] }));
}

#[test]
fn single_class_is_rejected_before_training() {
    let dir = tempfile::tempdir().unwrap();
    write_recording(&dir.path().join("left.json"), "swipe_left", 4, 10, 0.0);

    let output = dir.path().join("saved_model");
    let err = run_training(&quick_options(dir.path(), &output)).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<MotionflowError>(),
        Some(MotionflowError::InsufficientClasses { .. })
    ));
    assert!(!output.exists());
}

#[test]
fn missing_dataset_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("saved_model");
    let err = run_training(&quick_options(&dir.path().join("empty"), &output)).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<MotionflowError>(),
        Some(MotionflowError::NoMatchingFiles { .. })
    ));
}

#[test]
fn foreign_format_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_recording(&dir.path().join("a.json"), "wave", 3, 8, -1.0);
    write_recording(&dir.path().join("b.json"), "circle", 3, 8, 1.0);
    std::fs::write(
        dir.path().join("c.json"),
        json!({ "format": "motionflow.static_pose.v1", "samples": [] }).to_string(),
    )
    .unwrap();

    let report = run_training(&quick_options(dir.path(), &dir.path().join("out"))).unwrap();
    assert_eq!(report.sample_count, 6);
    assert_eq!(report.labels, ["circle", "wave"]);
}

#[test]
fn trained_model_exports_for_the_browser() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("raw");
    std::fs::create_dir_all(&data).unwrap();
    write_recording(&data.join("left.json"), "swipe_left", 4, 12, -1.0);
    write_recording(&data.join("right.json"), "swipe_right", 4, 12, 1.0);
    write_recording(&data.join("up.json"), "swipe_up", 4, 12, 0.0);

    let model_dir = dir.path().join("saved_model");
    run_training(&quick_options(&data, &model_dir)).unwrap();

    let web_dir = dir.path().join("public").join("dynamic_gesture");
    let report = export_model(&model_dir, &web_dir, &ExportOptions::default()).unwrap();

    assert!(web_dir.join(MODEL_JSON).is_file());
    assert!(!report.shards.is_empty());
    assert!(report.shards.iter().all(|p| p.is_file()));
    assert_eq!(
        report.labels.as_deref(),
        Some(&["swipe_left".to_string(), "swipe_right".into(), "swipe_up".into()][..])
    );

    let model: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(web_dir.join(MODEL_JSON)).unwrap())
            .unwrap();
    let layers = model["modelTopology"]["config"]["layers"].as_array().unwrap();
    assert_eq!(layers.len(), 4);
    assert_eq!(layers[0]["config"]["batch_input_shape"], json!([null, 12, 63]));
    assert_eq!(layers[3]["config"]["units"], 3);
}

#[test]
fn export_without_model_leaves_output_alone() {
    let dir = tempfile::tempdir().unwrap();
    let web_dir = dir.path().join("web");
    let err = export_model(
        &dir.path().join("saved_model"),
        &web_dir,
        &ExportOptions::default(),
    )
    .unwrap_err();

    assert!(err.to_string().contains("run training first"));
    assert!(!web_dir.exists());
}
