#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;

fn tapeloc() -> Command {
    Command::cargo_bin("tapeloc").expect("tapeloc binary")
}

fn write_tape_png(path: &Path, left: u32, right: u32) {
    let img = image::RgbImage::from_fn(320, 240, |x, _| {
        if (left..right).contains(&x) {
            image::Rgb([240, 240, 240])
        } else {
            image::Rgb([40, 40, 40])
        }
    });
    img.save(path).expect("save png");
}

fn write_config(path: &Path) {
    let config = serde_json::json!({
        "vision": {
            "hough": { "min_votes": 30, "max_gap": 10 },
            "filter": { "max_x_dist": 20.0, "min_y_dist": 60.0 }
        }
    });
    fs::write(path, serde_json::to_string(&config).expect("json")).expect("write config");
}

#[test]
fn default_config_prints_both_sections() {
    let out = tapeloc()
        .arg("default-config")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&out).expect("json");
    assert_eq!(json["vision"]["edges"]["high"], 39.0);
    assert_eq!(json["localizer"]["ticks_per_rev"], 8192.0);
    assert_eq!(json["vision"]["angle"]["mode"]["kind"], "empirical");
}

#[test]
fn default_config_round_trips_through_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tapeloc.json");
    tapeloc()
        .args(["default-config", "--out"])
        .arg(&path)
        .assert()
        .success();
    let loaded = tapeloc::TapelocConfig::load_json(&path).expect("load");
    assert_eq!(loaded, tapeloc::TapelocConfig::default());
}

#[test]
fn detect_reports_tape_position() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = dir.path().join("frame.png");
    let config = dir.path().join("config.json");
    let report = dir.path().join("report.json");
    let edges = dir.path().join("edges");
    write_tape_png(&image, 200, 240);
    write_config(&config);

    tapeloc()
        .arg("detect")
        .arg(&image)
        .arg("--config")
        .arg(&config)
        .arg("--out")
        .arg(&report)
        .arg("--edges-dir")
        .arg(&edges)
        .assert()
        .success();

    let json: Value =
        serde_json::from_str(&fs::read_to_string(&report).expect("report")).expect("json");
    let first = &json[0];
    assert_eq!(first["estimate"]["valid"], true);
    let center = first["estimate"]["pixel_center"].as_f64().expect("center");
    assert!((center - 219.0).abs() <= 0.5, "center {center}");
    assert!(first["diagnostics"]["kept_segments"].as_u64().expect("count") >= 2);
    assert!(edges.join("frame_edges.png").exists());
}

#[test]
fn detect_blank_image_is_invalid_not_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = dir.path().join("blank.png");
    image::GrayImage::new(64, 48).save(&image).expect("save");

    tapeloc()
        .arg("detect")
        .arg(&image)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": false"));
}

#[test]
fn detect_rejects_inverted_thresholds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = dir.path().join("frame.png");
    let config = dir.path().join("config.json");
    write_tape_png(&image, 100, 140);
    fs::write(&config, r#"{ "vision": { "edges": { "low": 80, "high": 20 } } }"#)
        .expect("write config");

    tapeloc()
        .arg("detect")
        .arg(&image)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ThresholdOrder"));
}

#[test]
fn replay_writes_trajectory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = dir.path().join("ticks.json");
    let config = dir.path().join("config.json");
    fs::write(&config, r#"{ "localizer": { "velocity_mode": "raw" } }"#).expect("config");
    let ticks: Vec<Value> = (0..5)
        .map(|i| {
            serde_json::json!({
                "parallel": { "ticks": -1000 * i, "timestamp": 0.02 * i as f64 },
                "perpendicular": { "ticks": 0, "timestamp": 0.02 * i as f64 },
                "heading": 0.0
            })
        })
        .collect();
    fs::write(
        &log,
        serde_json::to_string(&serde_json::json!({ "ticks": ticks })).expect("json"),
    )
    .expect("log");

    let out = tapeloc()
        .arg("replay")
        .arg(&log)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&out).expect("json");
    let points = json.as_array().expect("array");
    assert_eq!(points.len(), 5);
    let x = points[4]["pose"]["x"].as_f64().expect("x");
    assert!(x > 2.0 && x < 2.2, "x = {x}");
}

#[test]
fn replay_without_velocities_fails_in_corrected_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = dir.path().join("ticks.json");
    fs::write(
        &log,
        r#"{ "ticks": [ { "parallel": { "ticks": 0, "timestamp": 0.0 },
                          "perpendicular": { "ticks": 0, "timestamp": 0.0 },
                          "heading": 0.0 } ] }"#,
    )
    .expect("log");

    tapeloc()
        .arg("replay")
        .arg(&log)
        .assert()
        .failure()
        .stderr(predicate::str::contains("MissingVelocity"));
}

#[test]
fn log_filter_enables_target_debug_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image = dir.path().join("frame.png");
    write_tape_png(&image, 100, 140);

    tapeloc()
        .args(["--log", "warn,tapeloc=debug", "detect"])
        .arg(&image)
        .arg("--edges-dir")
        .arg(dir.path().join("edges"))
        .assert()
        .success()
        .stderr(predicate::str::contains("edge map written to"));
}

#[cfg(not(feature = "tracing"))]
#[test]
fn malformed_log_filter_is_rejected() {
    tapeloc()
        .args(["--log", "tapeloc=chatty", "default-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("UnknownLevel"));
}
