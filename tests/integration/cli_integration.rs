//! Integration tests for the assimilate binary

use super::test_utils::{observation_dataset, Workspace};
use assimilate::dataset;
use std::process::{Command, Output};

fn assimilate(ws: &Workspace, args: &[&str]) -> Output {
    let bin = env!("CARGO_BIN_EXE_assimilate");
    Command::new(bin)
        .env("XDG_CONFIG_HOME", ws.root().join("xdg"))
        .env("HOME", ws.root().join("home"))
        .arg("--quiet")
        .arg("--workspace")
        .arg(ws.root())
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "command failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn test_window_json() {
    let ws = Workspace::new();
    ws.write_config(&["aircraft"], "");

    let out = stdout(&assimilate(&ws, &["window", "20211212T000000Z", "--format", "json"]));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["window_begin"], "2021-12-11T21:00:00Z");
    assert_eq!(value["window_end"], "2021-12-12T03:00:00Z");
    assert_eq!(value["window_type"], "3D");
}

#[test]
fn test_slots_json_with_explicit_config() {
    let ws = Workspace::new();
    let config = ws.write_config(&["aircraft"], "[window]\noffset = \"PT6H\"\n");

    let bin = env!("CARGO_BIN_EXE_assimilate");
    let output = Command::new(bin)
        .arg("--quiet")
        .arg("--config")
        .arg(&config)
        .args(["slots", "2021-12-12T00:00:00Z", "--format", "json"])
        .output()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(
        value["slots"],
        serde_json::json!(["2021-12-11T15:00:00Z", "2021-12-11T21:00:00Z"])
    );
}

#[test]
fn test_render_prints_yaml() {
    let ws = Workspace::new();
    ws.write_config(&["aircraft"], "");

    let out = stdout(&assimilate(&ws, &["render", "20211212T000000Z"]));
    let doc: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
    let observers = &doc["cost function"]["observations"]["observers"];
    assert_eq!(observers.as_sequence().map(|s| s.len()), Some(1));

    let out = stdout(&assimilate(
        &ws,
        &["render", "20211212T000000Z", "--observation", "aircraft"],
    ));
    assert!(out.contains("VertInterp"));
}

#[test]
fn test_run_generate_config_only() {
    let ws = Workspace::new();
    ws.write_config(&["aircraft"], "");
    ws.seed_observation("gdas", "aircraft", "2021-12-11T21:00:00Z", &[1.0, 2.0]);

    let out = stdout(&assimilate(
        &ws,
        &["run", "2021-12-12T00:00:00Z", "--generate-config-only", "--format", "json"],
    ));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["dispatched"], false);
    assert_eq!(value["observations"][0]["provider"], "gdas");
    assert!(ws
        .run_dir()
        .join("20211212T000000Z/jedi_variational_config.yaml")
        .exists());
}

#[test]
fn test_merge_and_inspect() {
    let ws = Workspace::new();
    ws.write_config(&[], "");
    let a = ws.root().join("a.ads");
    let b = ws.root().join("b.ads");
    dataset::write(&a, &observation_dataset(&[1.0])).unwrap();
    dataset::write(&b, &observation_dataset(&[2.0, 3.0])).unwrap();
    let merged = ws.root().join("merged.ads");

    let rejected = assimilate(
        &ws,
        &[
            "merge",
            "--output",
            merged.to_str().unwrap(),
            "--fixed",
            "nchans",
            a.to_str().unwrap(),
            b.to_str().unwrap(),
        ],
    );
    assert!(!rejected.status.success());
    assert!(String::from_utf8_lossy(&rejected.stderr).contains("nchans"));
    assert!(!merged.exists());

    let out = stdout(&assimilate(
        &ws,
        &[
            "merge",
            "--output",
            merged.to_str().unwrap(),
            "--fixed",
            "Channel",
            a.to_str().unwrap(),
            b.to_str().unwrap(),
        ],
    ));
    assert!(out.contains("Merged 2 inputs"));

    let out = stdout(&assimilate(
        &ws,
        &["inspect", merged.to_str().unwrap(), "--format", "json"],
    ));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    let dims = value["dimensions"].as_array().unwrap();
    assert!(dims.contains(&serde_json::json!(["Location", 3])), "{:?}", dims);
}

#[test]
fn test_errors_exit_nonzero() {
    let ws = Workspace::new();
    ws.write_config(&["aircraft"], "");

    let output = assimilate(&ws, &["inspect", "does-not-exist.ads"]);
    assert!(!output.status.success());
    assert!(!output.stderr.is_empty());

    let output = assimilate(&ws, &["window", "not-a-time"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not-a-time"));
}
