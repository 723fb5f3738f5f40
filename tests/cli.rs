//! Command line behavior of the `strata` binary.

use std::path::Path;
use std::process::{Command, Output};
use strata::prelude::*;
use tempfile::TempDir;

const DESCRIPTION: &str = r#"{
    "metadata": { "name": "ramp statistics" },
    "nodes": [
        { "key": "source", "filter": "image_source_u8",
          "parameters": { "size": [6, 4], "pattern": "ramp" } },
        { "key": "mask", "filter": "threshold_u8",
          "parameters": { "lower": 12 } },
        { "key": "stats", "filter": "statistics_u8" }
    ],
    "connections": [
        { "from": "source", "to": "mask" },
        { "from": "mask", "from_slot": "output", "to": "stats", "to_slot": "input" }
    ],
    "target": { "node": "stats", "output": "summary" }
}"#;

fn strata(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_strata"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run strata")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn list_shows_every_builtin() {
    let output = strata(&["list"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("(35 total)"));
    assert!(text.contains("threshold_u8"));
    assert!(text.contains("box_mean_f64"));
}

#[test]
fn info_describes_a_filter() {
    let output = strata(&["info", "box_mean_u16"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("ID: box_mean_u16"));
    assert!(text.contains("radius"));

    let output = strata(&["info", "no_such_filter"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("filter not found"));
}

#[test]
fn run_prints_the_target_summary() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "stats.json", DESCRIPTION);

    let output = strata(&["run", &path]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let text = stdout(&output);
    assert!(text.contains("3 executed"));
    assert!(text.contains("count   24"));
    assert!(text.contains("sum     12"));
}

#[test]
fn run_streams_a_pinned_region() {
    let dir = TempDir::new().unwrap();
    let description = DESCRIPTION.replace(
        r#""target": { "node": "stats", "output": "summary" }"#,
        r#""target": { "node": "mask", "region": { "index": [0, 1], "size": [6, 3] } }"#,
    );
    let path = write(&dir, "mask.json", &description);
    let config = write(
        &dir,
        "options.toml",
        "parallel = true\n\n[streaming]\nstrategy = \"slowest_axis\"\n",
    );

    let output = strata(&["run", &path, "--pieces", "3", "--config", &config]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let text = stdout(&output);
    assert!(text.contains("Piece 3/3"));
    assert!(text.contains("3 pieces"));
    assert!(text.contains("Buffered:"));
}

#[test]
fn run_rejects_bad_arguments() {
    let output = strata(&["run"]);
    assert!(!output.status.success());

    let output = strata(&["run", "pipeline.json", "--pieces", "0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("at least 1"));

    let missing = Path::new("definitely").join("missing.json");
    let output = strata(&["run", &missing.to_string_lossy()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot read"));

    let output = strata(&["frobnicate"]);
    assert!(!output.status.success());
}

#[test]
fn run_reports_each_cause_once() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "broken.json", "{ \"nodes\": [ }");

    let output = strata(&["run", &path]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot load pipeline"));
    assert_eq!(stderr.matches("line 1 column").count(), 1, "{}", stderr);
}

#[test]
fn description_loads_in_process() {
    let registry = FilterRegistry::with_builtins();
    let loaded = Pipeline::from_json(DESCRIPTION, &registry).unwrap();
    assert_eq!(loaded.keys.len(), 3);
    assert_eq!(loaded.pipeline.connection_count(), 2);

    let (node, slot, region) = loaded.target.clone().unwrap();
    assert_eq!(node, loaded.keys["stats"]);
    assert_eq!(slot, SlotKey::from("summary"));
    assert!(region.is_none());

    let mut pipeline = loaded.pipeline;
    pipeline.update(node).unwrap();
    let summary = pipeline.output(node, slot).unwrap().summary().unwrap();
    assert_eq!(summary.count, 24);
    assert_eq!(summary.maximum, 1.0);

    let err = Pipeline::from_json(
        &DESCRIPTION.replace("threshold_u8", "threshold_u128"),
        &registry,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
