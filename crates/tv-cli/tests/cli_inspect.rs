mod common;

use common::{run, write_ticl_fixture};

#[test]
fn inspect_lists_collections_fields_and_events() {
    let tmp = tempfile::tempdir().unwrap();
    write_ticl_fixture(tmp.path());

    let out = run(&["inspect", "--source", tmp.path().to_string_lossy().as_ref()]);
    assert!(out.status.success(), "inspect should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("stdout is JSON");
    assert_eq!(v["n_events"], 2);
    let collections = v["collections"].as_object().unwrap();
    assert_eq!(collections.len(), 6);
    assert_eq!(
        collections["ticlDumper/clusters"],
        serde_json::json!(["cluster_layer_id", "position_z"])
    );
    let clue3d = collections["ticlDumper/trackstersCLUE3DHigh"].as_array().unwrap();
    assert!(clue3d.iter().any(|f| f == "id_probabilities"));
}

#[test]
fn inspect_writes_output_file() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("dump");
    write_ticl_fixture(&source);
    let report = tmp.path().join("inspect.json");

    let out = run(&[
        "inspect",
        "--source",
        source.to_string_lossy().as_ref(),
        "--output",
        report.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());
    let v: serde_json::Value = serde_json::from_slice(&std::fs::read(&report).unwrap()).unwrap();
    assert_eq!(v["n_events"], 2);
}

#[test]
fn inspect_missing_source_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let out = run(&["inspect", "--source", tmp.path().join("nope").to_string_lossy().as_ref()]);
    assert!(!out.status.success());
}
