mod common;

use common::{read_store, run, total, write_config, write_ticl_fixture};

fn config_body(source: &std::path::Path, out: &std::path::Path, extra: &str) -> String {
    format!("source: {}\nout_dir: {}\n{extra}", source.display(), out.display())
}

#[test]
fn run_writes_every_analysis_store() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("dump");
    let out = tmp.path().join("out");
    write_ticl_fixture(&source);
    let cfg = write_config(tmp.path(), "run.yaml", &config_body(&source, &out, ""));

    let res = run(&["run", "--config", cfg.to_string_lossy().as_ref()]);
    assert!(res.status.success(), "run should succeed, stderr={}", String::from_utf8_lossy(&res.stderr));

    let report: serde_json::Value = serde_json::from_slice(&res.stdout).expect("report is JSON");
    let stores: Vec<&str> = report
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["store"].as_str().unwrap())
        .collect();
    for name in [
        "multiplicity_histos.json",
        "kinematics_E_histos.json",
        "kinematics_ET_histos.json",
        "kinematics_eta_histos.json",
        "pid_photon_histos.json",
        "pid_charged_hadron_histos.json",
        "association_recoToSim_histos.json",
        "association_recoToSim_score_histos.json",
        "association_simToReco_sharedE_histos.json",
        "angular_recoToSim_histos.json",
        "layers_histos.json",
    ] {
        assert!(out.join(name).exists(), "missing {name}");
        assert!(stores.iter().any(|s| s.ends_with(name)), "{name} not reported");
    }

    // Per-object tables: one entry per object, sliced by every kinematic quantity.
    let mult = read_store(&out.join("multiplicity_histos.json"));
    assert_eq!(total(&mult["LC_reco"]), 3);
    assert_eq!(total(&mult["LC_sim"]), 3);
    assert!(mult["LC_reco_E"].get("c_data_bin_edges").is_some());
    // eta alternates 1.8, -2.6: objects 0 and 2 are low density.
    assert_eq!(total(&mult["LC_reco_LD"]), 2);
    assert_eq!(total(&mult["LC_reco_HD"]), 1);

    // Only truth-labelled photons, no slicing.
    let pid = read_store(&out.join("pid_photon_histos.json"));
    let keys: Vec<&String> = pid.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["LC_reco"]);
    assert_eq!(total(&pid["LC_reco"]), 2);

    // recoToSim tables are keyed by the reco side only.
    let score = read_store(&out.join("association_recoToSim_score_histos.json"));
    assert!(score.get("LC_reco").is_some());
    assert!(score.get("LC_sim").is_none());
    assert_eq!(total(&score["Tracksters_reco"]), 3);

    let layers = read_store(&out.join("layers_histos.json"));
    assert_eq!(total(&layers["Tracksters_sim"]), 3);
}

#[test]
fn rerun_is_byte_identical_and_keeps_foreign_keys() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("dump");
    let out = tmp.path().join("out");
    write_ticl_fixture(&source);
    let cfg = write_config(
        tmp.path(),
        "run.yaml",
        &config_body(&source, &out, "analyses: [multiplicity]\n"),
    );
    let store = out.join("multiplicity_histos.json");

    let res = run(&["run", "--config", cfg.to_string_lossy().as_ref()]);
    assert!(res.status.success(), "stderr={}", String::from_utf8_lossy(&res.stderr));
    let first = std::fs::read(&store).unwrap();

    let res = run(&["run", "--config", cfg.to_string_lossy().as_ref()]);
    assert!(res.status.success(), "stderr={}", String::from_utf8_lossy(&res.stderr));
    assert_eq!(first, std::fs::read(&store).unwrap(), "re-running should not change the store");

    let mut doc = read_store(&store);
    doc["foreign"] = serde_json::json!({"data": [1], "data_bin_edges": [0.0, 1.0]});
    std::fs::write(&store, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();

    let res = run(&["run", "--config", cfg.to_string_lossy().as_ref()]);
    assert!(res.status.success(), "stderr={}", String::from_utf8_lossy(&res.stderr));
    let doc = read_store(&store);
    assert_eq!(doc["foreign"]["data"], serde_json::json!([1]));
    assert!(doc.get("LC_reco").is_some());
}

#[test]
fn json_config_with_selections_and_bins() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("dump");
    let out = tmp.path().join("out");
    write_ticl_fixture(&source);
    let cfg = serde_json::json!({
        "source": source,
        "out_dir": out,
        "analyses": ["layers"],
        "selections": ["HD"],
        "engines": {"layers": {"bins": [0.5, 1.5, 2.5, 3.5, 4.5], "slices": []}}
    });
    let cfg = write_config(tmp.path(), "run.json", &cfg.to_string());

    let res = run(&["run", "--config", cfg.to_string_lossy().as_ref()]);
    assert!(res.status.success(), "stderr={}", String::from_utf8_lossy(&res.stderr));

    let layers = read_store(&out.join("layers_histos.json"));
    assert_eq!(layers["LC_reco"]["data_bin_edges"], serde_json::json!([0.5, 1.5, 2.5, 3.5, 4.5]));
    assert_eq!(total(&layers["LC_reco"]), 3);
    assert_eq!(total(&layers["LC_reco_HD"]), 1);
    assert!(layers.get("LC_reco_E").is_none());
}

#[test]
fn analysis_flag_and_out_dir_override() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("dump");
    let out = tmp.path().join("elsewhere");
    write_ticl_fixture(&source);
    let cfg = write_config(
        tmp.path(),
        "run.yaml",
        &config_body(&source, &tmp.path().join("unused"), ""),
    );

    let res = run(&[
        "run",
        "--config",
        cfg.to_string_lossy().as_ref(),
        "--analysis",
        "angular",
        "--out-dir",
        out.to_string_lossy().as_ref(),
    ]);
    assert!(res.status.success(), "stderr={}", String::from_utf8_lossy(&res.stderr));
    assert!(out.join("angular_recoToSim_histos.json").exists());
    assert!(!out.join("multiplicity_histos.json").exists());
    assert!(!tmp.path().join("unused").exists());
}

#[test]
fn missing_field_fails_with_alternatives() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("dump");
    let out = tmp.path().join("out");
    write_ticl_fixture(&source);
    let cfg = write_config(
        tmp.path(),
        "run.yaml",
        &config_body(
            &source,
            &out,
            "analyses: [kinematics]\nkinematics:\n  quantities:\n    - name: E\n      quantity: raw_energie\n",
        ),
    );

    let res = run(&["run", "--config", cfg.to_string_lossy().as_ref()]);
    assert!(!res.status.success());
    let stderr = String::from_utf8_lossy(&res.stderr);
    assert!(stderr.contains("raw_energie"), "stderr={stderr}");
    assert!(stderr.contains("raw_energy"), "alternatives should be listed, stderr={stderr}");
}

#[test]
fn bad_comparison_is_rejected_at_load() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = write_config(
        tmp.path(),
        "run.yaml",
        "source: dump\nout_dir: out\nkinematics:\n  quantities:\n    - name: HD\n      quantity: abs(barycenter_eta) > 2.15\n",
    );
    let res = run(&["run", "--config", cfg.to_string_lossy().as_ref()]);
    assert!(!res.status.success());
    assert!(!tmp.path().join("out").exists());
}
