#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tv_source::{Column, JaggedCol, NestedCol, ParquetSource};

pub fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ticlval"))
}

pub fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

pub const RECO_COUNTS: [usize; 2] = [2, 1];
pub const SIM_COUNTS: [usize; 2] = [1, 2];

/// One value per object, numbered globally across events.
fn jagged(counts: &[usize], f: impl Fn(usize) -> f64) -> Column {
    let mut next = 0;
    let rows: Vec<Vec<f64>> = counts
        .iter()
        .map(|&n| {
            let row = (next..next + n).map(&f).collect();
            next += n;
            row
        })
        .collect();
    Column::Jagged(JaggedCol::from_rows(&rows))
}

/// A sequence per object, numbered globally across events.
fn nested(counts: &[usize], f: impl Fn(usize) -> Vec<f64>) -> Column {
    let mut next = 0;
    let rows: Vec<Vec<Vec<f64>>> = counts
        .iter()
        .map(|&n| {
            let row = (next..next + n).map(&f).collect();
            next += n;
            row
        })
        .collect();
    Column::Nested(NestedCol::from_rows(&rows))
}

/// Candidate lists of every `from` object over the `to` objects of its event,
/// best candidate first.
fn candidates(from: &[usize], to: &[usize], f: impl Fn(usize, usize) -> f64) -> Column {
    let rows: Vec<Vec<Vec<f64>>> = from
        .iter()
        .zip(to)
        .map(|(&n_from, &n_to)| {
            (0..n_from)
                .map(|j| (0..n_to).map(|k| f(j, (j + k) % n_to)).collect())
                .collect()
        })
        .collect();
    Column::Nested(NestedCol::from_rows(&rows))
}

fn one_hot(class: usize) -> Vec<f64> {
    (0..8).map(|i| if i == class { 1.0 } else { 0.0 }).collect()
}

fn write_objects(dir: &Path, name: &str, counts: &[usize], multiplicity_field: &str, with_pid: bool) {
    let energy = jagged(counts, |i| 10.0 * (i + 1) as f64);
    let pt = jagged(counts, |i| 5.0 * (i + 1) as f64);
    let eta = jagged(counts, |i| if i % 2 == 0 { 1.8 } else { -2.6 });
    let z = jagged(counts, |i| 320.1 + i as f64);
    let vx = jagged(counts, |i| 1.0 + i as f64);
    let vy = jagged(counts, |_| 0.5);
    let vz = jagged(counts, |_| 1.0);
    let constituents = nested(counts, |i| (0..=i).map(|v| v as f64).collect());
    // Even objects are photons (class 0), odd ones charged hadrons (class 4).
    let probs = nested(counts, |i| {
        let (photon, hadron) = if i % 2 == 0 { (0.7, 0.3) } else { (0.2, 0.8) };
        vec![photon, 0.0, 0.0, 0.0, hadron, 0.0, 0.0, 0.0]
    });
    let truth = nested(counts, |i| one_hot(if i % 2 == 0 { 0 } else { 4 }));

    let mut columns: Vec<(&str, &Column)> = vec![
        ("raw_energy", &energy),
        ("raw_pt", &pt),
        ("barycenter_eta", &eta),
        ("barycenter_z", &z),
        ("eVector0_x", &vx),
        ("eVector0_y", &vy),
        ("eVector0_z", &vz),
        (multiplicity_field, &constituents),
    ];
    if with_pid {
        columns.push(("id_probabilities", &probs));
        columns.push(("sim_id_probabilities", &truth));
    }
    ParquetSource::write_collection(dir, name, &columns).expect("write objects");
}

/// A two-event dump with every collection and field the default
/// configuration reads.
pub fn write_ticl_fixture(dir: &Path) {
    write_objects(dir, "ticlDumper/trackstersCLUE3DHigh", &RECO_COUNTS, "vertices_x", true);
    write_objects(dir, "ticlDumper/simtrackstersCP", &SIM_COUNTS, "vertices_x", false);
    write_objects(dir, "ticlDumper/trackstersSuperclustering", &RECO_COUNTS, "trackster_indices", false);
    write_objects(dir, "ticlDumper/simtrackstersSC", &SIM_COUNTS, "trackster_indices", false);

    let mut assoc: Vec<(String, Column)> = Vec::new();
    for (prefix, target) in [("ticlTrackstersCLUE3DHigh", "CP"), ("ticlTrackstersSuperclustering", "SC")] {
        for (dir_name, from, to) in [("recoToSim", &RECO_COUNTS, &SIM_COUNTS), ("simToReco", &SIM_COUNTS, &RECO_COUNTS)] {
            let base = format!("{prefix}_{dir_name}_{target}");
            assoc.push((base.clone(), candidates(from, to, |_, k| k as f64)));
            assoc.push((format!("{base}_score"), candidates(from, to, |j, k| 0.1 * (j + k + 1) as f64)));
            assoc.push((format!("{base}_sharedE"), candidates(from, to, |j, _| 2.0 + j as f64)));
        }
    }
    let columns: Vec<(&str, &Column)> = assoc.iter().map(|(n, c)| (n.as_str(), c)).collect();
    ParquetSource::write_collection(dir, "ticlDumper/associations", &columns).expect("write associations");

    let z = Column::Jagged(JaggedCol::from_rows(&[vec![321.0, 320.0, 322.0], vec![320.5, 323.0]]));
    let layer = Column::Jagged(JaggedCol::from_rows(&[vec![2.0, 1.0, 3.0], vec![1.0, 4.0]]));
    ParquetSource::write_collection(dir, "ticlDumper/clusters", &[("position_z", &z), ("cluster_layer_id", &layer)])
        .expect("write clusters");
}

pub fn write_config(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write config");
    path
}

pub fn read_store(path: &Path) -> serde_json::Value {
    let bytes = std::fs::read(path).unwrap_or_else(|e| panic!("missing store {}: {e}", path.display()));
    serde_json::from_slice(&bytes).expect("store is JSON")
}

/// Sum of all counts of a 1-D or 2-D record.
pub fn total(record: &serde_json::Value) -> u64 {
    fn sum(v: &serde_json::Value) -> u64 {
        match v {
            serde_json::Value::Array(items) => items.iter().map(sum).sum(),
            other => other.as_u64().unwrap_or(0),
        }
    }
    sum(&record["data"])
}
