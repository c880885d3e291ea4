//! Integration tests: write collection files with `ParquetSource::write_collection`
//! and read them back through the `ColumnarSource` contract.

use tv_core::Error;
use tv_source::{Column, ColumnarSource, JaggedCol, NestedCol, ParquetSource};

fn write_fixture(dir: &std::path::Path) {
    let z = Column::Jagged(JaggedCol::from_rows(&[vec![-320.5, 321.0], vec![], vec![330.25]]));
    let layer = Column::Jagged(JaggedCol::from_rows(&[vec![1.0, 2.0], vec![], vec![3.0]]));
    ParquetSource::write_collection(
        dir,
        "ticlDumper/clusters",
        &[("position_z", &z), ("cluster_layer_id", &layer)],
    )
    .expect("write clusters");

    let vertices = Column::Nested(NestedCol::from_rows(&[
        vec![vec![1.0, 2.0], vec![3.0]],
        vec![],
        vec![vec![]],
    ]));
    let energy = Column::Jagged(JaggedCol::from_rows(&[vec![10.0, 20.0], vec![], vec![5.0]]));
    ParquetSource::write_collection(
        dir,
        "ticlDumper/trackstersCLUE3DHigh",
        &[("vertices_x", &vertices), ("raw_energy", &energy)],
    )
    .expect("write tracksters");
}

#[test]
fn roundtrip_collections_and_fields() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());

    let src = ParquetSource::open(dir.path()).expect("open source");
    assert_eq!(
        src.collections(),
        vec!["ticlDumper/clusters", "ticlDumper/trackstersCLUE3DHigh"]
    );
    assert_eq!(src.n_events(), 3);
    assert_eq!(
        src.fields("ticlDumper/trackstersCLUE3DHigh").unwrap(),
        vec!["raw_energy", "vertices_x"]
    );

    let z = src.read_jagged("ticlDumper/clusters", "position_z").unwrap();
    assert_eq!(z.flatten(), &[-320.5, 321.0, 330.25]);
    assert_eq!(z.counts(), vec![2, 0, 1]);

    let v = src.read_nested("ticlDumper/trackstersCLUE3DHigh", "vertices_x").unwrap();
    assert_eq!(v.lengths(), vec![2, 1, 0]);
    assert_eq!(v.object_offsets, vec![0, 2, 2, 3]);

    let e = src.read_jagged("ticlDumper/trackstersCLUE3DHigh", "raw_energy").unwrap();
    v.check_objects_aligned(&e, "tracksters").expect("fields of one collection are aligned");
}

#[test]
fn unknown_names_enumerate_alternatives() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let src = ParquetSource::open(dir.path()).unwrap();

    match src.read_column("ticlDumper/nope", "x").unwrap_err() {
        Error::UnknownCollection { available, .. } => assert_eq!(available.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
    match src.read_column("ticlDumper/clusters", "position_x").unwrap_err() {
        Error::UnknownField { available, .. } => {
            assert_eq!(available, vec!["cluster_layer_id", "position_z"])
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn mismatched_event_counts_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let a = Column::Jagged(JaggedCol::from_rows(&[vec![1.0], vec![2.0]]));
    let b = Column::Jagged(JaggedCol::from_rows(&[vec![1.0]]));
    ParquetSource::write_collection(dir.path(), "a", &[("x", &a)]).unwrap();
    ParquetSource::write_collection(dir.path(), "b", &[("x", &b)]).unwrap();

    let err = ParquetSource::open(dir.path()).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }), "{err}");
}

#[test]
fn missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ParquetSource::open(dir.path().join("absent")).unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}
