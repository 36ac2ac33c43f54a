mod util;

use mesh_exodus::io::codec::CodecOp;
use mesh_exodus::prelude::*;
use std::path::Path;
use util::strip_mesh;

fn opened() -> (MemoryCodec, MeshDatabase) {
    let codec = MemoryCodec::in_memory();
    strip_mesh().write(&codec, "fields.exo").expect("write exodus");
    let db = MeshDatabase::open(&codec, "fields.exo").expect("open exodus");
    codec.store().reset_calls();
    (codec, db)
}

#[test]
fn open_reads_no_field_arrays() {
    let codec = MemoryCodec::in_memory();
    strip_mesh().write(&codec, "fields.exo").expect("write exodus");
    codec.store().reset_calls();
    let db = MeshDatabase::open(&codec, "fields.exo").expect("open exodus");
    assert_eq!(db.field_mode(), FieldMode::OnDemand);
    assert_eq!(codec.store().calls(CodecOp::GetNodalVar), 0);
    assert_eq!(codec.store().calls(CodecOp::GetElemVar), 0);
    assert_eq!(codec.store().calls(CodecOp::GetGlobVars), 0);
    assert_eq!(codec.store().open_handles(), 0);
}

#[test]
fn read_materializes_every_array() {
    let codec = MemoryCodec::in_memory();
    strip_mesh().write(&codec, "fields.exo").expect("write exodus");
    codec.store().reset_calls();
    let db = MeshDatabase::read(&codec, "fields.exo").expect("read exodus");
    // two steps, one nodal variable
    assert_eq!(codec.store().calls(CodecOp::GetNodalVar), 2);
    // two steps, one element variable, two blocks
    assert_eq!(codec.store().calls(CodecOp::GetElemVar), 4);
    codec.store().reset_calls();
    db.node_data(1, "temperature").expect("cached temperature");
    db.element_data(0, "stress").expect("cached stress");
    assert_eq!(codec.store().total_calls(), 0);
}

#[test]
fn repeated_queries_hit_the_file_once() {
    let (codec, db) = opened();
    let first = db.node_data(1, "temperature").expect("first query").to_vec();
    let second = db.node_data(1, "temperature").expect("second query").to_vec();
    assert_eq!(first, second);
    assert_eq!(codec.store().calls(CodecOp::GetNodalVar), 1);
    assert_eq!(codec.store().calls(CodecOp::Open), 1);
    assert!(db.is_node_data_cached(1, "temperature"));
    assert!(!db.is_node_data_cached(0, "temperature"));

    assert_eq!(db.element_value(0, "stress", 0).expect("stress of element 0"), 109.0);
    assert_eq!(db.element_value(0, "stress", 9).expect("stress of element 9"), 100.0);
    assert_eq!(codec.store().calls(CodecOp::GetElemVar), 2);
    assert_eq!(codec.store().open_handles(), 0);
}

#[test]
fn failed_fill_leaves_the_entry_empty() {
    let (codec, db) = opened();
    codec.store().fail_on(CodecOp::GetElemVar, 2);

    let err = db.element_data(0, "stress").unwrap_err();
    assert_eq!(
        err,
        MeshError::Codec(CodecError::Injected(CodecOp::GetElemVar))
    );
    assert!(!db.is_element_data_cached(0, "stress"));
    assert_eq!(codec.store().open_handles(), 0);

    let per_block = db.element_data(0, "stress").expect("retried fill");
    assert_eq!(per_block.len(), 2);
    assert_eq!(per_block[1][0], 105.0);
    assert!(db.is_element_data_cached(0, "stress"));
    assert_eq!(codec.store().calls(CodecOp::GetElemVar), 4);
}

#[test]
fn failed_open_during_fill_is_reported() {
    let (codec, db) = opened();
    codec.store().fail_on(CodecOp::Open, 1);
    let err = db.global_data(1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CodecFailure);
    assert!(!db.is_global_data_cached(1));
    assert_eq!(db.global_value(1, "energy").expect("energy after retry"), 15.0);
    assert!(db.is_global_data_cached(1));
    assert!(!db.is_global_data_cached(0));
    assert_eq!(codec.store().calls(CodecOp::GetGlobVars), 1);
}

#[test]
fn unknown_variable_and_step_are_distinguished() {
    let (_codec, db) = opened();
    assert!(matches!(
        db.node_data(0, "pressure").unwrap_err(),
        MeshError::UnknownVariable { .. }
    ));
    assert_eq!(
        db.node_data(2, "temperature").unwrap_err(),
        MeshError::TimeStepOutOfRange { step: 2, len: 2 }
    );
}

#[test]
fn adding_a_block_drops_cached_element_arrays() {
    let codec = MemoryCodec::in_memory();
    let mut db = strip_mesh();
    let rung = ElementBlock::try_new(30, ElementTopology::Bar2, 2, 1, 2, 0, vec![10, 11])
        .expect("bar over the last rung");
    assert_eq!(db.add_block(rung).expect("add block"), 2);
    db.set_element_map((0..11).collect()).expect("element map");

    assert!(!db.is_element_data_cached(0, "stress"));
    assert!(matches!(
        db.element_value(0, "stress", 10).unwrap_err(),
        MeshError::FieldNotLoaded { step: 0, .. }
    ));
    db.validate_invariants().expect("caches match the block layout");
    assert!(db.is_node_data_cached(0, "temperature"));

    let err = db.write(&codec, "grown.exo").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(codec.store().get(Path::new("grown.exo")).is_none());
    assert_eq!(codec.store().open_handles(), 0);

    for step in 0..2 {
        let per_block = vec![vec![1.0; 5], vec![2.0; 5], vec![3.5]];
        db.set_element_values(step, "stress", per_block)
            .expect("stress over three blocks");
    }
    db.write(&codec, "grown.exo").expect("write grown mesh");
    let back = MeshDatabase::read(&codec, "grown.exo").expect("read grown mesh");
    assert_eq!(back.element_value(1, "stress", 10).expect("stress of the new element"), 3.5);
}

#[test]
fn changing_the_node_count_drops_cached_nodal_arrays() {
    let mut db = strip_mesh();
    let xs: Vec<f64> = (0..14).map(|i| (i / 2) as f64).collect();
    let ys: Vec<f64> = (0..14).map(|i| (i % 2) as f64).collect();
    db.set_coordinates(Coordinates::try_new(vec![xs, ys], vec![]).expect("longer ladder"))
        .expect("set longer ladder");

    assert_eq!(db.num_nodes(), 14);
    assert!(db.node_map().is_empty());
    assert!(!db.is_node_data_cached(1, "temperature"));
    assert!(matches!(
        db.node_data(1, "temperature").unwrap_err(),
        MeshError::FieldNotLoaded { step: 1, .. }
    ));
    db.validate_invariants().expect("caches match the node count");
    // element and global arrays do not depend on the node count
    assert!(db.is_element_data_cached(1, "stress"));
    assert_eq!(db.global_value(1, "energy").expect("energy"), 15.0);

    db.set_node_values(1, "temperature", vec![0.5; 14])
        .expect("temperature over every node");
    assert_eq!(db.node_data(1, "temperature").expect("refilled").len(), 14);
}
