#![allow(dead_code)]
use mesh_exodus::prelude::*;

/// Two Bar2 blocks (ids 10 and 20, five elements each) over a 2 x 6 node
/// ladder, with one node set, one side set, two time steps and one
/// variable in every scope.
pub fn strip_mesh() -> MeshDatabase {
    let mut db = MeshDatabase::try_new("strip", 2).expect("2-D database");
    let xs: Vec<f64> = (0..12).map(|i| (i / 2) as f64).collect();
    let ys: Vec<f64> = (0..12).map(|i| (i % 2) as f64).collect();
    db.set_coordinates(Coordinates::try_new(vec![xs, ys], vec![]).expect("ladder coordinates"))
        .expect("set ladder coordinates");
    for (id, first) in [(10, 0usize), (20, 5)] {
        let conn: Vec<usize> = (first..first + 5).flat_map(|e| [e, e + 1]).collect();
        let block = ElementBlock::try_new(id, ElementTopology::Bar2, 2, 5, 2, 0, conn)
            .expect("bar block")
            .with_name(format!("bars_{id}"));
        db.add_block(block).expect("add bar block");
    }
    db.set_node_map((100..112).collect()).expect("node map");
    db.set_element_map((0..10).rev().collect()).expect("element map");

    db.add_node_set(NodeSet::try_new(1, 2, 0, vec![0, 1], "inlet").expect("node set"))
        .expect("add node set");
    db.add_side_set(SideSet::try_new(2, 2, 0, vec![5, 10], vec![1, 2], "").expect("side set"))
        .expect("add side set");

    db.add_node_variable("temperature").expect("nodal variable");
    db.add_element_variable("stress").expect("element variable");
    db.add_global_variable("energy").expect("global variable");
    for (step, time) in [0.0, 0.5].into_iter().enumerate() {
        db.add_time_step(time).expect("time step");
        let scale = (step + 1) as f64;
        db.set_node_values(
            step,
            "temperature",
            (0..12).map(|n| scale * n as f64).collect(),
        )
        .expect("nodal values");
        db.set_element_values(
            step,
            "stress",
            vec![
                (0..5).map(|e| scale * 100.0 + e as f64).collect(),
                (5..10).map(|e| scale * 100.0 + e as f64).collect(),
            ],
        )
        .expect("element values");
        db.set_global_values(step, vec![scale * 7.5]).expect("global values");
    }
    db
}

/// One Tri3 block of four triangles over six nodes.
pub fn triangle_mesh() -> MeshDatabase {
    let mut db = MeshDatabase::try_new("triangles", 2).expect("2-D database");
    let xs = vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0];
    let ys = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
    db.set_coordinates(Coordinates::try_new(vec![xs, ys], vec![]).expect("grid coordinates"))
        .expect("set grid coordinates");
    let conn = vec![0, 1, 4, 0, 4, 3, 1, 2, 5, 1, 5, 4];
    db.add_block(ElementBlock::try_new(1, ElementTopology::Tri3, 2, 4, 3, 0, conn).expect("triangle block"))
        .expect("add triangle block");
    db.set_node_map((0..6).collect()).expect("node map");
    db.set_element_map((0..4).collect()).expect("element map");
    db
}
