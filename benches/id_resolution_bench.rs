use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use mesh_exodus::prelude::*;

fn build_chain(num_blocks: usize, per_block: usize) -> MeshDatabase {
    let total = num_blocks * per_block;
    let num_nodes = total + 1;
    let mut db = MeshDatabase::try_new("bench", 2).expect("valid dimension");
    let xs = (0..num_nodes).map(|i| i as f64).collect();
    db.set_coordinates(
        Coordinates::try_new(vec![xs, vec![0.0; num_nodes]], vec![]).expect("coordinates"),
    )
    .expect("set coordinates");
    for b in 0..num_blocks {
        let first = b * per_block;
        let conn = (first..first + per_block).flat_map(|e| [e, e + 1]).collect();
        let block = ElementBlock::try_new(b as i64 + 1, ElementTopology::Bar2, 2, per_block, 2, 0, conn)
            .expect("block");
        db.add_block(block).expect("add block");
    }
    db.set_node_map((0..num_nodes).collect()).expect("node map");
    db.set_element_map((0..total).rev().collect()).expect("element map");
    db
}

fn bench_id_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("id_resolution");

    for &num_blocks in &[4usize, 64usize] {
        let db = build_chain(num_blocks, 256);
        let total = db.num_elements();

        group.bench_with_input(
            BenchmarkId::new("locate_element", num_blocks),
            &num_blocks,
            |b, _| {
                b.iter(|| {
                    for id in (0..total).step_by(17) {
                        black_box(db.locate_element(id).expect("known id"));
                    }
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("element_coordinates", num_blocks),
            &num_blocks,
            |b, _| {
                b.iter(|| {
                    for id in (0..total).step_by(17) {
                        black_box(db.element_coordinates(id).expect("known id"));
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_field_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_access");
    let codec = MemoryCodec::in_memory();
    let mut db = build_chain(8, 512);
    db.add_element_variable("stress").expect("variable");
    db.add_time_step(0.0).expect("time step");
    let per_block = db
        .blocks()
        .iter()
        .map(|b| vec![1.0; b.num_elements()])
        .collect();
    db.set_element_values(0, "stress", per_block).expect("values");
    db.write(&codec, "bench.exo").expect("write");

    group.bench_function("first_query_on_demand", |b| {
        b.iter(|| {
            let db = MeshDatabase::open(&codec, "bench.exo").expect("open");
            black_box(db.element_data(0, "stress").expect("field").len());
        });
    });

    let cached = MeshDatabase::open(&codec, "bench.exo").expect("open");
    cached.element_data(0, "stress").expect("field");
    group.bench_function("cached_query", |b| {
        b.iter(|| black_box(cached.element_value(0, "stress", 1000).expect("value")));
    });

    group.finish();
}

criterion_group!(benches, bench_id_resolution, bench_field_access);
criterion_main!(benches);
