use mesh_exodus::prelude::*;
use proptest::prelude::*;
use std::path::Path;

/// Builds a chain of Bar2 blocks with the given element counts.
fn chain(block_sizes: &[usize]) -> MeshDatabase {
    let total: usize = block_sizes.iter().sum();
    let num_nodes = total + 1;
    let mut db = MeshDatabase::try_new("chain", 2).expect("2-D database");
    let xs = (0..num_nodes).map(|i| i as f64).collect();
    db.set_coordinates(Coordinates::try_new(vec![xs, vec![0.0; num_nodes]], vec![]).expect("chain coordinates"))
        .expect("set chain coordinates");
    let mut first = 0;
    for (b, &n) in block_sizes.iter().enumerate() {
        let conn = (first..first + n).flat_map(|e| [e, e + 1]).collect();
        let block =
            ElementBlock::try_new(b as i64 + 1, ElementTopology::Bar2, 2, n, 2, 0, conn)
                .expect("bar block");
        db.add_block(block).expect("add bar block");
        first += n;
    }
    db.set_node_map((0..num_nodes).collect()).expect("node map");
    db.set_element_map((0..total).collect()).expect("element map");
    db
}

proptest! {
    #[test]
    fn every_element_lands_in_exactly_one_block(
        sizes in prop::collection::vec(1usize..6, 1..5)
    ) {
        let db = chain(&sizes);
        let total: usize = sizes.iter().sum();
        prop_assert_eq!(db.num_elements(), total);
        let mut seen = vec![0usize; sizes.len()];
        for id in 0..total {
            let (block, local) = db.locate_element(id).expect("every id resolves");
            prop_assert!(local < sizes[block]);
            seen[block] += 1;
        }
        prop_assert_eq!(seen, sizes.clone());
        prop_assert!(db.locate_index(total).is_err());
    }

    #[test]
    fn stored_connectivity_is_shifted_by_one(
        sizes in prop::collection::vec(1usize..6, 1..4)
    ) {
        let db = chain(&sizes);
        let codec = MemoryCodec::in_memory();
        db.write(&codec, "chain.exo").expect("write exodus");
        let record = codec.store().get(Path::new("chain.exo")).expect("committed");
        for (block, stored) in db.blocks().iter().zip(&record.blocks) {
            let expected: Vec<i64> = block
                .connectivity_array()
                .iter()
                .map(|&v| v as i64 + 1)
                .collect();
            prop_assert_eq!(&stored.connectivity, &expected);
        }
        let back = MeshDatabase::read(&codec, "chain.exo").expect("read exodus");
        prop_assert_eq!(back.blocks(), db.blocks());
    }
}
