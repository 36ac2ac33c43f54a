//! Mesh topology: element blocks and the node and side sets built on them.

pub mod element_block;
pub mod element_type;
pub mod sets;

pub use element_block::ElementBlock;
pub use element_type::ElementTopology;
pub use sets::{NodeSet, SideSet};
