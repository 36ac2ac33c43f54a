#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-exodus
//!
//! mesh-exodus is an in-memory finite-element mesh database with a
//! round-trip to Exodus-style files. It holds the mesh graph (coordinates,
//! element blocks, node sets and side sets), bidirectional id maps, and
//! time-indexed nodal, element and global field data.
//!
//! ## Features
//! - Programmatic mesh construction with validated blocks and sets
//! - External-id resolution for nodes and elements through [`data::id_map::IdMap`]
//! - Preloaded or on-demand field access with per-entry memoization
//! - A narrow codec boundary ([`io::codec::ExodusCodec`]) with an in-memory
//!   store for tests and a JSON store for disk files
//!
//! ## Numbering
//!
//! Inside the crate everything is 0-based: node indices in connectivity
//! and node sets, id-map entries, time steps and variable positions. The
//! codec speaks the file format's 1-based numbering; conversion happens
//! only in [`database`].
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-exodus = "0.3"
//! # Optional features:
//! # features = ["check-invariants"]
//! ```

pub mod data;
pub mod database;
pub mod debug_invariants;
pub mod io;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::data::coordinates::Coordinates;
    pub use crate::data::field_store::FieldMode;
    pub use crate::data::id_map::{IdMap, MapKind};
    pub use crate::data::variables::VarScope;
    pub use crate::database::{CoordLookup, MeshDatabase, ReadOptions, WriteOptions};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::io::codec::{CodecError, CreateOptions, ExodusCodec, ExodusFile};
    #[cfg(feature = "json-codec")]
    pub use crate::io::json::JsonCodec;
    pub use crate::io::memory::{MemoryCodec, MemoryStore};
    pub use crate::mesh_error::{ErrorKind, MeshError};
    pub use crate::topology::element_block::ElementBlock;
    pub use crate::topology::element_type::ElementTopology;
    pub use crate::topology::sets::{NodeSet, SideSet};
}
