//! MeshError: Unified error type for mesh-exodus public APIs
//!
//! Every lookup, query, and codec round trip reports failure through
//! [`MeshError`]. A failed lookup is never reported as a default value;
//! callers can branch on [`MeshError::kind`] when only the broad category
//! matters.

use crate::data::variables::VarScope;
use crate::io::codec::CodecError;
use thiserror::Error;

/// Broad failure category of a [`MeshError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// An external id, block id, or variable name could not be resolved.
    NotFound,
    /// A time step or local index lies outside its valid bounds.
    OutOfRange,
    /// A declared count disagrees with actual membership or array length.
    Malformed,
    /// The underlying codec primitive failed.
    CodecFailure,
}

/// Unified error type for mesh-exodus operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    /// The node id map holds no entries, so external ids cannot be resolved.
    #[error("node id map is empty")]
    EmptyNodeMap,
    /// The element id map holds no entries.
    #[error("element id map is empty")]
    EmptyElementMap,
    /// External node id absent from the node id map.
    #[error("node id {0} not found")]
    UnknownNodeId(usize),
    /// External element id absent from the element id map.
    #[error("element id {0} not found")]
    UnknownElementId(usize),
    /// No element block carries this block id.
    #[error("element block {0} not found")]
    UnknownBlockId(i64),
    /// Variable name absent from the catalog of the given scope.
    #[error("{scope} variable `{name}` not found")]
    UnknownVariable { scope: VarScope, name: String },
    /// Neither the cache nor a field source can supply the requested array.
    #[error("{scope} variable `{name}` has no data at time step {step}")]
    FieldNotLoaded {
        scope: VarScope,
        name: String,
        step: usize,
    },

    /// Time step beyond the loaded time list.
    #[error("time step {step} out of range (database holds {len} steps)")]
    TimeStepOutOfRange { step: usize, len: usize },
    /// Local element index outside `0..num_elements` of its block.
    #[error("element index {index} out of range for block {block_id} ({len} elements)")]
    ElementIndexOutOfRange {
        block_id: i64,
        index: usize,
        len: usize,
    },
    /// Local node index outside `0..num_nodes`.
    #[error("node index {index} out of range ({len} nodes)")]
    NodeIndexOutOfRange { index: usize, len: usize },
    /// Block position outside the block list.
    #[error("block index {index} out of range ({len} blocks)")]
    BlockIndexOutOfRange { index: usize, len: usize },
    /// A 0-based element index does not fall inside any block.
    #[error("element index {index} exceeds the {total} elements held by all blocks")]
    ElementNotInAnyBlock { index: usize, total: usize },

    /// A declared count disagrees with the length actually supplied.
    #[error("{what}: expected {expected} entries, found {found}")]
    CountMismatch {
        what: String,
        expected: usize,
        found: usize,
    },
    /// Spatial dimension other than 2 or 3.
    #[error("unsupported spatial dimension {0} (expected 2 or 3)")]
    InvalidDimension(usize),
    /// The same identifier appears twice where ids must be unique.
    #[error("duplicate {what} id {id}")]
    DuplicateId { what: &'static str, id: i64 },
    /// The same variable name appears twice in one catalog.
    #[error("duplicate {scope} variable `{name}`")]
    DuplicateVariable { scope: VarScope, name: String },
    /// A 1-based id arriving from the codec was zero or negative.
    #[error("{what} id {id} is not a valid 1-based id")]
    InvalidExternalId { what: &'static str, id: i64 },
    /// Connectivity or set membership referencing a node that does not exist.
    #[error("{what} references node {node} but the mesh has {num_nodes} nodes")]
    NodeReferenceOutOfRange {
        what: String,
        node: usize,
        num_nodes: usize,
    },
    /// Time values must be strictly increasing.
    #[error("time value {value} at step {step} does not follow {previous}")]
    NonMonotonicTime {
        step: usize,
        previous: f64,
        value: f64,
    },

    /// Failure reported by the codec.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl MeshError {
    /// Maps this error onto its broad category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeshError::EmptyNodeMap
            | MeshError::EmptyElementMap
            | MeshError::UnknownNodeId(_)
            | MeshError::UnknownElementId(_)
            | MeshError::UnknownBlockId(_)
            | MeshError::UnknownVariable { .. }
            | MeshError::FieldNotLoaded { .. } => ErrorKind::NotFound,
            MeshError::TimeStepOutOfRange { .. }
            | MeshError::ElementIndexOutOfRange { .. }
            | MeshError::NodeIndexOutOfRange { .. }
            | MeshError::BlockIndexOutOfRange { .. }
            | MeshError::ElementNotInAnyBlock { .. } => ErrorKind::OutOfRange,
            MeshError::CountMismatch { .. }
            | MeshError::InvalidDimension(_)
            | MeshError::DuplicateId { .. }
            | MeshError::DuplicateVariable { .. }
            | MeshError::InvalidExternalId { .. }
            | MeshError::NodeReferenceOutOfRange { .. }
            | MeshError::NonMonotonicTime { .. } => ErrorKind::Malformed,
            MeshError::Codec(_) => ErrorKind::CodecFailure,
        }
    }

    pub(crate) fn count_mismatch(what: impl Into<String>, expected: usize, found: usize) -> Self {
        MeshError::CountMismatch {
            what: what.into(),
            expected,
            found,
        }
    }
}
