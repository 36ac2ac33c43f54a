//! IdMap: bidirectional index between local positions and external ids.
//!
//! The forward array maps each 0-based local index to its external id, in
//! the order the codec stores them. The reverse index is built once when
//! the map is constructed, so resolution is O(1) and duplicate external
//! ids are rejected up front instead of silently resolving to the first
//! match.

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshError;
use hashbrown::HashMap;

/// Which entity an [`IdMap`] numbers; selects the NotFound variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MapKind {
    Node,
    Element,
}

impl MapKind {
    fn label(self) -> &'static str {
        match self {
            MapKind::Node => "node",
            MapKind::Element => "element",
        }
    }
}

/// Bidirectional local-index ↔ external-id map.
#[derive(Clone, Debug)]
pub struct IdMap {
    kind: MapKind,
    to_external: Vec<usize>,
    to_local: HashMap<usize, usize>,
}

impl IdMap {
    /// Empty map; every resolution fails until ids are supplied.
    pub fn empty(kind: MapKind) -> Self {
        Self {
            kind,
            to_external: Vec::new(),
            to_local: HashMap::new(),
        }
    }

    /// Map where local index `i` has external id `i`.
    pub fn identity(kind: MapKind, len: usize) -> Self {
        Self {
            kind,
            to_external: (0..len).collect(),
            to_local: (0..len).map(|i| (i, i)).collect(),
        }
    }

    /// Builds a map from the local → external array.
    ///
    /// # Errors
    /// `DuplicateId` if an external id occurs more than once.
    pub fn try_from_external(kind: MapKind, to_external: Vec<usize>) -> Result<Self, MeshError> {
        let mut to_local = HashMap::with_capacity(to_external.len());
        for (local, &external) in to_external.iter().enumerate() {
            if to_local.insert(external, local).is_some() {
                return Err(MeshError::DuplicateId {
                    what: kind.label(),
                    id: external as i64,
                });
            }
        }
        Ok(Self {
            kind,
            to_external,
            to_local,
        })
    }

    #[inline]
    pub fn kind(&self) -> MapKind {
        self.kind
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.to_external.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.to_external.is_empty()
    }

    /// External ids in local order.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.to_external
    }

    /// Local index of `external`.
    ///
    /// # Errors
    /// `EmptyNodeMap`/`EmptyElementMap` when the map has no entries,
    /// `UnknownNodeId`/`UnknownElementId` when `external` is absent.
    pub fn resolve(&self, external: usize) -> Result<usize, MeshError> {
        if self.is_empty() {
            return Err(match self.kind {
                MapKind::Node => MeshError::EmptyNodeMap,
                MapKind::Element => MeshError::EmptyElementMap,
            });
        }
        self.to_local
            .get(&external)
            .copied()
            .ok_or(match self.kind {
                MapKind::Node => MeshError::UnknownNodeId(external),
                MapKind::Element => MeshError::UnknownElementId(external),
            })
    }

    /// External id of local index `local`, if in range.
    #[inline]
    pub fn external(&self, local: usize) -> Option<usize> {
        self.to_external.get(local).copied()
    }
}

impl PartialEq for IdMap {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.to_external == other.to_external
    }
}

impl DebugInvariants for IdMap {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "IdMap");
    }

    fn validate_invariants(&self) -> Result<(), MeshError> {
        if self.to_local.len() != self.to_external.len() {
            return Err(MeshError::count_mismatch(
                format!("{} id index", self.kind.label()),
                self.to_external.len(),
                self.to_local.len(),
            ));
        }
        for (local, external) in self.to_external.iter().enumerate() {
            if self.to_local.get(external) != Some(&local) {
                return Err(MeshError::DuplicateId {
                    what: self.kind.label(),
                    id: *external as i64,
                });
            }
        }
        Ok(())
    }
}
