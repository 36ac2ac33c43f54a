//! Named node and side groupings.
//!
//! Both set kinds are immutable once built. Node-set membership is held in
//! 0-based local node numbering. Side-set entries are kept exactly as the
//! codec reports them: they follow the codec's per-element local side
//! numbering and are never renumbered.

use crate::mesh_error::MeshError;

/// Named set of mesh nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSet {
    id: i64,
    num_dist_factors: usize,
    nodes: Vec<usize>,
    name: String,
}

impl NodeSet {
    /// Builds a node set, checking `num_nodes == nodes.len()`.
    ///
    /// An empty `name` becomes `unnamed_ns_<id>`.
    pub fn try_new(
        id: i64,
        num_nodes: usize,
        num_dist_factors: usize,
        nodes: Vec<usize>,
        name: impl Into<String>,
    ) -> Result<Self, MeshError> {
        if nodes.len() != num_nodes {
            return Err(MeshError::count_mismatch(
                format!("node set {id}"),
                num_nodes,
                nodes.len(),
            ));
        }
        let name = name.into();
        let name = if name.is_empty() {
            format!("unnamed_ns_{id}")
        } else {
            name
        };
        Ok(Self {
            id,
            num_dist_factors,
            nodes,
            name,
        })
    }

    #[inline]
    pub fn id(&self) -> i64 {
        self.id
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn num_dist_factors(&self) -> usize {
        self.num_dist_factors
    }

    /// Member nodes, 0-based.
    #[inline]
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Named set of element sides.
///
/// `elems[i]` and `sides[i]` together identify one side.
#[derive(Clone, Debug, PartialEq)]
pub struct SideSet {
    id: i64,
    num_dist_factors: usize,
    elems: Vec<i64>,
    sides: Vec<i64>,
    name: String,
}

impl SideSet {
    /// Builds a side set, checking `num_sides == elems.len() == sides.len()`.
    ///
    /// An empty `name` becomes `unnamed_ss_<id>`.
    pub fn try_new(
        id: i64,
        num_sides: usize,
        num_dist_factors: usize,
        elems: Vec<i64>,
        sides: Vec<i64>,
        name: impl Into<String>,
    ) -> Result<Self, MeshError> {
        if elems.len() != num_sides {
            return Err(MeshError::count_mismatch(
                format!("side set {id} elements"),
                num_sides,
                elems.len(),
            ));
        }
        if sides.len() != num_sides {
            return Err(MeshError::count_mismatch(
                format!("side set {id} sides"),
                num_sides,
                sides.len(),
            ));
        }
        let name = name.into();
        let name = if name.is_empty() {
            format!("unnamed_ss_{id}")
        } else {
            name
        };
        Ok(Self {
            id,
            num_dist_factors,
            elems,
            sides,
            name,
        })
    }

    #[inline]
    pub fn id(&self) -> i64 {
        self.id
    }

    #[inline]
    pub fn num_sides(&self) -> usize {
        self.elems.len()
    }

    #[inline]
    pub fn num_dist_factors(&self) -> usize {
        self.num_dist_factors
    }

    /// Element references, in codec-native numbering.
    #[inline]
    pub fn elems(&self) -> &[i64] {
        &self.elems
    }

    /// Element-local side ids, in codec-native numbering.
    #[inline]
    pub fn sides(&self) -> &[i64] {
        &self.sides
    }

    /// Iterates `(element, side)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.elems.iter().copied().zip(self.sides.iter().copied())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnamed_sets_get_default_names() {
        let ns = NodeSet::try_new(4, 2, 0, vec![0, 3], "").unwrap();
        assert_eq!(ns.name(), "unnamed_ns_4");
        let ss = SideSet::try_new(9, 1, 0, vec![1], vec![3], "").unwrap();
        assert_eq!(ss.name(), "unnamed_ss_9");
    }

    #[test]
    fn declared_counts_must_match() {
        let err = NodeSet::try_new(1, 3, 0, vec![0, 1], "top").unwrap_err();
        assert!(matches!(err, MeshError::CountMismatch { expected: 3, found: 2, .. }));
        let err = SideSet::try_new(1, 2, 0, vec![1, 2], vec![1], "wall").unwrap_err();
        assert!(matches!(err, MeshError::CountMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn side_entries_pair_up() {
        let ss = SideSet::try_new(2, 2, 0, vec![5, 6], vec![1, 4], "wall").unwrap();
        assert_eq!(ss.entries().collect::<Vec<_>>(), vec![(5, 1), (6, 4)]);
    }
}
