//! Element blocks: homogeneous groups of same-topology elements.
//!
//! A block owns a flat, 0-based connectivity array of length
//! `num_elements * nodes_per_element`. Geometry is not stored on the block;
//! geometric queries borrow the parent database's [`Coordinates`].

use crate::data::coordinates::Coordinates;
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshError;
use crate::topology::element_type::ElementTopology;

/// One homogeneous group of elements.
///
/// # Invariants
///
/// - `connectivity.len() == num_elements * nodes_per_element`.
/// - `num_dim` is 2 or 3.
/// - When the topology has a known node count it equals `nodes_per_element`.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementBlock {
    id: i64,
    topology: ElementTopology,
    num_dim: usize,
    num_elements: usize,
    nodes_per_element: usize,
    num_attributes: usize,
    connectivity: Vec<usize>,
    name: String,
}

impl ElementBlock {
    /// Builds a block from 0-based connectivity, validating its length.
    pub fn try_new(
        id: i64,
        topology: ElementTopology,
        num_dim: usize,
        num_elements: usize,
        nodes_per_element: usize,
        num_attributes: usize,
        connectivity: Vec<usize>,
    ) -> Result<Self, MeshError> {
        let block = Self {
            id,
            topology,
            num_dim,
            num_elements,
            nodes_per_element,
            num_attributes,
            connectivity,
            name: String::new(),
        };
        block.validate_invariants()?;
        Ok(block)
    }

    /// Attaches a block name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[inline]
    pub fn id(&self) -> i64 {
        self.id
    }

    #[inline]
    pub fn topology(&self) -> &ElementTopology {
        &self.topology
    }

    #[inline]
    pub fn num_dim(&self) -> usize {
        self.num_dim
    }

    #[inline]
    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    #[inline]
    pub fn nodes_per_element(&self) -> usize {
        self.nodes_per_element
    }

    #[inline]
    pub fn num_attributes(&self) -> usize {
        self.num_attributes
    }

    /// Flat 0-based connectivity of every element in the block.
    #[inline]
    pub fn connectivity_array(&self) -> &[usize] {
        &self.connectivity
    }

    /// Block name as stored; empty when unnamed.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name written to file: the stored name, or `block_<id>` when unnamed.
    pub fn name_or_default(&self) -> String {
        if self.name.is_empty() {
            format!("block_{}", self.id)
        } else {
            self.name.clone()
        }
    }

    /// Node indices of element `local` in block-local numbering.
    ///
    /// # Errors
    /// `ElementIndexOutOfRange` unless `local < num_elements`.
    pub fn connectivity(&self, local: usize) -> Result<&[usize], MeshError> {
        if local >= self.num_elements {
            return Err(MeshError::ElementIndexOutOfRange {
                block_id: self.id,
                index: local,
                len: self.num_elements,
            });
        }
        let start = local * self.nodes_per_element;
        Ok(&self.connectivity[start..start + self.nodes_per_element])
    }

    /// Positions of the nodes of element `local`, one tuple per node.
    ///
    /// Each tuple has `num_dim` components gathered from `coords`.
    pub fn get_element(
        &self,
        local: usize,
        coords: &Coordinates,
    ) -> Result<Vec<Vec<f64>>, MeshError> {
        if coords.dimension() != self.num_dim {
            return Err(MeshError::count_mismatch(
                format!("coordinate axes for block {}", self.id),
                self.num_dim,
                coords.dimension(),
            ));
        }
        self.connectivity(local)?
            .iter()
            .map(|&node| coords.try_point(node))
            .collect()
    }

    /// Largest node index referenced by the block, if it has any elements.
    pub fn max_node_index(&self) -> Option<usize> {
        self.connectivity.iter().copied().max()
    }
}

impl DebugInvariants for ElementBlock {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "ElementBlock");
    }

    fn validate_invariants(&self) -> Result<(), MeshError> {
        if !(2..=3).contains(&self.num_dim) {
            return Err(MeshError::InvalidDimension(self.num_dim));
        }
        let expected = self.num_elements * self.nodes_per_element;
        if self.connectivity.len() != expected {
            return Err(MeshError::count_mismatch(
                format!("connectivity of block {}", self.id),
                expected,
                self.connectivity.len(),
            ));
        }
        if let Some(per_elem) = self.topology.nodes_per_element() {
            if per_elem != self.nodes_per_element {
                return Err(MeshError::count_mismatch(
                    format!("nodes per {} element in block {}", self.topology, self.id),
                    per_elem,
                    self.nodes_per_element,
                ));
            }
        }
        Ok(())
    }
}
