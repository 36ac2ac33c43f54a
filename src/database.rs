//! MeshDatabase: the full mesh graph plus its time-indexed fields.
//!
//! A database owns coordinates, element blocks, node and side sets, id maps
//! and variable catalogs, and a [`FieldStore`] holding field arrays. It is
//! populated either programmatically (`try_new` followed by the `add_*` and
//! `set_*` mutators) or from a file through an [`ExodusCodec`]:
//!
//! - [`MeshDatabase::read`] hydrates everything and materializes every field
//!   array before the file is closed ([`FieldMode::Preloaded`]);
//! - [`MeshDatabase::open`] hydrates metadata only and fetches each field
//!   array from the file on first query ([`FieldMode::OnDemand`]).
//!
//! All numbering inside the database is 0-based: connectivity, node-set
//! membership and id-map entries are converted from the codec's 1-based
//! numbering on read and back on write. Side-set entries are the exception
//! and pass through untouched.
//!
//! # Element lookup
//!
//! Elements are numbered globally in block-list order: block 0 holds global
//! indices `0..n0`, block 1 holds `n0..n0 + n1`, and so on. An external
//! element id resolves through the element id map to a global index, then
//! to `(block_index, local_index)`.

use crate::data::coordinates::Coordinates;
use crate::data::field_store::{CodecSource, FieldMode, FieldStore};
use crate::data::id_map::{IdMap, MapKind};
use crate::data::variables::{VarCatalog, VarScope};
use crate::debug_invariants::DebugInvariants;
use crate::io::codec::{
    BlockParams, CreateOptions, EntityKind, ExodusCodec, ExodusFile, InitParams, SetParams,
    with_file,
};
use crate::mesh_error::MeshError;
use crate::topology::element_block::ElementBlock;
use crate::topology::element_type::ElementTopology;
use crate::topology::sets::{NodeSet, SideSet};
use itertools::Itertools;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// How [`MeshDatabase::coord_data`] interprets its node argument.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CoordLookup {
    /// Resolve through the node id map.
    #[default]
    ExternalId,
    /// Use the argument directly as the 0-based local node index.
    LocalIndex,
}

/// Options for reading a database from a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadOptions {
    /// Eager materialization or fetch-on-first-query for field arrays.
    pub field_mode: FieldMode,
    /// Run [`DebugInvariants::validate_invariants`] after hydration.
    pub validate: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            field_mode: FieldMode::Preloaded,
            validate: true,
        }
    }
}

/// Options for writing a database to a file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub create: CreateOptions,
}

/// In-memory finite-element mesh database.
#[derive(Clone, Debug)]
pub struct MeshDatabase {
    title: String,
    num_dim: usize,
    coordinates: Coordinates,
    blocks: Vec<ElementBlock>,
    node_sets: Vec<NodeSet>,
    side_sets: Vec<SideSet>,
    node_map: IdMap,
    elem_map: IdMap,
    times: Vec<f64>,
    node_vars: VarCatalog,
    elem_vars: VarCatalog,
    global_vars: VarCatalog,
    fields: FieldStore,
    /// `[block_index]` → flat `num_attributes * num_elements` array; empty
    /// when the block carries no attribute values.
    elem_attr: Vec<Vec<f64>>,
}

impl MeshDatabase {
    /// Empty database with no nodes, blocks, sets, time steps or variables.
    ///
    /// # Errors
    /// `InvalidDimension` unless `num_dim` is 2 or 3.
    pub fn try_new(title: impl Into<String>, num_dim: usize) -> Result<Self, MeshError> {
        let coordinates = Coordinates::try_new(vec![Vec::new(); num_dim], Vec::new())?;
        Ok(Self {
            title: title.into(),
            num_dim,
            coordinates,
            blocks: Vec::new(),
            node_sets: Vec::new(),
            side_sets: Vec::new(),
            node_map: IdMap::empty(MapKind::Node),
            elem_map: IdMap::empty(MapKind::Element),
            times: Vec::new(),
            node_vars: VarCatalog::new(VarScope::Nodal),
            elem_vars: VarCatalog::new(VarScope::Element),
            global_vars: VarCatalog::new(VarScope::Global),
            fields: FieldStore::new(FieldMode::Preloaded),
            elem_attr: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[inline]
    pub fn num_dim(&self) -> usize {
        self.num_dim
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.coordinates.num_nodes()
    }

    /// Total element count, the sum over all blocks.
    pub fn num_elements(&self) -> usize {
        self.blocks.iter().map(ElementBlock::num_elements).sum()
    }

    #[inline]
    pub fn blocks(&self) -> &[ElementBlock] {
        &self.blocks
    }

    #[inline]
    pub fn node_sets(&self) -> &[NodeSet] {
        &self.node_sets
    }

    #[inline]
    pub fn side_sets(&self) -> &[SideSet] {
        &self.side_sets
    }

    #[inline]
    pub fn coordinates(&self) -> &Coordinates {
        &self.coordinates
    }

    /// Moves the node at local `index` to `point` (geometric morphing).
    pub fn move_node(&mut self, index: usize, point: &[f64]) -> Result<(), MeshError> {
        self.coordinates.try_set_point(index, point)
    }

    /// Values of one coordinate axis for bulk morphing. The slice has one
    /// entry per node, so node count and dimension stay fixed.
    pub fn coordinate_axis_mut(&mut self, axis: usize) -> Option<&mut [f64]> {
        self.coordinates.axis_mut(axis)
    }

    #[inline]
    pub fn node_map(&self) -> &IdMap {
        &self.node_map
    }

    #[inline]
    pub fn element_map(&self) -> &IdMap {
        &self.elem_map
    }

    /// Time values in step order.
    #[inline]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    #[inline]
    pub fn node_variable_names(&self) -> &[String] {
        self.node_vars.names()
    }

    #[inline]
    pub fn element_variable_names(&self) -> &[String] {
        self.elem_vars.names()
    }

    #[inline]
    pub fn global_variable_names(&self) -> &[String] {
        self.global_vars.names()
    }

    #[inline]
    pub fn field_mode(&self) -> FieldMode {
        self.fields.mode()
    }

    /// Attribute array of the block at `block_index`; empty if none stored.
    pub fn element_attributes(&self, block_index: usize) -> Result<&[f64], MeshError> {
        self.elem_attr
            .get(block_index)
            .map(Vec::as_slice)
            .ok_or(MeshError::BlockIndexOutOfRange {
                index: block_index,
                len: self.blocks.len(),
            })
    }

    /// Block carrying block id `id`.
    pub fn block_by_id(&self, id: i64) -> Result<&ElementBlock, MeshError> {
        self.blocks
            .iter()
            .find(|b| b.id() == id)
            .ok_or(MeshError::UnknownBlockId(id))
    }

    /// Whether the nodal array of `(step, name)` is cached.
    pub fn is_node_data_cached(&self, step: usize, name: &str) -> bool {
        self.node_vars
            .index_of(name)
            .is_ok_and(|var| self.fields.is_nodal_cached(step, var))
    }

    /// Whether the global values of `step` are cached.
    pub fn is_global_data_cached(&self, step: usize) -> bool {
        self.fields.is_global_cached(step)
    }

    /// Whether the element arrays of `(step, name)` are cached.
    pub fn is_element_data_cached(&self, step: usize, name: &str) -> bool {
        self.elem_vars
            .index_of(name)
            .is_ok_and(|var| self.fields.is_element_cached(step, var))
    }

    // ------------------------------------------------------------------
    // Programmatic construction
    // ------------------------------------------------------------------

    /// Replaces the nodal coordinates.
    ///
    /// A new node count empties the nodal field cache and, when its length
    /// no longer matches, the node id map.
    ///
    /// # Errors
    /// `InvalidDimension` when the axis count differs from the database
    /// dimension; `NodeReferenceOutOfRange` when existing blocks or node
    /// sets reference nodes beyond the new node count.
    pub fn set_coordinates(&mut self, coordinates: Coordinates) -> Result<(), MeshError> {
        if coordinates.dimension() != self.num_dim {
            return Err(MeshError::InvalidDimension(coordinates.dimension()));
        }
        let num_nodes = coordinates.num_nodes();
        for block in &self.blocks {
            check_node_refs(
                block.connectivity_array(),
                num_nodes,
                || format!("block {}", block.id()),
            )?;
        }
        for set in &self.node_sets {
            check_node_refs(set.nodes(), num_nodes, || format!("node set {}", set.id()))?;
        }
        if !self.node_map.is_empty() && self.node_map.len() != num_nodes {
            log::warn!(
                "node count changed from {} to {num_nodes}; node id map cleared",
                self.node_map.len()
            );
            self.node_map = IdMap::empty(MapKind::Node);
        }
        if num_nodes != self.num_nodes() {
            let dropped = self.fields.clear_nodal();
            if dropped > 0 {
                log::warn!(
                    "node count changed to {num_nodes}; dropped {dropped} cached nodal arrays"
                );
            }
        }
        self.coordinates = coordinates;
        self.debug_assert_invariants();
        Ok(())
    }

    /// Appends an element block and returns its block index.
    ///
    /// Cached element arrays no longer cover every block, so the element
    /// field cache is emptied, as is an installed element id map.
    pub fn add_block(&mut self, block: ElementBlock) -> Result<usize, MeshError> {
        if block.num_dim() != self.num_dim {
            return Err(MeshError::InvalidDimension(block.num_dim()));
        }
        if self.blocks.iter().any(|b| b.id() == block.id()) {
            return Err(MeshError::DuplicateId {
                what: "element block",
                id: block.id(),
            });
        }
        check_node_refs(block.connectivity_array(), self.num_nodes(), || {
            format!("block {}", block.id())
        })?;
        let id = block.id();
        self.blocks.push(block);
        self.elem_attr.push(Vec::new());
        if !self.elem_map.is_empty() {
            log::warn!("element block {id} added after the element id map; map cleared");
            self.elem_map = IdMap::empty(MapKind::Element);
        }
        let dropped = self.fields.clear_element();
        if dropped > 0 {
            log::warn!("element block {id} added; dropped {dropped} cached element arrays");
        }
        self.debug_assert_invariants();
        Ok(self.blocks.len() - 1)
    }

    pub fn add_node_set(&mut self, set: NodeSet) -> Result<(), MeshError> {
        if self.node_sets.iter().any(|s| s.id() == set.id()) {
            return Err(MeshError::DuplicateId {
                what: "node set",
                id: set.id(),
            });
        }
        check_node_refs(set.nodes(), self.num_nodes(), || {
            format!("node set {}", set.id())
        })?;
        self.node_sets.push(set);
        Ok(())
    }

    pub fn add_side_set(&mut self, set: SideSet) -> Result<(), MeshError> {
        if self.side_sets.iter().any(|s| s.id() == set.id()) {
            return Err(MeshError::DuplicateId {
                what: "side set",
                id: set.id(),
            });
        }
        self.side_sets.push(set);
        Ok(())
    }

    /// Installs the node id map (local index → 0-based external id).
    pub fn set_node_map(&mut self, external: Vec<usize>) -> Result<(), MeshError> {
        if external.len() != self.num_nodes() {
            return Err(MeshError::count_mismatch(
                "node id map",
                self.num_nodes(),
                external.len(),
            ));
        }
        self.node_map = IdMap::try_from_external(MapKind::Node, external)?;
        Ok(())
    }

    /// Installs the element id map (global element index → 0-based external id).
    pub fn set_element_map(&mut self, external: Vec<usize>) -> Result<(), MeshError> {
        if external.len() != self.num_elements() {
            return Err(MeshError::count_mismatch(
                "element id map",
                self.num_elements(),
                external.len(),
            ));
        }
        self.elem_map = IdMap::try_from_external(MapKind::Element, external)?;
        Ok(())
    }

    /// Appends a time step and returns its 0-based step index.
    ///
    /// # Errors
    /// `NonMonotonicTime` unless `value` exceeds the last time value.
    pub fn add_time_step(&mut self, value: f64) -> Result<usize, MeshError> {
        if let Some(&previous) = self.times.last() {
            if value.partial_cmp(&previous) != Some(std::cmp::Ordering::Greater) {
                return Err(MeshError::NonMonotonicTime {
                    step: self.times.len(),
                    previous,
                    value,
                });
            }
        }
        self.times.push(value);
        self.reserve_fields();
        Ok(self.times.len() - 1)
    }

    pub fn add_node_variable(&mut self, name: impl Into<String>) -> Result<usize, MeshError> {
        let index = self.node_vars.try_push(name)?;
        self.reserve_fields();
        Ok(index)
    }

    pub fn add_element_variable(&mut self, name: impl Into<String>) -> Result<usize, MeshError> {
        let index = self.elem_vars.try_push(name)?;
        self.reserve_fields();
        Ok(index)
    }

    pub fn add_global_variable(&mut self, name: impl Into<String>) -> Result<usize, MeshError> {
        self.global_vars.try_push(name)
    }

    /// Stores the nodal array of variable `name` at `step`, replacing any
    /// cached values.
    pub fn set_node_values(
        &mut self,
        step: usize,
        name: &str,
        values: Vec<f64>,
    ) -> Result<(), MeshError> {
        let var = self.node_vars.index_of(name)?;
        self.check_step(step)?;
        if values.len() != self.num_nodes() {
            return Err(MeshError::count_mismatch(
                format!("nodal variable `{name}`"),
                self.num_nodes(),
                values.len(),
            ));
        }
        self.fields.set_nodal(step, var, values);
        Ok(())
    }

    /// Stores the per-block element arrays of variable `name` at `step`.
    ///
    /// `per_block[b]` must hold one value per element of block `b`.
    pub fn set_element_values(
        &mut self,
        step: usize,
        name: &str,
        per_block: Vec<Vec<f64>>,
    ) -> Result<(), MeshError> {
        let var = self.elem_vars.index_of(name)?;
        self.check_step(step)?;
        if per_block.len() != self.blocks.len() {
            return Err(MeshError::count_mismatch(
                format!("blocks of element variable `{name}`"),
                self.blocks.len(),
                per_block.len(),
            ));
        }
        for (block, values) in self.blocks.iter().zip(&per_block) {
            if values.len() != block.num_elements() {
                return Err(MeshError::count_mismatch(
                    format!("element variable `{name}` in block {}", block.id()),
                    block.num_elements(),
                    values.len(),
                ));
            }
        }
        self.fields.set_element(step, var, per_block);
        Ok(())
    }

    /// Stores the values of all global variables at `step`.
    pub fn set_global_values(&mut self, step: usize, values: Vec<f64>) -> Result<(), MeshError> {
        self.check_step(step)?;
        if values.len() != self.global_vars.len() {
            return Err(MeshError::count_mismatch(
                "global variables",
                self.global_vars.len(),
                values.len(),
            ));
        }
        self.fields.set_global(step, values);
        Ok(())
    }

    /// Stores the attribute array of the block at `block_index`, laid out as
    /// `num_attributes * num_elements` values.
    pub fn set_element_attributes(
        &mut self,
        block_index: usize,
        values: Vec<f64>,
    ) -> Result<(), MeshError> {
        let block = self
            .blocks
            .get(block_index)
            .ok_or(MeshError::BlockIndexOutOfRange {
                index: block_index,
                len: self.blocks.len(),
            })?;
        let expected = block.num_attributes() * block.num_elements();
        if values.len() != expected {
            return Err(MeshError::count_mismatch(
                format!("attributes of block {}", block.id()),
                expected,
                values.len(),
            ));
        }
        self.elem_attr[block_index] = values;
        Ok(())
    }

    fn reserve_fields(&mut self) {
        self.fields
            .reserve(self.times.len(), self.node_vars.len(), self.elem_vars.len());
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn check_step(&self, step: usize) -> Result<(), MeshError> {
        if step >= self.times.len() {
            return Err(MeshError::TimeStepOutOfRange {
                step,
                len: self.times.len(),
            });
        }
        Ok(())
    }

    fn block_layout(&self) -> Vec<(i64, usize)> {
        self.blocks
            .iter()
            .map(|b| (b.id(), b.num_elements()))
            .collect()
    }

    /// Coordinates of one node, with 2 or 3 components.
    pub fn coord_data(&self, node: usize, lookup: CoordLookup) -> Result<Vec<f64>, MeshError> {
        let index = match lookup {
            CoordLookup::ExternalId => self.node_map.resolve(node)?,
            CoordLookup::LocalIndex => node,
        };
        self.coordinates.try_point(index)
    }

    /// Splits a global element index into `(block_index, local_index)`.
    ///
    /// Walks the blocks in order, subtracting each block's element count;
    /// the owning block is the first one that drives the remainder negative.
    pub fn locate_index(&self, index: usize) -> Result<(usize, usize), MeshError> {
        let mut remainder = index;
        for (block_index, block) in self.blocks.iter().enumerate() {
            if remainder < block.num_elements() {
                return Ok((block_index, remainder));
            }
            remainder -= block.num_elements();
        }
        Err(MeshError::ElementNotInAnyBlock {
            index,
            total: self.num_elements(),
        })
    }

    /// Resolves an external element id to `(block_index, local_index)`.
    pub fn locate_element(&self, elem_id: usize) -> Result<(usize, usize), MeshError> {
        let index = self.elem_map.resolve(elem_id)?;
        self.locate_index(index)
    }

    /// Node indices of the element with external id `elem_id`.
    pub fn connectivity(&self, elem_id: usize) -> Result<&[usize], MeshError> {
        let (block_index, local) = self.locate_element(elem_id)?;
        self.blocks[block_index].connectivity(local)
    }

    /// Node positions of the element with external id `elem_id`.
    pub fn element_coordinates(&self, elem_id: usize) -> Result<Vec<Vec<f64>>, MeshError> {
        let (block_index, local) = self.locate_element(elem_id)?;
        self.blocks[block_index].get_element(local, &self.coordinates)
    }

    fn node_field(&self, step: usize, var: usize) -> Result<&[f64], MeshError> {
        self.fields.nodal(step, var, self.num_nodes(), || {
            MeshError::FieldNotLoaded {
                scope: VarScope::Nodal,
                name: self.node_vars.names()[var].clone(),
                step,
            }
        })
    }

    fn element_field(&self, step: usize, var: usize) -> Result<&[Vec<f64>], MeshError> {
        self.fields.element(step, var, &self.block_layout(), || {
            MeshError::FieldNotLoaded {
                scope: VarScope::Element,
                name: self.elem_vars.names()[var].clone(),
                step,
            }
        })
    }

    /// Nodal array of variable `name` at `step`, one value per node.
    ///
    /// The first call for a given `(step, name)` may read from the file;
    /// later calls are served from the cache.
    pub fn node_data(&self, step: usize, name: &str) -> Result<&[f64], MeshError> {
        let var = self.node_vars.index_of(name)?;
        self.check_step(step)?;
        self.node_field(step, var)
    }

    /// Value of nodal variable `name` at `step` for the node with external
    /// id `node_id`.
    pub fn node_value(&self, step: usize, name: &str, node_id: usize) -> Result<f64, MeshError> {
        let var = self.node_vars.index_of(name)?;
        self.check_step(step)?;
        let index = self.node_map.resolve(node_id)?;
        Ok(self.node_field(step, var)?[index])
    }

    /// Per-block element arrays of variable `name` at `step`, in block order.
    ///
    /// Caching follows [`Self::node_data`]; all blocks are fetched together.
    pub fn element_data(&self, step: usize, name: &str) -> Result<&[Vec<f64>], MeshError> {
        let var = self.elem_vars.index_of(name)?;
        self.check_step(step)?;
        self.element_field(step, var)
    }

    /// Value of element variable `name` at `step` for the element with
    /// external id `elem_id`.
    pub fn element_value(&self, step: usize, name: &str, elem_id: usize) -> Result<f64, MeshError> {
        let var = self.elem_vars.index_of(name)?;
        self.check_step(step)?;
        let (block_index, local) = self.locate_element(elem_id)?;
        Ok(self.element_field(step, var)?[block_index][local])
    }

    /// Value of element variable `name` at `step` addressed by block index
    /// and block-local element index.
    pub fn element_value_in_block(
        &self,
        step: usize,
        name: &str,
        block_index: usize,
        local: usize,
    ) -> Result<f64, MeshError> {
        let var = self.elem_vars.index_of(name)?;
        self.check_step(step)?;
        let block = self
            .blocks
            .get(block_index)
            .ok_or(MeshError::BlockIndexOutOfRange {
                index: block_index,
                len: self.blocks.len(),
            })?;
        if local >= block.num_elements() {
            return Err(MeshError::ElementIndexOutOfRange {
                block_id: block.id(),
                index: local,
                len: block.num_elements(),
            });
        }
        Ok(self.element_field(step, var)?[block_index][local])
    }

    /// Values of all global variables at `step`.
    pub fn global_data(&self, step: usize) -> Result<&[f64], MeshError> {
        self.check_step(step)?;
        if self.global_vars.is_empty() {
            return Ok(&[]);
        }
        self.fields.global(step, self.global_vars.len(), || {
            MeshError::FieldNotLoaded {
                scope: VarScope::Global,
                name: self.global_vars.names().join(","),
                step,
            }
        })
    }

    /// Value of global variable `name` at `step`.
    pub fn global_value(&self, step: usize, name: &str) -> Result<f64, MeshError> {
        let var = self.global_vars.index_of(name)?;
        Ok(self.global_data(step)?[var])
    }

    // ------------------------------------------------------------------
    // File round trip
    // ------------------------------------------------------------------

    /// Reads the file at `path`, materializing every field array.
    pub fn read<C>(codec: &C, path: impl AsRef<Path>) -> Result<Self, MeshError>
    where
        C: ExodusCodec + Clone + fmt::Debug + Send + Sync + 'static,
    {
        Self::read_with_options(codec, path, ReadOptions::default())
    }

    /// Reads the metadata of the file at `path`; field arrays are fetched
    /// from the file when first queried.
    pub fn open<C>(codec: &C, path: impl AsRef<Path>) -> Result<Self, MeshError>
    where
        C: ExodusCodec + Clone + fmt::Debug + Send + Sync + 'static,
    {
        Self::read_with_options(
            codec,
            path,
            ReadOptions {
                field_mode: FieldMode::OnDemand,
                ..ReadOptions::default()
            },
        )
    }

    /// Reads the file at `path` with explicit options.
    ///
    /// The file handle is released before this returns, on success and on
    /// every failure path. Any failure aborts the whole read.
    pub fn read_with_options<C>(
        codec: &C,
        path: impl AsRef<Path>,
        options: ReadOptions,
    ) -> Result<Self, MeshError>
    where
        C: ExodusCodec + Clone + fmt::Debug + Send + Sync + 'static,
    {
        let path = path.as_ref();
        log::info!(
            "reading mesh database from {} ({:?})",
            path.display(),
            options.field_mode
        );
        let fields = match options.field_mode {
            FieldMode::Preloaded => FieldStore::new(FieldMode::Preloaded),
            FieldMode::OnDemand => FieldStore::with_source(
                FieldMode::OnDemand,
                Arc::new(CodecSource::new(codec.clone(), path)),
            ),
        };
        let file = codec.open(path)?;
        let db = with_file(file, |f| Self::hydrate(f, fields))?;
        if options.validate {
            db.validate_invariants()?;
        }
        log::info!(
            "read {}: {} nodes, {} elements in {} blocks, {} time steps",
            path.display(),
            db.num_nodes(),
            db.num_elements(),
            db.blocks.len(),
            db.times.len()
        );
        Ok(db)
    }

    fn hydrate<F: ExodusFile>(file: &mut F, fields: FieldStore) -> Result<Self, MeshError> {
        let init = file.get_init()?;
        log::debug!(
            "header: dim {}, {} nodes, {} elements, {} blocks, {} node sets, {} side sets",
            init.num_dim,
            init.num_nodes,
            init.num_elements,
            init.num_blocks,
            init.num_node_sets,
            init.num_side_sets
        );
        if !(2..=3).contains(&init.num_dim) {
            return Err(MeshError::InvalidDimension(init.num_dim));
        }

        let axes = file.get_coord(init.num_dim, init.num_nodes)?;
        let names = file.get_coord_names(init.num_dim)?;
        let names = if names.iter().all(String::is_empty) {
            Vec::new()
        } else {
            names
        };
        let coordinates = Coordinates::try_new(axes, names)?;

        let mut db = Self::try_new(init.title.clone(), init.num_dim)?;
        db.coordinates = coordinates;
        db.fields = fields;

        let block_ids = file.get_elem_blk_ids(init.num_blocks)?;
        let block_names = file.get_names(EntityKind::Block, init.num_blocks)?;
        for (&block_id, name) in block_ids.iter().zip(block_names) {
            let params = file.get_elem_block(block_id)?;
            let conn = file.get_elem_conn(block_id)?;
            let conn = to_zero_based(&conn, "node")?;
            let block = ElementBlock::try_new(
                block_id,
                ElementTopology::from_token(&params.topology),
                init.num_dim,
                params.num_elements,
                params.nodes_per_element,
                params.num_attributes,
                conn,
            )?
            .with_name(name);
            let block_index = db.add_block(block)?;
            if params.num_attributes > 0 {
                db.elem_attr[block_index] = file.get_elem_attr(block_id)?;
            }
        }
        if db.num_elements() != init.num_elements {
            return Err(MeshError::count_mismatch(
                "elements across blocks",
                init.num_elements,
                db.num_elements(),
            ));
        }
        log::debug!("read {} element blocks", db.blocks.len());

        if init.num_node_sets > 0 {
            let ids = file.get_node_set_ids(init.num_node_sets)?;
            let names = file.get_names(EntityKind::NodeSet, init.num_node_sets)?;
            for (&set_id, name) in ids.iter().zip(names) {
                let params = file.get_node_set_param(set_id)?;
                let nodes = to_zero_based(&file.get_node_set(set_id)?, "node")?;
                db.add_node_set(NodeSet::try_new(
                    set_id,
                    params.num_entries,
                    params.num_dist_factors,
                    nodes,
                    name,
                )?)?;
            }
            log::debug!("read {} node sets", db.node_sets.len());
        }

        if init.num_side_sets > 0 {
            let ids = file.get_side_set_ids(init.num_side_sets)?;
            let names = file.get_names(EntityKind::SideSet, init.num_side_sets)?;
            for (&set_id, name) in ids.iter().zip(names) {
                let params = file.get_side_set_param(set_id)?;
                let (elems, sides) = file.get_side_set(set_id)?;
                db.add_side_set(SideSet::try_new(
                    set_id,
                    params.num_entries,
                    params.num_dist_factors,
                    elems,
                    sides,
                    name,
                )?)?;
            }
            log::debug!("read {} side sets", db.side_sets.len());
        }

        for scope in [VarScope::Nodal, VarScope::Element, VarScope::Global] {
            let count = file.get_var_param(scope)?;
            let names = file.get_var_names(scope, count)?;
            let catalog = VarCatalog::try_from_names(scope, names)?;
            match scope {
                VarScope::Nodal => db.node_vars = catalog,
                VarScope::Element => db.elem_vars = catalog,
                VarScope::Global => db.global_vars = catalog,
            }
        }
        db.times = file.get_all_times()?;
        db.reserve_fields();
        log::debug!(
            "{} time steps; {} nodal, {} element, {} global variables",
            db.times.len(),
            db.node_vars.len(),
            db.elem_vars.len(),
            db.global_vars.len()
        );

        let node_map = to_zero_based(&file.get_node_num_map(init.num_nodes)?, "node")?;
        db.set_node_map(node_map)?;
        let elem_map = to_zero_based(&file.get_elem_num_map(init.num_elements)?, "element")?;
        db.set_element_map(elem_map)?;

        if db.fields.mode() == FieldMode::Preloaded {
            db.preload(file)?;
        }
        Ok(db)
    }

    fn preload<F: ExodusFile>(&mut self, file: &mut F) -> Result<(), MeshError> {
        let num_nodes = self.num_nodes();
        for step in 0..self.times.len() {
            for var in 0..self.node_vars.len() {
                let values = file.get_nodal_var(step + 1, var + 1, num_nodes)?;
                self.fields.set_nodal(step, var, values);
            }
            for var in 0..self.elem_vars.len() {
                let per_block = self
                    .blocks
                    .iter()
                    .map(|b| file.get_elem_var(step + 1, var + 1, b.id(), b.num_elements()))
                    .collect::<Result<Vec<_>, _>>()?;
                self.fields.set_element(step, var, per_block);
            }
            if !self.global_vars.is_empty() {
                let values = file.get_glob_vars(step + 1, self.global_vars.len())?;
                self.fields.set_global(step, values);
            }
        }
        log::debug!("preloaded fields for {} time steps", self.times.len());
        Ok(())
    }

    /// Writes the database to a new file at `path`.
    pub fn write<C: ExodusCodec>(&self, codec: &C, path: impl AsRef<Path>) -> Result<(), MeshError> {
        self.write_with_options(codec, path, &WriteOptions::default())
    }

    /// Writes the database with explicit options.
    ///
    /// The database is not modified: field arrays that are not cached are
    /// read through from the field source without being retained. The file
    /// is committed only when every primitive succeeds.
    pub fn write_with_options<C: ExodusCodec>(
        &self,
        codec: &C,
        path: impl AsRef<Path>,
        options: &WriteOptions,
    ) -> Result<(), MeshError> {
        let path = path.as_ref();
        log::info!("writing mesh database to {}", path.display());
        let file = codec.create(path, &options.create)?;
        with_file(file, |f| self.write_to(f))?;
        log::info!(
            "wrote {}: {} nodes, {} elements, {} time steps",
            path.display(),
            self.num_nodes(),
            self.num_elements(),
            self.times.len()
        );
        Ok(())
    }

    fn write_to<F: ExodusFile>(&self, file: &mut F) -> Result<(), MeshError> {
        file.put_init(&InitParams {
            title: self.title.clone(),
            num_dim: self.num_dim,
            num_nodes: self.num_nodes(),
            num_elements: self.num_elements(),
            num_blocks: self.blocks.len(),
            num_node_sets: self.node_sets.len(),
            num_side_sets: self.side_sets.len(),
        })?;

        file.put_coord(self.coordinates.axes())?;
        file.put_coord_names(self.coordinates.names())?;

        for block in &self.blocks {
            file.put_elem_block(
                block.id(),
                &BlockParams {
                    topology: block.topology().to_token().to_string(),
                    num_elements: block.num_elements(),
                    nodes_per_element: block.nodes_per_element(),
                    num_attributes: block.num_attributes(),
                },
            )?;
            file.put_elem_conn(block.id(), &to_one_based(block.connectivity_array()))?;
        }
        let block_names: Vec<String> = self.blocks.iter().map(ElementBlock::name_or_default).collect();
        file.put_names(EntityKind::Block, &block_names)?;

        for set in &self.side_sets {
            file.put_side_set_param(
                set.id(),
                &SetParams {
                    num_entries: set.num_sides(),
                    num_dist_factors: set.num_dist_factors(),
                },
            )?;
            file.put_side_set(set.id(), set.elems(), set.sides())?;
        }
        let names: Vec<String> = self.side_sets.iter().map(|s| s.name().to_string()).collect();
        file.put_names(EntityKind::SideSet, &names)?;

        for set in &self.node_sets {
            file.put_node_set_param(
                set.id(),
                &SetParams {
                    num_entries: set.num_nodes(),
                    num_dist_factors: set.num_dist_factors(),
                },
            )?;
            file.put_node_set(set.id(), &to_one_based(set.nodes()))?;
        }
        let names: Vec<String> = self.node_sets.iter().map(|s| s.name().to_string()).collect();
        file.put_names(EntityKind::NodeSet, &names)?;

        for (step, &time) in self.times.iter().enumerate() {
            file.put_time(step + 1, time)?;
        }

        if !self.elem_vars.is_empty() {
            file.put_var_param(VarScope::Element, self.elem_vars.len())?;
            file.put_var_names(VarScope::Element, self.elem_vars.names())?;
            let layout = self.block_layout();
            for step in 0..self.times.len() {
                for var in 0..self.elem_vars.len() {
                    let per_block = self.fields.element_uncached(step, var, &layout, || {
                        MeshError::FieldNotLoaded {
                            scope: VarScope::Element,
                            name: self.elem_vars.names()[var].clone(),
                            step,
                        }
                    })?;
                    for (block, values) in self.blocks.iter().zip(per_block.iter()) {
                        file.put_elem_var(step + 1, var + 1, block.id(), values)?;
                    }
                }
            }
        }

        if !self.node_vars.is_empty() {
            file.put_var_param(VarScope::Nodal, self.node_vars.len())?;
            file.put_var_names(VarScope::Nodal, self.node_vars.names())?;
            for step in 0..self.times.len() {
                for var in 0..self.node_vars.len() {
                    let values = self.fields.nodal_uncached(step, var, self.num_nodes(), || {
                        MeshError::FieldNotLoaded {
                            scope: VarScope::Nodal,
                            name: self.node_vars.names()[var].clone(),
                            step,
                        }
                    })?;
                    file.put_nodal_var(step + 1, var + 1, &values)?;
                }
            }
        }

        if !self.global_vars.is_empty() {
            file.put_var_param(VarScope::Global, self.global_vars.len())?;
            file.put_var_names(VarScope::Global, self.global_vars.names())?;
            for step in 0..self.times.len() {
                let values = self
                    .fields
                    .global_uncached(step, self.global_vars.len(), || {
                        MeshError::FieldNotLoaded {
                            scope: VarScope::Global,
                            name: self.global_vars.names().join(","),
                            step,
                        }
                    })?;
                file.put_glob_vars(step + 1, &values)?;
            }
        }

        if !self.node_map.is_empty() {
            file.put_node_num_map(&to_one_based(self.node_map.as_slice()))?;
        }
        if !self.elem_map.is_empty() {
            file.put_elem_num_map(&to_one_based(self.elem_map.as_slice()))?;
        }

        for (block, attrs) in self.blocks.iter().zip(&self.elem_attr) {
            if block.num_attributes() == 0 {
                continue;
            }
            if attrs.is_empty() {
                log::debug!("block {} declares attributes but holds none", block.id());
                continue;
            }
            file.put_elem_attr(block.id(), attrs)?;
        }
        Ok(())
    }
}

/// Converts 1-based codec ids to 0-based indices.
fn to_zero_based(ids: &[i64], what: &'static str) -> Result<Vec<usize>, MeshError> {
    ids.iter()
        .map(|&id| {
            if id < 1 {
                Err(MeshError::InvalidExternalId { what, id })
            } else {
                Ok((id - 1) as usize)
            }
        })
        .collect()
}

/// Converts 0-based indices to 1-based codec ids.
fn to_one_based(indices: &[usize]) -> Vec<i64> {
    indices.iter().map(|&i| i as i64 + 1).collect()
}

fn check_node_refs(
    nodes: &[usize],
    num_nodes: usize,
    what: impl FnOnce() -> String,
) -> Result<(), MeshError> {
    match nodes.iter().copied().find(|&n| n >= num_nodes) {
        Some(node) => Err(MeshError::NodeReferenceOutOfRange {
            what: what(),
            node,
            num_nodes,
        }),
        None => Ok(()),
    }
}

impl DebugInvariants for MeshDatabase {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "MeshDatabase");
    }

    fn validate_invariants(&self) -> Result<(), MeshError> {
        if self.coordinates.dimension() != self.num_dim {
            return Err(MeshError::InvalidDimension(self.coordinates.dimension()));
        }
        let num_nodes = self.num_nodes();
        if let Some(id) = self.blocks.iter().map(ElementBlock::id).duplicates().next() {
            return Err(MeshError::DuplicateId {
                what: "element block",
                id,
            });
        }
        for block in &self.blocks {
            block.validate_invariants()?;
            check_node_refs(block.connectivity_array(), num_nodes, || {
                format!("block {}", block.id())
            })?;
        }
        for set in &self.node_sets {
            check_node_refs(set.nodes(), num_nodes, || format!("node set {}", set.id()))?;
        }
        if !self.node_map.is_empty() && self.node_map.len() != num_nodes {
            return Err(MeshError::count_mismatch(
                "node id map",
                num_nodes,
                self.node_map.len(),
            ));
        }
        if !self.elem_map.is_empty() && self.elem_map.len() != self.num_elements() {
            return Err(MeshError::count_mismatch(
                "element id map",
                self.num_elements(),
                self.elem_map.len(),
            ));
        }
        self.node_map.validate_invariants()?;
        self.elem_map.validate_invariants()?;
        for (step, (&previous, &value)) in self.times.iter().tuple_windows().enumerate() {
            if value.partial_cmp(&previous) != Some(std::cmp::Ordering::Greater) {
                return Err(MeshError::NonMonotonicTime {
                    step: step + 1,
                    previous,
                    value,
                });
            }
        }
        if self.elem_attr.len() != self.blocks.len() {
            return Err(MeshError::count_mismatch(
                "attribute arrays",
                self.blocks.len(),
                self.elem_attr.len(),
            ));
        }
        for (block, attrs) in self.blocks.iter().zip(&self.elem_attr) {
            let expected = block.num_attributes() * block.num_elements();
            if !attrs.is_empty() && attrs.len() != expected {
                return Err(MeshError::count_mismatch(
                    format!("attributes of block {}", block.id()),
                    expected,
                    attrs.len(),
                ));
            }
        }
        self.fields
            .check_shapes(num_nodes, &self.block_layout(), self.global_vars.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_block_mesh() -> MeshDatabase {
        let mut db = MeshDatabase::try_new("strip", 2).unwrap();
        let xs: Vec<f64> = (0..12).map(|i| (i / 2) as f64).collect();
        let ys: Vec<f64> = (0..12).map(|i| (i % 2) as f64).collect();
        db.set_coordinates(Coordinates::try_new(vec![xs, ys], vec![]).unwrap())
            .unwrap();
        for (id, first) in [(10, 0usize), (20, 5)] {
            let conn: Vec<usize> = (first..first + 5).flat_map(|e| [e, e + 1]).collect();
            let block =
                ElementBlock::try_new(id, ElementTopology::Bar2, 2, 5, 2, 0, conn).unwrap();
            db.add_block(block).unwrap();
        }
        db.set_node_map((0..12).collect()).unwrap();
        db.set_element_map((0..10).collect()).unwrap();
        db
    }

    #[test]
    fn locate_walks_blocks_in_order() {
        let db = two_block_mesh();
        assert_eq!(db.locate_element(0).unwrap(), (0, 0));
        assert_eq!(db.locate_element(4).unwrap(), (0, 4));
        assert_eq!(db.locate_element(7).unwrap(), (1, 2));
        assert_eq!(db.locate_element(10).unwrap_err(), MeshError::UnknownElementId(10));
        assert_eq!(
            db.locate_index(10).unwrap_err(),
            MeshError::ElementNotInAnyBlock { index: 10, total: 10 }
        );
    }

    #[test]
    fn coord_lookup_modes() {
        let mut db = two_block_mesh();
        db.set_node_map((0..12).rev().collect()).unwrap();
        assert_eq!(db.coord_data(11, CoordLookup::ExternalId).unwrap(), vec![0.0, 0.0]);
        assert_eq!(db.coord_data(11, CoordLookup::LocalIndex).unwrap(), vec![5.0, 1.0]);
        assert_eq!(
            db.coord_data(12, CoordLookup::LocalIndex).unwrap_err(),
            MeshError::NodeIndexOutOfRange { index: 12, len: 12 }
        );
    }

    #[test]
    fn time_steps_must_increase() {
        let mut db = two_block_mesh();
        db.add_time_step(0.0).unwrap();
        db.add_time_step(0.5).unwrap();
        let err = db.add_time_step(0.5).unwrap_err();
        assert!(matches!(err, MeshError::NonMonotonicTime { step: 2, .. }));
    }

    #[test]
    fn queries_check_variable_before_step() {
        let mut db = two_block_mesh();
        db.add_element_variable("stress").unwrap();
        db.add_time_step(1.0).unwrap();
        assert!(matches!(
            db.element_data(5, "strain").unwrap_err(),
            MeshError::UnknownVariable { .. }
        ));
        assert_eq!(
            db.element_data(5, "stress").unwrap_err(),
            MeshError::TimeStepOutOfRange { step: 5, len: 1 }
        );
        assert!(matches!(
            db.element_data(0, "stress").unwrap_err(),
            MeshError::FieldNotLoaded { step: 0, .. }
        ));
    }

    #[test]
    fn element_values_resolve_through_the_walk() {
        let mut db = two_block_mesh();
        db.add_element_variable("stress").unwrap();
        db.add_time_step(1.0).unwrap();
        let per_block = vec![
            (0..5).map(f64::from).collect(),
            (5..10).map(f64::from).collect(),
        ];
        db.set_element_values(0, "stress", per_block).unwrap();
        assert_eq!(db.element_value(0, "stress", 7).unwrap(), 7.0);
        assert_eq!(db.element_value_in_block(0, "stress", 1, 4).unwrap(), 9.0);
        assert!(matches!(
            db.element_value_in_block(0, "stress", 1, 5).unwrap_err(),
            MeshError::ElementIndexOutOfRange { block_id: 20, .. }
        ));
    }

    #[test]
    fn blocks_must_reference_existing_nodes() {
        let mut db = two_block_mesh();
        let block =
            ElementBlock::try_new(30, ElementTopology::Bar2, 2, 1, 2, 0, vec![11, 12]).unwrap();
        assert!(matches!(
            db.add_block(block).unwrap_err(),
            MeshError::NodeReferenceOutOfRange { node: 12, .. }
        ));
    }

    #[test]
    fn validation_accepts_a_consistent_mesh() {
        let db = two_block_mesh();
        assert!(db.validate_invariants().is_ok());
        assert_eq!(db.num_elements(), 10);
    }
}
