//! Record-backed codec.
//!
//! An [`ExodusRecord`] is the complete contents of one file in the codec's
//! own conventions (1-based ids, values keyed by 1-based step and variable
//! numbers). [`RecordFile`] implements every [`ExodusFile`] primitive over
//! such a record, and a [`RecordStore`] decides where records live: in
//! process memory ([`crate::io::memory::MemoryStore`]) or on disk
//! ([`crate::io::json::JsonStore`]).
//!
//! A handle from `open` works on a private copy of the stored record. A
//! handle from `create` starts from an empty record which is handed to the
//! store only by `close`; abandoned or dropped write handles leave the store
//! untouched.

use crate::data::variables::VarScope;
use crate::io::codec::{
    BlockParams, CodecError, CodecOp, CreateOptions, EntityKind, ExodusCodec, ExodusFile,
    InitParams, SetParams,
};
use std::path::{Path, PathBuf};

/// One element block as stored in a file.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecordBlock {
    pub id: i64,
    pub params: BlockParams,
    pub name: String,
    pub connectivity: Vec<i64>,
    pub attributes: Vec<f64>,
    /// Element variable values, `[step - 1][var - 1]`; empty when absent.
    pub values: Vec<Vec<Vec<f64>>>,
}

/// One node or side set as stored in a file.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecordSet {
    pub id: i64,
    pub params: SetParams,
    pub name: String,
    /// Node ids for node sets, element ids for side sets.
    pub entries: Vec<i64>,
    /// Local side ids; empty for node sets.
    pub sides: Vec<i64>,
}

/// Variable catalog of one scope as stored in a file.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecordVars {
    pub count: usize,
    pub names: Vec<String>,
}

/// Full contents of one file.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExodusRecord {
    pub comp_word_size: usize,
    pub io_word_size: usize,
    pub init: Option<InitParams>,
    pub coords: Vec<Vec<f64>>,
    pub coord_names: Vec<String>,
    pub blocks: Vec<RecordBlock>,
    pub node_sets: Vec<RecordSet>,
    pub side_sets: Vec<RecordSet>,
    pub nodal_vars: RecordVars,
    pub element_vars: RecordVars,
    pub global_vars: RecordVars,
    pub times: Vec<f64>,
    pub node_num_map: Option<Vec<i64>>,
    pub elem_num_map: Option<Vec<i64>>,
    /// Nodal variable values, `[step - 1][var - 1]`; empty when absent.
    pub nodal_values: Vec<Vec<Vec<f64>>>,
    /// Global variable values, `[step - 1]`; empty when absent.
    pub global_values: Vec<Vec<f64>>,
}

impl ExodusRecord {
    fn vars(&self, scope: VarScope) -> &RecordVars {
        match scope {
            VarScope::Nodal => &self.nodal_vars,
            VarScope::Element => &self.element_vars,
            VarScope::Global => &self.global_vars,
        }
    }

    fn vars_mut(&mut self, scope: VarScope) -> &mut RecordVars {
        match scope {
            VarScope::Nodal => &mut self.nodal_vars,
            VarScope::Element => &mut self.element_vars,
            VarScope::Global => &mut self.global_vars,
        }
    }

    fn block(&self, id: i64) -> Result<&RecordBlock, CodecError> {
        self.blocks
            .iter()
            .find(|b| b.id == id)
            .ok_or(CodecError::MissingEntity {
                what: EntityKind::Block,
                id,
            })
    }

    fn block_mut(&mut self, id: i64) -> Result<&mut RecordBlock, CodecError> {
        self.blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(CodecError::MissingEntity {
                what: EntityKind::Block,
                id,
            })
    }

    fn sets(&self, kind: EntityKind) -> &[RecordSet] {
        match kind {
            EntityKind::SideSet => &self.side_sets,
            _ => &self.node_sets,
        }
    }

    fn sets_mut(&mut self, kind: EntityKind) -> &mut Vec<RecordSet> {
        match kind {
            EntityKind::SideSet => &mut self.side_sets,
            _ => &mut self.node_sets,
        }
    }

    fn set(&self, kind: EntityKind, id: i64) -> Result<&RecordSet, CodecError> {
        self.sets(kind)
            .iter()
            .find(|s| s.id == id)
            .ok_or(CodecError::MissingEntity { what: kind, id })
    }

    fn set_mut(&mut self, kind: EntityKind, id: i64) -> Result<&mut RecordSet, CodecError> {
        self.sets_mut(kind)
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(CodecError::MissingEntity { what: kind, id })
    }
}

/// Where records live between handles.
pub trait RecordStore: Clone {
    /// Returns a copy of the record stored at `path`.
    fn load(&self, path: &Path) -> Result<ExodusRecord, CodecError>;

    /// Whether a record is stored at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Stores `record` at `path`, replacing any previous record.
    fn commit(&self, path: &Path, record: ExodusRecord) -> Result<(), CodecError>;

    /// Called before every primitive; an error aborts the primitive.
    fn observe(&self, _op: CodecOp) -> Result<(), CodecError> {
        Ok(())
    }

    /// Called when a handle on `path` is acquired.
    fn acquired(&self, _path: &Path) {}

    /// Called exactly once when a handle on `path` is released.
    fn released(&self, _path: &Path) {}
}

/// Codec whose files are [`ExodusRecord`]s kept by a [`RecordStore`].
#[derive(Clone, Debug, Default)]
pub struct RecordCodec<S> {
    store: S,
}

impl<S: RecordStore> RecordCodec<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: RecordStore> ExodusCodec for RecordCodec<S> {
    type File = RecordFile<S>;

    fn open(&self, path: &Path) -> Result<Self::File, CodecError> {
        self.store.observe(CodecOp::Open)?;
        if !self.store.exists(path) {
            return Err(CodecError::FileNotFound(path.to_path_buf()));
        }
        let record = self.store.load(path)?;
        log::debug!("opened {} for reading", path.display());
        Ok(RecordFile::new(self.store.clone(), path, record, Mode::Read))
    }

    fn create(&self, path: &Path, options: &CreateOptions) -> Result<Self::File, CodecError> {
        self.store.observe(CodecOp::Create)?;
        if !options.overwrite && self.store.exists(path) {
            return Err(CodecError::FileExists(path.to_path_buf()));
        }
        let record = ExodusRecord {
            comp_word_size: options.comp_word_size,
            io_word_size: options.io_word_size,
            ..ExodusRecord::default()
        };
        log::debug!(
            "created {} (word sizes {}/{})",
            path.display(),
            options.comp_word_size,
            options.io_word_size
        );
        Ok(RecordFile::new(self.store.clone(), path, record, Mode::Write))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mode {
    Read,
    Write,
}

/// Open handle on one record.
#[derive(Debug)]
pub struct RecordFile<S: RecordStore> {
    store: S,
    path: PathBuf,
    record: ExodusRecord,
    mode: Mode,
    open: bool,
}

impl<S: RecordStore> RecordFile<S> {
    fn new(store: S, path: &Path, record: ExodusRecord, mode: Mode) -> Self {
        store.acquired(path);
        Self {
            store,
            path: path.to_path_buf(),
            record,
            mode,
            open: true,
        }
    }

    /// Path this handle was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn enter(&self, op: CodecOp) -> Result<(), CodecError> {
        if !self.open {
            return Err(CodecError::Closed);
        }
        self.store.observe(op)
    }

    fn enter_put(&self, op: CodecOp) -> Result<(), CodecError> {
        self.enter(op)?;
        if self.mode != Mode::Write {
            return Err(CodecError::ReadOnly);
        }
        Ok(())
    }

    fn init(&self, op: CodecOp) -> Result<&InitParams, CodecError> {
        self.record.init.as_ref().ok_or(CodecError::OutOfOrder {
            op,
            requires: CodecOp::PutInit,
        })
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.store.released(&self.path);
        }
    }

    fn stored_real(&self, value: f64) -> f64 {
        if self.record.io_word_size == 4 {
            value as f32 as f64
        } else {
            value
        }
    }

    fn stored_reals(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.stored_real(v)).collect()
    }

    fn check_var(&self, scope: VarScope, var: usize) -> Result<(), CodecError> {
        let count = self.record.vars(scope).count;
        if var == 0 || var > count {
            return Err(CodecError::UndeclaredVariable { scope, var, count });
        }
        Ok(())
    }

    fn check_step(&self, op: CodecOp, step: usize) -> Result<(), CodecError> {
        if step == 0 || step > self.record.times.len() {
            return Err(CodecError::OutOfOrder {
                op,
                requires: CodecOp::PutTime,
            });
        }
        Ok(())
    }

    fn set_ids(&self, op: CodecOp, kind: EntityKind, count: usize) -> Result<Vec<i64>, CodecError> {
        self.enter(op)?;
        let ids: Vec<i64> = self.record.sets(kind).iter().map(|s| s.id).collect();
        expect_len(op, count, ids.len())?;
        Ok(ids)
    }

    fn put_set_param(
        &mut self,
        op: CodecOp,
        kind: EntityKind,
        set_id: i64,
        params: &SetParams,
    ) -> Result<(), CodecError> {
        self.enter_put(op)?;
        let declared = match kind {
            EntityKind::SideSet => self.init(op)?.num_side_sets,
            _ => self.init(op)?.num_node_sets,
        };
        let sets = self.record.sets_mut(kind);
        if let Some(existing) = sets.iter_mut().find(|s| s.id == set_id) {
            existing.params = *params;
            return Ok(());
        }
        expect_room(op, declared, sets.len())?;
        sets.push(RecordSet {
            id: set_id,
            params: *params,
            ..RecordSet::default()
        });
        Ok(())
    }
}

fn expect_len(op: CodecOp, expected: usize, found: usize) -> Result<(), CodecError> {
    if expected != found {
        return Err(CodecError::LengthMismatch {
            op,
            expected,
            found,
        });
    }
    Ok(())
}

fn expect_room(op: CodecOp, declared: usize, used: usize) -> Result<(), CodecError> {
    if used >= declared {
        return Err(CodecError::LengthMismatch {
            op,
            expected: declared,
            found: used + 1,
        });
    }
    Ok(())
}

/// Returns the slot at `[step - 1][var - 1]`, growing the table as needed.
fn value_slot(table: &mut Vec<Vec<Vec<f64>>>, step: usize, var: usize) -> &mut Vec<f64> {
    if table.len() < step {
        table.resize_with(step, Vec::new);
    }
    let row = &mut table[step - 1];
    if row.len() < var {
        row.resize_with(var, Vec::new);
    }
    &mut row[var - 1]
}

fn stored_values<'a>(
    table: &'a [Vec<Vec<f64>>],
    scope: VarScope,
    step: usize,
    var: usize,
) -> Result<&'a [f64], CodecError> {
    table
        .get(step - 1)
        .and_then(|row| row.get(var - 1))
        .filter(|values| !values.is_empty())
        .map(Vec::as_slice)
        .ok_or(CodecError::MissingValues { scope, step, var })
}

fn identity_map(len: usize) -> Vec<i64> {
    (1..=len as i64).collect()
}

impl<S: RecordStore> ExodusFile for RecordFile<S> {
    fn get_init(&mut self) -> Result<InitParams, CodecError> {
        self.enter(CodecOp::GetInit)?;
        self.init(CodecOp::GetInit).cloned()
    }

    fn put_init(&mut self, params: &InitParams) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutInit)?;
        self.record.init = Some(params.clone());
        Ok(())
    }

    fn get_coord(&mut self, num_dim: usize, num_nodes: usize) -> Result<Vec<Vec<f64>>, CodecError> {
        self.enter(CodecOp::GetCoord)?;
        expect_len(CodecOp::GetCoord, num_dim, self.record.coords.len())?;
        for axis in &self.record.coords {
            expect_len(CodecOp::GetCoord, num_nodes, axis.len())?;
        }
        Ok(self.record.coords.clone())
    }

    fn put_coord(&mut self, axes: &[Vec<f64>]) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutCoord)?;
        let init = self.init(CodecOp::PutCoord)?;
        let (num_dim, num_nodes) = (init.num_dim, init.num_nodes);
        expect_len(CodecOp::PutCoord, num_dim, axes.len())?;
        for axis in axes {
            expect_len(CodecOp::PutCoord, num_nodes, axis.len())?;
        }
        self.record.coords = axes.iter().map(|axis| self.stored_reals(axis)).collect();
        Ok(())
    }

    fn get_coord_names(&mut self, num_dim: usize) -> Result<Vec<String>, CodecError> {
        self.enter(CodecOp::GetCoordNames)?;
        if self.record.coord_names.is_empty() {
            return Ok(vec![String::new(); num_dim]);
        }
        expect_len(CodecOp::GetCoordNames, num_dim, self.record.coord_names.len())?;
        Ok(self.record.coord_names.clone())
    }

    fn put_coord_names(&mut self, names: &[String]) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutCoordNames)?;
        let num_dim = self.init(CodecOp::PutCoordNames)?.num_dim;
        expect_len(CodecOp::PutCoordNames, num_dim, names.len())?;
        self.record.coord_names = names.to_vec();
        Ok(())
    }

    fn get_elem_blk_ids(&mut self, num_blocks: usize) -> Result<Vec<i64>, CodecError> {
        self.enter(CodecOp::GetElemBlkIds)?;
        let ids: Vec<i64> = self.record.blocks.iter().map(|b| b.id).collect();
        expect_len(CodecOp::GetElemBlkIds, num_blocks, ids.len())?;
        Ok(ids)
    }

    fn get_elem_block(&mut self, block_id: i64) -> Result<BlockParams, CodecError> {
        self.enter(CodecOp::GetElemBlock)?;
        Ok(self.record.block(block_id)?.params.clone())
    }

    fn put_elem_block(&mut self, block_id: i64, params: &BlockParams) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutElemBlock)?;
        let declared = self.init(CodecOp::PutElemBlock)?.num_blocks;
        if let Ok(block) = self.record.block_mut(block_id) {
            block.params = params.clone();
            return Ok(());
        }
        expect_room(CodecOp::PutElemBlock, declared, self.record.blocks.len())?;
        self.record.blocks.push(RecordBlock {
            id: block_id,
            params: params.clone(),
            ..RecordBlock::default()
        });
        Ok(())
    }

    fn get_elem_conn(&mut self, block_id: i64) -> Result<Vec<i64>, CodecError> {
        self.enter(CodecOp::GetElemConn)?;
        let block = self.record.block(block_id)?;
        let expected = block.params.num_elements * block.params.nodes_per_element;
        expect_len(CodecOp::GetElemConn, expected, block.connectivity.len())?;
        Ok(block.connectivity.clone())
    }

    fn put_elem_conn(&mut self, block_id: i64, conn: &[i64]) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutElemConn)?;
        let block = self.record.block_mut(block_id)?;
        let expected = block.params.num_elements * block.params.nodes_per_element;
        expect_len(CodecOp::PutElemConn, expected, conn.len())?;
        block.connectivity = conn.to_vec();
        Ok(())
    }

    fn get_elem_attr(&mut self, block_id: i64) -> Result<Vec<f64>, CodecError> {
        self.enter(CodecOp::GetElemAttr)?;
        let block = self.record.block(block_id)?;
        let expected = block.params.num_elements * block.params.num_attributes;
        if block.attributes.is_empty() {
            return Ok(vec![0.0; expected]);
        }
        expect_len(CodecOp::GetElemAttr, expected, block.attributes.len())?;
        Ok(block.attributes.clone())
    }

    fn put_elem_attr(&mut self, block_id: i64, attrs: &[f64]) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutElemAttr)?;
        let stored = self.stored_reals(attrs);
        let block = self.record.block_mut(block_id)?;
        let expected = block.params.num_elements * block.params.num_attributes;
        expect_len(CodecOp::PutElemAttr, expected, stored.len())?;
        block.attributes = stored;
        Ok(())
    }

    fn get_node_set_ids(&mut self, num_sets: usize) -> Result<Vec<i64>, CodecError> {
        self.set_ids(CodecOp::GetNodeSetIds, EntityKind::NodeSet, num_sets)
    }

    fn get_node_set_param(&mut self, set_id: i64) -> Result<SetParams, CodecError> {
        self.enter(CodecOp::GetNodeSetParam)?;
        Ok(self.record.set(EntityKind::NodeSet, set_id)?.params)
    }

    fn put_node_set_param(&mut self, set_id: i64, params: &SetParams) -> Result<(), CodecError> {
        self.put_set_param(CodecOp::PutNodeSetParam, EntityKind::NodeSet, set_id, params)
    }

    fn get_node_set(&mut self, set_id: i64) -> Result<Vec<i64>, CodecError> {
        self.enter(CodecOp::GetNodeSet)?;
        let set = self.record.set(EntityKind::NodeSet, set_id)?;
        expect_len(CodecOp::GetNodeSet, set.params.num_entries, set.entries.len())?;
        Ok(set.entries.clone())
    }

    fn put_node_set(&mut self, set_id: i64, nodes: &[i64]) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutNodeSet)?;
        let set = self.record.set_mut(EntityKind::NodeSet, set_id)?;
        expect_len(CodecOp::PutNodeSet, set.params.num_entries, nodes.len())?;
        set.entries = nodes.to_vec();
        Ok(())
    }

    fn get_side_set_ids(&mut self, num_sets: usize) -> Result<Vec<i64>, CodecError> {
        self.set_ids(CodecOp::GetSideSetIds, EntityKind::SideSet, num_sets)
    }

    fn get_side_set_param(&mut self, set_id: i64) -> Result<SetParams, CodecError> {
        self.enter(CodecOp::GetSideSetParam)?;
        Ok(self.record.set(EntityKind::SideSet, set_id)?.params)
    }

    fn put_side_set_param(&mut self, set_id: i64, params: &SetParams) -> Result<(), CodecError> {
        self.put_set_param(CodecOp::PutSideSetParam, EntityKind::SideSet, set_id, params)
    }

    fn get_side_set(&mut self, set_id: i64) -> Result<(Vec<i64>, Vec<i64>), CodecError> {
        self.enter(CodecOp::GetSideSet)?;
        let set = self.record.set(EntityKind::SideSet, set_id)?;
        expect_len(CodecOp::GetSideSet, set.params.num_entries, set.entries.len())?;
        expect_len(CodecOp::GetSideSet, set.params.num_entries, set.sides.len())?;
        Ok((set.entries.clone(), set.sides.clone()))
    }

    fn put_side_set(
        &mut self,
        set_id: i64,
        elems: &[i64],
        sides: &[i64],
    ) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutSideSet)?;
        let set = self.record.set_mut(EntityKind::SideSet, set_id)?;
        expect_len(CodecOp::PutSideSet, set.params.num_entries, elems.len())?;
        expect_len(CodecOp::PutSideSet, set.params.num_entries, sides.len())?;
        set.entries = elems.to_vec();
        set.sides = sides.to_vec();
        Ok(())
    }

    fn get_names(&mut self, kind: EntityKind, count: usize) -> Result<Vec<String>, CodecError> {
        self.enter(CodecOp::GetNames)?;
        let names: Vec<String> = match kind {
            EntityKind::Block => self.record.blocks.iter().map(|b| b.name.clone()).collect(),
            _ => self.record.sets(kind).iter().map(|s| s.name.clone()).collect(),
        };
        expect_len(CodecOp::GetNames, count, names.len())?;
        Ok(names)
    }

    fn put_names(&mut self, kind: EntityKind, names: &[String]) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutNames)?;
        match kind {
            EntityKind::Block => {
                expect_len(CodecOp::PutNames, self.record.blocks.len(), names.len())?;
                for (block, name) in self.record.blocks.iter_mut().zip(names) {
                    block.name = name.clone();
                }
            }
            _ => {
                let sets = self.record.sets_mut(kind);
                expect_len(CodecOp::PutNames, sets.len(), names.len())?;
                for (set, name) in sets.iter_mut().zip(names) {
                    set.name = name.clone();
                }
            }
        }
        Ok(())
    }

    fn get_var_param(&mut self, scope: VarScope) -> Result<usize, CodecError> {
        self.enter(CodecOp::GetVarParam)?;
        Ok(self.record.vars(scope).count)
    }

    fn put_var_param(&mut self, scope: VarScope, count: usize) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutVarParam)?;
        self.init(CodecOp::PutVarParam)?;
        self.record.vars_mut(scope).count = count;
        Ok(())
    }

    fn get_var_names(&mut self, scope: VarScope, count: usize) -> Result<Vec<String>, CodecError> {
        self.enter(CodecOp::GetVarNames)?;
        let vars = self.record.vars(scope);
        expect_len(CodecOp::GetVarNames, count, vars.names.len())?;
        Ok(vars.names.clone())
    }

    fn put_var_names(&mut self, scope: VarScope, names: &[String]) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutVarNames)?;
        let vars = self.record.vars_mut(scope);
        expect_len(CodecOp::PutVarNames, vars.count, names.len())?;
        vars.names = names.to_vec();
        Ok(())
    }

    fn get_all_times(&mut self) -> Result<Vec<f64>, CodecError> {
        self.enter(CodecOp::GetAllTimes)?;
        Ok(self.record.times.clone())
    }

    fn put_time(&mut self, step: usize, value: f64) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutTime)?;
        self.init(CodecOp::PutTime)?;
        // Steps are appended in order; rewriting an existing step is allowed.
        let len = self.record.times.len();
        if step == 0 || step > len + 1 {
            return Err(CodecError::LengthMismatch {
                op: CodecOp::PutTime,
                expected: len + 1,
                found: step,
            });
        }
        let value = self.stored_real(value);
        if step == len + 1 {
            self.record.times.push(value);
        } else {
            self.record.times[step - 1] = value;
        }
        Ok(())
    }

    fn get_node_num_map(&mut self, num_nodes: usize) -> Result<Vec<i64>, CodecError> {
        self.enter(CodecOp::GetNodeNumMap)?;
        match &self.record.node_num_map {
            Some(map) => {
                expect_len(CodecOp::GetNodeNumMap, num_nodes, map.len())?;
                Ok(map.clone())
            }
            None => Ok(identity_map(num_nodes)),
        }
    }

    fn put_node_num_map(&mut self, map: &[i64]) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutNodeNumMap)?;
        let num_nodes = self.init(CodecOp::PutNodeNumMap)?.num_nodes;
        expect_len(CodecOp::PutNodeNumMap, num_nodes, map.len())?;
        self.record.node_num_map = Some(map.to_vec());
        Ok(())
    }

    fn get_elem_num_map(&mut self, num_elements: usize) -> Result<Vec<i64>, CodecError> {
        self.enter(CodecOp::GetElemNumMap)?;
        match &self.record.elem_num_map {
            Some(map) => {
                expect_len(CodecOp::GetElemNumMap, num_elements, map.len())?;
                Ok(map.clone())
            }
            None => Ok(identity_map(num_elements)),
        }
    }

    fn put_elem_num_map(&mut self, map: &[i64]) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutElemNumMap)?;
        let num_elements = self.init(CodecOp::PutElemNumMap)?.num_elements;
        expect_len(CodecOp::PutElemNumMap, num_elements, map.len())?;
        self.record.elem_num_map = Some(map.to_vec());
        Ok(())
    }

    fn get_nodal_var(
        &mut self,
        step: usize,
        var: usize,
        num_nodes: usize,
    ) -> Result<Vec<f64>, CodecError> {
        self.enter(CodecOp::GetNodalVar)?;
        self.check_var(VarScope::Nodal, var)?;
        self.check_step(CodecOp::GetNodalVar, step)?;
        let values = stored_values(&self.record.nodal_values, VarScope::Nodal, step, var)?;
        expect_len(CodecOp::GetNodalVar, num_nodes, values.len())?;
        Ok(values.to_vec())
    }

    fn put_nodal_var(
        &mut self,
        step: usize,
        var: usize,
        values: &[f64],
    ) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutNodalVar)?;
        self.check_var(VarScope::Nodal, var)?;
        self.check_step(CodecOp::PutNodalVar, step)?;
        let num_nodes = self.init(CodecOp::PutNodalVar)?.num_nodes;
        expect_len(CodecOp::PutNodalVar, num_nodes, values.len())?;
        let stored = self.stored_reals(values);
        *value_slot(&mut self.record.nodal_values, step, var) = stored;
        Ok(())
    }

    fn get_elem_var(
        &mut self,
        step: usize,
        var: usize,
        block_id: i64,
        num_elements: usize,
    ) -> Result<Vec<f64>, CodecError> {
        self.enter(CodecOp::GetElemVar)?;
        self.check_var(VarScope::Element, var)?;
        self.check_step(CodecOp::GetElemVar, step)?;
        let block = self.record.block(block_id)?;
        let values = stored_values(&block.values, VarScope::Element, step, var)?;
        expect_len(CodecOp::GetElemVar, num_elements, values.len())?;
        Ok(values.to_vec())
    }

    fn put_elem_var(
        &mut self,
        step: usize,
        var: usize,
        block_id: i64,
        values: &[f64],
    ) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutElemVar)?;
        self.check_var(VarScope::Element, var)?;
        self.check_step(CodecOp::PutElemVar, step)?;
        let stored = self.stored_reals(values);
        let block = self.record.block_mut(block_id)?;
        expect_len(CodecOp::PutElemVar, block.params.num_elements, stored.len())?;
        *value_slot(&mut block.values, step, var) = stored;
        Ok(())
    }

    fn get_glob_vars(&mut self, step: usize, num_vars: usize) -> Result<Vec<f64>, CodecError> {
        self.enter(CodecOp::GetGlobVars)?;
        self.check_step(CodecOp::GetGlobVars, step)?;
        let count = self.record.global_vars.count;
        expect_len(CodecOp::GetGlobVars, count, num_vars)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        self.record
            .global_values
            .get(step - 1)
            .filter(|values| !values.is_empty())
            .cloned()
            .ok_or(CodecError::MissingValues {
                scope: VarScope::Global,
                step,
                var: 1,
            })
    }

    fn put_glob_vars(&mut self, step: usize, values: &[f64]) -> Result<(), CodecError> {
        self.enter_put(CodecOp::PutGlobVars)?;
        self.check_step(CodecOp::PutGlobVars, step)?;
        expect_len(CodecOp::PutGlobVars, self.record.global_vars.count, values.len())?;
        let stored = self.stored_reals(values);
        let table = &mut self.record.global_values;
        if table.len() < step {
            table.resize_with(step, Vec::new);
        }
        table[step - 1] = stored;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CodecError> {
        self.enter(CodecOp::Close)?;
        let result = match self.mode {
            Mode::Write => self
                .store
                .commit(&self.path, std::mem::take(&mut self.record)),
            Mode::Read => Ok(()),
        };
        self.release();
        log::debug!("closed {}", self.path.display());
        result
    }

    fn abandon(&mut self) {
        if self.open {
            log::debug!("abandoning {} without commit", self.path.display());
        }
        self.release();
    }
}

impl<S: RecordStore> Drop for RecordFile<S> {
    fn drop(&mut self) {
        if self.open {
            log::warn!(
                "handle on {} dropped without close; releasing without commit",
                self.path.display()
            );
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory::MemoryStore;

    fn header() -> InitParams {
        InitParams {
            title: "t".into(),
            num_dim: 2,
            num_nodes: 3,
            num_elements: 1,
            num_blocks: 1,
            num_node_sets: 0,
            num_side_sets: 0,
        }
    }

    #[test]
    fn writes_are_invisible_until_close() {
        let codec = RecordCodec::new(MemoryStore::new());
        let path = Path::new("pending.exo");
        let mut file = codec.create(path, &CreateOptions::default()).unwrap();
        file.put_init(&header()).unwrap();
        assert!(!codec.store().exists(path));
        file.close().unwrap();
        assert!(codec.store().exists(path));
        assert_eq!(file.get_init().unwrap_err(), CodecError::Closed);
    }

    #[test]
    fn abandoned_handle_commits_nothing() {
        let codec = RecordCodec::new(MemoryStore::new());
        let path = Path::new("abandoned.exo");
        let mut file = codec.create(path, &CreateOptions::default()).unwrap();
        file.put_init(&header()).unwrap();
        file.abandon();
        assert!(!codec.store().exists(path));
        assert_eq!(codec.store().open_handles(), 0);
    }

    #[test]
    fn puts_require_init_and_write_mode() {
        let codec = RecordCodec::new(MemoryStore::new());
        let path = Path::new("order.exo");
        let mut file = codec.create(path, &CreateOptions::default()).unwrap();
        assert_eq!(
            file.put_coord(&[vec![0.0; 3], vec![0.0; 3]]).unwrap_err(),
            CodecError::OutOfOrder {
                op: CodecOp::PutCoord,
                requires: CodecOp::PutInit
            }
        );
        file.put_init(&header()).unwrap();
        file.close().unwrap();

        let mut file = codec.open(path).unwrap();
        assert_eq!(file.put_init(&header()).unwrap_err(), CodecError::ReadOnly);
    }

    #[test]
    fn single_precision_storage_rounds_reals() {
        let codec = RecordCodec::new(MemoryStore::new());
        let path = Path::new("single.exo");
        let options = CreateOptions {
            io_word_size: 4,
            ..CreateOptions::default()
        };
        let mut file = codec.create(path, &options).unwrap();
        file.put_init(&header()).unwrap();
        file.put_coord(&[vec![0.1, 0.2, 0.3], vec![0.0; 3]]).unwrap();
        file.close().unwrap();

        let mut file = codec.open(path).unwrap();
        let coords = file.get_coord(2, 3).unwrap();
        assert_eq!(coords[0][0], 0.1f32 as f64);
        file.close().unwrap();
    }

    #[test]
    fn missing_maps_read_back_as_identity() {
        let codec = RecordCodec::new(MemoryStore::new());
        let path = Path::new("maps.exo");
        let mut file = codec.create(path, &CreateOptions::default()).unwrap();
        file.put_init(&header()).unwrap();
        file.close().unwrap();

        let mut file = codec.open(path).unwrap();
        assert_eq!(file.get_node_num_map(3).unwrap(), vec![1, 2, 3]);
        file.close().unwrap();
    }
}
