//! The codec boundary.
//!
//! An [`ExodusCodec`] opens or creates files and hands out [`ExodusFile`]
//! handles exposing typed get/put primitives. Everything that crosses this
//! boundary uses the file format's conventions: node, element, time-step and
//! variable numbers are 1-based, integers are `i64`, reals are `f64`.
//! Translation to the 0-based numbering used inside the crate happens in
//! [`crate::database`], never here.

use crate::data::variables::VarScope;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Global parameters stored in a file header.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InitParams {
    pub title: String,
    pub num_dim: usize,
    pub num_nodes: usize,
    pub num_elements: usize,
    pub num_blocks: usize,
    pub num_node_sets: usize,
    pub num_side_sets: usize,
}

/// Topology metadata of one element block.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BlockParams {
    pub topology: String,
    pub num_elements: usize,
    pub nodes_per_element: usize,
    pub num_attributes: usize,
}

/// Size parameters of a node or side set.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SetParams {
    pub num_entries: usize,
    pub num_dist_factors: usize,
}

/// Entity kinds that carry names.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EntityKind {
    Block,
    NodeSet,
    SideSet,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Block => "element block",
            EntityKind::NodeSet => "node set",
            EntityKind::SideSet => "side set",
        })
    }
}

/// Options for creating a new file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreateOptions {
    /// Word size of reals handed to the codec (4 or 8).
    pub comp_word_size: usize,
    /// Word size of reals stored in the file (4 or 8). With 4, reals are
    /// stored at single precision.
    pub io_word_size: usize,
    /// Replace an existing file instead of failing.
    pub overwrite: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            comp_word_size: 8,
            io_word_size: 8,
            overwrite: true,
        }
    }
}

/// Identifies one codec primitive, for logging, call counting and fault
/// injection.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CodecOp {
    Open,
    Create,
    Close,
    GetInit,
    PutInit,
    GetCoord,
    PutCoord,
    GetCoordNames,
    PutCoordNames,
    GetElemBlkIds,
    GetElemBlock,
    PutElemBlock,
    GetElemConn,
    PutElemConn,
    GetElemAttr,
    PutElemAttr,
    GetNodeSetIds,
    GetNodeSetParam,
    PutNodeSetParam,
    GetNodeSet,
    PutNodeSet,
    GetSideSetIds,
    GetSideSetParam,
    PutSideSetParam,
    GetSideSet,
    PutSideSet,
    GetNames,
    PutNames,
    GetVarParam,
    PutVarParam,
    GetVarNames,
    PutVarNames,
    GetAllTimes,
    PutTime,
    GetNodeNumMap,
    PutNodeNumMap,
    GetElemNumMap,
    PutElemNumMap,
    GetNodalVar,
    PutNodalVar,
    GetElemVar,
    PutElemVar,
    GetGlobVars,
    PutGlobVars,
}

impl fmt::Display for CodecOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Failure reported by a codec primitive.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// Operating-system I/O failure.
    #[error("i/o error on {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
    /// `open` on a path that holds no file.
    #[error("file {} does not exist", .0.display())]
    FileNotFound(PathBuf),
    /// `create` without overwrite on a path that already holds a file.
    #[error("file {} already exists", .0.display())]
    FileExists(PathBuf),
    /// Put primitive on a handle obtained from `open`.
    #[error("file handle is read-only")]
    ReadOnly,
    /// Primitive on a handle after `close`.
    #[error("file handle already closed")]
    Closed,
    /// Primitive issued before a primitive it depends on.
    #[error("{op} issued before {requires}")]
    OutOfOrder { op: CodecOp, requires: CodecOp },
    /// Referenced block or set id is not defined in the file.
    #[error("{what} {id} not present in file")]
    MissingEntity { what: EntityKind, id: i64 },
    /// Variable number outside the declared variable count.
    #[error("{scope} variable {var} not declared (file declares {count})")]
    UndeclaredVariable {
        scope: VarScope,
        var: usize,
        count: usize,
    },
    /// No values stored for the requested step and variable.
    #[error("no {scope} values for variable {var} at step {step}")]
    MissingValues {
        scope: VarScope,
        step: usize,
        var: usize,
    },
    /// Caller-declared length disagrees with the file contents.
    #[error("{op}: expected {expected} values, found {found}")]
    LengthMismatch {
        op: CodecOp,
        expected: usize,
        found: usize,
    },
    /// Encoding or decoding the file contents failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// Failure armed on a test store.
    #[error("injected failure in {0}")]
    Injected(CodecOp),
}

/// Factory for file handles.
pub trait ExodusCodec {
    /// Handle type produced by this codec.
    type File: ExodusFile;

    /// Opens an existing file read-only.
    fn open(&self, path: &Path) -> Result<Self::File, CodecError>;

    /// Creates a new file for writing.
    fn create(&self, path: &Path, options: &CreateOptions) -> Result<Self::File, CodecError>;
}

/// Typed read/write primitives over one open file.
///
/// All ids, step numbers and variable numbers are 1-based.
pub trait ExodusFile {
    fn get_init(&mut self) -> Result<InitParams, CodecError>;
    fn put_init(&mut self, params: &InitParams) -> Result<(), CodecError>;

    /// One array of `num_nodes` values per axis.
    fn get_coord(&mut self, num_dim: usize, num_nodes: usize) -> Result<Vec<Vec<f64>>, CodecError>;
    fn put_coord(&mut self, axes: &[Vec<f64>]) -> Result<(), CodecError>;
    fn get_coord_names(&mut self, num_dim: usize) -> Result<Vec<String>, CodecError>;
    fn put_coord_names(&mut self, names: &[String]) -> Result<(), CodecError>;

    fn get_elem_blk_ids(&mut self, num_blocks: usize) -> Result<Vec<i64>, CodecError>;
    fn get_elem_block(&mut self, block_id: i64) -> Result<BlockParams, CodecError>;
    fn put_elem_block(&mut self, block_id: i64, params: &BlockParams) -> Result<(), CodecError>;
    /// Flat 1-based connectivity of the block.
    fn get_elem_conn(&mut self, block_id: i64) -> Result<Vec<i64>, CodecError>;
    fn put_elem_conn(&mut self, block_id: i64, conn: &[i64]) -> Result<(), CodecError>;
    fn get_elem_attr(&mut self, block_id: i64) -> Result<Vec<f64>, CodecError>;
    fn put_elem_attr(&mut self, block_id: i64, attrs: &[f64]) -> Result<(), CodecError>;

    fn get_node_set_ids(&mut self, num_sets: usize) -> Result<Vec<i64>, CodecError>;
    fn get_node_set_param(&mut self, set_id: i64) -> Result<SetParams, CodecError>;
    fn put_node_set_param(&mut self, set_id: i64, params: &SetParams) -> Result<(), CodecError>;
    fn get_node_set(&mut self, set_id: i64) -> Result<Vec<i64>, CodecError>;
    fn put_node_set(&mut self, set_id: i64, nodes: &[i64]) -> Result<(), CodecError>;

    fn get_side_set_ids(&mut self, num_sets: usize) -> Result<Vec<i64>, CodecError>;
    fn get_side_set_param(&mut self, set_id: i64) -> Result<SetParams, CodecError>;
    fn put_side_set_param(&mut self, set_id: i64, params: &SetParams) -> Result<(), CodecError>;
    /// Parallel `(elements, sides)` arrays.
    fn get_side_set(&mut self, set_id: i64) -> Result<(Vec<i64>, Vec<i64>), CodecError>;
    fn put_side_set(&mut self, set_id: i64, elems: &[i64], sides: &[i64])
    -> Result<(), CodecError>;

    /// Names of all entities of `kind`, in id order; unnamed entities yield `""`.
    fn get_names(&mut self, kind: EntityKind, count: usize) -> Result<Vec<String>, CodecError>;
    fn put_names(&mut self, kind: EntityKind, names: &[String]) -> Result<(), CodecError>;

    fn get_var_param(&mut self, scope: VarScope) -> Result<usize, CodecError>;
    fn put_var_param(&mut self, scope: VarScope, count: usize) -> Result<(), CodecError>;
    fn get_var_names(&mut self, scope: VarScope, count: usize) -> Result<Vec<String>, CodecError>;
    fn put_var_names(&mut self, scope: VarScope, names: &[String]) -> Result<(), CodecError>;

    fn get_all_times(&mut self) -> Result<Vec<f64>, CodecError>;
    fn put_time(&mut self, step: usize, value: f64) -> Result<(), CodecError>;

    fn get_node_num_map(&mut self, num_nodes: usize) -> Result<Vec<i64>, CodecError>;
    fn put_node_num_map(&mut self, map: &[i64]) -> Result<(), CodecError>;
    fn get_elem_num_map(&mut self, num_elements: usize) -> Result<Vec<i64>, CodecError>;
    fn put_elem_num_map(&mut self, map: &[i64]) -> Result<(), CodecError>;

    fn get_nodal_var(
        &mut self,
        step: usize,
        var: usize,
        num_nodes: usize,
    ) -> Result<Vec<f64>, CodecError>;
    fn put_nodal_var(&mut self, step: usize, var: usize, values: &[f64])
    -> Result<(), CodecError>;
    fn get_elem_var(
        &mut self,
        step: usize,
        var: usize,
        block_id: i64,
        num_elements: usize,
    ) -> Result<Vec<f64>, CodecError>;
    fn put_elem_var(
        &mut self,
        step: usize,
        var: usize,
        block_id: i64,
        values: &[f64],
    ) -> Result<(), CodecError>;
    fn get_glob_vars(&mut self, step: usize, num_vars: usize) -> Result<Vec<f64>, CodecError>;
    fn put_glob_vars(&mut self, step: usize, values: &[f64]) -> Result<(), CodecError>;

    /// Flushes pending writes and releases the handle.
    fn close(&mut self) -> Result<(), CodecError>;

    /// Releases the handle without committing pending writes.
    fn abandon(&mut self);
}

/// Runs `body` against `file` and releases the handle on every exit path.
///
/// On success the file is closed and a close failure is reported. When the
/// body fails the handle is abandoned, so a half-written file is never
/// committed, and the body's error is returned.
pub fn with_file<F, T, E>(mut file: F, body: impl FnOnce(&mut F) -> Result<T, E>) -> Result<T, E>
where
    F: ExodusFile,
    E: From<CodecError>,
{
    match body(&mut file) {
        Ok(value) => {
            file.close()?;
            Ok(value)
        }
        Err(err) => {
            file.abandon();
            Err(err)
        }
    }
}
