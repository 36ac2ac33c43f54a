//! Time-indexed field storage with memoized loading.
//!
//! Field arrays are cached per `(step, variable)`:
//!
//! - nodal: one flat array over all nodes,
//! - element: one array per block, in block-list order,
//! - global: one array over all global variables, per step.
//!
//! Each cache entry is a [`OnceCell`], so an entry is either absent or
//! holds the complete array set. A fill that fails part-way leaves the cell
//! empty and the next query retries the whole fill.
//!
//! The store runs in one of two [`FieldMode`]s. `Preloaded` stores are
//! filled eagerly while a file is read (or by the caller through the
//! setters). `OnDemand` stores pull each entry from a [`FieldSource`] the
//! first time it is queried.

use crate::io::codec::{CodecError, ExodusCodec, ExodusFile, with_file};
use crate::mesh_error::MeshError;
use once_cell::sync::OnceCell;
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Population strategy of a [`FieldStore`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FieldMode {
    /// Every array is materialized up front.
    #[default]
    Preloaded,
    /// Arrays are fetched from the field source on first query.
    OnDemand,
}

/// Supplies field arrays on request. Steps and variables are 0-based.
pub trait FieldSource: fmt::Debug + Send + Sync {
    /// Values of nodal variable `var` at `step`, one per node.
    fn nodal(&self, step: usize, var: usize, num_nodes: usize) -> Result<Vec<f64>, CodecError>;

    /// Values of element variable `var` at `step` for each `(block_id,
    /// num_elements)` in `blocks`, in the same order.
    fn element(
        &self,
        step: usize,
        var: usize,
        blocks: &[(i64, usize)],
    ) -> Result<Vec<Vec<f64>>, CodecError>;

    /// Values of all `num_vars` global variables at `step`.
    fn global(&self, step: usize, num_vars: usize) -> Result<Vec<f64>, CodecError>;
}

/// Field source reading from a file through a codec.
///
/// Every request opens its own handle and releases it before returning.
#[derive(Clone, Debug)]
pub struct CodecSource<C> {
    codec: C,
    path: PathBuf,
}

impl<C> CodecSource<C> {
    pub fn new(codec: C, path: impl AsRef<Path>) -> Self {
        Self {
            codec,
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl<C> FieldSource for CodecSource<C>
where
    C: ExodusCodec + fmt::Debug + Send + Sync,
{
    fn nodal(&self, step: usize, var: usize, num_nodes: usize) -> Result<Vec<f64>, CodecError> {
        let file = self.codec.open(&self.path)?;
        with_file(file, |f| f.get_nodal_var(step + 1, var + 1, num_nodes))
    }

    fn element(
        &self,
        step: usize,
        var: usize,
        blocks: &[(i64, usize)],
    ) -> Result<Vec<Vec<f64>>, CodecError> {
        let file = self.codec.open(&self.path)?;
        with_file(file, |f| {
            blocks
                .iter()
                .map(|&(block_id, num_elements)| {
                    f.get_elem_var(step + 1, var + 1, block_id, num_elements)
                })
                .collect()
        })
    }

    fn global(&self, step: usize, num_vars: usize) -> Result<Vec<f64>, CodecError> {
        let file = self.codec.open(&self.path)?;
        with_file(file, |f| f.get_glob_vars(step + 1, num_vars))
    }
}

type Grid<T> = Vec<Vec<OnceCell<T>>>;

/// Memoizing cache of nodal, element and global field arrays.
#[derive(Clone, Debug, Default)]
pub struct FieldStore {
    mode: FieldMode,
    source: Option<Arc<dyn FieldSource>>,
    nodal: Grid<Vec<f64>>,
    element: Grid<Vec<Vec<f64>>>,
    global: Vec<OnceCell<Vec<f64>>>,
}

fn grow<T>(grid: &mut Grid<T>, steps: usize, vars: usize) {
    if grid.len() < steps {
        grid.resize_with(steps, Vec::new);
    }
    for row in grid.iter_mut() {
        if row.len() < vars {
            row.resize_with(vars, OnceCell::new);
        }
    }
}

fn cell<T>(grid: &Grid<T>, step: usize, var: usize) -> Option<&OnceCell<T>> {
    grid.get(step).and_then(|row| row.get(var))
}

impl FieldStore {
    /// Empty store without a source.
    pub fn new(mode: FieldMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Empty store backed by `source`.
    pub fn with_source(mode: FieldMode, source: Arc<dyn FieldSource>) -> Self {
        Self {
            mode,
            source: Some(source),
            ..Self::default()
        }
    }

    #[inline]
    pub fn mode(&self) -> FieldMode {
        self.mode
    }

    /// Grows the cache grid to at least `steps × vars` for each scope.
    pub fn reserve(&mut self, steps: usize, nodal_vars: usize, element_vars: usize) {
        grow(&mut self.nodal, steps, nodal_vars);
        grow(&mut self.element, steps, element_vars);
        if self.global.len() < steps {
            self.global.resize_with(steps, OnceCell::new);
        }
    }

    pub fn is_nodal_cached(&self, step: usize, var: usize) -> bool {
        cell(&self.nodal, step, var).is_some_and(|c| c.get().is_some())
    }

    pub fn is_element_cached(&self, step: usize, var: usize) -> bool {
        cell(&self.element, step, var).is_some_and(|c| c.get().is_some())
    }

    pub fn is_global_cached(&self, step: usize) -> bool {
        self.global.get(step).is_some_and(|c| c.get().is_some())
    }

    fn source(&self, missing: impl FnOnce() -> MeshError) -> Result<&dyn FieldSource, MeshError> {
        self.source.as_deref().ok_or_else(missing)
    }

    /// Nodal array for `(step, var)`, filling the cache on first use.
    ///
    /// `missing` builds the error reported when neither the cache nor a
    /// source can supply the array.
    pub fn nodal(
        &self,
        step: usize,
        var: usize,
        num_nodes: usize,
        missing: impl FnOnce() -> MeshError,
    ) -> Result<&[f64], MeshError> {
        let Some(cell) = cell(&self.nodal, step, var) else {
            return Err(missing());
        };
        if let Some(values) = cell.get() {
            log::trace!("nodal cache hit: step {step}, var {var}");
            return Ok(values.as_slice());
        }
        let values = cell.get_or_try_init(|| {
            let values = self.source(missing)?.nodal(step, var, num_nodes)?;
            check_len(values.len(), num_nodes, "nodal field")?;
            log::debug!("filled nodal cache: step {step}, var {var}");
            Ok::<_, MeshError>(values)
        })?;
        Ok(values.as_slice())
    }

    /// Per-block element arrays for `(step, var)`, filling the cache on
    /// first use. `blocks` lists `(block_id, num_elements)` in block order.
    pub fn element(
        &self,
        step: usize,
        var: usize,
        blocks: &[(i64, usize)],
        missing: impl FnOnce() -> MeshError,
    ) -> Result<&[Vec<f64>], MeshError> {
        let Some(cell) = cell(&self.element, step, var) else {
            return Err(missing());
        };
        if let Some(values) = cell.get() {
            log::trace!("element cache hit: step {step}, var {var}");
            return Ok(values.as_slice());
        }
        let values = cell.get_or_try_init(|| {
            let per_block = self.source(missing)?.element(step, var, blocks)?;
            check_blocks(&per_block, blocks)?;
            log::debug!(
                "filled element cache: step {step}, var {var}, {} blocks",
                per_block.len()
            );
            Ok::<_, MeshError>(per_block)
        })?;
        Ok(values.as_slice())
    }

    /// Global variable values at `step`, filling the cache on first use.
    pub fn global(
        &self,
        step: usize,
        num_vars: usize,
        missing: impl FnOnce() -> MeshError,
    ) -> Result<&[f64], MeshError> {
        let Some(cell) = self.global.get(step) else {
            return Err(missing());
        };
        let values = cell.get_or_try_init(|| {
            let values = self.source(missing)?.global(step, num_vars)?;
            check_len(values.len(), num_vars, "global field")?;
            Ok::<_, MeshError>(values)
        })?;
        Ok(values.as_slice())
    }

    /// Nodal array without touching the cache: a cached entry is borrowed,
    /// otherwise the source is read and the result is not retained.
    pub fn nodal_uncached(
        &self,
        step: usize,
        var: usize,
        num_nodes: usize,
        missing: impl FnOnce() -> MeshError,
    ) -> Result<Cow<'_, [f64]>, MeshError> {
        if let Some(values) = cell(&self.nodal, step, var).and_then(OnceCell::get) {
            return Ok(Cow::Borrowed(values.as_slice()));
        }
        let values = self.source(missing)?.nodal(step, var, num_nodes)?;
        check_len(values.len(), num_nodes, "nodal field")?;
        Ok(Cow::Owned(values))
    }

    /// Element arrays without touching the cache; see [`Self::nodal_uncached`].
    pub fn element_uncached(
        &self,
        step: usize,
        var: usize,
        blocks: &[(i64, usize)],
        missing: impl FnOnce() -> MeshError,
    ) -> Result<Cow<'_, [Vec<f64>]>, MeshError> {
        if let Some(values) = cell(&self.element, step, var).and_then(OnceCell::get) {
            return Ok(Cow::Borrowed(values.as_slice()));
        }
        let per_block = self.source(missing)?.element(step, var, blocks)?;
        check_blocks(&per_block, blocks)?;
        Ok(Cow::Owned(per_block))
    }

    /// Global values without touching the cache; see [`Self::nodal_uncached`].
    pub fn global_uncached(
        &self,
        step: usize,
        num_vars: usize,
        missing: impl FnOnce() -> MeshError,
    ) -> Result<Cow<'_, [f64]>, MeshError> {
        if let Some(values) = self.global.get(step).and_then(OnceCell::get) {
            return Ok(Cow::Borrowed(values.as_slice()));
        }
        let values = self.source(missing)?.global(step, num_vars)?;
        check_len(values.len(), num_vars, "global field")?;
        Ok(Cow::Owned(values))
    }

    /// Empties every nodal entry and returns how many held values.
    pub fn clear_nodal(&mut self) -> usize {
        clear(&mut self.nodal)
    }

    /// Empties every element entry and returns how many held values.
    pub fn clear_element(&mut self) -> usize {
        clear(&mut self.element)
    }

    /// Checks every cached array against the current mesh shape.
    ///
    /// # Errors
    /// `CountMismatch` for the first cached array whose length disagrees
    /// with `num_nodes`, the block layout, or `num_globals`.
    pub fn check_shapes(
        &self,
        num_nodes: usize,
        blocks: &[(i64, usize)],
        num_globals: usize,
    ) -> Result<(), MeshError> {
        for (step, row) in self.nodal.iter().enumerate() {
            for (var, values) in row.iter().enumerate() {
                if let Some(values) = values.get() {
                    check_len(
                        values.len(),
                        num_nodes,
                        &format!("cached nodal field (step {step}, var {var})"),
                    )?;
                }
            }
        }
        for row in &self.element {
            for per_block in row.iter().filter_map(OnceCell::get) {
                check_blocks(per_block, blocks)?;
            }
        }
        for (step, values) in self.global.iter().enumerate() {
            if let Some(values) = values.get() {
                check_len(
                    values.len(),
                    num_globals,
                    &format!("cached global field (step {step})"),
                )?;
            }
        }
        Ok(())
    }

    /// Replaces the nodal entry for `(step, var)`; the grid must cover it.
    pub fn set_nodal(&mut self, step: usize, var: usize, values: Vec<f64>) {
        self.nodal[step][var] = OnceCell::from(values);
    }

    /// Replaces the element entry for `(step, var)`; the grid must cover it.
    pub fn set_element(&mut self, step: usize, var: usize, per_block: Vec<Vec<f64>>) {
        self.element[step][var] = OnceCell::from(per_block);
    }

    /// Replaces the global entry for `step`; the grid must cover it.
    pub fn set_global(&mut self, step: usize, values: Vec<f64>) {
        self.global[step] = OnceCell::from(values);
    }
}

fn clear<T>(grid: &mut Grid<T>) -> usize {
    grid.iter_mut()
        .flat_map(|row| row.iter_mut())
        .filter_map(OnceCell::take)
        .count()
}

fn check_len(found: usize, expected: usize, what: &str) -> Result<(), MeshError> {
    if found != expected {
        return Err(MeshError::count_mismatch(what, expected, found));
    }
    Ok(())
}

fn check_blocks(per_block: &[Vec<f64>], blocks: &[(i64, usize)]) -> Result<(), MeshError> {
    check_len(per_block.len(), blocks.len(), "element field blocks")?;
    for (values, &(block_id, num_elements)) in per_block.iter().zip(blocks) {
        check_len(
            values.len(),
            num_elements,
            &format!("element field of block {block_id}"),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::variables::VarScope;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct CountingSource {
        nodal_calls: Mutex<usize>,
        fail_block: Option<i64>,
    }

    impl FieldSource for CountingSource {
        fn nodal(&self, step: usize, var: usize, num_nodes: usize) -> Result<Vec<f64>, CodecError> {
            *self.nodal_calls.lock() += 1;
            Ok(vec![(step * 10 + var) as f64; num_nodes])
        }

        fn element(
            &self,
            _step: usize,
            _var: usize,
            blocks: &[(i64, usize)],
        ) -> Result<Vec<Vec<f64>>, CodecError> {
            blocks
                .iter()
                .map(|&(id, n)| {
                    if Some(id) == self.fail_block {
                        Err(CodecError::Injected(crate::io::codec::CodecOp::GetElemVar))
                    } else {
                        Ok(vec![id as f64; n])
                    }
                })
                .collect()
        }

        fn global(&self, _step: usize, num_vars: usize) -> Result<Vec<f64>, CodecError> {
            Ok(vec![1.0; num_vars])
        }
    }

    fn missing() -> MeshError {
        MeshError::FieldNotLoaded {
            scope: VarScope::Nodal,
            name: "u".into(),
            step: 0,
        }
    }

    #[test]
    fn on_demand_fills_once() {
        let source = Arc::new(CountingSource::default());
        let mut store = FieldStore::with_source(FieldMode::OnDemand, source.clone());
        store.reserve(2, 1, 0);
        assert!(!store.is_nodal_cached(1, 0));
        assert_eq!(store.nodal(1, 0, 3, missing).unwrap(), &[10.0, 10.0, 10.0]);
        assert_eq!(store.nodal(1, 0, 3, missing).unwrap(), &[10.0, 10.0, 10.0]);
        assert_eq!(*source.nodal_calls.lock(), 1);
        assert!(store.is_nodal_cached(1, 0));
    }

    #[test]
    fn failed_element_fill_leaves_entry_absent() {
        let source = Arc::new(CountingSource {
            fail_block: Some(2),
            ..CountingSource::default()
        });
        let mut store = FieldStore::with_source(FieldMode::OnDemand, source);
        store.reserve(1, 0, 1);
        let blocks = [(1, 2), (2, 3)];
        assert!(store.element(0, 0, &blocks, missing).is_err());
        assert!(!store.is_element_cached(0, 0));
    }

    #[test]
    fn without_source_uncached_entries_are_missing() {
        let mut store = FieldStore::new(FieldMode::Preloaded);
        store.reserve(1, 1, 0);
        assert_eq!(store.nodal(0, 0, 2, missing).unwrap_err(), missing());
        store.set_nodal(0, 0, vec![4.0, 5.0]);
        assert_eq!(store.nodal(0, 0, 2, missing).unwrap(), &[4.0, 5.0]);
    }

    #[test]
    fn cleared_entries_refill_and_shapes_are_checked() {
        let mut store = FieldStore::new(FieldMode::Preloaded);
        store.reserve(2, 1, 1);
        store.set_nodal(0, 0, vec![1.0, 2.0]);
        store.set_nodal(1, 0, vec![3.0, 4.0]);
        store.set_element(0, 0, vec![vec![1.0]]);
        assert!(store.check_shapes(2, &[(1, 1)], 0).is_ok());
        assert!(matches!(
            store.check_shapes(3, &[(1, 1)], 0).unwrap_err(),
            MeshError::CountMismatch { expected: 3, found: 2, .. }
        ));
        assert!(store.check_shapes(2, &[(1, 1), (2, 4)], 0).is_err());

        assert_eq!(store.clear_nodal(), 2);
        assert!(!store.is_nodal_cached(1, 0));
        assert!(store.check_shapes(3, &[(1, 1)], 0).is_ok());
        assert_eq!(store.clear_element(), 1);
        assert!(store.check_shapes(3, &[(1, 1), (2, 4)], 0).is_ok());
    }

    #[test]
    fn global_entries_fill_once() {
        let source = Arc::new(CountingSource::default());
        let mut store = FieldStore::with_source(FieldMode::OnDemand, source);
        store.reserve(1, 0, 0);
        assert!(!store.is_global_cached(0));
        assert_eq!(store.global(0, 2, missing).unwrap(), &[1.0, 1.0]);
        assert!(store.is_global_cached(0));
    }

    #[test]
    fn uncached_read_does_not_fill() {
        let source = Arc::new(CountingSource::default());
        let mut store = FieldStore::with_source(FieldMode::OnDemand, source);
        store.reserve(1, 1, 0);
        let values = store.nodal_uncached(0, 0, 2, missing).unwrap();
        assert!(matches!(values, Cow::Owned(_)));
        assert!(!store.is_nodal_cached(0, 0));
    }
}
