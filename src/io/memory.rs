//! In-process record store.
//!
//! [`MemoryStore`] keeps records in a shared map, so clones of a store (and
//! every handle opened through them) see the same files. It counts each
//! primitive call, tracks open handles, and can be armed to fail a chosen
//! call, which makes it the test double for everything above the codec
//! boundary.

use crate::io::codec::{CodecError, CodecOp};
use crate::io::record::{ExodusRecord, RecordCodec, RecordStore};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Codec over a [`MemoryStore`].
pub type MemoryCodec = RecordCodec<MemoryStore>;

impl MemoryCodec {
    /// Codec over a fresh, empty store.
    pub fn in_memory() -> Self {
        RecordCodec::new(MemoryStore::new())
    }
}

#[derive(Debug)]
struct Fault {
    op: CodecOp,
    remaining: usize,
}

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<PathBuf, ExodusRecord>,
    calls: HashMap<CodecOp, usize>,
    faults: Vec<Fault>,
    open_handles: usize,
}

/// Shared in-memory record store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` at `path` directly, bypassing the codec.
    pub fn insert(&self, path: impl Into<PathBuf>, record: ExodusRecord) {
        self.inner.lock().files.insert(path.into(), record);
    }

    /// Copy of the record at `path`, if any.
    pub fn get(&self, path: &Path) -> Option<ExodusRecord> {
        self.inner.lock().files.get(path).cloned()
    }

    /// Number of calls of `op` since creation or the last reset.
    pub fn calls(&self, op: CodecOp) -> usize {
        self.inner.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of calls of all primitives since creation or the last reset.
    pub fn total_calls(&self) -> usize {
        self.inner.lock().calls.values().sum()
    }

    pub fn reset_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Arms a one-shot failure: the `nth` call of `op` from now (1-based)
    /// fails with [`CodecError::Injected`].
    pub fn fail_on(&self, op: CodecOp, nth: usize) {
        self.inner.lock().faults.push(Fault {
            op,
            remaining: nth.max(1),
        });
    }

    /// Drops all armed failures.
    pub fn clear_faults(&self) {
        self.inner.lock().faults.clear();
    }

    /// Handles acquired and not yet released.
    pub fn open_handles(&self) -> usize {
        self.inner.lock().open_handles
    }
}

impl RecordStore for MemoryStore {
    fn load(&self, path: &Path) -> Result<ExodusRecord, CodecError> {
        self.get(path)
            .ok_or_else(|| CodecError::FileNotFound(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.lock().files.contains_key(path)
    }

    fn commit(&self, path: &Path, record: ExodusRecord) -> Result<(), CodecError> {
        self.insert(path, record);
        Ok(())
    }

    fn observe(&self, op: CodecOp) -> Result<(), CodecError> {
        let mut inner = self.inner.lock();
        *inner.calls.entry(op).or_insert(0) += 1;
        let mut triggered = false;
        inner.faults.retain_mut(|fault| {
            if fault.op != op || triggered {
                return true;
            }
            fault.remaining -= 1;
            if fault.remaining == 0 {
                triggered = true;
                return false;
            }
            true
        });
        if triggered {
            log::debug!("injected failure in {op}");
            return Err(CodecError::Injected(op));
        }
        Ok(())
    }

    fn acquired(&self, _path: &Path) {
        self.inner.lock().open_handles += 1;
    }

    fn released(&self, _path: &Path) {
        let mut inner = self.inner.lock();
        inner.open_handles = inner.open_handles.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_fires_once_on_the_nth_call() {
        let store = MemoryStore::new();
        store.fail_on(CodecOp::GetElemVar, 2);
        assert!(store.observe(CodecOp::GetElemVar).is_ok());
        assert!(store.observe(CodecOp::GetNodalVar).is_ok());
        assert_eq!(
            store.observe(CodecOp::GetElemVar).unwrap_err(),
            CodecError::Injected(CodecOp::GetElemVar)
        );
        assert!(store.observe(CodecOp::GetElemVar).is_ok());
        assert_eq!(store.calls(CodecOp::GetElemVar), 3);
        assert_eq!(store.total_calls(), 4);
    }

    #[test]
    fn clones_share_files() {
        let store = MemoryStore::new();
        let clone = store.clone();
        clone.insert("a.exo", ExodusRecord::default());
        assert!(store.exists(Path::new("a.exo")));
    }
}
