//! On-disk record store encoding each file as JSON.

use crate::io::codec::CodecError;
use crate::io::record::{ExodusRecord, RecordCodec, RecordStore};
use std::fs;
use std::path::Path;

/// Codec persisting records as JSON files.
pub type JsonCodec = RecordCodec<JsonStore>;

impl JsonCodec {
    pub fn json() -> Self {
        RecordCodec::new(JsonStore)
    }
}

/// Filesystem store; each record is one JSON document.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonStore;

fn io_error(path: &Path, err: std::io::Error) -> CodecError {
    CodecError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

impl RecordStore for JsonStore {
    fn load(&self, path: &Path) -> Result<ExodusRecord, CodecError> {
        let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        serde_json::from_str(&text).map_err(|e| CodecError::Serialization(e.to_string()))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn commit(&self, path: &Path, record: ExodusRecord) -> Result<(), CodecError> {
        let text = serde_json::to_string(&record)
            .map_err(|e| CodecError::Serialization(e.to_string()))?;
        // Stage beside the target, then rename over it.
        let mut staging = path.as_os_str().to_owned();
        staging.push(".partial");
        let staging = Path::new(&staging);
        fs::write(staging, text).map_err(|e| io_error(staging, e))?;
        fs::rename(staging, path).map_err(|e| io_error(path, e))
    }
}
