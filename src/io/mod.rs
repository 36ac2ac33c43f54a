//! File I/O for mesh databases.
//!
//! [`codec`] defines the boundary every file format implements. The
//! [`record`] codec implements it over a serializable snapshot of the whole
//! file, stored either in process memory ([`memory`]) or as JSON on disk
//! ([`json`], behind the `json-codec` feature).

pub mod codec;
#[cfg(feature = "json-codec")]
pub mod json;
pub mod memory;
pub mod record;

pub use codec::{CodecError, CodecOp, CreateOptions, ExodusCodec, ExodusFile, with_file};
#[cfg(feature = "json-codec")]
pub use json::JsonCodec;
pub use memory::{MemoryCodec, MemoryStore};
pub use record::{ExodusRecord, RecordCodec, RecordStore};
