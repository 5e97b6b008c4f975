//! Payload transfer into and out of protected storage.
//!
//! A payload is persisted as one named object. Writes run in two passes: an
//! untimed prepare pass that creates (and truncates) the object and fills it,
//! then a timed pass through a fresh handle. Reads open the object and copy
//! it out chunk by chunk, timing the loop.
//!
//! # Layers
//!
//! - [`ChunkedTransferEngine`] -- chunk loops and timing over an open handle
//! - [`ObjectLifecycleManager`] -- create, prepare, open and close of the
//!   configured object, with [`ObjectGuard`] releasing handles on every path
//! - [`SecureTransfer`] -- store/load entry points driven by [`TransferConfig`]
//!
//! # Chunk semantics
//!
//! [`TransferMode::Accumulate`] walks the payload on write and gathers every
//! chunk on read. [`TransferMode::Collapse`] repeats one staging chunk on
//! write and keeps only the final chunk on read.

pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod pipeline;
pub mod timing;

pub use config::{
    TransferConfig, TransferMode, DEFAULT_CHUNK_SIZE, DEFAULT_OBJECT_NAME, MAX_PAYLOAD_SIZE,
};
pub use engine::{check_chunk_size, chunk_count, ChunkedTransferEngine, TransferReport};
pub use error::{status, ConfigError, StorageError, StorageResult};
pub use lifecycle::{ObjectGuard, ObjectLifecycleManager};
pub use pipeline::SecureTransfer;
pub use timing::{Clock, ElapsedMs, ManualClock, SystemClock, TeeTime};
