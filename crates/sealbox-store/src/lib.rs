//! Protected object storage for Sealbox.
//!
//! This crate models the persistent storage namespace that only code inside
//! the isolated environment can reach. Objects are opaque, named byte
//! streams accessed through handles, with an explicit create-vs-open
//! distinction and per-handle access flags.
//!
//! # Storage Backends
//!
//! All backends implement the [`SecureStorage`] trait:
//!
//! - [`InMemorySecureStorage`] -- `HashMap`-based store for tests, with fault
//!   injection and a write-size log
//! - [`FileSecureStorage`] -- one CRC-framed file per object under a root
//!   directory
//!
//! # Design Rules
//!
//! 1. Object names are validated before they reach a backend.
//! 2. Every handle carries its own data position and access flags.
//! 3. `close` is idempotent and infallible.
//! 4. The store never interprets object contents.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
mod handles;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{BackendError, BackendResult};
pub use file::{FileSecureStorage, FileStorageConfig};
pub use memory::{FaultPlan, InMemorySecureStorage};
pub use object::{
    validate_object_name, AccessFlags, ObjectHandle, ObjectInfo, ObjectName, MAX_OBJECT_NAME_LEN,
};
pub use traits::SecureStorage;
