use std::io;
use std::path::PathBuf;

use crate::object::ObjectHandle;

/// Errors raised by a protected storage backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No object with this name exists in the namespace.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The object exists and the create call did not ask for overwrite.
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// The object name violates the naming rules.
    #[error("invalid object name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// The handle was not opened with the access the operation needs.
    #[error("access denied on {handle}: requires {required}")]
    AccessDenied {
        handle: ObjectHandle,
        required: &'static str,
    },

    /// The handle is unknown or already closed.
    #[error("bad handle: {0}")]
    BadHandle(ObjectHandle),

    /// Persisted object data failed an integrity check.
    #[error("corrupt object at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// I/O error from the underlying medium.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A fault injected by a test backend.
    #[error("injected fault: {0}")]
    Injected(&'static str),
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
