use sealbox_store::{BackendError, ObjectName};

/// Errors from the transfer pipeline.
///
/// Every variant is reported as soon as it happens; handle and chunk-buffer
/// cleanup has already run by the time the caller sees it.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend refused to create the object.
    #[error("failed to create object {name}")]
    CreateFailed {
        name: ObjectName,
        #[source]
        source: BackendError,
    },

    /// The object could not be opened (missing, corrupt, medium fault).
    #[error("failed to open object {name}")]
    OpenFailed {
        name: ObjectName,
        #[source]
        source: BackendError,
    },

    /// The size of an open object could not be queried.
    #[error("failed to query size of object {name}")]
    InfoFailed {
        name: ObjectName,
        #[source]
        source: BackendError,
    },

    /// A chunk write failed.
    #[error("chunk write of {len} bytes failed at offset {offset}")]
    WriteFailed {
        offset: usize,
        len: usize,
        #[source]
        source: BackendError,
    },

    /// A chunk read failed or returned fewer bytes than requested.
    #[error("chunk read failed at offset {offset}: requested {expected} bytes, got {actual}")]
    ReadFailed {
        offset: usize,
        expected: usize,
        actual: usize,
        #[source]
        source: Option<BackendError>,
    },

    /// A chunk or payload buffer could not be reserved.
    #[error("could not allocate a {size}-byte buffer")]
    AllocationFailed { size: usize },

    /// Arguments rejected before any resource was acquired.
    #[error("bad parameters: {0}")]
    BadParameters(String),

    /// The payload does not fit the caller's buffer.
    #[error("buffer too small: need {needed} bytes, capacity is {capacity}")]
    ShortBuffer { needed: usize, capacity: usize },
}

impl StorageError {
    /// Stable status code reported across the dispatch boundary.
    pub fn code(&self) -> u32 {
        match self {
            Self::BadParameters(_) => status::BAD_PARAMETERS,
            Self::AllocationFailed { .. } => status::OUT_OF_MEMORY,
            Self::ShortBuffer { .. } => status::SHORT_BUFFER,
            Self::OpenFailed { source, .. } | Self::CreateFailed { source, .. } => {
                backend_code(source)
            }
            Self::InfoFailed { source, .. } | Self::WriteFailed { source, .. } => {
                backend_code(source)
            }
            Self::ReadFailed { source: Some(source), .. } => backend_code(source),
            Self::ReadFailed { source: None, .. } => status::GENERIC,
        }
    }
}

fn backend_code(err: &BackendError) -> u32 {
    match err {
        BackendError::NotFound(_) => status::ITEM_NOT_FOUND,
        BackendError::AlreadyExists(_) => status::ACCESS_CONFLICT,
        BackendError::InvalidName { .. } => status::BAD_PARAMETERS,
        BackendError::AccessDenied { .. } => status::ACCESS_DENIED,
        BackendError::Corrupt { .. } => status::CORRUPT_OBJECT,
        BackendError::BadHandle(_) | BackendError::Io(_) | BackendError::Injected(_) => {
            status::GENERIC
        }
    }
}

/// Status codes shared by the transfer pipeline and the dispatcher.
pub mod status {
    pub const SUCCESS: u32 = 0x0000_0000;
    pub const GENERIC: u32 = 0xFFFF_0000;
    pub const ACCESS_DENIED: u32 = 0xFFFF_0001;
    pub const ACCESS_CONFLICT: u32 = 0xFFFF_0003;
    pub const BAD_PARAMETERS: u32 = 0xFFFF_0006;
    pub const ITEM_NOT_FOUND: u32 = 0xFFFF_0008;
    pub const NOT_SUPPORTED: u32 = 0xFFFF_000A;
    pub const OUT_OF_MEMORY: u32 = 0xFFFF_000C;
    pub const SHORT_BUFFER: u32 = 0xFFFF_0010;
    pub const CORRUPT_OBJECT: u32 = 0xF010_0001;
}

/// Result alias for transfer operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from loading a [`TransferConfig`](crate::TransferConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The TOML document could not be produced.
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The values parse but are not usable.
    #[error("invalid config value: {0}")]
    Invalid(String),
}
