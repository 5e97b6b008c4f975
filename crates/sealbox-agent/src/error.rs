use thiserror::Error;

use sealbox_transfer::{status, StorageError};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("bad parameters: {0}")]
    BadParameters(String),

    #[error("unknown command id: {0}")]
    UnknownCommand(u32),
}

impl AgentError {
    /// Status code returned to the caller of the dispatcher.
    pub fn code(&self) -> u32 {
        match self {
            Self::Storage(e) => e.code(),
            Self::BadParameters(_) | Self::UnknownCommand(_) => status::BAD_PARAMETERS,
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
