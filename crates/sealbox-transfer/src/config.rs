use serde::{Deserialize, Serialize};

use sealbox_store::ObjectName;

use crate::error::ConfigError;

/// Largest payload a single object may carry (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Default staging chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Name of the object used when none is configured.
pub const DEFAULT_OBJECT_NAME: &str = "sealbox.secret";

/// How chunk contents relate to the payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Writes repeat one staging chunk; reads keep only the final chunk.
    Collapse,
    /// Writes walk the payload; reads gather every chunk into one buffer.
    #[default]
    Accumulate,
}

/// Configuration of the transfer pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Name of the persistent object holding the payload.
    pub object_name: ObjectName,
    /// Staging chunk size in bytes. Must be non-zero.
    pub chunk_size: usize,
    /// Fixed payload size. When unset, writes take the caller's buffer size
    /// and reads take the stored object's size.
    pub payload_size: Option<usize>,
    /// Chunk semantics.
    pub mode: TransferMode,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            object_name: ObjectName::new(DEFAULT_OBJECT_NAME)
                .expect("default object name is valid"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            payload_size: None,
            mode: TransferMode::default(),
        }
    }
}

impl TransferConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be non-zero".into()));
        }
        if let Some(size) = self.payload_size {
            if size > MAX_PAYLOAD_SIZE {
                return Err(ConfigError::Invalid(format!(
                    "payload_size {size} exceeds maximum {MAX_PAYLOAD_SIZE}"
                )));
            }
        }
        Ok(())
    }
}
