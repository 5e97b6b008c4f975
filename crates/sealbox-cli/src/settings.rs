//! Config file for the `sealbox` binary: a `[transfer]` and a `[storage]`
//! table, both optional.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use sealbox_store::FileStorageConfig;
use sealbox_transfer::TransferConfig;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub transfer: TransferConfig,
    pub storage: FileStorageConfig,
}

impl Settings {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let settings: Self = toml::from_str(s).context("invalid config")?;
        settings.transfer.validate()?;
        Ok(settings)
    }

    /// Load `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Self::from_toml_str(&text).with_context(|| format!("loading {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string(self)?)
    }
}
