use std::path::Path;

use dop_capture::{CaptureConfig, QueueConfig};
use dop_store::RepositoryConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Immutable configuration of an [`EventController`](crate::EventController).
///
/// Every section is optional in TOML; missing sections and fields keep their
/// defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub entity_store: RepositoryConfig,
    pub provenance_store: RepositoryConfig,
    pub capture: CaptureConfig,
    pub queue: QueueConfig,
}

impl ControllerConfig {
    pub fn from_toml_str(content: &str) -> SdkResult<Self> {
        toml::from_str(content).map_err(|e| SdkError::Config(format!("invalid TOML: {e}")))
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string(self).map_err(|e| SdkError::Config(e.to_string()))
    }
}
