use std::time::Duration;

use dop_ledger::{LifecycleEventTypes, Reference};
use serde::{Deserialize, Serialize};

use crate::poll::Backoff;

/// Configuration for lifecycle capture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Polling schedule used to wait for writes to become visible.
    pub visibility: Backoff,
    /// Width of the trailing `modifiedOn` window an update must fall in.
    pub update_window_ms: u64,
    /// Publish a version of the entity on insert/update and record its id.
    pub publish_versions: bool,
    pub event_types: LifecycleEventTypes,
    /// Role attached to every lifecycle record.
    pub default_role: Option<Reference>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            visibility: Backoff::default(),
            update_window_ms: 5_000,
            publish_versions: true,
            event_types: LifecycleEventTypes::default(),
            default_role: None,
        }
    }
}

impl CaptureConfig {
    pub fn update_window(&self) -> Duration {
        Duration::from_millis(self.update_window_ms)
    }
}
