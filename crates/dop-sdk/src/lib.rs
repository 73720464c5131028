//! High-level SDK for digital object provenance.
//!
//! [`EventController`] is the entry point for a host system: it receives the
//! raw JSON delivered by lifecycle hooks, runs capture in the background,
//! records custom events, and answers point-in-time queries.

pub mod config;
pub mod controller;
pub mod error;

pub use config::ControllerConfig;
pub use controller::EventController;
pub use error::{SdkError, SdkResult};

// Re-export key types
pub use dop_capture::{Backoff, CaptureConfig, CaptureFailure, CaptureStats, QueueConfig};
pub use dop_diff::{ContentDiff, ValueDifference};
pub use dop_ledger::{LifecycleEvent, LifecycleState, ProvenanceRecord, Reference};
pub use dop_store::{InMemoryRepository, ObjectRepository, Query, RepositoryConfig};
pub use dop_types::{Clock, DigitalObject, EventContext, ManualClock, SystemClock, Version};
