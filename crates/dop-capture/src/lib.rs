//! Event capture and provenance writing.
//!
//! Lifecycle hooks (create, update, delete, retrieve) and custom events are
//! turned into immutable provenance records:
//!
//! 1. **Boundary**: raw snapshots and context descriptors are parsed once.
//! 2. **Visibility**: create/update/delete wait for the triggering write to
//!    become observable in the entity store, polling with backoff.
//! 3. **Record**: the found object is diffed (updates), optionally versioned,
//!    and a record is appended to the provenance store.
//!
//! Background capture runs on a bounded [`CaptureQueue`] so that back-pressure
//! and shutdown draining are explicit.

pub mod config;
pub mod custom;
pub mod error;
pub mod lifecycle;
pub mod poll;
pub mod queue;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

pub use config::CaptureConfig;
pub use custom::{CustomEvent, CustomEventRecorder};
pub use error::{CaptureError, CaptureResult};
pub use lifecycle::{CaptureOutcome, EventCapture, SkipReason};
pub use poll::{poll_until, Backoff, PollOutcome, Visibility};
pub use queue::{CaptureFailure, CaptureJob, CaptureQueue, CaptureStats, QueueConfig};
pub use schema::validate as validate_schema;
