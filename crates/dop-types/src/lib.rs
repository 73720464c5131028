//! Foundation types for digital object provenance (DOP).
//!
//! This crate provides the data model shared by every other DOP crate: the
//! digital objects held in the remote entity store, their published versions,
//! the event context delivered by lifecycle hooks, and the clock abstraction
//! used for timestamps and eventual-consistency waits.
//!
//! # Key Types
//!
//! - [`DigitalObject`] / [`ObjectMetadata`] -- Typed, identified object with nested content
//! - [`Version`] -- Published, immutable snapshot reference of an object
//! - [`EventContext`] -- Hook context, parsed once at the boundary
//! - [`Clock`] -- Injectable time source ([`SystemClock`], [`ManualClock`])

pub mod clock;
pub mod context;
pub mod error;
pub mod object;
pub mod temporal;
pub mod version;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::EventContext;
pub use error::TypeError;
pub use object::{scalar_to_string, DigitalObject, ObjectMetadata};
pub use temporal::{format_timestamp, from_epoch_ms, parse_timestamp};
pub use version::{sort_by_publish_time, Version};
