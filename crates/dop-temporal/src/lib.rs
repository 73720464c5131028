//! Temporal reconstruction: what did an object look like at time `t`?
//!
//! Two independent answers are offered:
//! - from the entity store's published versions ([`TemporalReconstructor::version_at`]),
//!   informational and only as fine-grained as publishing was;
//! - from the provenance log ([`TemporalReconstructor::object_at`]), the
//!   authoritative "as of" definition, replaying Insert/Update/Delete records.
//!
//! An object that did not exist at `t` is a normal `None`, not an error.

pub mod error;
pub mod reconstructor;
pub mod versions;

pub use error::{TemporalError, TemporalResult};
pub use reconstructor::TemporalReconstructor;
pub use versions::VersionSnapshot;
