//! Append-only provenance ledger.
//!
//! Provenance records live as ordinary objects (type `EventProvenanceRecord`)
//! in the provenance store and reference the entity they describe weakly, by
//! id. This crate provides:
//! - The record model and its object wire shape
//! - Event-type and role resolution against the provenance store
//! - `ProvenanceWriter` (create-only) / `ProvenanceReader` boundaries
//! - Deterministic replay of an entity's lifecycle records up to an instant

pub mod error;
pub mod reader;
pub mod records;
pub mod refs;
pub mod replay;
pub mod writer;

pub use error::{LedgerError, LedgerResult};
pub use reader::ProvenanceReader;
pub use records::{
    LifecycleData, LifecycleEvent, ProvenanceContent, ProvenanceRecord, PROVENANCE_RECORD_TYPE,
};
pub use refs::{
    additional_data_schema, LifecycleEventTypes, Reference, Resolver, EVENT_TYPE_TYPE, ROLE_TYPE,
};
pub use replay::{LifecycleRecord, LifecycleState, ReplayEngine};
pub use writer::ProvenanceWriter;
