//! Repository gateway for digital object stores.
//!
//! The object store is an external, eventually-consistent collaborator. This
//! crate defines the capability the rest of the system needs from it
//! ([`ObjectRepository`]), the conjunctive query language used to search it
//! ([`Query`]), and an in-memory implementation for tests and embedding.
//!
//! The gateway is instantiated twice by the host: once for the entity store
//! and once for the provenance store.
//!
//! # Storage Backends
//!
//! - [`InMemoryRepository`] -- `HashMap`-based store with search indexing lag,
//!   version publishing and call accounting

pub mod config;
pub mod error;
pub mod memory;
pub mod query;
pub mod traits;

pub use config::RepositoryConfig;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRepository;
pub use query::{escape_value, Field, Predicate, Query, Term};
pub use traits::ObjectRepository;
