//! Diff engine for digital object content.
//!
//! Content trees are compared through their flattened projections: every
//! scalar leaf becomes one `path -> value` entry, with object keys and list
//! indices joined by `/`. The comparison yields the paths only present on
//! either side plus the paths whose values differ; unchanged paths are dropped.
//!
//! # Key Types
//!
//! - [`flatten`] -- Nested tree to `BTreeMap<path, scalar>`
//! - [`ContentDiff`] / [`ValueDifference`] -- Tagged comparison result
//! - [`compare`] / [`compare_objects`] -- Comparators (the `id` field is excluded)

pub mod content_diff;
pub mod flatten;

pub use content_diff::{compare, compare_objects, ContentDiff, ValueDifference, EXCLUDED_FIELD};
pub use flatten::flatten;
