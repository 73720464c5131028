//! Version-list selection.

use dop_diff::ContentDiff;
use dop_types::{DigitalObject, Version};
use serde_json::Value;

/// A published version together with its content and an informational diff.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionSnapshot {
    pub version: Version,
    pub object: DigitalObject,
    /// Against the current object ([`version_at`]) or the previous version
    /// ([`versions_of`]).
    ///
    /// [`version_at`]: crate::TemporalReconstructor::version_at
    /// [`versions_of`]: crate::TemporalReconstructor::versions_of
    pub comparison: Option<ContentDiff>,
}

impl VersionSnapshot {
    /// The object's JSON with `versionId`, `publishedOn` and, when present,
    /// the comparison under `comparison_field`.
    pub fn to_json(&self, comparison_field: &str) -> Value {
        let mut value = serde_json::to_value(&self.object).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert("versionId".into(), Value::String(self.version.version_id.clone()));
            map.insert(
                "publishedOn".into(),
                self.version
                    .published_on_epoch_ms
                    .map(Value::from)
                    .unwrap_or(Value::Null),
            );
            if let Some(comparison) = &self.comparison {
                if let Ok(diff) = serde_json::to_value(comparison) {
                    map.insert(comparison_field.into(), diff);
                }
            }
        }
        value
    }
}

/// Index of the version in effect at `t_ms` within `sorted` (ascending by
/// publish time, the unpublished live entry last and taken as `now_ms`).
///
/// That is the last version published at or before `t_ms`. When every
/// version is newer but the object already existed (`created_on <= t_ms`),
/// the object was unmodified since creation and the earliest version is
/// returned.
pub fn select_at(sorted: &[Version], t_ms: i64, now_ms: i64, created_on: Option<i64>) -> Option<usize> {
    match sorted
        .iter()
        .rposition(|v| v.effective_published_on(now_ms) <= t_ms)
    {
        Some(index) => Some(index),
        None if !sorted.is_empty() && created_on.is_some_and(|created| created <= t_ms) => Some(0),
        None => None,
    }
}
