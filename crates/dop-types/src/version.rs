use serde::{Deserialize, Serialize};

/// A published version of an object, as listed by the entity store.
///
/// The store lists the live object itself with `published_on_epoch_ms =
/// None`; callers treat a missing publish time as "now".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub object_id: String,
    pub version_id: String,
    pub published_on_epoch_ms: Option<i64>,
}

impl Version {
    /// Publish time, substituting `now_ms` for an unpublished entry.
    pub fn effective_published_on(&self, now_ms: i64) -> i64 {
        self.published_on_epoch_ms.unwrap_or(now_ms)
    }

    /// Returns `true` if this entry is the live object rather than a snapshot.
    pub fn is_live(&self) -> bool {
        self.version_id == self.object_id
    }
}

/// Sort versions ascending by publish time; unpublished entries sort last.
pub fn sort_by_publish_time(versions: &mut [Version]) {
    versions.sort_by_key(|v| (v.published_on_epoch_ms.is_none(), v.published_on_epoch_ms));
}
