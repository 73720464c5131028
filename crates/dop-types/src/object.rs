use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TypeError;

/// Audit metadata stamped by the entity store.
///
/// Times are epoch milliseconds, as reported by the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMetadata {
    pub created_on: i64,
    pub created_by: String,
    pub modified_on: i64,
    pub modified_by: String,
}

/// A typed, identified object held in a remote object store.
///
/// The `content` is an arbitrarily nested JSON tree. This system never
/// mutates objects owned by the entity store; it only reads them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DigitalObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub object_type: String,
    pub content: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMetadata>,
}

impl DigitalObject {
    /// Create an unsaved object (no id, no metadata).
    pub fn new(object_type: impl Into<String>, content: Map<String, Value>) -> Self {
        Self {
            id: None,
            object_type: object_type.into(),
            content,
            metadata: None,
        }
    }

    /// Builder-style id assignment.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Parse a raw snapshot delivered by a lifecycle hook.
    ///
    /// `type` and an object-valued `content` are required; `id` and
    /// `metadata` are optional (a snapshot taken before creation has no id).
    pub fn from_raw_json(raw: &str) -> Result<Self, TypeError> {
        serde_json::from_str(raw).map_err(|e| TypeError::MalformedInput(e.to_string()))
    }

    /// The object id, or an empty string for unsaved snapshots.
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Creation time in epoch milliseconds, if the store stamped one.
    pub fn created_on(&self) -> Option<i64> {
        self.metadata.as_ref().map(|m| m.created_on)
    }

    /// Last modification time in epoch milliseconds, if stamped.
    pub fn modified_on(&self) -> Option<i64> {
        self.metadata.as_ref().map(|m| m.modified_on)
    }

    /// Top-level content attributes whose values are non-blank scalars,
    /// rendered as query strings. Objects, lists and nulls are skipped.
    pub fn scalar_attributes(&self) -> Vec<(&str, String)> {
        self.content
            .iter()
            .filter_map(|(key, value)| {
                scalar_to_string(value)
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| (key.as_str(), s))
            })
            .collect()
    }

    /// Look up a content attribute by `/`-separated path (`a/b/0`).
    pub fn content_at(&self, path: &str) -> Option<&Value> {
        let mut segments = path.trim_start_matches('/').split('/');
        let first = segments.next()?;
        let mut current = self.content.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Render a JSON scalar the way query terms and search indexes see it.
///
/// Returns `None` for nulls, objects and arrays.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
