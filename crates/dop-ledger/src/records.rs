use std::fmt;

use chrono::{DateTime, Utc};
use dop_diff::ContentDiff;
use dop_types::{format_timestamp, parse_timestamp, DigitalObject, ObjectMetadata};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LedgerError, LedgerResult};

/// Object type under which provenance records are stored.
pub const PROVENANCE_RECORD_TYPE: &str = "EventProvenanceRecord";

/// Lifecycle events captured automatically from store hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Insert,
    Update,
    Delete,
    Retrieve,
}

impl LifecycleEvent {
    /// Events that change whether or how an object exists.
    pub const STATE_CHANGING: [LifecycleEvent; 3] = [Self::Insert, Self::Update, Self::Delete];

    /// Event-type name as registered in the provenance store.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Insert => "Insert",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Retrieve => "Retrieve",
        }
    }

    /// Human-readable description written into the record.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Insert => "Digital object created",
            Self::Update => "Digital object updated",
            Self::Delete => "Digital object deleted",
            Self::Retrieve => "Digital object retrieved",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Content of a provenance record, in its persisted wire shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceContent {
    pub event_type_id: String,
    pub entity_id: String,
    #[serde(default)]
    pub entity_type: String,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    /// UTC ISO-8601.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl ProvenanceContent {
    pub fn new(
        event_type_id: impl Into<String>,
        entity_id: impl Into<String>,
        entity_type: impl Into<String>,
        agent_id: impl Into<String>,
        timestamp: &DateTime<Utc>,
    ) -> Self {
        Self {
            event_type_id: event_type_id.into(),
            entity_id: entity_id.into(),
            entity_type: entity_type.into(),
            agent_id: agent_id.into(),
            role_id: None,
            timestamp: format_timestamp(timestamp),
            description: None,
            data: None,
        }
    }

    pub fn with_role(mut self, role_id: Option<String>) -> Self {
        self.role_id = role_id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a data payload; an empty payload is omitted.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = if data.is_empty() { None } else { Some(data) };
        self
    }
}

/// Typed view of the `data` payload written for lifecycle events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LifecycleData {
    pub changes: Option<ContentDiff>,
    pub revision_id: Option<String>,
    pub entity_content: Option<Map<String, Value>>,
}

impl LifecycleData {
    pub fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(changes) = self.changes {
            if let Ok(value) = serde_json::to_value(changes) {
                map.insert("changes".into(), value);
            }
        }
        if let Some(revision_id) = self.revision_id {
            map.insert("revisionId".into(), Value::String(revision_id));
        }
        if let Some(content) = self.entity_content {
            map.insert("entityContent".into(), Value::Object(content));
        }
        map
    }

    /// Read the typed fields out of an arbitrary payload. Fields with an
    /// unexpected shape are treated as absent.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            changes: map
                .get("changes")
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
            revision_id: map
                .get("revisionId")
                .and_then(Value::as_str)
                .map(str::to_string),
            entity_content: map
                .get("entityContent")
                .and_then(Value::as_object)
                .cloned(),
        }
    }
}

/// An immutable provenance record.
#[derive(Clone, Debug, PartialEq)]
pub struct ProvenanceRecord {
    /// Assigned by the provenance store on creation.
    pub id: Option<String>,
    pub content: ProvenanceContent,
    pub metadata: Option<ObjectMetadata>,
}

impl ProvenanceRecord {
    /// An unsaved record.
    pub fn new(content: ProvenanceContent) -> Self {
        Self {
            id: None,
            content,
            metadata: None,
        }
    }

    /// Encode as a store object. The id is left for the store to assign.
    pub fn to_object(&self) -> LedgerResult<DigitalObject> {
        let content = match serde_json::to_value(&self.content)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?
        {
            Value::Object(map) => map,
            _ => return Err(LedgerError::Serialization("record content is not an object".into())),
        };
        Ok(DigitalObject::new(PROVENANCE_RECORD_TYPE, content))
    }

    /// Decode a store object.
    pub fn from_object(object: &DigitalObject) -> LedgerResult<Self> {
        let malformed = |reason: String| LedgerError::MalformedRecord {
            id: object.id_str().to_string(),
            reason,
        };
        if object.object_type != PROVENANCE_RECORD_TYPE {
            return Err(malformed(format!("unexpected type {}", object.object_type)));
        }
        let content: ProvenanceContent =
            serde_json::from_value(Value::Object(object.content.clone()))
                .map_err(|e| malformed(e.to_string()))?;
        Ok(Self {
            id: object.id.clone(),
            content,
            metadata: object.metadata.clone(),
        })
    }

    /// The parsed event timestamp.
    pub fn timestamp(&self) -> LedgerResult<DateTime<Utc>> {
        parse_timestamp(&self.content.timestamp).map_err(|e| LedgerError::MalformedRecord {
            id: self.id.clone().unwrap_or_default(),
            reason: e.to_string(),
        })
    }

    /// Typed view of the data payload (empty when there is none).
    pub fn lifecycle_data(&self) -> LifecycleData {
        self.content
            .data
            .as_ref()
            .map(LifecycleData::from_map)
            .unwrap_or_default()
    }
}
