//! Custom (application-defined) provenance events.
//!
//! Unlike lifecycle capture this path is synchronous and all-or-nothing:
//! the event is parsed and validated before any store is touched, every
//! reference is resolved, and a single record is written only if all of
//! that succeeds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dop_ledger::{
    additional_data_schema, ProvenanceContent, ProvenanceRecord, ProvenanceWriter, Reference,
    Resolver,
};
use dop_store::ObjectRepository;
use dop_types::parse_timestamp;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{CaptureError, CaptureResult};
use crate::schema;

/// A parsed custom event descriptor.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomEvent {
    pub event_type: Reference,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub role: Option<Reference>,
    pub description: Option<String>,
    pub data: Option<Map<String, Value>>,
}

impl CustomEvent {
    /// Parse a raw event descriptor.
    ///
    /// Required: `eventTypeId` or `eventType` (a name), `agentId`, and an
    /// RFC 3339 `timestamp`. Optional: `roleId` or `roleName`,
    /// `description`, and an object-valued `data`. The timestamp is
    /// persisted at millisecond precision.
    pub fn parse(raw: &str) -> CaptureResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| CaptureError::MalformedInput(format!("event is not valid JSON: {e}")))?;
        let Value::Object(fields) = value else {
            return Err(CaptureError::MalformedInput("event must be a JSON object".into()));
        };

        let event_type = match (text(&fields, "eventTypeId")?, text(&fields, "eventType")?) {
            (Some(id), _) => Reference::Id(id),
            (None, Some(name)) => Reference::Name(name),
            (None, None) => {
                return Err(CaptureError::MalformedInput(
                    "`eventTypeId` or `eventType` is required".into(),
                ))
            }
        };
        let agent_id = text(&fields, "agentId")?
            .ok_or_else(|| CaptureError::MalformedInput("`agentId` is required".into()))?;
        let timestamp = text(&fields, "timestamp")?
            .ok_or_else(|| CaptureError::MalformedInput("`timestamp` is required".into()))?;
        let timestamp = parse_timestamp(&timestamp)?;

        let role = match (text(&fields, "roleId")?, text(&fields, "roleName")?) {
            (Some(id), _) => Some(Reference::Id(id)),
            (None, Some(name)) => Some(Reference::Name(name)),
            (None, None) => None,
        };
        let data = match fields.get("data") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) if map.is_empty() => None,
            Some(Value::Object(map)) => Some(map.clone()),
            Some(_) => {
                return Err(CaptureError::MalformedInput("`data` must be an object".into()));
            }
        };

        Ok(Self {
            event_type,
            agent_id,
            timestamp,
            role,
            description: text(&fields, "description")?,
            data,
        })
    }
}

/// A non-blank string field. Blank strings count as absent; other JSON
/// types are rejected.
fn text(fields: &Map<String, Value>, key: &str) -> CaptureResult<Option<String>> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(CaptureError::MalformedInput(format!("`{key}` must be a string"))),
    }
}

/// Validates and records custom events.
pub struct CustomEventRecorder {
    entities: Arc<dyn ObjectRepository>,
    resolver: Resolver,
    writer: ProvenanceWriter,
}

impl CustomEventRecorder {
    pub fn new(entities: Arc<dyn ObjectRepository>, provenance: Arc<dyn ObjectRepository>) -> Self {
        Self {
            entities,
            resolver: Resolver::new(provenance.clone()),
            writer: ProvenanceWriter::new(provenance),
        }
    }

    /// Parse, validate and record a custom event about `entity_id`.
    pub async fn record(&self, raw: &str, entity_id: &str) -> CaptureResult<ProvenanceRecord> {
        let event = CustomEvent::parse(raw)?;
        self.record_event(&event, entity_id).await
    }

    /// Validate and record an already parsed event.
    ///
    /// The entity and the agent must exist in the entity store; the event
    /// type and the role (when one is given) in the provenance store. Data is
    /// checked against the event type's `additionalDataSchema` when it
    /// declares one.
    pub async fn record_event(
        &self,
        event: &CustomEvent,
        entity_id: &str,
    ) -> CaptureResult<ProvenanceRecord> {
        if entity_id.trim().is_empty() {
            return Err(CaptureError::MalformedInput("entity id must not be blank".into()));
        }
        let entity = self
            .entities
            .retrieve(entity_id)
            .await?
            .ok_or_else(|| CaptureError::not_found("entity", entity_id))?;
        self.entities
            .retrieve(&event.agent_id)
            .await?
            .ok_or_else(|| CaptureError::not_found("agent", &event.agent_id))?;
        let event_type = self.resolver.event_type(&event.event_type).await?;
        let role_id = match &event.role {
            Some(role) => Some(self.resolver.role(role).await?.id_str().to_string()),
            None => None,
        };

        if let (Some(data), Some(schema)) = (&event.data, additional_data_schema(&event_type)) {
            if let Err(errors) = schema::validate(schema, &Value::Object(data.clone())) {
                warn!(
                    entity_id = %entity_id,
                    event_type = %event.event_type,
                    violations = errors.len(),
                    "custom event data rejected"
                );
                return Err(CaptureError::SchemaValidation(errors));
            }
        }

        let mut content = ProvenanceContent::new(
            event_type.id_str(),
            entity_id,
            &entity.object_type,
            &event.agent_id,
            &event.timestamp,
        )
        .with_role(role_id);
        if let Some(description) = &event.description {
            content = content.with_description(description);
        }
        if let Some(data) = &event.data {
            content = content.with_data(data.clone());
        }

        let record = self.writer.append(&ProvenanceRecord::new(content)).await?;
        info!(entity_id = %entity_id, event_type = %event.event_type, "custom event recorded");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{content, Fixture};
    use dop_types::{format_timestamp, DigitalObject};
    use serde_json::json;

    fn recorder(fx: &Fixture) -> CustomEventRecorder {
        CustomEventRecorder::new(fx.entities.clone(), fx.provenance.clone())
    }

    fn specimen(fx: &Fixture) -> String {
        fx.entities.insert(DigitalObject::new(
            "Specimen",
            content(json!({"label": "S-1"})),
        ))
    }

    #[test]
    fn parse_accepts_names_and_normalizes_time() {
        let event = CustomEvent::parse(
            r#"{"eventType": "Measurement", "agentId": "entity/alice",
                "timestamp": "2021-06-01T12:00:00+02:00", "roleName": "Curator",
                "description": "  ", "data": {}}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, Reference::name("Measurement"));
        assert_eq!(event.role, Some(Reference::name("Curator")));
        assert_eq!(format_timestamp(&event.timestamp), "2021-06-01T10:00:00.000Z");
        assert_eq!(event.description, None);
        assert_eq!(event.data, None);
    }

    #[test]
    fn parse_prefers_ids() {
        let event = CustomEvent::parse(
            r#"{"eventTypeId": "prov/1", "eventType": "Ignored", "agentId": "a",
                "timestamp": "2021-06-01T10:00:00Z", "roleId": "prov/r"}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, Reference::id("prov/1"));
        assert_eq!(event.role, Some(Reference::id("prov/r")));
    }

    #[test]
    fn parse_rejects_missing_and_mistyped_fields() {
        let cases = [
            r#"{"agentId": "a", "timestamp": "2021-06-01T10:00:00Z"}"#,
            r#"{"eventType": "E", "timestamp": "2021-06-01T10:00:00Z"}"#,
            r#"{"eventType": "E", "agentId": "a"}"#,
            r#"{"eventType": "E", "agentId": "a", "timestamp": "yesterday"}"#,
            r#"{"eventType": "E", "agentId": 7, "timestamp": "2021-06-01T10:00:00Z"}"#,
            r#"{"eventType": "E", "agentId": "a", "timestamp": "2021-06-01T10:00:00Z", "data": [1]}"#,
            r#"["not", "an", "object"]"#,
            "{",
        ];
        for raw in cases {
            let err = CustomEvent::parse(raw).unwrap_err();
            assert!(matches!(err, CaptureError::MalformedInput(_)), "{raw}: {err}");
        }
    }

    #[tokio::test]
    async fn missing_timestamp_touches_no_store() {
        let fx = Fixture::new();
        let entity = specimen(&fx);
        let err = recorder(&fx)
            .record(r#"{"eventType": "Annotation", "agentId": "entity/alice"}"#, &entity)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::MalformedInput(_)));
        assert_eq!(fx.entities.call_count(), 0);
        assert_eq!(fx.provenance.call_count(), 0);
    }

    #[tokio::test]
    async fn records_valid_event() {
        let fx = Fixture::new();
        let entity = specimen(&fx);
        let raw = json!({
            "eventType": "Measurement",
            "agentId": "entity/alice",
            "timestamp": "2021-06-01T10:00:00Z",
            "roleName": "Curator",
            "description": "weighed",
            "data": {"instrument": "scale-2", "value": 4.5}
        })
        .to_string();

        let record = recorder(&fx).record(&raw, &entity).await.unwrap();
        assert!(record.id.is_some());
        assert_eq!(record.content.event_type_id, fx.id("Measurement"));
        assert_eq!(record.content.entity_type, "Specimen");
        assert_eq!(record.content.role_id.as_deref(), Some(fx.id("Curator")));
        assert_eq!(record.content.description.as_deref(), Some("weighed"));
        assert_eq!(record.content.timestamp, "2021-06-01T10:00:00.000Z");
        assert_eq!(fx.records(), vec![record]);
    }

    #[tokio::test]
    async fn schema_violation_writes_nothing() {
        let fx = Fixture::new();
        let entity = specimen(&fx);
        let raw = json!({
            "eventType": "Measurement",
            "agentId": "entity/alice",
            "timestamp": "2021-06-01T10:00:00Z",
            "data": {"value": -1}
        })
        .to_string();

        let err = recorder(&fx).record(&raw, &entity).await.unwrap_err();
        let CaptureError::SchemaValidation(errors) = err else {
            panic!("expected schema failure, got {err}");
        };
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(fx.records().is_empty());
    }

    #[tokio::test]
    async fn pattern_and_multiple_of_violations_write_nothing() {
        let fx = Fixture::new();
        let entity = specimen(&fx);
        fx.provenance.insert(DigitalObject::new(
            dop_ledger::EVENT_TYPE_TYPE,
            content(json!({
                "name": "Coding",
                "additionalDataSchema": {
                    "type": "object",
                    "properties": {
                        "code": {"type": "string", "pattern": "^[A-Z]{3}$"},
                        "n": {"type": "integer", "multipleOf": 5},
                        "x": {"not": {"type": "string"}}
                    }
                }
            })),
        ));
        let event = |data: serde_json::Value| {
            json!({
                "eventType": "Coding",
                "agentId": "entity/alice",
                "timestamp": "2021-06-01T10:00:00Z",
                "data": data
            })
            .to_string()
        };

        let bad = event(json!({"code": "lowercase-not-matching", "n": 7, "x": "str"}));
        let err = recorder(&fx).record(&bad, &entity).await.unwrap_err();
        let CaptureError::SchemaValidation(errors) = err else {
            panic!("expected schema failure, got {err}");
        };
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(fx.records().is_empty());

        let good = event(json!({"code": "ABC", "n": 15, "x": 1}));
        recorder(&fx).record(&good, &entity).await.unwrap();
        assert_eq!(fx.records().len(), 1);
    }

    #[tokio::test]
    async fn event_type_without_schema_accepts_any_data() {
        let fx = Fixture::new();
        let entity = specimen(&fx);
        let raw = json!({
            "eventType": "Annotation",
            "agentId": "entity/alice",
            "timestamp": "2021-06-01T10:00:00Z",
            "data": {"note": ["free", "form"]}
        })
        .to_string();
        let record = recorder(&fx).record(&raw, &entity).await.unwrap();
        assert_eq!(record.content.data, Some(content(json!({"note": ["free", "form"]}))));
        assert_eq!(record.content.role_id, None);
    }

    #[tokio::test]
    async fn missing_references_are_not_found() {
        let fx = Fixture::new();
        let entity = specimen(&fx);
        let event = |agent: &str, event_type: &str, role: Option<&str>| {
            let mut raw = json!({
                "eventType": event_type,
                "agentId": agent,
                "timestamp": "2021-06-01T10:00:00Z"
            });
            if let Some(role) = role {
                raw["roleName"] = json!(role);
            }
            raw.to_string()
        };
        let recorder = recorder(&fx);

        let cases = [
            (event("entity/alice", "Annotation", None), "entity/none", "entity"),
            (event("entity/nobody", "Annotation", None), entity.as_str(), "agent"),
            (event("entity/alice", "Unknown", None), entity.as_str(), "event type"),
            (event("entity/alice", "Annotation", Some("Janitor")), entity.as_str(), "role"),
        ];
        for (raw, entity_id, expected_kind) in cases {
            match recorder.record(&raw, entity_id).await {
                Err(CaptureError::NotFound { kind, .. }) => assert_eq!(kind, expected_kind),
                other => panic!("expected {expected_kind} not found, got {other:?}"),
            }
        }
        assert!(fx.records().is_empty());
    }
}
