//! Resolution of event types and roles registered in the provenance store.

use std::collections::HashMap;
use std::sync::Arc;

use dop_store::{ObjectRepository, Query, StoreError};
use dop_types::DigitalObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::records::LifecycleEvent;

/// Object type of event-type definitions.
pub const EVENT_TYPE_TYPE: &str = "EventType";
/// Object type of role definitions.
pub const ROLE_TYPE: &str = "Role";

/// A reference to a registered object, either by id or by its `name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reference {
    Id(String),
    Name(String),
}

impl Reference {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Name(name) => write!(f, "name {name}"),
        }
    }
}

/// Event-type references used for lifecycle records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleEventTypes {
    pub insert: Reference,
    pub update: Reference,
    pub delete: Reference,
    pub retrieve: Reference,
}

impl Default for LifecycleEventTypes {
    fn default() -> Self {
        Self {
            insert: Reference::name(LifecycleEvent::Insert.name()),
            update: Reference::name(LifecycleEvent::Update.name()),
            delete: Reference::name(LifecycleEvent::Delete.name()),
            retrieve: Reference::name(LifecycleEvent::Retrieve.name()),
        }
    }
}

impl LifecycleEventTypes {
    /// The configured reference for a lifecycle event.
    pub fn reference(&self, event: LifecycleEvent) -> &Reference {
        match event {
            LifecycleEvent::Insert => &self.insert,
            LifecycleEvent::Update => &self.update,
            LifecycleEvent::Delete => &self.delete,
            LifecycleEvent::Retrieve => &self.retrieve,
        }
    }
}

/// The JSON schema an event type declares for its custom `data` payload.
pub fn additional_data_schema(event_type: &DigitalObject) -> Option<&Value> {
    event_type
        .content
        .get("additionalDataSchema")
        .filter(|schema| !schema.is_null())
}

/// Looks up event types and roles in the provenance store.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn ObjectRepository>,
}

impl Resolver {
    pub fn new(store: Arc<dyn ObjectRepository>) -> Self {
        Self { store }
    }

    /// Resolve an event-type definition.
    pub async fn event_type(&self, reference: &Reference) -> LedgerResult<DigitalObject> {
        self.resolve("event type", EVENT_TYPE_TYPE, reference).await
    }

    /// Resolve a role definition.
    pub async fn role(&self, reference: &Reference) -> LedgerResult<DigitalObject> {
        self.resolve("role", ROLE_TYPE, reference).await
    }

    /// Resolve a reference to its object id.
    pub async fn event_type_id(&self, reference: &Reference) -> LedgerResult<String> {
        Ok(self.event_type(reference).await?.id_str().to_string())
    }

    /// Map the ids of the given lifecycle event types back to their events.
    ///
    /// Event types that are not registered are left out: no record can
    /// reference them.
    pub async fn lifecycle_event_ids(
        &self,
        types: &LifecycleEventTypes,
        events: &[LifecycleEvent],
    ) -> LedgerResult<HashMap<String, LifecycleEvent>> {
        let mut ids = HashMap::with_capacity(events.len());
        for &event in events {
            match self.event_type_id(types.reference(event)).await {
                Ok(id) => {
                    ids.insert(id, event);
                }
                Err(LedgerError::NotFound { reference, .. }) => {
                    debug!(event = %event, reference = %reference, "lifecycle event type not registered");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(ids)
    }

    async fn resolve(
        &self,
        kind: &'static str,
        object_type: &str,
        reference: &Reference,
    ) -> LedgerResult<DigitalObject> {
        let not_found = || LedgerError::NotFound {
            kind,
            reference: reference.to_string(),
        };
        match reference {
            Reference::Id(id) => self
                .store
                .retrieve(id)
                .await?
                .filter(|object| object.object_type == object_type)
                .ok_or_else(not_found),
            Reference::Name(name) => {
                let query = Query::of_type(object_type).content("name", name.clone());
                match self.store.search_one(&query).await {
                    Ok(object) => Ok(object),
                    Err(StoreError::NotFound(_)) => Err(not_found()),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}
