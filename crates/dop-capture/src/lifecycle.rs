//! Capture of object lifecycle events (create, update, delete, retrieve).
//!
//! Create, update and delete hooks fire before the write is observable in
//! the entity store, so each first polls for the expected state and only
//! then appends a record. Nothing is written when the expected state is
//! never observed.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dop_diff::compare_objects;
use dop_ledger::{
    LifecycleData, LifecycleEvent, ProvenanceContent, ProvenanceRecord, ProvenanceWriter, Resolver,
};
use dop_store::{Field, ObjectRepository, Query};
use dop_types::{from_epoch_ms, Clock, DigitalObject, EventContext};
use tracing::{debug, info};

use crate::config::CaptureConfig;
use crate::error::{CaptureError, CaptureResult};
use crate::poll::{poll_until, PollOutcome, Visibility};

/// Why a lifecycle event produced no record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The expected object never became visible.
    NotVisible { attempts: u32 },
    /// More than one object matched the capture search.
    Ambiguous(String),
    /// A deleted object is still present in the entity store.
    StillExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotVisible { attempts } => {
                write!(f, "object not visible after {attempts} attempts")
            }
            Self::Ambiguous(reason) => write!(f, "ambiguous match: {reason}"),
            Self::StillExists => write!(f, "object still exists"),
        }
    }
}

/// Result of capturing one lifecycle event.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureOutcome {
    Recorded(ProvenanceRecord),
    Skipped(SkipReason),
}

impl CaptureOutcome {
    pub fn record(&self) -> Option<&ProvenanceRecord> {
        match self {
            Self::Recorded(record) => Some(record),
            Self::Skipped(_) => None,
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

/// Turns lifecycle hooks into provenance records.
pub struct EventCapture {
    entities: Arc<dyn ObjectRepository>,
    resolver: Resolver,
    writer: ProvenanceWriter,
    clock: Arc<dyn Clock>,
    config: CaptureConfig,
}

impl EventCapture {
    pub fn new(
        entities: Arc<dyn ObjectRepository>,
        provenance: Arc<dyn ObjectRepository>,
        clock: Arc<dyn Clock>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            entities,
            resolver: Resolver::new(provenance.clone()),
            writer: ProvenanceWriter::new(provenance),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Record the creation of `object` by `context.user_id`.
    ///
    /// The created object is located by type, creator and every non-blank
    /// top-level scalar attribute of the hook snapshot; exactly one match is
    /// required. The record is stamped with the object's `createdOn`.
    pub async fn capture_create(
        &self,
        object: &DigitalObject,
        context: &EventContext,
    ) -> CaptureResult<CaptureOutcome> {
        let mut query = Query::of_type(&object.object_type).metadata("createdBy", &context.user_id);
        for (key, value) in object.scalar_attributes() {
            query = query.content(key, value);
        }

        let entities = &self.entities;
        let query = &query;
        let outcome = poll_until(self.clock.as_ref(), &self.config.visibility, move |_| async move {
            Ok(single_match(entities.search_all(query).await?, query))
        })
        .await?;
        let found = match settle(outcome) {
            Ok(found) => found,
            Err(reason) => return Ok(skip(LifecycleEvent::Insert, object.id_str(), reason)),
        };

        let entity_id = found.id_str().to_string();
        let refs = self.references(LifecycleEvent::Insert).await?;
        let data = LifecycleData {
            changes: None,
            revision_id: self.publish_revision(&entity_id).await?,
            entity_content: Some(found.content.clone()),
        };
        let at = self.stamp(found.created_on())?;
        let record = self
            .append(
                refs,
                &entity_id,
                &found.object_type,
                &context.user_id,
                &at,
                Some(data),
            )
            .await?;
        Ok(CaptureOutcome::Recorded(record))
    }

    /// Record a modification of `original` into `modified`.
    ///
    /// The stored object must carry the same id, have been modified by
    /// `context.user_id`, and have a `modifiedOn` inside the trailing update
    /// window measured at each check. The record holds the diff from the
    /// hook's original snapshot to the stored state.
    pub async fn capture_update(
        &self,
        original: &DigitalObject,
        modified: &DigitalObject,
        context: &EventContext,
    ) -> CaptureResult<CaptureOutcome> {
        let entity_id = modified
            .id
            .clone()
            .or_else(|| context.object_id.clone())
            .or_else(|| original.id.clone())
            .ok_or_else(|| CaptureError::MalformedInput("updated object has no id".into()))?;

        let window = i64::try_from(self.config.update_window_ms).unwrap_or(i64::MAX);
        let base = Query::of_type(&modified.object_type)
            .equals(Field::Id, &entity_id)
            .metadata("modifiedBy", &context.user_id);

        let entities = &self.entities;
        let clock = &self.clock;
        let base = &base;
        let outcome = poll_until(self.clock.as_ref(), &self.config.visibility, move |_| async move {
            let now = clock.now_ms();
            let query = base.clone().range(
                Field::Metadata("modifiedOn".into()),
                now.saturating_sub(window),
                now,
            );
            Ok(single_match(entities.search_all(&query).await?, &query))
        })
        .await?;
        let found = match settle(outcome) {
            Ok(found) => found,
            Err(reason) => return Ok(skip(LifecycleEvent::Update, &entity_id, reason)),
        };

        let refs = self.references(LifecycleEvent::Update).await?;
        let data = LifecycleData {
            changes: Some(compare_objects(original, &found)),
            revision_id: self.publish_revision(&entity_id).await?,
            entity_content: Some(found.content.clone()),
        };
        let at = self.stamp(found.modified_on())?;
        let record = self
            .append(
                refs,
                &entity_id,
                &found.object_type,
                &context.user_id,
                &at,
                Some(data),
            )
            .await?;
        Ok(CaptureOutcome::Recorded(record))
    }

    /// Record the deletion of `object`, requested at `requested_at`.
    ///
    /// The record is written only once the object is confirmed absent, and
    /// carries the request time rather than the confirmation time.
    pub async fn capture_delete(
        &self,
        object: &DigitalObject,
        context: &EventContext,
        requested_at: DateTime<Utc>,
    ) -> CaptureResult<CaptureOutcome> {
        let entity_id = object
            .id
            .clone()
            .or_else(|| context.object_id.clone())
            .ok_or_else(|| CaptureError::MalformedInput("deleted object has no id".into()))?;

        let entities = &self.entities;
        let id = entity_id.as_str();
        let outcome = poll_until(self.clock.as_ref(), &self.config.visibility, move |_| async move {
            Ok(match entities.retrieve(id).await? {
                None => Visibility::Visible(()),
                Some(_) => Visibility::NotYet,
            })
        })
        .await?;
        match settle(outcome) {
            Ok(()) => {}
            Err(SkipReason::NotVisible { .. }) => {
                return Ok(skip(LifecycleEvent::Delete, &entity_id, SkipReason::StillExists))
            }
            Err(reason) => return Ok(skip(LifecycleEvent::Delete, &entity_id, reason)),
        }

        let refs = self.references(LifecycleEvent::Delete).await?;
        let record = self
            .append(
                refs,
                &entity_id,
                &object.object_type,
                &context.user_id,
                &requested_at,
                None,
            )
            .await?;
        Ok(CaptureOutcome::Recorded(record))
    }

    /// Record a read of `object`. A read is already committed, so the record
    /// is written immediately with the current time.
    pub async fn record_retrieve(
        &self,
        object: &DigitalObject,
        context: &EventContext,
    ) -> CaptureResult<ProvenanceRecord> {
        let entity_id = context
            .object_id
            .clone()
            .or_else(|| object.id.clone())
            .ok_or_else(|| CaptureError::MalformedInput("retrieved object has no id".into()))?;
        let refs = self.references(LifecycleEvent::Retrieve).await?;
        let now = self.clock.now();
        self.append(
            refs,
            &entity_id,
            &object.object_type,
            &context.user_id,
            &now,
            None,
        )
        .await
    }

    async fn publish_revision(&self, entity_id: &str) -> CaptureResult<Option<String>> {
        if !self.config.publish_versions {
            return Ok(None);
        }
        let version = self.entities.publish_version(entity_id).await?;
        Ok(Some(version.version_id))
    }

    /// Store metadata time, or now when the store did not stamp one.
    fn stamp(&self, epoch_ms: Option<i64>) -> CaptureResult<DateTime<Utc>> {
        match epoch_ms {
            Some(ms) => Ok(from_epoch_ms(ms)?),
            None => Ok(self.clock.now()),
        }
    }

    /// Resolve the event type and default role before anything is written.
    async fn references(&self, event: LifecycleEvent) -> CaptureResult<EventRefs> {
        let event_type_id = self
            .resolver
            .event_type_id(self.config.event_types.reference(event))
            .await?;
        let role_id = match &self.config.default_role {
            Some(role) => Some(self.resolver.role(role).await?.id_str().to_string()),
            None => None,
        };
        Ok(EventRefs {
            event,
            event_type_id,
            role_id,
        })
    }

    async fn append(
        &self,
        refs: EventRefs,
        entity_id: &str,
        entity_type: &str,
        agent_id: &str,
        at: &DateTime<Utc>,
        data: Option<LifecycleData>,
    ) -> CaptureResult<ProvenanceRecord> {
        let event = refs.event;
        let mut content =
            ProvenanceContent::new(refs.event_type_id, entity_id, entity_type, agent_id, at)
                .with_role(refs.role_id)
                .with_description(event.description());
        if let Some(data) = data {
            content = content.with_data(data.into_map());
        }
        let record = self.writer.append(&ProvenanceRecord::new(content)).await?;
        debug!(event = %event, entity_id = %entity_id, "lifecycle event captured");
        Ok(record)
    }
}

struct EventRefs {
    event: LifecycleEvent,
    event_type_id: String,
    role_id: Option<String>,
}

fn single_match(mut matches: Vec<DigitalObject>, query: &Query) -> Visibility<DigitalObject> {
    match matches.len() {
        0 => Visibility::NotYet,
        1 => Visibility::Visible(matches.remove(0)),
        count => Visibility::Abandon(format!("{count} objects match `{query}`")),
    }
}

fn settle<T>(outcome: PollOutcome<T>) -> Result<T, SkipReason> {
    match outcome {
        PollOutcome::Visible(value) => Ok(value),
        PollOutcome::Exhausted { attempts } => Err(SkipReason::NotVisible { attempts }),
        PollOutcome::Abandoned(reason) => Err(SkipReason::Ambiguous(reason)),
    }
}

fn skip(event: LifecycleEvent, entity_id: &str, reason: SkipReason) -> CaptureOutcome {
    info!(event = %event, entity_id = %entity_id, reason = %reason, "lifecycle event not recorded");
    CaptureOutcome::Skipped(reason)
}
