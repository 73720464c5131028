use std::sync::Arc;

use chrono::{DateTime, Utc};
use dop_diff::compare_objects;
use dop_ledger::{
    LifecycleEvent, LifecycleEventTypes, LifecycleRecord, LifecycleState, ProvenanceReader,
    ReplayEngine, Resolver,
};
use dop_store::ObjectRepository;
use dop_types::{sort_by_publish_time, Clock, DigitalObject};
use tracing::{debug, warn};

use crate::error::TemporalResult;
use crate::versions::{select_at, VersionSnapshot};

/// Answers point-in-time queries against the entity and provenance stores.
pub struct TemporalReconstructor {
    entities: Arc<dyn ObjectRepository>,
    reader: ProvenanceReader,
    resolver: Resolver,
    event_types: LifecycleEventTypes,
    clock: Arc<dyn Clock>,
}

impl TemporalReconstructor {
    pub fn new(
        entities: Arc<dyn ObjectRepository>,
        provenance: Arc<dyn ObjectRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            entities,
            reader: ProvenanceReader::new(provenance.clone()),
            resolver: Resolver::new(provenance),
            event_types: LifecycleEventTypes::default(),
            clock,
        }
    }

    /// Use non-default event-type references for lifecycle records.
    pub fn with_event_types(mut self, event_types: LifecycleEventTypes) -> Self {
        self.event_types = event_types;
        self
    }

    /// The published version of `id` in effect at `at` (now when absent).
    ///
    /// The returned object carries the object id rather than the version id.
    /// When the version is not the live object, its diff against the current
    /// object is attached if they differ.
    pub async fn version_at(
        &self,
        id: &str,
        at: Option<DateTime<Utc>>,
    ) -> TemporalResult<Option<VersionSnapshot>> {
        let now_ms = self.clock.now_ms();
        let t_ms = at.map(|t| t.timestamp_millis()).unwrap_or(now_ms);

        let mut versions = self.entities.list_versions(id).await?;
        sort_by_publish_time(&mut versions);
        let current = self.entities.retrieve(id).await?;
        // A deleted object keeps its creation time on its published versions.
        let created_on = match (&current, versions.first()) {
            (Some(current), _) => current.created_on(),
            (None, Some(earliest)) => self
                .entities
                .retrieve(&earliest.version_id)
                .await?
                .as_ref()
                .and_then(DigitalObject::created_on),
            (None, None) => None,
        };

        let Some(index) = select_at(&versions, t_ms, now_ms, created_on) else {
            debug!(id = %id, at = t_ms, "no version in effect");
            return Ok(None);
        };
        let version = versions.swap_remove(index);

        let mut object = match (&current, version.is_live()) {
            (Some(current), true) => current.clone(),
            _ => match self.entities.retrieve(&version.version_id).await? {
                Some(object) => object,
                None => {
                    warn!(id = %id, version = %version.version_id, "listed version cannot be retrieved");
                    return Ok(None);
                }
            },
        };

        let comparison = match &current {
            Some(current) if !version.is_live() => {
                Some(compare_objects(&object, current)).filter(|diff| !diff.is_empty())
            }
            _ => None,
        };
        object.id = Some(id.to_string());

        Ok(Some(VersionSnapshot {
            version,
            object,
            comparison,
        }))
    }

    /// Every version of `id`, oldest first, each compared with its
    /// predecessor. The live object comes last.
    pub async fn versions_of(&self, id: &str) -> TemporalResult<Vec<VersionSnapshot>> {
        let mut versions = self.entities.list_versions(id).await?;
        sort_by_publish_time(&mut versions);

        let mut snapshots: Vec<VersionSnapshot> = Vec::with_capacity(versions.len());
        for version in versions {
            let Some(object) = self.entities.retrieve(&version.version_id).await? else {
                warn!(id = %id, version = %version.version_id, "listed version cannot be retrieved");
                continue;
            };
            let comparison = snapshots
                .last()
                .map(|previous| compare_objects(&previous.object, &object));
            snapshots.push(VersionSnapshot {
                version,
                object,
                comparison,
            });
        }
        Ok(snapshots)
    }

    /// Insert/Update/Delete records of `id`, ordered by timestamp and then
    /// lifecycle order. Records with unparseable timestamps are skipped.
    pub async fn lifecycle(&self, id: &str) -> TemporalResult<Vec<LifecycleRecord>> {
        let ids = self
            .resolver
            .lifecycle_event_ids(&self.event_types, &LifecycleEvent::STATE_CHANGING)
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let event_type_ids: Vec<String> = ids.keys().cloned().collect();
        let records = self
            .reader
            .records_with_event_types(id, &event_type_ids)
            .await?;

        let mut lifecycle = Vec::with_capacity(records.len());
        for record in records {
            match LifecycleRecord::classify(record, &ids) {
                Ok(Some(classified)) => lifecycle.push(classified),
                Ok(None) => {}
                Err(e) => warn!(id = %id, error = %e, "skipping lifecycle record"),
            }
        }
        lifecycle.sort_by_key(|r| (r.at, r.event));
        Ok(lifecycle)
    }

    /// The object as it was at `at`, replayed from provenance.
    ///
    /// `None` when the object had not been created yet, had been deleted, or
    /// has no provenance at all.
    pub async fn object_at(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> TemporalResult<Option<DigitalObject>> {
        let lifecycle = self.lifecycle(id).await?;
        Ok(ReplayEngine::object_at(&lifecycle, &at))
    }

    /// Whether the object existed at `at`, according to provenance.
    pub async fn state_at(&self, id: &str, at: DateTime<Utc>) -> TemporalResult<LifecycleState> {
        let lifecycle = self.lifecycle(id).await?;
        Ok(ReplayEngine::state_at(&lifecycle, &at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemporalError;
    use dop_ledger::{
        LifecycleData, ProvenanceContent, ProvenanceRecord, ProvenanceWriter, EVENT_TYPE_TYPE,
    };
    use dop_store::InMemoryRepository;
    use dop_types::{from_epoch_ms, ManualClock};
    use serde_json::{json, Map, Value};

    const ENTITY: &str = "entity/o";

    fn content(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn at(ms: i64) -> DateTime<Utc> {
        from_epoch_ms(ms).unwrap()
    }

    struct Setup {
        clock: Arc<ManualClock>,
        entities: Arc<InMemoryRepository>,
        provenance: Arc<InMemoryRepository>,
        reconstructor: TemporalReconstructor,
    }

    fn setup() -> Setup {
        let clock = Arc::new(ManualClock::at_epoch_ms(0));
        let entities = Arc::new(InMemoryRepository::with_clock("entity", clock.clone()));
        let provenance = Arc::new(InMemoryRepository::with_clock("prov", clock.clone()));
        for name in ["Insert", "Update", "Delete", "Retrieve"] {
            provenance.insert(
                DigitalObject::new(EVENT_TYPE_TYPE, content(json!({ "name": name })))
                    .with_id(format!("prov/{}", name.to_lowercase())),
            );
        }
        let reconstructor =
            TemporalReconstructor::new(entities.clone(), provenance.clone(), clock.clone());
        Setup {
            clock,
            entities,
            provenance,
            reconstructor,
        }
    }

    async fn write(setup: &Setup, event_type_id: &str, ms: i64, snapshot: Option<Value>) {
        let data = LifecycleData {
            entity_content: snapshot.map(content),
            ..LifecycleData::default()
        };
        let record = ProvenanceRecord::new(
            ProvenanceContent::new(event_type_id, ENTITY, "Specimen", "alice", &at(ms))
                .with_data(data.into_map()),
        );
        ProvenanceWriter::new(setup.provenance.clone())
            .append(&record)
            .await
            .unwrap();
    }

    async fn lifecycle_history(setup: &Setup) {
        write(setup, "prov/update", 2_000, Some(json!({"a": 2, "b": 3}))).await;
        write(setup, "prov/insert", 1_000, Some(json!({"a": 1}))).await;
        write(setup, "prov/retrieve", 2_500, None).await;
        write(setup, "prov/delete", 3_000, None).await;
    }

    #[tokio::test]
    async fn object_at_replays_lifecycle() {
        let setup = setup();
        lifecycle_history(&setup).await;
        let r = &setup.reconstructor;

        assert_eq!(r.object_at(ENTITY, at(999)).await.unwrap(), None);
        let inserted = r.object_at(ENTITY, at(1_500)).await.unwrap().unwrap();
        assert_eq!(Value::Object(inserted.content), json!({"a": 1}));
        let updated = r.object_at(ENTITY, at(2_500)).await.unwrap().unwrap();
        assert_eq!(Value::Object(updated.content), json!({"a": 2, "b": 3}));
        assert_eq!(updated.id.as_deref(), Some(ENTITY));
        assert_eq!(updated.metadata.unwrap().modified_by, "alice");
        assert_eq!(r.object_at(ENTITY, at(3_000)).await.unwrap(), None);
        assert_eq!(r.object_at(ENTITY, at(3_500)).await.unwrap(), None);

        assert_eq!(
            r.state_at(ENTITY, at(2_999)).await.unwrap(),
            LifecycleState::Existing
        );
        assert_eq!(
            r.state_at(ENTITY, at(3_000)).await.unwrap(),
            LifecycleState::NonExistent
        );
    }

    #[tokio::test]
    async fn lifecycle_is_ordered_and_excludes_retrievals() {
        let setup = setup();
        lifecycle_history(&setup).await;
        let events: Vec<LifecycleEvent> = setup
            .reconstructor
            .lifecycle(ENTITY)
            .await
            .unwrap()
            .iter()
            .map(|r| r.event)
            .collect();
        assert_eq!(
            events,
            vec![LifecycleEvent::Insert, LifecycleEvent::Update, LifecycleEvent::Delete]
        );
    }

    #[tokio::test]
    async fn no_provenance_means_not_found() {
        let setup = setup();
        assert_eq!(
            setup.reconstructor.object_at(ENTITY, at(5_000)).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn unregistered_event_types_mean_no_history() {
        let clock = Arc::new(ManualClock::at_epoch_ms(0));
        let store = Arc::new(InMemoryRepository::with_clock("x", clock.clone()));
        let r = TemporalReconstructor::new(store.clone(), store, clock);
        assert!(r.lifecycle(ENTITY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn equal_timestamps_resolve_by_lifecycle_order() {
        let setup = setup();
        write(&setup, "prov/insert", 1_000, Some(json!({"a": 1}))).await;
        write(&setup, "prov/delete", 2_000, None).await;
        write(&setup, "prov/update", 2_000, Some(json!({"a": 2}))).await;
        assert_eq!(
            setup.reconstructor.object_at(ENTITY, at(2_000)).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn provenance_failure_is_remote_error() {
        let setup = setup();
        setup.provenance.set_failing(true);
        let err = setup
            .reconstructor
            .object_at(ENTITY, at(1_000))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TemporalError::RemoteStore("store unavailable".into())
        );
    }

    /// Object created at 100 with v=1, published at 200, updated to v=2 at
    /// 300, published at 400, updated to v=3 at 500; now is 1000.
    async fn versioned(setup: &Setup) -> String {
        setup.clock.set_epoch_ms(100);
        let id = setup
            .entities
            .create_as(&DigitalObject::new("T", content(json!({"v": 1}))), "alice")
            .id
            .unwrap();
        setup.clock.set_epoch_ms(200);
        setup.entities.publish_version(&id).await.unwrap();
        setup.clock.set_epoch_ms(300);
        setup
            .entities
            .update_as(&id, content(json!({"v": 2})), "alice")
            .unwrap();
        setup.clock.set_epoch_ms(400);
        setup.entities.publish_version(&id).await.unwrap();
        setup.clock.set_epoch_ms(500);
        setup
            .entities
            .update_as(&id, content(json!({"v": 3})), "alice")
            .unwrap();
        setup.clock.set_epoch_ms(1_000);
        id
    }

    #[tokio::test]
    async fn version_at_selects_published_version() {
        let setup = setup();
        let id = versioned(&setup).await;
        let r = &setup.reconstructor;

        let snapshot = r.version_at(&id, Some(at(300))).await.unwrap().unwrap();
        assert_eq!(snapshot.version.published_on_epoch_ms, Some(200));
        assert_eq!(snapshot.object.id.as_deref(), Some(id.as_str()));
        assert_eq!(snapshot.object.content["v"], json!(1));
        let diff = snapshot.comparison.expect("differs from current");
        assert_eq!(diff.differing["v"].left, json!(1));
        assert_eq!(diff.differing["v"].right, json!(3));

        let snapshot = r.version_at(&id, Some(at(450))).await.unwrap().unwrap();
        assert_eq!(snapshot.object.content["v"], json!(2));

        let live = r.version_at(&id, None).await.unwrap().unwrap();
        assert!(live.version.is_live());
        assert_eq!(live.object.content["v"], json!(3));
        assert!(live.comparison.is_none());
    }

    #[tokio::test]
    async fn version_before_first_publish_falls_back_to_earliest() {
        let setup = setup();
        let id = versioned(&setup).await;
        let r = &setup.reconstructor;

        let earliest = r.version_at(&id, Some(at(150))).await.unwrap().unwrap();
        assert_eq!(earliest.version.published_on_epoch_ms, Some(200));
        assert_eq!(r.version_at(&id, Some(at(50))).await.unwrap(), None);
        assert_eq!(r.version_at("entity/none", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn deleted_object_falls_back_to_earliest_version() {
        let setup = setup();
        setup.clock.set_epoch_ms(1_000);
        let id = setup
            .entities
            .create_as(&DigitalObject::new("T", content(json!({"v": 1}))), "alice")
            .id
            .unwrap();
        setup.clock.set_epoch_ms(5_000);
        let published = setup.entities.publish_version(&id).await.unwrap();
        setup.clock.set_epoch_ms(9_000);
        assert!(setup.entities.delete(&id));
        let r = &setup.reconstructor;

        let snapshot = r.version_at(&id, Some(at(2_000))).await.unwrap().unwrap();
        assert_eq!(snapshot.version.version_id, published.version_id);
        assert_eq!(snapshot.object.id.as_deref(), Some(id.as_str()));
        assert_eq!(snapshot.object.content["v"], json!(1));
        assert!(snapshot.comparison.is_none());

        assert_eq!(r.version_at(&id, Some(at(500))).await.unwrap(), None);
        let latest = r.version_at(&id, None).await.unwrap().unwrap();
        assert_eq!(latest.version.version_id, published.version_id);
    }

    #[tokio::test]
    async fn versions_are_chained_oldest_first() {
        let setup = setup();
        let id = versioned(&setup).await;

        let versions = setup.reconstructor.versions_of(&id).await.unwrap();
        let values: Vec<Value> = versions
            .iter()
            .map(|s| s.object.content["v"].clone())
            .collect();
        assert_eq!(values, vec![json!(1), json!(2), json!(3)]);
        assert!(versions[0].comparison.is_none());
        let step = versions[2].comparison.as_ref().unwrap();
        assert_eq!(step.differing["v"].left, json!(2));
        assert_eq!(step.differing["v"].right, json!(3));
        assert!(versions[2].version.is_live());
    }
}
