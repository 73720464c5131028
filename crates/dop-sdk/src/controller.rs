use std::sync::Arc;

use dop_capture::{
    CaptureFailure, CaptureJob, CaptureQueue, CaptureStats, CustomEventRecorder, EventCapture,
};
use dop_ledger::{LifecycleState, ProvenanceReader, ProvenanceRecord};
use dop_store::ObjectRepository;
use dop_temporal::TemporalReconstructor;
use dop_types::{parse_timestamp, Clock, DigitalObject, EventContext, SystemClock, Version};
use serde_json::Value;
use tracing::info;

use crate::config::ControllerConfig;
use crate::error::{SdkError, SdkResult};

/// JSON field carrying a version's diff against the current object.
pub const COMPARISON_AGAINST_CURRENT: &str = "comparisonAgainstCurrentVersion";
/// JSON field carrying a version's diff against its predecessor.
pub const COMPARISON_AGAINST_PREVIOUS: &str = "comparisonAgainstPreviousVersion";

/// Entry point for a host system.
///
/// Create, update and delete hooks are parsed synchronously and then
/// captured in the background; retrieve and custom events are recorded
/// before the call returns.
pub struct EventController {
    config: ControllerConfig,
    entities: Arc<dyn ObjectRepository>,
    clock: Arc<dyn Clock>,
    queue: CaptureQueue,
    custom: CustomEventRecorder,
    capture: Arc<EventCapture>,
    temporal: TemporalReconstructor,
    reader: ProvenanceReader,
}

impl EventController {
    /// Build a controller on the wall clock. Must be called from within a
    /// tokio runtime, which hosts the capture workers.
    pub fn new(
        config: ControllerConfig,
        entities: Arc<dyn ObjectRepository>,
        provenance: Arc<dyn ObjectRepository>,
    ) -> Self {
        Self::with_clock(config, entities, provenance, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: ControllerConfig,
        entities: Arc<dyn ObjectRepository>,
        provenance: Arc<dyn ObjectRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let capture = Arc::new(EventCapture::new(
            entities.clone(),
            provenance.clone(),
            clock.clone(),
            config.capture.clone(),
        ));
        let queue = CaptureQueue::start(capture.clone(), config.queue.clone());
        let temporal =
            TemporalReconstructor::new(entities.clone(), provenance.clone(), clock.clone())
                .with_event_types(config.capture.event_types.clone());
        info!(
            entity_prefix = %config.entity_store.handle_prefix,
            provenance_prefix = %config.provenance_store.handle_prefix,
            "event controller started"
        );

        Self {
            custom: CustomEventRecorder::new(entities.clone(), provenance.clone()),
            reader: ProvenanceReader::new(provenance),
            config,
            entities,
            clock,
            queue,
            capture,
            temporal,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    // ---- Lifecycle hooks ----

    /// Queue capture of a newly created object.
    pub fn process_create_event(&self, raw_object: &str, raw_context: &str) -> SdkResult<()> {
        let job = CaptureJob::Create {
            object: DigitalObject::from_raw_json(raw_object)?,
            context: EventContext::parse(raw_context)?,
        };
        Ok(self.queue.submit(job)?)
    }

    /// Queue capture of a modification.
    pub fn process_update_event(
        &self,
        raw_original: &str,
        raw_modified: &str,
        raw_context: &str,
    ) -> SdkResult<()> {
        let job = CaptureJob::Update {
            original: DigitalObject::from_raw_json(raw_original)?,
            modified: DigitalObject::from_raw_json(raw_modified)?,
            context: EventContext::parse(raw_context)?,
        };
        Ok(self.queue.submit(job)?)
    }

    /// Queue capture of a deletion. The request time is taken now, before
    /// the object's absence is confirmed.
    pub fn process_delete_event(&self, raw_object: &str, raw_context: &str) -> SdkResult<()> {
        let job = CaptureJob::Delete {
            object: DigitalObject::from_raw_json(raw_object)?,
            context: EventContext::parse(raw_context)?,
            requested_at: self.clock.now(),
        };
        Ok(self.queue.submit(job)?)
    }

    /// Record a read.
    pub async fn process_retrieve_event(
        &self,
        raw_object: &str,
        raw_context: &str,
    ) -> SdkResult<ProvenanceRecord> {
        let object = DigitalObject::from_raw_json(raw_object)?;
        let context = EventContext::parse(raw_context)?;
        Ok(self.capture.record_retrieve(&object, &context).await?)
    }

    /// Validate and record a custom event about `entity_id`.
    pub async fn process_custom_event(
        &self,
        raw_event: &str,
        entity_id: &str,
    ) -> SdkResult<ProvenanceRecord> {
        Ok(self.custom.record(raw_event, entity_id).await?)
    }

    // ---- Versions and history ----

    /// Publish a version of the object's current state.
    pub async fn publish_version(&self, id: &str) -> SdkResult<Version> {
        Ok(self.entities.publish_version(id).await?)
    }

    /// The version in effect at `timestamp` (now when absent or blank), as
    /// JSON with its diff against the current object.
    pub async fn version_of_object_at(
        &self,
        id: &str,
        timestamp: Option<&str>,
    ) -> SdkResult<Option<Value>> {
        let at = match timestamp.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => Some(parse_timestamp(t)?),
            None => None,
        };
        let snapshot = self.temporal.version_at(id, at).await?;
        Ok(snapshot.map(|s| s.to_json(COMPARISON_AGAINST_CURRENT)))
    }

    /// Every version of the object, oldest first, as JSON with each
    /// version's diff against its predecessor.
    pub async fn versions_of_object(&self, id: &str) -> SdkResult<Vec<Value>> {
        let snapshots = self.temporal.versions_of(id).await?;
        Ok(snapshots
            .iter()
            .map(|s| s.to_json(COMPARISON_AGAINST_PREVIOUS))
            .collect())
    }

    /// The object as it was at `timestamp`, replayed from provenance.
    pub async fn object_at(&self, id: &str, timestamp: &str) -> SdkResult<Option<DigitalObject>> {
        let at = parse_timestamp(timestamp)?;
        Ok(self.temporal.object_at(id, at).await?)
    }

    /// Whether the object existed at `timestamp`.
    pub async fn state_at(&self, id: &str, timestamp: &str) -> SdkResult<LifecycleState> {
        let at = parse_timestamp(timestamp)?;
        Ok(self.temporal.state_at(id, at).await?)
    }

    /// Every provenance record about the object, as a JSON array of record
    /// objects in store order.
    pub async fn provenance_records_for_object(&self, id: &str) -> SdkResult<String> {
        let objects = self.reader.record_objects(id).await?;
        serde_json::to_string(&objects).map_err(|e| SdkError::Serialization(e.to_string()))
    }

    // ---- Background capture ----

    pub fn capture_stats(&self) -> CaptureStats {
        self.queue.stats()
    }

    pub fn capture_failures(&self) -> Vec<CaptureFailure> {
        self.queue.failures()
    }

    /// Wait for every queued capture to finish.
    pub async fn drain(&self) {
        self.queue.drain().await;
    }

    /// Stop accepting lifecycle events and finish the queued ones.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
        info!("event controller stopped");
    }
}
