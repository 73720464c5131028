//! Shared fixtures for capture tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dop_ledger::{ProvenanceRecord, EVENT_TYPE_TYPE, PROVENANCE_RECORD_TYPE, ROLE_TYPE};
use dop_store::InMemoryRepository;
use dop_types::{DigitalObject, ManualClock};
use serde_json::{json, Map, Value};

use crate::config::CaptureConfig;
use crate::lifecycle::EventCapture;

pub(crate) const START_MS: i64 = 1_700_000_000_000;
const INDEXING_DELAY_MS: u64 = 1_500;

pub(crate) fn content(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

pub(crate) struct Fixture {
    pub clock: Arc<ManualClock>,
    pub entities: Arc<InMemoryRepository>,
    pub provenance: Arc<InMemoryRepository>,
    ids: HashMap<&'static str, String>,
}

impl Fixture {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::at_epoch_ms(START_MS));
        let entities = Arc::new(
            InMemoryRepository::with_clock("entity", clock.clone())
                .with_indexing_delay(Duration::from_millis(INDEXING_DELAY_MS)),
        );
        let provenance = Arc::new(InMemoryRepository::with_clock("prov", clock.clone()));

        let mut ids = HashMap::new();
        for name in ["Insert", "Update", "Delete", "Retrieve", "Annotation"] {
            let id = provenance.insert(DigitalObject::new(
                EVENT_TYPE_TYPE,
                content(json!({ "name": name })),
            ));
            ids.insert(name, id);
        }
        let measurement = provenance.insert(DigitalObject::new(
            EVENT_TYPE_TYPE,
            content(json!({
                "name": "Measurement",
                "additionalDataSchema": {
                    "type": "object",
                    "required": ["id", "instrument"],
                    "properties": {
                        "instrument": {"type": "string"},
                        "value": {"type": "number", "minimum": 0}
                    }
                }
            })),
        ));
        ids.insert("Measurement", measurement);
        let curator = provenance.insert(DigitalObject::new(
            ROLE_TYPE,
            content(json!({"name": "Curator"})),
        ));
        ids.insert("Curator", curator);
        let alice = entities.insert(
            DigitalObject::new("User", content(json!({"name": "alice"}))).with_id("entity/alice"),
        );
        ids.insert("alice", alice);

        Self {
            clock,
            entities,
            provenance,
            ids,
        }
    }

    /// Id of a registered event type, role or agent.
    pub fn id(&self, name: &str) -> &str {
        self.ids
            .get(name)
            .map(String::as_str)
            .unwrap_or_else(|| panic!("no fixture object named {name}"))
    }

    pub fn capture(&self, config: CaptureConfig) -> EventCapture {
        EventCapture::new(
            self.entities.clone(),
            self.provenance.clone(),
            self.clock.clone(),
            config,
        )
    }

    /// Provenance records written so far, in creation order.
    pub fn records(&self) -> Vec<ProvenanceRecord> {
        self.provenance
            .all_objects()
            .iter()
            .filter(|o| o.object_type == PROVENANCE_RECORD_TYPE)
            .map(|o| ProvenanceRecord::from_object(o).unwrap())
            .collect()
    }
}
