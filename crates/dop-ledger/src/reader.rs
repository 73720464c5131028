use std::sync::Arc;

use dop_store::{ObjectRepository, Query};
use dop_types::DigitalObject;
use tracing::warn;

use crate::error::LedgerResult;
use crate::records::{ProvenanceRecord, PROVENANCE_RECORD_TYPE};

/// Read boundary of the provenance ledger.
#[derive(Clone)]
pub struct ProvenanceReader {
    store: Arc<dyn ObjectRepository>,
}

impl ProvenanceReader {
    pub fn new(store: Arc<dyn ObjectRepository>) -> Self {
        Self { store }
    }

    fn entity_query(entity_id: &str) -> Query {
        Query::of_type(PROVENANCE_RECORD_TYPE).content("entityId", entity_id)
    }

    /// Raw record objects for an entity, in store order.
    pub async fn record_objects(&self, entity_id: &str) -> LedgerResult<Vec<DigitalObject>> {
        Ok(self.store.search_all(&Self::entity_query(entity_id)).await?)
    }

    /// Decoded records for an entity, in store order.
    ///
    /// Objects that do not decode as provenance records are skipped.
    pub async fn records_for_entity(&self, entity_id: &str) -> LedgerResult<Vec<ProvenanceRecord>> {
        let objects = self.record_objects(entity_id).await?;
        Ok(objects
            .iter()
            .filter_map(|object| match ProvenanceRecord::from_object(object) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(entity_id = %entity_id, error = %e, "skipping undecodable provenance record");
                    None
                }
            })
            .collect())
    }

    /// Records for an entity whose event type is one of `event_type_ids`.
    pub async fn records_with_event_types(
        &self,
        entity_id: &str,
        event_type_ids: &[String],
    ) -> LedgerResult<Vec<ProvenanceRecord>> {
        let mut records = self.records_for_entity(entity_id).await?;
        records.retain(|r| event_type_ids.contains(&r.content.event_type_id));
        Ok(records)
    }
}
