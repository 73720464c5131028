use std::sync::Arc;

use dop_store::ObjectRepository;
use tracing::info;

use crate::error::LedgerResult;
use crate::records::ProvenanceRecord;

/// Write boundary of the provenance ledger.
///
/// The only operation is `append`: records are created once and never
/// updated or deleted through this system.
#[derive(Clone)]
pub struct ProvenanceWriter {
    store: Arc<dyn ObjectRepository>,
}

impl ProvenanceWriter {
    pub fn new(store: Arc<dyn ObjectRepository>) -> Self {
        Self { store }
    }

    /// Persist a record as a new object and return it as stored.
    pub async fn append(&self, record: &ProvenanceRecord) -> LedgerResult<ProvenanceRecord> {
        let object = record.to_object()?;
        let stored = self.store.create(&object).await?;
        let saved = ProvenanceRecord::from_object(&stored)?;
        info!(
            record_id = saved.id.as_deref().unwrap_or_default(),
            entity_id = %saved.content.entity_id,
            event_type_id = %saved.content.event_type_id,
            "provenance record written"
        );
        Ok(saved)
    }
}
