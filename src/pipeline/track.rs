//! Processed-flag tracking.
//!
//! The flag write-back is the last stage of an item: it only runs once the
//! artifact has a durable home, so a crash in between re-processes the item
//! on the next run rather than losing it.

use crate::config::PipelineSettings;
use crate::pipeline::types::ReportRecord;
use crate::sharepoint::types::ListStore;
use crate::sharepoint::StoreError;

pub struct ProcessedTracker {
    list_id: String,
}

impl ProcessedTracker {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            list_id: settings.list_id.clone(),
        }
    }

    pub fn mark_processed(
        &self,
        store: &dyn ListStore,
        record: &ReportRecord,
    ) -> Result<(), StoreError> {
        store.set_processed(&self.list_id, &record.item_id)?;
        tracing::info!(item_id = %record.item_id, "Marked record processed");
        Ok(())
    }
}
