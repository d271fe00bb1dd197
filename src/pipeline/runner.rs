//! Run orchestration.
//!
//! One run is a straight pass over the eligible records: resolve (content
//! included), extract, publish, mark. Records are independent, so any
//! per-item failure is recorded in the summary and the loop moves on; only
//! failures that poison the whole run (connection loss, rejected
//! credentials) abort it. The processed flag is set last, after the
//! artifact is durably published, so an interrupted item is retried on the
//! next run.

use std::time::Instant;

use thiserror::Error;

use crate::config::PipelineSettings;
use crate::pipeline::extract::report::artifact_name;
use crate::pipeline::extract::{extract_report, ExtractedReport};
use crate::pipeline::publish::{ArtifactPublisher, PublishError, PublishLocation};
use crate::pipeline::resolve::FileResolver;
use crate::pipeline::scan::ListScanner;
use crate::pipeline::track::ProcessedTracker;
use crate::pipeline::types::{ItemFailure, ItemStage, ReportRecord, RunSummary};
use crate::sharepoint::types::{FileStore, ListStore};
use crate::sharepoint::StoreError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The initial list scan failed; nothing was processed.
    #[error("failed to scan report list: {0}")]
    Scan(#[source] StoreError),

    /// A run-fatal store failure mid-run. Items already processed keep
    /// their flags; the rest are picked up next run.
    #[error("run aborted: {0}")]
    Fatal(#[source] StoreError),
}

/// How one item ended, before it is folded into the summary.
enum ItemError {
    Fatal(StoreError),
    Contained { stage: ItemStage, message: String },
}

/// Demote a store error to a contained item failure unless it is run-fatal.
fn store_error_at(stage: ItemStage, e: StoreError) -> ItemError {
    if e.is_fatal() {
        ItemError::Fatal(e)
    } else {
        ItemError::Contained {
            stage,
            message: e.to_string(),
        }
    }
}

pub struct ReportPipeline {
    scanner: ListScanner,
    resolver: FileResolver,
    publisher: ArtifactPublisher,
    tracker: ProcessedTracker,
}

impl ReportPipeline {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            scanner: ListScanner::new(settings),
            resolver: FileResolver::new(settings),
            publisher: ArtifactPublisher::new(settings),
            tracker: ProcessedTracker::new(settings),
        }
    }

    /// Run the pipeline once over the current state of the list.
    pub fn run(
        &self,
        list_store: &dyn ListStore,
        file_store: &dyn FileStore,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let outcome = self.scanner.scan(list_store).map_err(PipelineError::Scan)?;

        let mut summary = RunSummary::empty();
        summary.scanned = outcome.scanned;
        summary.discovered = outcome.records.len();

        for record in &outcome.records {
            match self.process_record(list_store, file_store, record, &mut summary) {
                Ok(()) => {}
                Err(ItemError::Fatal(e)) => {
                    tracing::error!(
                        item_id = %record.item_id,
                        error = %e,
                        "Fatal store failure, aborting run"
                    );
                    return Err(PipelineError::Fatal(e));
                }
                Err(ItemError::Contained { stage, message }) => {
                    tracing::error!(
                        item_id = %record.item_id,
                        filename = %record.filename,
                        stage = %stage,
                        error = %message,
                        "Item failed, continuing with the next record"
                    );
                    summary.failures.push(ItemFailure {
                        item_id: record.item_id.clone(),
                        filename: record.filename.clone(),
                        stage,
                        message,
                    });
                }
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(summary = %summary, "Run complete");
        Ok(summary)
    }

    fn process_record(
        &self,
        list_store: &dyn ListStore,
        file_store: &dyn FileStore,
        record: &ReportRecord,
        summary: &mut RunSummary,
    ) -> Result<(), ItemError> {
        let resolved = self
            .resolver
            .resolve(file_store, record)
            .map_err(|e| store_error_at(ItemStage::Resolve, e))?
            .ok_or_else(|| ItemError::Contained {
                stage: ItemStage::Resolve,
                message: "no resolution strategy located the file".to_string(),
            })?;
        summary.resolved += 1;

        let report: ExtractedReport =
            extract_report(&resolved.content).map_err(|e| ItemError::Contained {
                stage: ItemStage::Extract,
                message: e.to_string(),
            })?;
        summary.extracted += 1;

        let name = artifact_name(&record.filename);
        let location = self
            .publisher
            .publish(file_store, &name, &report.to_artifact_text())
            .map_err(|e| match e {
                PublishError::Store(store_err) => store_error_at(ItemStage::Publish, store_err),
                local => ItemError::Contained {
                    stage: ItemStage::Publish,
                    message: local.to_string(),
                },
            })?;
        match location {
            PublishLocation::Remote => summary.published_remote += 1,
            PublishLocation::Local => summary.published_local += 1,
        }

        self.tracker
            .mark_processed(list_store, record)
            .map_err(|e| store_error_at(ItemStage::Track, e))?;
        summary.marked += 1;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        PipelineSettings, StaticConfig, SETTING_DRIVE_ID, SETTING_LIBRARY_ROOT, SETTING_LIST_ID,
        SETTING_OUTPUT_DIR, SETTING_OWNER_FILTER, SETTING_REMOTE_OUTPUT_FOLDER, SETTING_SITE_HOST,
        SETTING_SITE_ID,
    };
    use crate::pipeline::scan::{FIELD_FILENAME, FIELD_OWNER, FIELD_PATH, FIELD_PROCESSED};
    use crate::sharepoint::mock::{
        FailureKind, MockStore, OP_ITEM_BY_PATH, OP_SET_PROCESSED, OP_UPLOAD,
    };
    use crate::sharepoint::types::DriveItem;
    use serde_json::{json, Map, Value};

    fn settings(output_dir: &std::path::Path) -> PipelineSettings {
        let provider = StaticConfig::new()
            .with(SETTING_SITE_HOST, "contoso.sharepoint.com")
            .with(SETTING_SITE_ID, "site-1")
            .with(SETTING_LIST_ID, "list-1")
            .with(SETTING_DRIVE_ID, "drive-1")
            .with(SETTING_LIBRARY_ROOT, "/sites/Team/Shared Documents")
            .with(SETTING_OWNER_FILTER, "Alice")
            .with(SETTING_REMOTE_OUTPUT_FOLDER, "Reports/Out")
            .with(SETTING_OUTPUT_DIR, &output_dir.display().to_string());
        PipelineSettings::from_provider(&provider).unwrap()
    }

    fn fields(path: &str, filename: &str, owner: &str, processed: Value) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert(FIELD_PATH.into(), json!(path));
        m.insert(FIELD_FILENAME.into(), json!(filename));
        m.insert(FIELD_OWNER.into(), json!(owner));
        m.insert(FIELD_PROCESSED.into(), processed);
        m
    }

    fn drive_item(id: &str, name: &str) -> DriveItem {
        DriveItem {
            drive_id: "d1".into(),
            item_id: id.into(),
            name: name.into(),
            download_url: None,
        }
    }

    fn workbook_bytes() -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(6, 6, "2025-01-10").unwrap();
        sheet.write_string(10, 6, "Contoso Services").unwrap();
        sheet.write_string(12, 6, "Fabrikam").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn eligible_record_flows_through_all_stages() {
        let dir = tempfile::tempdir().unwrap();
        let store = MockStore::new();
        store.push_item(
            "1",
            fields("Reports/2025", "w1.xlsx", "Alice", json!(false)),
        );
        store.push_item("2", fields("Reports/2025", "w2.xlsx", "Alice", json!(true)));
        store.push_item("3", fields("Reports/2025", "w3.xlsx", "Bob", json!(false)));
        store.add_file(
            "Reports/2025",
            "w1.xlsx",
            drive_item("i1", "w1.xlsx"),
            workbook_bytes(),
        );

        let pipeline = ReportPipeline::new(&settings(dir.path()));
        let summary = pipeline.run(&store, &store).unwrap();

        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.discovered, 1);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.extracted, 1);
        assert_eq!(summary.published_remote, 1);
        assert_eq!(summary.marked, 1);
        assert!(summary.failures.is_empty());
        assert_eq!(store.processed_ids(), vec!["1"]);

        let uploads = store.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].1, "w1.txt");
        let text = String::from_utf8(uploads[0].2.clone()).unwrap();
        assert!(text.starts_with("Week Ending: 2025-01-10\n"));
    }

    #[test]
    fn rerun_after_marking_discovers_nothing() {
        // The Alice scenario, second half: once marked, the same row no
        // longer makes it past the filter.
        let dir = tempfile::tempdir().unwrap();
        let store = MockStore::new();
        store.push_item("1", fields("Reports/2025", "w1.xlsx", "Alice", json!(true)));

        let summary = ReportPipeline::new(&settings(dir.path()))
            .run(&store, &store)
            .unwrap();
        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.discovered, 0);
        assert_eq!(summary.marked, 0);
    }

    #[test]
    fn unresolved_record_is_a_contained_resolve_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = MockStore::new();
        store.push_item(
            "1",
            fields("Reports/2025", "gone.xlsx", "Alice", json!(false)),
        );

        let summary = ReportPipeline::new(&settings(dir.path()))
            .run(&store, &store)
            .unwrap();

        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].stage, ItemStage::Resolve);
        assert_eq!(summary.resolved, 0);
        assert_eq!(summary.marked, 0);
        assert!(store.processed_ids().is_empty());
    }

    #[test]
    fn item_failure_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = MockStore::new();
        store.push_item(
            "1",
            fields("Reports/2025", "bad.xlsx", "Alice", json!(false)),
        );
        store.push_item(
            "2",
            fields("Reports/2025", "good.xlsx", "Alice", json!(false)),
        );
        store.add_file(
            "Reports/2025",
            "bad.xlsx",
            drive_item("i1", "bad.xlsx"),
            b"not a workbook".to_vec(),
        );
        store.add_file(
            "Reports/2025",
            "good.xlsx",
            drive_item("i2", "good.xlsx"),
            workbook_bytes(),
        );

        let summary = ReportPipeline::new(&settings(dir.path()))
            .run(&store, &store)
            .unwrap();

        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].item_id, "1");
        assert_eq!(summary.failures[0].stage, ItemStage::Extract);
        assert_eq!(summary.resolved, 2);
        assert_eq!(summary.extracted, 1);
        assert_eq!(summary.marked, 1);
        assert_eq!(store.processed_ids(), vec!["2"]);
    }

    #[test]
    fn fatal_store_failure_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = MockStore::new();
        store.push_item(
            "1",
            fields("Reports/2025", "w1.xlsx", "Alice", json!(false)),
        );
        store.push_item(
            "2",
            fields("Reports/2025", "w2.xlsx", "Alice", json!(false)),
        );
        store.fail_always(OP_ITEM_BY_PATH, FailureKind::Connection);

        let err = ReportPipeline::new(&settings(dir.path()))
            .run(&store, &store)
            .unwrap_err();

        assert!(matches!(err, PipelineError::Fatal(_)));
        // Abort happened on the first record; the second was never touched.
        assert_eq!(store.calls(OP_ITEM_BY_PATH), 1);
        assert_eq!(store.calls(OP_SET_PROCESSED), 0);
    }

    #[test]
    fn failed_upload_still_completes_the_item_locally() {
        let dir = tempfile::tempdir().unwrap();
        let store = MockStore::new();
        store.push_item(
            "1",
            fields("Reports/2025", "w1.xlsx", "Alice", json!(false)),
        );
        store.add_file(
            "Reports/2025",
            "w1.xlsx",
            drive_item("i1", "w1.xlsx"),
            workbook_bytes(),
        );
        store.fail_always(OP_UPLOAD, FailureKind::ServerError);

        let summary = ReportPipeline::new(&settings(dir.path()))
            .run(&store, &store)
            .unwrap();

        assert_eq!(summary.published_local, 1);
        assert_eq!(summary.published_remote, 0);
        assert_eq!(summary.marked, 1);
        assert_eq!(store.processed_ids(), vec!["1"]);
        assert!(dir.path().join("w1.txt").exists());
    }

    #[test]
    fn track_failure_leaves_the_item_unmarked() {
        let dir = tempfile::tempdir().unwrap();
        let store = MockStore::new();
        store.push_item(
            "1",
            fields("Reports/2025", "w1.xlsx", "Alice", json!(false)),
        );
        store.add_file(
            "Reports/2025",
            "w1.xlsx",
            drive_item("i1", "w1.xlsx"),
            workbook_bytes(),
        );
        store.fail_always(OP_SET_PROCESSED, FailureKind::ServerError);

        let summary = ReportPipeline::new(&settings(dir.path()))
            .run(&store, &store)
            .unwrap();

        // Artifact published, flag not set: the item is retried next run.
        assert_eq!(summary.published_remote, 1);
        assert_eq!(summary.marked, 0);
        assert_eq!(summary.failures[0].stage, ItemStage::Track);
    }

    #[test]
    fn scan_failure_is_its_own_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = MockStore::new();
        store.fail_always(
            crate::sharepoint::mock::OP_LIST_ITEMS,
            FailureKind::ServerError,
        );
        let err = ReportPipeline::new(&settings(dir.path()))
            .run(&store, &store)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Scan(_)));
    }
}
