//! List scanning and eligibility filtering.
//!
//! The scanner reads every row of the record list and keeps the ones worth
//! processing: not yet marked processed, owned by the configured owner, and
//! carrying both a path and a filename. Everything else is skipped with a
//! debug line naming the reason, never an error.

use serde_json::Value;

use crate::config::PipelineSettings;
use crate::pipeline::types::{parse_processed_flag, ReportRecord};
use crate::sharepoint::types::{ListStore, RawListItem};
use crate::sharepoint::StoreError;

// Column names as they appear in the list schema.
pub const FIELD_PATH: &str = "Path";
pub const FIELD_FILENAME: &str = "Filename";
pub const FIELD_OWNER: &str = "Manager";
pub const FIELD_PROCESSED: &str = "Processed";

/// What a scan saw and what survived the filter.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Total rows in the list.
    pub scanned: usize,
    pub records: Vec<ReportRecord>,
}

pub struct ListScanner {
    list_id: String,
    owner_filter: String,
    library_root: String,
}

impl ListScanner {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            list_id: settings.list_id.clone(),
            owner_filter: settings.owner_filter.clone(),
            library_root: settings.library_root.clone(),
        }
    }

    pub fn scan(&self, store: &dyn ListStore) -> Result<ScanOutcome, StoreError> {
        let rows = store.list_items(&self.list_id)?;
        let scanned = rows.len();

        let records: Vec<ReportRecord> = rows
            .into_iter()
            .filter_map(|row| self.eligible(row))
            .collect();

        tracing::info!(
            scanned,
            eligible = records.len(),
            owner = %self.owner_filter,
            "Scanned report list"
        );
        Ok(ScanOutcome { scanned, records })
    }

    /// Apply the eligibility filter to one row, normalizing it into a
    /// `ReportRecord` when it passes.
    fn eligible(&self, row: RawListItem) -> Option<ReportRecord> {
        let processed = parse_processed_flag(row.fields.get(FIELD_PROCESSED)).unwrap_or_else(|| {
            tracing::warn!(
                item_id = %row.id,
                value = %row.fields.get(FIELD_PROCESSED).cloned().unwrap_or_default(),
                "Unrecognized processed flag, treating row as unprocessed"
            );
            false
        });
        if processed {
            tracing::debug!(item_id = %row.id, "Skipping row: already processed");
            return None;
        }

        let owner = string_field(&row.fields, FIELD_OWNER);
        if owner.as_deref() != Some(self.owner_filter.as_str()) {
            tracing::debug!(
                item_id = %row.id,
                owner = owner.as_deref().unwrap_or("<none>"),
                "Skipping row: owner does not match"
            );
            return None;
        }

        let path = string_field(&row.fields, FIELD_PATH);
        let filename = string_field(&row.fields, FIELD_FILENAME);
        let (Some(path), Some(filename)) = (path, filename) else {
            tracing::debug!(item_id = %row.id, "Skipping row: missing path or filename");
            return None;
        };

        Some(ReportRecord {
            item_id: row.id,
            path: canonical_path(&path, &self.library_root),
            filename: ensure_workbook_extension(filename),
            owner: self.owner_filter.clone(),
            modified: row.modified,
        })
    }
}

/// Rows sometimes record the base name without its extension; resolution
/// and artifact naming both assume it is present.
fn ensure_workbook_extension(filename: String) -> String {
    if filename.to_ascii_lowercase().ends_with(".xlsx") {
        filename
    } else {
        format!("{filename}.xlsx")
    }
}

/// A trimmed, non-empty string field, or `None`.
fn string_field(fields: &serde_json::Map<String, Value>, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Reduce a stored path to its drive-relative form: strip the library-root
/// prefix rows redundantly carry, then any surrounding slashes.
pub fn canonical_path(raw: &str, library_root: &str) -> String {
    let trimmed = raw.trim();
    let root = library_root.trim_end_matches('/');
    let stripped = trimmed.strip_prefix(root).unwrap_or(trimmed);
    stripped.trim_matches('/').to_string()
}
