//! Types shared across pipeline stages.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::sharepoint::types::DriveItem;

/// One eligible report record, normalized at the ingestion boundary.
#[derive(Debug, Clone)]
pub struct ReportRecord {
    /// List row id, used for the processed-flag write-back.
    pub item_id: String,
    /// Drive-relative folder path (library-root prefix already stripped).
    pub path: String,
    /// Base name, always carrying the workbook extension.
    pub filename: String,
    pub owner: String,
    /// When the list row last changed, as reported by the list.
    /// Informational.
    pub modified: Option<DateTime<Utc>>,
}

/// Interpret a loosely typed processed-flag field.
///
/// Absent and null read as "not processed". `None` means the value has a
/// shape this parser does not recognize; the caller logs it and treats the
/// row as unprocessed, so a malformed flag is picked up rather than
/// silently skipped forever.
pub fn parse_processed_flag(value: Option<&Value>) -> Option<bool> {
    match value {
        None | Some(Value::Null) => Some(false),
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" | "" => Some(false),
            _ => None,
        },
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v == 0.0 => Some(false),
            Some(v) if v == 1.0 => Some(true),
            _ => None,
        },
        _ => None,
    }
}

/// Which resolution strategy produced a file, in fixed attempt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StrategyKind {
    DirectPath,
    ExactNameSearch,
    FuzzySearch,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::DirectPath => "direct path",
            StrategyKind::ExactNameSearch => "exact-name search",
            StrategyKind::FuzzySearch => "fuzzy search",
        };
        f.write_str(name)
    }
}

/// A located workbook: its content plus how it was found. Owned by the
/// orchestrator for one item and dropped after extraction.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub item: DriveItem,
    pub content: Vec<u8>,
    pub strategy: StrategyKind,
}

/// Pipeline stage an item failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStage {
    Resolve,
    Extract,
    Publish,
    Track,
}

impl fmt::Display for ItemStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemStage::Resolve => "resolve",
            ItemStage::Extract => "extract",
            ItemStage::Publish => "publish",
            ItemStage::Track => "track",
        };
        f.write_str(name)
    }
}

/// One contained per-item failure, kept for the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub item_id: String,
    pub filename: String,
    pub stage: ItemStage,
    pub message: String,
}

/// Outcome of a full run, serializable for the embedding caller. Counts
/// track how far items got, stage by stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Rows seen in the list before eligibility filtering.
    pub scanned: usize,
    /// Rows that passed the eligibility filter.
    pub discovered: usize,
    pub resolved: usize,
    pub extracted: usize,
    pub published_remote: usize,
    pub published_local: usize,
    /// Items whose processed flag was set (fully done).
    pub marked: usize,
    pub failures: Vec<ItemFailure>,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn empty() -> Self {
        Self::default()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "discovered {}, resolved {}, extracted {}, published {} ({} remote / {} local), marked {}, failed {} in {} ms",
            self.discovered,
            self.resolved,
            self.extracted,
            self.published_remote + self.published_local,
            self.published_remote,
            self.published_local,
            self.marked,
            self.failures.len(),
            self.duration_ms
        )
    }
}
