//! Workbook extraction.
//!
//! Reports arrive as spreadsheets filled into a fixed template: scalar
//! headers, three small tables, two free-text blocks, always at the same
//! cells. [`grid`] gives normalized cell access over the raw workbook bytes
//! and [`report`] reads the template layout out of it.

pub mod grid;
pub mod report;

use thiserror::Error;

pub use grid::{CellRect, SheetGrid};
pub use report::{ExtractedReport, IssueRow, RiskRow, StandardRow};

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The bytes are not a readable workbook.
    #[error("failed to open workbook: {0}")]
    Workbook(String),

    #[error("workbook has no worksheets")]
    NoWorksheet,

    #[error("failed to read sheet '{0}': {1}")]
    Sheet(String, String),
}

/// Extract one report from raw workbook bytes.
///
/// Absent cells become `None` fields and empty table sections; only an
/// unreadable workbook is an error.
pub fn extract_report(bytes: &[u8]) -> Result<ExtractedReport, ExtractError> {
    let mut grid = SheetGrid::from_workbook_bytes(bytes)?;
    if grid.normalize_merges(report::MERGE_ANCHOR, &report::MERGE_RECT) {
        tracing::debug!("Removed merged ranges overlapping the table block");
    }
    Ok(ExtractedReport::from_grid(&grid))
}
