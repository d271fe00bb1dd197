//! The fixed report template and its text artifact.
//!
//! Report workbooks are filled copies of one template, so every field has a
//! fixed address: scalar headers in column G, three tables keyed on their
//! column-D cell, and two free-text blocks. A table row exists exactly when
//! its column-D cell is non-empty; other cells may be blank and read as
//! empty strings in the artifact.

use std::ops::RangeInclusive;

use serde::Serialize;

use super::grid::{CellRect, SheetGrid};

/// Cell whose merge state decides whether merge normalization runs (E33).
pub const MERGE_ANCHOR: (u32, u32) = (32, 4);

/// Rectangle the normalization strips merges from (D31:S72), covering the
/// three tables and both free-text blocks.
pub const MERGE_RECT: CellRect = CellRect {
    first_row: 30,
    last_row: 71,
    first_col: 3,
    last_col: 18,
};

// Scalar header cells (G7, G11, G13).
const WEEK_ENDING: (u32, u32) = (6, 6);
const SERVICE_PROVIDER: (u32, u32) = (10, 6);
const CLIENT: (u32, u32) = (12, 6);

// Table row bands (rows 34-42, 45-47 and 50-52 in sheet numbering).
const STANDARD_ROWS: RangeInclusive<u32> = 33..=41;
const RISK_ROWS: RangeInclusive<u32> = 44..=46;
const ISSUE_ROWS: RangeInclusive<u32> = 49..=51;

// Table columns.
const COL_D: u32 = 3;
const COL_E: u32 = 4;
const COL_H: u32 = 7;
const COL_J: u32 = 9;
const COL_K: u32 = 10;

// Free-text blocks (D57, D67).
const PLANNED_ACTIVITIES: (u32, u32) = (56, 3);
const CLIENT_UPDATES: (u32, u32) = (66, 3);

/// One service-standard row (D / J / K).
#[derive(Debug, Clone, Serialize)]
pub struct StandardRow {
    pub ssn: String,
    pub status: Option<String>,
    pub comments: Option<String>,
}

/// One risk row (D / E / H / J / K).
#[derive(Debug, Clone, Serialize)]
pub struct RiskRow {
    pub number: String,
    pub description: Option<String>,
    pub likelihood: Option<String>,
    pub impact: Option<String>,
    pub mitigation: Option<String>,
}

/// One issue row (D / E / J / K).
#[derive(Debug, Clone, Serialize)]
pub struct IssueRow {
    pub number: String,
    pub description: Option<String>,
    pub impact: Option<String>,
    pub mitigation: Option<String>,
}

/// Everything extracted from one report workbook.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedReport {
    pub week_ending: Option<String>,
    pub service_provider: Option<String>,
    pub client: Option<String>,
    pub standards: Vec<StandardRow>,
    pub risks: Vec<RiskRow>,
    pub issues: Vec<IssueRow>,
    pub planned_activities: Option<String>,
    pub client_updates: Option<String>,
}

impl ExtractedReport {
    /// Read the template layout out of a (merge-normalized) grid.
    pub fn from_grid(grid: &SheetGrid) -> Self {
        let week_ending = grid.value_at(WEEK_ENDING.0, WEEK_ENDING.1);
        let service_provider = grid.value_at(SERVICE_PROVIDER.0, SERVICE_PROVIDER.1);
        let client = grid.value_at(CLIENT.0, CLIENT.1);

        if week_ending.is_none() && service_provider.is_none() && client.is_none() {
            // Likely a workbook that is not a filled template; extraction
            // still proceeds and yields an empty-shaped artifact.
            tracing::warn!("All header cells are empty, workbook may not match the template");
        }

        let standards = STANDARD_ROWS
            .filter_map(|row| {
                grid.value_at(row, COL_D).map(|ssn| StandardRow {
                    ssn,
                    status: grid.value_at(row, COL_J),
                    comments: grid.value_at(row, COL_K),
                })
            })
            .collect();

        let risks = RISK_ROWS
            .filter_map(|row| {
                grid.value_at(row, COL_D).map(|number| RiskRow {
                    number,
                    description: grid.value_at(row, COL_E),
                    likelihood: grid.value_at(row, COL_H),
                    impact: grid.value_at(row, COL_J),
                    mitigation: grid.value_at(row, COL_K),
                })
            })
            .collect();

        let issues = ISSUE_ROWS
            .filter_map(|row| {
                grid.value_at(row, COL_D).map(|number| IssueRow {
                    number,
                    description: grid.value_at(row, COL_E),
                    impact: grid.value_at(row, COL_J),
                    mitigation: grid.value_at(row, COL_K),
                })
            })
            .collect();

        Self {
            week_ending,
            service_provider,
            client,
            standards,
            risks,
            issues,
            planned_activities: grid.value_at(PLANNED_ACTIVITIES.0, PLANNED_ACTIVITIES.1),
            client_updates: grid.value_at(CLIENT_UPDATES.0, CLIENT_UPDATES.1),
        }
    }

    /// Render the pipe-delimited text artifact. Deterministic for a given
    /// report: fixed section order, blank line before each section header,
    /// absent values as empty strings, single trailing newline.
    pub fn to_artifact_text(&self) -> String {
        fn opt(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("")
        }

        let mut out = String::new();
        out.push_str(&format!("Week Ending: {}\n", opt(&self.week_ending)));
        out.push_str(&format!("Service Provider: {}\n", opt(&self.service_provider)));
        out.push_str(&format!("Client: {}\n", opt(&self.client)));

        out.push_str("\nService Standard updates:\nSSN|Status|Comments\n");
        for row in &self.standards {
            out.push_str(&format!(
                "{}|{}|{}\n",
                row.ssn,
                opt(&row.status),
                opt(&row.comments)
            ));
        }

        out.push_str("\nService Risks:\nRisk No|Description|Likelihood|Impact|Mitigation\n");
        for row in &self.risks {
            out.push_str(&format!(
                "{}|{}|{}|{}|{}\n",
                row.number,
                opt(&row.description),
                opt(&row.likelihood),
                opt(&row.impact),
                opt(&row.mitigation)
            ));
        }

        out.push_str("\nService Issues:\nIssue No|Description|Impact|Mitigation\n");
        for row in &self.issues {
            out.push_str(&format!(
                "{}|{}|{}|{}\n",
                row.number,
                opt(&row.description),
                opt(&row.impact),
                opt(&row.mitigation)
            ));
        }

        out.push_str("\nPlanned Activities:\n");
        out.push_str(opt(&self.planned_activities));
        out.push('\n');

        out.push_str("\nClient Updates:\n");
        out.push_str(opt(&self.client_updates));
        out.push('\n');

        out
    }
}

/// Artifact filename for a source workbook name: final extension swapped
/// for `.txt`.
pub fn artifact_name(source_filename: &str) -> String {
    let stem = match source_filename.rfind('.') {
        Some(idx) if idx > 0 => &source_filename[..idx],
        _ => source_filename,
    };
    format!("{stem}.txt")
}
