//! Cell-level access over one worksheet.
//!
//! `SheetGrid` wraps the first worksheet of a workbook together with its
//! merged-range records. Reads go through [`SheetGrid::value_at`], which
//! follows merges to their anchor cell, and the template reader can strip
//! merges from a rectangle first so each cell reads its own stored value
//! (the anchor keeps the text, covered cells read empty).

use std::io::Cursor;

use calamine::{Data, Dimensions, Range, Reader, Xlsx};

use super::ExtractError;

/// An inclusive cell rectangle, zero-based.
#[derive(Debug, Clone, Copy)]
pub struct CellRect {
    pub first_row: u32,
    pub last_row: u32,
    pub first_col: u32,
    pub last_col: u32,
}

impl CellRect {
    fn intersects(&self, merge: &Dimensions) -> bool {
        let (start_row, start_col) = merge.start;
        let (end_row, end_col) = merge.end;
        !(end_col < self.first_col
            || start_col > self.last_col
            || end_row < self.first_row
            || start_row > self.last_row)
    }
}

fn merge_contains(merge: &Dimensions, cell: (u32, u32)) -> bool {
    let (row, col) = cell;
    (merge.start.0..=merge.end.0).contains(&row) && (merge.start.1..=merge.end.1).contains(&col)
}

#[derive(Debug)]
pub struct SheetGrid {
    range: Range<Data>,
    merges: Vec<Dimensions>,
}

impl SheetGrid {
    /// Open workbook bytes and load the first worksheet with its merges.
    pub fn from_workbook_bytes(bytes: &[u8]) -> Result<Self, ExtractError> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))
            .map_err(|e| ExtractError::Workbook(e.to_string()))?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(ExtractError::NoWorksheet)?;

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ExtractError::Sheet(sheet_name.clone(), e.to_string()))?;

        workbook
            .load_merged_regions()
            .map_err(|e| ExtractError::Sheet(sheet_name.clone(), e.to_string()))?;
        let merges = match workbook.worksheet_merge_cells(&sheet_name) {
            Some(Ok(regions)) => regions.to_vec(),
            // A sheet without merge records reads as plain cells.
            Some(Err(_)) | None => Vec::new(),
        };

        Ok(Self { range, merges })
    }

    /// Drop merge records intersecting `rect`, but only when `anchor` itself
    /// sits inside a merge (the signal that the template still carries its
    /// decorative merges). Calling this again is a no-op.
    pub fn normalize_merges(&mut self, anchor: (u32, u32), rect: &CellRect) -> bool {
        let anchor_merged = self.merges.iter().any(|m| merge_contains(m, anchor));
        if !anchor_merged {
            return false;
        }
        self.merges.retain(|m| !rect.intersects(m));
        true
    }

    /// The rendered value at a cell, following any remaining merge to its
    /// anchor. `None` for empty, error and whitespace-only cells.
    pub fn value_at(&self, row: u32, col: u32) -> Option<String> {
        let (row, col) = self
            .merges
            .iter()
            .find(|m| merge_contains(m, (row, col)))
            .map(|m| m.start)
            .unwrap_or((row, col));
        self.range.get_value((row, col)).and_then(render)
    }
}

/// Render one cell value the way it reads in the sheet. Integral floats
/// lose their fraction, dates render ISO, errors read as absent.
fn render(data: &Data) -> Option<String> {
    match data {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Some(format!("{}", *f as i64))
            } else {
                Some(f.to_string())
            }
        }
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => dt.as_datetime().map(|d| {
            if d.time() == chrono::NaiveTime::MIN {
                d.format("%Y-%m-%d").to_string()
            } else {
                d.format("%Y-%m-%d %H:%M:%S").to_string()
            }
        }),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}
