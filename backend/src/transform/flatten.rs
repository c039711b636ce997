//! Flatten a nested report document into detail rows.
//!
//! ```text
//! Columns.Column[]            Rows.Row[] (sections)
//!   ColTitle                    Header.ColData[0].id  ──┐
//!                               Rows.Row[]              │ header_id
//!                                 ColData[]  ──────────▶ FlatRow
//! ```

use serde_json::Value;

use crate::error::{ReportError, ReportResult};
use crate::models::{FlatRow, RawCell};

/// A flattened report: declared columns plus one row per detail line.
#[derive(Debug, Clone, Default)]
pub struct FlatReport {
    /// Column titles in declared order.
    pub columns: Vec<String>,
    /// Detail rows in source order.
    pub rows: Vec<FlatRow>,
    /// Number of sections in the report.
    pub section_count: usize,
}

/// Read the declared column titles.
pub fn column_titles(document: &Value) -> ReportResult<Vec<String>> {
    let columns = match document.pointer("/Columns/Column") {
        Some(Value::Array(columns)) => columns,
        Some(_) => return Err(ReportError::malformed(0, 0, "Columns.Column is not an array")),
        None => return Ok(Vec::new()),
    };

    columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            col.get("ColTitle")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ReportError::malformed(0, 0, format!("column {} has no ColTitle", i)))
        })
        .collect()
}

/// Flatten the report into detail rows.
///
/// Sections without detail rows contribute nothing. A detail row whose cell
/// count differs from the declared column count is a
/// [`ReportError::SchemaMismatch`].
pub fn flatten_report(document: &Value) -> ReportResult<FlatReport> {
    let columns = column_titles(document)?;

    let sections: &[Value] = match document.pointer("/Rows/Row") {
        Some(Value::Array(sections)) => sections.as_slice(),
        Some(_) => return Err(ReportError::malformed(0, 0, "Rows.Row is not an array")),
        None => &[],
    };

    let mut rows = Vec::new();
    for (section_idx, section) in sections.iter().enumerate() {
        let header_id = header_id(section);

        let details: &[Value] = match section.pointer("/Rows/Row") {
            Some(Value::Array(details)) => details.as_slice(),
            Some(_) => {
                return Err(ReportError::malformed(section_idx, 0, "section Rows.Row is not an array"))
            }
            None => &[],
        };

        for (row_idx, detail) in details.iter().enumerate() {
            rows.push(flatten_detail(detail, &columns, &header_id, section_idx, row_idx)?);
        }
    }

    Ok(FlatReport {
        columns,
        rows,
        section_count: sections.len(),
    })
}

/// Id of the section header's first cell, "" when absent.
fn header_id(section: &Value) -> String {
    section
        .pointer("/Header/ColData/0/id")
        .map(|id| match id {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

fn flatten_detail(
    detail: &Value,
    columns: &[String],
    header_id: &str,
    section: usize,
    row: usize,
) -> ReportResult<FlatRow> {
    let cells = detail
        .get("ColData")
        .and_then(Value::as_array)
        .ok_or_else(|| ReportError::malformed(section, row, "detail row has no ColData array"))?;

    if cells.len() != columns.len() {
        return Err(ReportError::SchemaMismatch {
            section,
            row,
            expected: columns.len(),
            found: cells.len(),
        });
    }

    let cells = columns
        .iter()
        .zip(cells)
        .map(|(title, cell)| {
            RawCell::from_json(cell)
                .map(|cell| (title.clone(), cell))
                .map_err(|reason| ReportError::malformed(section, row, format!("{}: {}", title, reason)))
        })
        .collect::<ReportResult<Vec<_>>>()?;

    Ok(FlatRow {
        header_id: header_id.to_string(),
        cells,
    })
}
