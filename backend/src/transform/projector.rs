//! Project flat rows into ledger rows.
//!
//! Each cell is first expanded into keyed values (`T value` / `T id` for
//! entity references, `T` otherwise), then the mapping picks the keys it
//! knows. Keys the row lacks leave their field blank.

use crate::models::{FlatRow, LedgerRow, RawCell};

use super::mapping::ColumnMapping;

/// Expand a flat row into `(key, value)` pairs.
pub fn expand_cells(row: &FlatRow) -> Vec<(String, String)> {
    let mut expanded = Vec::with_capacity(row.cells.len() * 2);
    for (title, cell) in &row.cells {
        match cell {
            RawCell::Pair { value, id: Some(id) } => {
                expanded.push((format!("{} value", title), value.clone()));
                expanded.push((format!("{} id", title), id.clone()));
            }
            RawCell::Pair { value, id: None } => expanded.push((title.clone(), value.clone())),
            RawCell::Scalar(value) => expanded.push((title.clone(), value.clone())),
        }
    }
    expanded
}

/// Project one flat row.
pub fn project_row(row: &FlatRow, mapping: &ColumnMapping) -> LedgerRow {
    let expanded = expand_cells(row);
    let mut ledger = LedgerRow::default();

    for rule in &mapping.rules {
        if let Some((_, value)) = expanded.iter().find(|(key, _)| *key == rule.source) {
            ledger.set(rule.target, value);
        }
    }

    ledger
}

/// Project every row, preserving order.
pub fn project_rows(rows: &[FlatRow], mapping: &ColumnMapping) -> Vec<LedgerRow> {
    rows.iter().map(|row| project_row(row, mapping)).collect()
}
