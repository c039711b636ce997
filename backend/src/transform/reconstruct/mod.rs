//! Split transaction reconstruction.
//!
//! Turns projected ledger rows into a ledger of split transactions:
//!
//! ```text
//! projected rows
//!   │ pass 1  account legs (strategy)       from_account_id / to_account_id
//!   │ pass 2  identities                    id
//!   │ pass 3  split groups                  split_id
//!   │ pass 4  parent-field inheritance      name / date / transaction_type
//!   ▼ filter  group size > 1
//! ledger rows
//! ```
//!
//! Every pass reads a frozen slice and returns a new vector, so no pass ever
//! observes a neighbour half-way through its own transformation.

pub mod strategy;

use std::collections::HashMap;

use crate::models::{is_unset, LedgerRow};

use super::ids::IdGenerator;
pub use strategy::{
    detect_strategy, AccountLegs, DeferredTransfer, ReconstructionStrategy, StrategyKind,
    TypeBoundary,
};

/// Output of a reconstruction run.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Final rows in report order.
    pub rows: Vec<LedgerRow>,
    /// Strategy that ran pass 1.
    pub strategy: StrategyKind,
    /// Rows entering the reconstruction.
    pub input_rows: usize,
    /// Rows with no projected content.
    pub blank_rows: usize,
    /// Split groups kept in the output.
    pub group_count: usize,
    /// Non-blank rows dropped because their group had a single line.
    pub standalone_dropped: usize,
}

/// Run all passes.
pub fn reconstruct(
    rows: &[LedgerRow],
    strategy: &dyn ReconstructionStrategy,
    ids: &mut dyn IdGenerator,
    keep_standalone: bool,
) -> Reconstruction {
    let with_accounts = apply_account_legs(rows, &strategy.infer_accounts(rows));
    let identified = assign_ids(&with_accounts, ids);
    let mut grouped = assign_split_groups(&identified, strategy);
    if strategy.clears_member_targets() {
        grouped = clear_member_targets(&grouped);
    }
    let inherited = inherit_parent_fields(&grouped);
    let sizes = group_sizes(&inherited);
    let kept = filter_groups(&inherited, keep_standalone);

    let blank_rows = inherited.iter().filter(|r| r.id.is_empty()).count();
    let standalone_dropped = if keep_standalone {
        0
    } else {
        inherited.len() - blank_rows - kept.len()
    };

    Reconstruction {
        group_count: sizes.values().filter(|&&size| size > 1).count(),
        rows: kept,
        strategy: strategy.kind(),
        input_rows: rows.len(),
        blank_rows,
        standalone_dropped,
    }
}

/// Pass 1: write inferred legs, then drop any `to` whose `from` is unset.
pub fn apply_account_legs(rows: &[LedgerRow], legs: &[AccountLegs]) -> Vec<LedgerRow> {
    rows.iter()
        .zip(legs)
        .map(|(row, legs)| {
            let mut out = row.clone();
            out.from_account_id = legs.from.clone().filter(|v| !v.trim().is_empty());
            out.to_account_id = if is_unset(&out.from_account_id) {
                None
            } else {
                legs.to.clone().filter(|v| !v.trim().is_empty())
            };
            out
        })
        .collect()
}

/// Pass 2: every non-blank row gets a fresh identity, blank rows get "".
pub fn assign_ids(rows: &[LedgerRow], ids: &mut dyn IdGenerator) -> Vec<LedgerRow> {
    rows.iter()
        .map(|row| {
            let mut out = row.clone();
            out.id = if row.is_blank() {
                String::new()
            } else {
                ids.next_id()
            };
            out
        })
        .collect()
}

/// Pass 3: consecutive non-blank rows share the first row's id as
/// `split_id`; the anchor itself keeps an empty `split_id`. A group ends at a
/// blank row or at a row the strategy marks as a transaction start.
pub fn assign_split_groups(
    rows: &[LedgerRow],
    strategy: &dyn ReconstructionStrategy,
) -> Vec<LedgerRow> {
    let mut current = String::new();
    let mut active = false;

    rows.iter()
        .map(|row| {
            let mut out = row.clone();
            if row.id.is_empty() {
                active = false;
                out.split_id = String::new();
            } else {
                if !active || strategy.starts_group(row) {
                    current = row.id.clone();
                    active = true;
                }
                out.split_id = if current == row.id {
                    String::new()
                } else {
                    current.clone()
                };
            }
            out
        })
        .collect()
}

/// Split members lose their `to_account_id`; the anchor carries the pair.
pub fn clear_member_targets(rows: &[LedgerRow]) -> Vec<LedgerRow> {
    rows.iter()
        .map(|row| {
            let mut out = row.clone();
            if !row.split_id.is_empty() {
                out.to_account_id = None;
            }
            out
        })
        .collect()
}

/// Pass 4: members take `name`, `date` and `transaction_type` from their
/// anchor when their own value is blank (or the date is missing).
pub fn inherit_parent_fields(rows: &[LedgerRow]) -> Vec<LedgerRow> {
    let anchors: HashMap<&str, &LedgerRow> = rows
        .iter()
        .filter(|r| r.split_id.is_empty() && !r.id.is_empty())
        .map(|r| (r.id.as_str(), r))
        .collect();

    rows.iter()
        .map(|row| {
            let mut out = row.clone();
            let anchor = match anchors.get(row.split_id.as_str()) {
                Some(anchor) if !row.split_id.is_empty() => anchor,
                _ => return out,
            };

            if out.name.trim().is_empty() {
                out.name = anchor.name.clone();
            }
            if out.date.is_none() {
                out.date = anchor.date.clone();
            }
            if !out.is_typed() {
                out.transaction_type = anchor.transaction_type.clone();
            }
            out
        })
        .collect()
}

/// Number of non-blank rows per group key.
pub fn group_sizes(rows: &[LedgerRow]) -> HashMap<String, usize> {
    let mut sizes: HashMap<String, usize> = HashMap::new();
    for row in rows.iter().filter(|r| !r.id.is_empty()) {
        *sizes.entry(row.group_key().to_string()).or_default() += 1;
    }
    sizes
}

/// Keep non-blank rows whose group has more than one line, or every
/// non-blank row when `keep_standalone` is set.
pub fn filter_groups(rows: &[LedgerRow], keep_standalone: bool) -> Vec<LedgerRow> {
    let sizes = group_sizes(rows);

    rows.iter()
        .filter(|row| !row.id.is_empty())
        .filter(|row| keep_standalone || sizes.get(row.group_key()).copied().unwrap_or(0) > 1)
        .cloned()
        .collect()
}
