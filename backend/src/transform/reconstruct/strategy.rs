//! Account inference strategies.
//!
//! Reports lay out transfer legs in one of two ways:
//!
//! - **Deferred transfer**: transactions are separated by blank rows and the
//!   destination of a leg is the account of the next row in the same
//!   transaction.
//! - **Type boundary**: transactions follow each other without separators and
//!   a row carrying a transaction type opens a new from/to pair.
//!
//! Both read a frozen snapshot of the projected rows and return one
//! [`AccountLegs`] per row.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::LedgerRow;

/// Resolved account pointers of one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountLegs {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Which strategy to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Detect from the report shape.
    #[default]
    Auto,
    DeferredTransfer,
    TypeBoundary,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Auto => "auto",
            StrategyKind::DeferredTransfer => "deferred",
            StrategyKind::TypeBoundary => "type-boundary",
        }
    }

    /// Resolve `Auto` against the projected rows.
    pub fn resolve(self, rows: &[LedgerRow]) -> StrategyKind {
        match self {
            StrategyKind::Auto => detect_strategy(rows),
            concrete => concrete,
        }
    }

    /// Concrete strategy for a resolved kind.
    pub fn strategy(self, rows: &[LedgerRow]) -> Box<dyn ReconstructionStrategy> {
        match self.resolve(rows) {
            StrategyKind::TypeBoundary => Box::new(TypeBoundary),
            _ => Box::new(DeferredTransfer),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(StrategyKind::Auto),
            "deferred" | "deferred-transfer" => Ok(StrategyKind::DeferredTransfer),
            "type-boundary" | "type" => Ok(StrategyKind::TypeBoundary),
            other => Err(format!(
                "unknown strategy '{}' (expected auto, deferred or type-boundary)",
                other
            )),
        }
    }
}

/// Pass 1 of the reconstruction.
pub trait ReconstructionStrategy {
    fn kind(&self) -> StrategyKind;

    /// Compute account legs for every row.
    fn infer_accounts(&self, rows: &[LedgerRow]) -> Vec<AccountLegs>;

    /// Whether split members drop their `to_account_id` once groups are
    /// known, leaving the pair on the anchor only.
    fn clears_member_targets(&self) -> bool {
        false
    }

    /// Whether `row` opens a new split group even without a blank row
    /// before it.
    fn starts_group(&self, _row: &LedgerRow) -> bool {
        false
    }
}

/// Pick the strategy matching the report shape.
///
/// When a run of non-blank rows holds more than one typed row, blank rows do
/// not separate transactions and the type flag has to mark leg boundaries.
pub fn detect_strategy(rows: &[LedgerRow]) -> StrategyKind {
    let mut typed_in_run = 0;
    for row in rows {
        if row.is_blank() {
            typed_in_run = 0;
            continue;
        }
        if row.is_typed() {
            typed_in_run += 1;
            if typed_in_run > 1 {
                return StrategyKind::TypeBoundary;
            }
        }
    }
    StrategyKind::DeferredTransfer
}

// =============================================================================
// Deferred transfer
// =============================================================================

/// The destination of a row is only known once the next row is seen: each
/// non-blank row writes its account into the previous one's `to`. A blank row
/// ends the transaction, so the last row before it keeps no destination.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferredTransfer;

impl ReconstructionStrategy for DeferredTransfer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DeferredTransfer
    }

    fn infer_accounts(&self, rows: &[LedgerRow]) -> Vec<AccountLegs> {
        let mut legs: Vec<AccountLegs> = rows
            .iter()
            .map(|row| AccountLegs {
                from: row.from_account_id.clone(),
                to: None,
            })
            .collect();

        let mut previous: Option<usize> = None;
        for (index, row) in rows.iter().enumerate() {
            if row.is_blank() {
                previous = None;
                continue;
            }
            if let Some(prev) = previous {
                legs[prev].to = row.from_account_id.clone();
            }
            previous = Some(index);
        }

        legs
    }

    fn clears_member_targets(&self) -> bool {
        true
    }
}

// =============================================================================
// Type boundary
// =============================================================================

/// A typed row followed by an untyped one forms a from/to pair; both rows
/// carry the pair. Gaps inside a transaction are forward-filled afterwards,
/// except for `to` pointers cleared as ambiguous.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeBoundary;

impl ReconstructionStrategy for TypeBoundary {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TypeBoundary
    }

    fn infer_accounts(&self, rows: &[LedgerRow]) -> Vec<AccountLegs> {
        let mut legs = vec![AccountLegs::default(); rows.len()];
        let mut cleared = vec![false; rows.len()];

        for (i, row) in rows.iter().enumerate() {
            if row.is_blank() {
                continue;
            }

            let previous = i
                .checked_sub(1)
                .map(|p| &rows[p])
                .filter(|p| !p.is_blank());
            let next = rows.get(i + 1).filter(|n| !n.is_blank());

            if row.is_typed() {
                legs[i] = AccountLegs {
                    from: row.from_account_id.clone(),
                    to: next
                        .filter(|n| !n.is_typed())
                        .and_then(|n| n.from_account_id.clone()),
                };
            } else if let Some(prev) = previous.filter(|p| p.is_typed()) {
                legs[i] = AccountLegs {
                    from: prev.from_account_id.clone(),
                    to: row.from_account_id.clone(),
                };
            } else {
                legs[i] = AccountLegs {
                    from: row.from_account_id.clone(),
                    to: None,
                };
                cleared[i] = true;
            }
        }

        // Forward-fill within each transaction: a typed row or a blank row
        // starts over.
        let mut carry = AccountLegs::default();
        for (i, row) in rows.iter().enumerate() {
            if row.is_blank() {
                carry = AccountLegs::default();
                continue;
            }
            if row.is_typed() {
                carry = AccountLegs::default();
            }
            if legs[i].from.is_none() {
                legs[i].from = carry.from.clone();
            }
            if legs[i].to.is_none() && !cleared[i] {
                legs[i].to = carry.to.clone();
            }
            carry = legs[i].clone();
        }

        legs
    }

    fn starts_group(&self, row: &LedgerRow) -> bool {
        row.is_typed()
    }
}
