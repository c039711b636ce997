//! Transformation module.
//!
//! Turns a nested report document into reconciled ledger rows:
//! - Flatten: report sections to detail rows
//! - Mapping / Projector: detail rows to ledger fields
//! - Reconstruct: account legs, identities, split groups
//! - Grouper: flat ledger rows to split transactions
//! - Pipeline: main reconciliation pipeline

pub mod flatten;
pub mod grouper;
pub mod ids;
pub mod mapping;
pub mod pipeline;
pub mod projector;
pub mod reconstruct;

pub use flatten::{flatten_report, FlatReport};
pub use grouper::rows_to_groups;
pub use ids::{IdGenerator, SequentialIds, UuidIds};
pub use mapping::{default_mapping, ColumnMapping, ColumnRule};
pub use pipeline::*;
pub use projector::{project_row, project_rows};
pub use reconstruct::{reconstruct, Reconstruction, ReconstructionStrategy, StrategyKind};
