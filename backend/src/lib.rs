//! # Splitledger - Split transaction reconstruction for report exports
//!
//! Splitledger flattens nested "Transaction List with Splits" report exports
//! and reconstructs double-entry semantics: which account money moved from
//! and to, which lines belong to the same split transaction, and which
//! transaction-level fields each line inherits.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │ Report JSON │──▶│  Flattener  │──▶│  Projector  │──▶│ Reconstruct │──▶│   Emitter   │
//! │ (auto-enc)  │   │ (sections)  │   │  (mapping)  │   │ (4 passes)  │   │ (JSON/CSV)  │
//! └─────────────┘   └─────────────┘   └─────────────┘   └─────────────┘   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use splitledger::{reconcile_file, OutputFormat, ReconcileOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let output = reconcile_file("report.json", &ReconcileOptions::default())?;
//!     println!("{}", output.emit(OutputFormat::Csv)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (RawCell, FlatRow, LedgerRow, SplitGroup)
//! - [`config`] - Defaults and environment settings
//! - [`source`] - Report loading with encoding detection
//! - [`transform`] - Flattening, projection, reconstruction and pipeline
//! - [`emit`] - JSON and CSV serialization
//! - [`validation`] - Ledger record schema validation
//! - [`cache`] - Column mapping registry
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Input
pub mod source;

// Transformation
pub mod transform;

// Output
pub mod emit;
pub mod validation;

// Mapping registry
pub mod cache;

// HTTP API
pub mod api;

pub use transform::pipeline;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    EmitError, PipelineError, RegistryError, ReportError, ServerError, SourceError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{normalize_date, FlatRow, LedgerField, LedgerRow, RawCell, SplitGroup};

// =============================================================================
// Re-exports - Source
// =============================================================================

pub use source::{
    decode_content, detect_encoding, fetch_report, load_report_file, parse_report_bytes,
    LoadedReport,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    default_mapping, flatten_report, project_rows, reconstruct, rows_to_groups, ColumnMapping,
    ColumnRule, FlatReport, IdGenerator, Reconstruction, ReconstructionStrategy, SequentialIds,
    StrategyKind, UuidIds,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    project_document, reconcile_bytes, reconcile_document, reconcile_file, reconcile_report,
    reconcile_url, ReconcileOptions, ReconcileOutput, ReconcileStats, ReportInfo,
};

// =============================================================================
// Re-exports - Emit / Validation
// =============================================================================

pub use emit::{IdField, OutputFormat};
pub use validation::{is_valid_ledger_record, validate_ledger_record, validate_records};

// =============================================================================
// Re-exports - Registry
// =============================================================================

pub use cache::{mapping_id, MappingRegistry, StoredMapping};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, ReconcileQuery, ReconcileResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
