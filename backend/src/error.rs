//! Error types for the splitledger pipeline.
//!
//! - [`ReportError`] - Report structure errors (flattening/projection)
//! - [`SourceError`] - Loading, decoding and fetching report documents
//! - [`EmitError`] - Output serialization errors
//! - [`RegistryError`] - Column mapping registry errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Every lower-level error converts into [`PipelineError`] via `From`,
//! so `?` works across stage boundaries.

use thiserror::Error;

// =============================================================================
// Report Structure Errors
// =============================================================================

/// Errors raised while walking the nested report structure.
///
/// All of them are fatal to a run: the reconstruction passes rely on the
/// position of every detail row, so a row is never skipped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReportError {
    /// A detail row does not carry one cell per declared column.
    #[error("Section {section}, row {row}: expected {expected} cells, found {found}")]
    SchemaMismatch {
        section: usize,
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A row is missing a structural key or holds a cell that cannot be read.
    #[error("Section {section}, row {row}: malformed row: {reason}")]
    MalformedRow {
        section: usize,
        row: usize,
        reason: String,
    },

    /// The report has no sections or no detail rows.
    #[error("Report contains no detail rows")]
    EmptyReport,
}

impl ReportError {
    pub fn malformed(section: usize, row: usize, reason: impl Into<String>) -> Self {
        ReportError::MalformedRow {
            section,
            row,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Source Errors
// =============================================================================

/// Errors while obtaining the raw report document.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read file.
    #[error("Failed to read report: {0}")]
    Io(#[from] std::io::Error),

    /// Content could not be decoded.
    #[error("Failed to decode report: {0}")]
    Encoding(String),

    /// Content is not valid JSON.
    #[error("Invalid report JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Remote returned a non-success status.
    #[error("Report endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

// =============================================================================
// Emit Errors
// =============================================================================

/// Errors while serializing ledger records.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Output IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the column mapping registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Mapping not found.
    #[error("Mapping not found: {0}")]
    NotFound(String),

    /// Invalid mapping data.
    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    /// Name yields an empty id.
    #[error("Mapping name has no letters or digits: '{0}'")]
    InvalidName(String),

    /// IO error.
    #[error("Registry IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::reconcile_report`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Report structure error.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Source error.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Emit error.
    #[error("Emit error: {0}")]
    Emit(#[from] EmitError),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Output records failed schema validation.
    #[error("{invalid} of {total} records failed schema validation")]
    Validation { invalid: usize, total: usize },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for report structure operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for emit operations.
pub type EmitResult<T> = Result<T, EmitError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
