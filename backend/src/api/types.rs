//! REST API types.
//!
//! Responses carry the emitted ledger records (flat, in report order) and
//! the same records collected per split transaction.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::emit::IdField;
use crate::error::EmitResult;
use crate::transform::pipeline::{ReconcileOptions, ReconcileOutput};
use crate::transform::reconstruct::StrategyKind;

/// Query parameters accepted by the reconcile routes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReconcileQuery {
    pub strategy: Option<StrategyKind>,
    pub keep_standalone: bool,
    pub uid: bool,
}

impl ReconcileQuery {
    pub fn options(&self) -> ReconcileOptions {
        ReconcileOptions {
            strategy: self.strategy.unwrap_or_default(),
            keep_standalone: self.keep_standalone,
            id_field: if self.uid { IdField::Uid } else { IdField::Id },
            ..Default::default()
        }
    }
}

/// Response sent after a report was reconciled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready", "warning", "error"
    pub status: String,

    /// Ledger records in report order
    pub records: Vec<Value>,

    /// Records collected per split transaction
    pub groups: Vec<Value>,

    /// Metadata about the run
    pub metadata: ResponseMetadata,
}

/// Metadata about the run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Strategy that inferred the account legs
    pub strategy: StrategyKind,

    /// Number of split transactions
    pub total_groups: usize,

    /// Number of emitted records
    pub total_records: usize,

    /// Single-line rows dropped by the group filter
    pub standalone_dropped: usize,

    /// Report info
    pub report_info: ReportMetadata,

    /// Validation stats
    pub validation: ValidationStats,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub encoding: Option<String>,
    pub section_count: usize,
    pub row_count: usize,
    pub columns: Vec<String>,
}

/// Validation statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStats {
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<ValidationError>,
}

/// A validation error
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub record_index: usize,
    pub errors: Vec<String>,
}

impl ReconcileResponse {
    /// Build the response from a finished run.
    pub fn from_output(output: ReconcileOutput) -> EmitResult<Self> {
        let records = output.records()?;
        let groups = output.group_records()?;

        Ok(ReconcileResponse {
            job_id: Uuid::new_v4().to_string(),
            status: if output.invalid_count == 0 { "ready" } else { "warning" }.to_string(),
            metadata: ResponseMetadata {
                strategy: output.strategy,
                total_groups: groups.len(),
                total_records: records.len(),
                standalone_dropped: output.stats.standalone_dropped,
                report_info: ReportMetadata {
                    encoding: output.report.encoding,
                    section_count: output.report.section_count,
                    row_count: output.report.detail_rows,
                    columns: output.report.columns,
                },
                validation: ValidationStats {
                    valid: output.valid_count,
                    invalid: output.invalid_count,
                    errors: output
                        .validation_errors
                        .into_iter()
                        .map(|(idx, errs)| ValidationError {
                            record_index: idx,
                            errors: errs,
                        })
                        .collect(),
                },
            },
            records,
            groups,
        })
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "records": [],
        "groups": [],
        "metadata": {
            "totalGroups": 0,
            "totalRecords": 0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::ids::SequentialIds;
    use crate::transform::pipeline::reconcile_document;

    fn report() -> Value {
        json!({
            "Columns": { "Column": [{ "ColTitle": "Account" }, { "ColTitle": "Amount" }] },
            "Rows": { "Row": [{
                "Header": { "ColData": [{ "value": "Checking", "id": "H1" }] },
                "Rows": { "Row": [
                    { "ColData": [{ "value": "Checking", "id": "35" }, "-4.00"] },
                    { "ColData": [{ "value": "Fees", "id": "80" }, "4.00"] }
                ]}
            }]}
        })
    }

    #[test]
    fn test_response_from_output() {
        let query = ReconcileQuery {
            uid: true,
            ..Default::default()
        };
        let output =
            reconcile_document(&report(), &query.options(), &mut SequentialIds::new("r")).unwrap();
        let response = ReconcileResponse::from_output(output).unwrap();

        assert_eq!(response.status, "ready");
        assert_eq!(response.records.len(), 2);
        assert_eq!(response.records[0]["uid"], "r-1");
        assert_eq!(response.groups[0]["lines"][1]["split_id"], "r-1");
        assert_eq!(response.metadata.total_groups, 1);

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("jobId").is_some());
        assert_eq!(json["metadata"]["reportInfo"]["rowCount"], 2);
    }

    #[test]
    fn test_query_defaults() {
        let options = ReconcileQuery::default().options();
        assert_eq!(options.strategy, StrategyKind::Auto);
        assert_eq!(options.id_field, IdField::Id);
        assert!(!options.keep_standalone);
    }

    #[test]
    fn test_error_response_shape() {
        let response = error_response("bad report");
        assert_eq!(response["status"], "error");
        assert_eq!(response["records"], json!([]));
    }
}
