//! High-level pipeline API for report reconciliation.
//!
//! Combines every stage: source decoding, flattening, projection,
//! reconstruction, schema validation and grouping.
//!
//! # Example
//!
//! ```rust,ignore
//! use splitledger::pipeline::{reconcile_file, ReconcileOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let output = reconcile_file("report.json", &ReconcileOptions::default())?;
//!     println!("Reconciled {} split transactions", output.groups.len());
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::flatten::{flatten_report, FlatReport};
use super::grouper::rows_to_groups;
use super::ids::{IdGenerator, UuidIds};
use super::mapping::ColumnMapping;
use super::projector::project_rows;
use super::reconstruct::{reconstruct, StrategyKind};
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::emit::{self, IdField, OutputFormat};
use crate::error::{EmitResult, PipelineError, PipelineResult, ReportError};
use crate::models::{LedgerRow, SplitGroup};
use crate::source::{fetch_report, load_report_file, parse_report_bytes, LoadedReport};
use crate::validation::validate_records;

/// Options for one reconciliation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileOptions {
    /// Account inference strategy; `auto` detects it from the report shape
    pub strategy: StrategyKind,

    /// Keep single-line transactions instead of dropping them
    pub keep_standalone: bool,

    /// Name of the identity field in emitted records
    pub id_field: IdField,

    /// Skip schema validation of emitted records
    pub skip_validation: bool,

    /// Fail on empty reports and on invalid records
    pub strict: bool,

    /// Column mapping; the built-in mapping when absent
    pub mapping: Option<ColumnMapping>,
}

/// Facts about the input report
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportInfo {
    /// Encoding the document was decoded with, when it came from bytes
    pub encoding: Option<String>,
    /// Declared column titles
    pub columns: Vec<String>,
    /// Number of sections
    pub section_count: usize,
    /// Number of detail rows
    pub detail_rows: usize,
}

/// Row counts of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileStats {
    pub input_rows: usize,
    pub blank_rows: usize,
    pub group_count: usize,
    pub standalone_dropped: usize,
    pub output_rows: usize,
}

/// Result of a complete reconciliation
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutput {
    /// Reconstructed rows in report order
    pub rows: Vec<LedgerRow>,

    /// The same rows collected per split transaction
    pub groups: Vec<SplitGroup>,

    /// Strategy that inferred the account legs
    pub strategy: StrategyKind,

    /// Identity field used when emitting
    pub id_field: IdField,

    pub stats: ReconcileStats,

    /// Number of valid records
    pub valid_count: usize,

    /// Number of invalid records
    pub invalid_count: usize,

    /// Validation errors (record index, errors)
    pub validation_errors: Vec<(usize, Vec<String>)>,

    pub report: ReportInfo,
}

impl ReconcileOutput {
    fn empty(strategy: StrategyKind, id_field: IdField, report: ReportInfo) -> Self {
        Self {
            rows: Vec::new(),
            groups: Vec::new(),
            strategy,
            id_field,
            stats: ReconcileStats::default(),
            valid_count: 0,
            invalid_count: 0,
            validation_errors: Vec::new(),
            report,
        }
    }

    /// Flat records as JSON values
    pub fn records(&self) -> EmitResult<Vec<Value>> {
        emit::record_values(&self.rows, self.id_field)
    }

    /// Split groups as JSON values
    pub fn group_records(&self) -> EmitResult<Vec<Value>> {
        emit::group_values(&self.groups, self.id_field)
    }

    /// Serialize the flat records
    pub fn emit(&self, format: OutputFormat) -> EmitResult<String> {
        emit::emit(&self.rows, format, self.id_field)
    }

    /// Serialize the split groups as JSON
    pub fn emit_groups(&self) -> EmitResult<String> {
        emit::groups_to_json(&self.groups, self.id_field)
    }
}

/// Reconcile a report file.
pub fn reconcile_file<P: AsRef<Path>>(
    path: P,
    options: &ReconcileOptions,
) -> PipelineResult<ReconcileOutput> {
    log_info(format!("Reading report {}...", path.as_ref().display()));
    let loaded = load_report_file(path)?;
    reconcile_loaded(loaded, options)
}

/// Reconcile raw report bytes.
pub fn reconcile_bytes(bytes: &[u8], options: &ReconcileOptions) -> PipelineResult<ReconcileOutput> {
    let loaded = parse_report_bytes(bytes)?;
    reconcile_loaded(loaded, options)
}

/// Fetch a report over HTTP and reconcile it.
pub async fn reconcile_url(
    url: &str,
    token: Option<&str>,
    options: &ReconcileOptions,
) -> PipelineResult<ReconcileOutput> {
    log_info(format!("Fetching report from {}...", url));
    let loaded = fetch_report(url, token).await?;
    reconcile_loaded(loaded, options)
}

fn reconcile_loaded(loaded: LoadedReport, options: &ReconcileOptions) -> PipelineResult<ReconcileOutput> {
    log_success(format!(
        "Decoded {} bytes as {}",
        loaded.byte_len, loaded.encoding
    ));
    let mut output = reconcile_report(&loaded.document, options)?;
    output.report.encoding = Some(loaded.encoding);
    Ok(output)
}

/// Reconcile an already-parsed report document with random identities.
pub fn reconcile_report(document: &Value, options: &ReconcileOptions) -> PipelineResult<ReconcileOutput> {
    reconcile_document(document, options, &mut UuidIds)
}

/// Flatten and project a document without reconstructing it.
pub fn project_document(
    document: &Value,
    mapping: &ColumnMapping,
) -> PipelineResult<(FlatReport, Vec<LedgerRow>)> {
    let flat = flatten_report(document)?;
    if let Err(missing) = mapping.validate_columns(&flat.columns) {
        log_warning(format!(
            "Mapped columns absent from the report (projected blank): {}",
            missing.join(", ")
        ));
    }
    let projected = project_rows(&flat.rows, mapping);
    Ok((flat, projected))
}

/// Reconcile a report document with the given identity generator.
///
/// This is the main entry point for the pipeline. It:
/// 1. Flattens the report into detail rows
/// 2. Projects them through the column mapping
/// 3. Reconstructs accounts, identities and split groups
/// 4. Validates the emitted records
/// 5. Collects the rows per split transaction
pub fn reconcile_document(
    document: &Value,
    options: &ReconcileOptions,
    ids: &mut dyn IdGenerator,
) -> PipelineResult<ReconcileOutput> {
    let default_mapping;
    let mapping = match &options.mapping {
        Some(mapping) => mapping,
        None => {
            default_mapping = ColumnMapping::default();
            &default_mapping
        }
    };

    // Step 1-2: Flatten and project
    log_info("Flattening report...");
    let (flat, projected) = project_document(document, mapping)?;
    let report = ReportInfo {
        encoding: None,
        columns: flat.columns.clone(),
        section_count: flat.section_count,
        detail_rows: flat.rows.len(),
    };
    log_success(format!(
        "{} detail rows in {} sections",
        report.detail_rows, report.section_count
    ));

    if flat.rows.is_empty() {
        if options.strict {
            log_error("Report contains no detail rows");
            return Err(ReportError::EmptyReport.into());
        }
        log_warning("Report contains no detail rows, nothing to reconcile");
        let strategy = options.strategy.resolve(&projected);
        return Ok(ReconcileOutput::empty(strategy, options.id_field, report));
    }

    // Step 3: Reconstruct
    let strategy = options.strategy.strategy(&projected);
    log_info(format!("Reconstructing splits ({} strategy)...", strategy.kind()));
    let result = reconstruct(&projected, strategy.as_ref(), ids, options.keep_standalone);
    log_success(format!(
        "{} split transactions, {} rows",
        result.group_count,
        result.rows.len()
    ));
    if result.blank_rows > 0 {
        log_info_indent(format!("{} blank rows skipped", result.blank_rows), 1);
    }
    if result.standalone_dropped > 0 {
        log_info_indent(
            format!("{} single-line rows dropped", result.standalone_dropped),
            1,
        );
    }

    // Step 4: Validate
    let (valid_count, invalid_count, validation_errors) = if options.skip_validation {
        log_info("(validation skipped)");
        (result.rows.len(), 0, Vec::new())
    } else {
        log_info("Validating records...");
        let records = emit::record_values(&result.rows, options.id_field)?;
        let (valid, invalid, errors) = validate_records(&records);
        print_validation_result(valid, invalid, &errors);
        (valid, invalid, errors)
    };

    if options.strict && invalid_count > 0 {
        return Err(PipelineError::Validation {
            invalid: invalid_count,
            total: result.rows.len(),
        });
    }

    // Step 5: Group
    let groups = rows_to_groups(&result.rows);

    Ok(ReconcileOutput {
        stats: ReconcileStats {
            input_rows: result.input_rows,
            blank_rows: result.blank_rows,
            group_count: result.group_count,
            standalone_dropped: result.standalone_dropped,
            output_rows: result.rows.len(),
        },
        rows: result.rows,
        groups,
        strategy: result.strategy,
        id_field: options.id_field,
        valid_count,
        invalid_count,
        validation_errors,
        report,
    })
}

/// Print validation result
fn print_validation_result(valid: usize, invalid: usize, errors: &[(usize, Vec<String>)]) {
    if invalid == 0 {
        log_success(format!("All {} records valid", valid));
        return;
    }
    log_success(format!("Valid: {}", valid));
    log_error(format!("Invalid: {}", invalid));
    for (index, errs) in errors.iter().take(3) {
        log_info_indent(format!("Record {}: {}", index, errs.join(", ")), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LedgerField;
    use crate::transform::ids::SequentialIds;
    use crate::transform::mapping::ColumnRule;
    use serde_json::json;

    const COLUMNS: [&str; 6] = [
        "Date",
        "Transaction Type",
        "Name",
        "Memo/Description",
        "Account",
        "Amount",
    ];

    fn report(sections: Vec<Value>) -> Value {
        let columns: Vec<Value> = COLUMNS.iter().map(|t| json!({ "ColTitle": t })).collect();
        json!({
            "Columns": { "Column": columns },
            "Rows": { "Row": sections }
        })
    }

    fn section(header_id: &str, details: Vec<Value>) -> Value {
        json!({
            "Header": { "ColData": [{ "value": "Header", "id": header_id }] },
            "Rows": { "Row": details }
        })
    }

    fn detail(date: &str, ty: Option<(&str, &str)>, name: &str, account: (&str, &str), amount: &str) -> Value {
        let ty = match ty {
            Some((value, id)) => json!({ "value": value, "id": id }),
            None => json!({ "value": "" }),
        };
        let name = if name.is_empty() {
            json!({ "value": "" })
        } else {
            json!({ "value": name, "id": "55" })
        };
        json!({ "ColData": [
            { "value": date },
            ty,
            name,
            { "value": "" },
            { "value": account.0, "id": account.1 },
            { "value": amount }
        ]})
    }

    fn blank() -> Value {
        json!({ "ColData": [
            { "value": "" }, { "value": "" }, { "value": "" },
            { "value": "" }, { "value": "" }, { "value": "" }
        ]})
    }

    fn two_leg_report() -> Value {
        report(vec![section(
            "H1",
            vec![
                detail("2024-01-05", Some(("Expense", "120")), "Acme", ("Checking", "A"), "-10.00"),
                detail("", None, "", ("Supplies", "B"), "10.00"),
                blank(),
            ],
        )])
    }

    fn run(document: &Value, options: &ReconcileOptions) -> ReconcileOutput {
        reconcile_document(document, options, &mut SequentialIds::new("t")).unwrap()
    }

    #[test]
    fn test_two_leg_transaction() {
        let output = run(&two_leg_report(), &ReconcileOptions::default());

        assert_eq!(output.strategy, StrategyKind::DeferredTransfer);
        assert_eq!(output.rows.len(), 2);

        let anchor = &output.rows[0];
        assert_eq!(anchor.id, "t-1");
        assert_eq!(anchor.split_id, "");
        assert_eq!(anchor.from_account_id.as_deref(), Some("A"));
        assert_eq!(anchor.to_account_id.as_deref(), Some("B"));

        let member = &output.rows[1];
        assert_eq!(member.split_id, "t-1");
        assert_eq!(member.name, "Acme");
        assert_eq!(member.transaction_type, "Expense");
        assert_eq!(member.date.as_deref(), Some("2024-01-05"));

        assert_eq!(output.stats.blank_rows, 1);
        assert_eq!(output.groups.len(), 1);
        assert_eq!(output.invalid_count, 0);
        assert_eq!(output.valid_count, 2);
    }

    #[test]
    fn test_name_without_id_projects_blank() {
        let mut doc = two_leg_report();
        doc["Rows"]["Row"][0]["Rows"]["Row"][0]["ColData"][2] = json!({ "value": "Acme" });

        let output = run(&doc, &ReconcileOptions::default());
        assert_eq!(output.rows.len(), 2);
        assert_eq!(output.rows[0].name, "");
        assert_eq!(output.rows[1].name, "");
        assert_eq!(output.rows[1].transaction_type, "Expense");
    }

    #[test]
    fn test_single_line_section_dropped() {
        let doc = report(vec![section(
            "H1",
            vec![detail("2024-01-05", Some(("Deposit", "7")), "Bank", ("Checking", "A"), "5")],
        )]);

        let output = run(&doc, &ReconcileOptions::default());
        assert!(output.rows.is_empty());
        assert_eq!(output.stats.standalone_dropped, 1);

        let keep = ReconcileOptions {
            keep_standalone: true,
            ..Default::default()
        };
        let output = run(&doc, &keep);
        assert_eq!(output.rows.len(), 1);
        assert_eq!(output.rows[0].split_id, "");
    }

    #[test]
    fn test_account_pair_projection() {
        let output = run(&two_leg_report(), &ReconcileOptions::default());
        assert_eq!(output.rows[1].account, "Supplies");
        assert_eq!(output.rows[1].from_account_id.as_deref(), Some("B"));
        assert_eq!(output.rows[0].original_transaction_id, "120");
    }

    #[test]
    fn test_empty_report() {
        let doc = report(vec![section("H1", vec![])]);

        let output = run(&doc, &ReconcileOptions::default());
        assert!(output.rows.is_empty());
        assert_eq!(output.report.section_count, 1);

        let strict = ReconcileOptions {
            strict: true,
            ..Default::default()
        };
        let err = reconcile_document(&doc, &strict, &mut SequentialIds::new("t")).unwrap_err();
        assert!(matches!(err, PipelineError::Report(ReportError::EmptyReport)));
    }

    #[test]
    fn test_schema_mismatch_aborts() {
        let doc = report(vec![section("H1", vec![json!({ "ColData": [{ "value": "" }] })])]);
        let err = reconcile_report(&doc, &ReconcileOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Report(ReportError::SchemaMismatch { expected: 6, found: 1, .. })
        ));
    }

    #[test]
    fn test_runs_are_deterministic() {
        let doc = two_leg_report();
        let first = run(&doc, &ReconcileOptions::default());
        let second = run(&doc, &ReconcileOptions::default());
        assert_eq!(first.rows, second.rows);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let doc = two_leg_report();
        let mapping = ColumnMapping::default();
        let (_, first) = project_document(&doc, &mapping).unwrap();
        let (_, second) = project_document(&doc, &mapping).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_mapping_and_uid() {
        let mapping = ColumnMapping {
            rules: vec![
                ColumnRule::new("Account value", LedgerField::Account),
                ColumnRule::new("Account id", LedgerField::FromAccountId),
                ColumnRule::new("Amount", LedgerField::Amount),
            ],
            ..Default::default()
        };
        let options = ReconcileOptions {
            mapping: Some(mapping),
            id_field: IdField::Uid,
            skip_validation: true,
            ..Default::default()
        };

        let output = run(&two_leg_report(), &options);
        assert_eq!(output.rows.len(), 2);
        assert_eq!(output.rows[0].name, "");

        let records = output.records().unwrap();
        assert_eq!(records[1]["uid"], "t-2");
        assert!(output.emit(OutputFormat::Csv).unwrap().starts_with("uid,"));
    }

    #[test]
    fn test_reconcile_bytes_reports_encoding() {
        let bytes = serde_json::to_vec(&two_leg_report()).unwrap();
        let output = reconcile_bytes(&bytes, &ReconcileOptions::default()).unwrap();
        assert_eq!(output.report.encoding.as_deref(), Some("utf-8"));
        assert_eq!(output.rows.len(), 2);
        assert!(!output.rows[0].id.is_empty());
    }

    #[test]
    fn test_options_from_json() {
        let options: ReconcileOptions =
            serde_json::from_value(json!({ "strategy": "type-boundary", "keep_standalone": true }))
                .unwrap();
        assert_eq!(options.strategy, StrategyKind::TypeBoundary);
        assert!(options.keep_standalone);
        assert_eq!(options.id_field, IdField::Id);
    }
}
