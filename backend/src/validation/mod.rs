//! JSON Schema validation for emitted ledger records.
//!
//! The schema (`schemas/ledger-row.json`, embedded at compile time) is the
//! contract with the storage layer: which fields are required, which are
//! optional (`to_account_id`, `department_id`), and which may be `null`.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use splitledger::validate_ledger_record;
//!
//! let record = json!({
//!     "id": "t-2", "split_id": "t-1", "name": "Acme", "memo": "",
//!     "date": "2024-01-05", "account": "Supplies", "from_account_id": "60",
//!     "to_account_id": null, "original_transaction_id": "120",
//!     "transaction_type": "Expense", "department_id": "", "amount": "12.50"
//! });
//! assert!(validate_ledger_record(&record).is_ok());
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

static LEDGER_ROW_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/ledger-row.json"))
        .expect("embedded ledger schema is valid JSON")
});

/// Validate a JSON value against a schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every violation otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick boolean check.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// The embedded ledger row schema.
pub fn ledger_row_schema() -> &'static Value {
    &LEDGER_ROW_SCHEMA
}

/// Validate one emitted record.
pub fn validate_ledger_record(data: &Value) -> Result<(), Vec<String>> {
    validate(ledger_row_schema(), data)
}

/// Quick check against the ledger schema.
pub fn is_valid_ledger_record(data: &Value) -> bool {
    is_valid(ledger_row_schema(), data)
}

/// Validate a batch; returns `(valid, invalid, first errors by record index)`.
pub fn validate_records(records: &[Value]) -> (usize, usize, Vec<(usize, Vec<String>)>) {
    let mut valid = 0;
    let mut invalid = 0;
    let mut errors = Vec::new();

    for (i, record) in records.iter().enumerate() {
        match validate_ledger_record(record) {
            Ok(()) => valid += 1,
            Err(errs) => {
                invalid += 1;
                if errors.len() < 10 {
                    errors.push((i, errs));
                }
            }
        }
    }

    (valid, invalid, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Value {
        json!({
            "id": "t-2",
            "split_id": "t-1",
            "name": "Acme",
            "memo": "",
            "date": "2024-01-05",
            "account": "Supplies",
            "from_account_id": "60",
            "to_account_id": null,
            "original_transaction_id": "120",
            "transaction_type": "Expense",
            "department_id": "",
            "amount": "12.50"
        })
    }

    #[test]
    fn test_valid_record() {
        assert!(is_valid_ledger_record(&record()));
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let mut rec = record();
        let obj = rec.as_object_mut().unwrap();
        obj.remove("to_account_id");
        obj.remove("department_id");
        assert!(validate_ledger_record(&rec).is_ok());
    }

    #[test]
    fn test_uid_variant_valid() {
        let mut rec = record();
        let obj = rec.as_object_mut().unwrap();
        let id = obj.remove("id").unwrap();
        obj.insert("uid".to_string(), id);
        assert!(is_valid_ledger_record(&rec));
    }

    #[test]
    fn test_missing_required_field() {
        let mut rec = record();
        rec.as_object_mut().unwrap().remove("amount");
        let errors = validate_ledger_record(&rec).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_sentinel_date_rejected() {
        let mut rec = record();
        rec["date"] = json!("0-00-00");
        assert!(!is_valid_ledger_record(&rec));
    }

    #[test]
    fn test_blank_id_rejected() {
        let mut rec = record();
        rec["id"] = json!("");
        assert!(!is_valid_ledger_record(&rec));
    }

    #[test]
    fn test_validate_records_counts() {
        let mut bad = record();
        bad["amount"] = json!(12.5);
        let (valid, invalid, errors) = validate_records(&[record(), bad]);
        assert_eq!((valid, invalid), (1, 1));
        assert_eq!(errors[0].0, 1);
    }
}
