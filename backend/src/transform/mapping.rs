//! Column mapping definition
//!
//! The mapping is the rename table plus projection list: which projected
//! cell keys survive, and which ledger field each one lands in.
//!
//! Cell keys follow the projection convention: a `{value, id}` cell under
//! column `T` yields `T value` and `T id`, any other cell yields `T`.

use serde::{Deserialize, Serialize};

use crate::models::LedgerField;

/// A complete column mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Version of the mapping format
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Ordered rules; only keys named here are projected.
    pub rules: Vec<ColumnRule>,
}

/// One entry of the rename table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    /// Projected cell key, e.g. `Account id`.
    pub source: String,
    /// Ledger field receiving the value.
    pub target: LedgerField,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl ColumnRule {
    pub fn new(source: &str, target: LedgerField) -> Self {
        Self {
            source: source.to_string(),
            target,
        }
    }

    /// Report column title the key is derived from.
    pub fn column_title(&self) -> &str {
        self.source
            .strip_suffix(" value")
            .or_else(|| self.source.strip_suffix(" id"))
            .unwrap_or(&self.source)
    }
}

impl ColumnMapping {
    /// Parse a mapping from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Report column titles referenced by the mapping, deduplicated.
    pub fn source_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .rules
            .iter()
            .map(|r| r.column_title().to_string())
            .collect();
        columns.sort();
        columns.dedup();
        columns
    }

    /// Check that every referenced column is declared by the report.
    ///
    /// Returns the missing column titles. Missing columns are not fatal: they
    /// project to blank values.
    pub fn validate_columns(&self, columns: &[String]) -> Result<(), Vec<String>> {
        let missing: Vec<String> = self
            .source_columns()
            .into_iter()
            .filter(|col| !columns.iter().any(|c| c == col))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    /// Reject mappings that write the same ledger field twice or leave the
    /// rule list empty.
    pub fn check(&self) -> Result<(), String> {
        if self.rules.is_empty() {
            return Err("mapping has no rules".to_string());
        }
        for (i, rule) in self.rules.iter().enumerate() {
            if self.rules[..i].iter().any(|r| r.target == rule.target) {
                return Err(format!("field '{}' is mapped twice", rule.target.as_str()));
            }
        }
        Ok(())
    }
}

impl Default for ColumnMapping {
    fn default() -> Self {
        default_mapping()
    }
}

/// The built-in mapping for "Transaction List with Splits" exports.
pub fn default_mapping() -> ColumnMapping {
    ColumnMapping {
        version: default_version(),
        description: "Transaction List with Splits".to_string(),
        rules: vec![
            ColumnRule::new("Name value", LedgerField::Name),
            ColumnRule::new("Memo/Description", LedgerField::Memo),
            ColumnRule::new("Account value", LedgerField::Account),
            ColumnRule::new("Account id", LedgerField::FromAccountId),
            ColumnRule::new("Transaction Type id", LedgerField::OriginalTransactionId),
            ColumnRule::new("Transaction Type value", LedgerField::TransactionType),
            ColumnRule::new("Date", LedgerField::Date),
            ColumnRule::new("Department id", LedgerField::DepartmentId),
            ColumnRule::new("Amount", LedgerField::Amount),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping_covers_every_field() {
        let mapping = default_mapping();
        for field in LedgerField::ALL {
            assert!(mapping.rules.iter().any(|r| r.target == field), "{:?}", field);
        }
        assert!(mapping.check().is_ok());
    }

    #[test]
    fn test_mapping_json() {
        let mapping = default_mapping();
        let json = mapping.to_json().unwrap();
        assert!(json.contains("\"from_account_id\""));
        assert_eq!(ColumnMapping::from_json(&json).unwrap(), mapping);
    }

    #[test]
    fn test_source_columns() {
        let columns = default_mapping().source_columns();
        assert_eq!(
            columns,
            vec!["Account", "Amount", "Date", "Department", "Memo/Description", "Name", "Transaction Type"]
        );
    }

    #[test]
    fn test_validate_columns() {
        let mapping = default_mapping();
        let report_columns: Vec<String> = [
            "Date", "Transaction Type", "Name", "Memo/Description", "Account", "Department", "Amount",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert!(mapping.validate_columns(&report_columns).is_ok());

        let result = mapping.validate_columns(&["Date".to_string()]);
        let missing = result.unwrap_err();
        assert!(missing.contains(&"Department".to_string()));
        assert!(!missing.contains(&"Date".to_string()));
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let mapping = ColumnMapping {
            version: "1.0".into(),
            description: String::new(),
            rules: vec![
                ColumnRule::new("Name value", LedgerField::Name),
                ColumnRule::new("Vendor value", LedgerField::Name),
            ],
        };
        assert!(mapping.check().unwrap_err().contains("name"));
    }
}
