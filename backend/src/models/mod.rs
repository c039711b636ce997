//! Domain models for the splitledger pipeline.
//!
//! - [`RawCell`] - One leaf of the report (scalar or `{value, id}` pair)
//! - [`FlatRow`] - One detail line with its cells keyed by column title
//! - [`LedgerRow`] - Working record during split reconstruction
//! - [`LedgerField`] - Projected ledger fields a column can be mapped to
//! - [`SplitGroup`] - One reconstructed transaction with its lines

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

// =============================================================================
// Raw Cell
// =============================================================================

/// A single cell of the source report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCell {
    /// `{ "value": ..., "id": ... }`, an entity reference when `id` is present.
    Pair {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Bare scalar.
    Scalar(String),
}

impl RawCell {
    /// Read a cell from a JSON leaf.
    ///
    /// Numbers and booleans become their textual form and `null` is the empty
    /// scalar. Arrays and objects without `value` are rejected.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(RawCell::Scalar(String::new())),
            Value::String(s) => Ok(RawCell::Scalar(s.clone())),
            Value::Number(n) => Ok(RawCell::Scalar(n.to_string())),
            Value::Bool(b) => Ok(RawCell::Scalar(b.to_string())),
            Value::Object(obj) => {
                let value = obj
                    .get("value")
                    .ok_or_else(|| "cell object has no 'value' key".to_string())
                    .and_then(scalar_text)?;
                let id = match obj.get("id") {
                    None | Some(Value::Null) => None,
                    Some(v) => Some(scalar_text(v)?),
                };
                Ok(RawCell::Pair { value, id })
            }
            Value::Array(_) => Err("cell is an array".to_string()),
        }
    }

    /// Display value of the cell.
    pub fn value(&self) -> &str {
        match self {
            RawCell::Pair { value, .. } => value,
            RawCell::Scalar(s) => s,
        }
    }

    /// Entity id, if the cell carries one.
    pub fn id(&self) -> Option<&str> {
        match self {
            RawCell::Pair { id, .. } => id.as_deref(),
            RawCell::Scalar(_) => None,
        }
    }
}

fn scalar_text(value: &Value) -> Result<String, String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a scalar, found {}", other)),
    }
}

// =============================================================================
// Flat Row
// =============================================================================

/// One detail line of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRow {
    /// Id of the enclosing section's first header cell ("" when absent).
    pub header_id: String,
    /// Cells in declared column order.
    pub cells: Vec<(String, RawCell)>,
}

impl FlatRow {
    /// Look up a cell by column title.
    pub fn get(&self, title: &str) -> Option<&RawCell> {
        self.cells
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, cell)| cell)
    }
}

// =============================================================================
// Ledger Fields
// =============================================================================

/// Ledger fields a report column can be projected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerField {
    Name,
    Memo,
    Date,
    Account,
    FromAccountId,
    OriginalTransactionId,
    TransactionType,
    DepartmentId,
    Amount,
}

impl LedgerField {
    pub const ALL: [LedgerField; 9] = [
        LedgerField::Name,
        LedgerField::Memo,
        LedgerField::Date,
        LedgerField::Account,
        LedgerField::FromAccountId,
        LedgerField::OriginalTransactionId,
        LedgerField::TransactionType,
        LedgerField::DepartmentId,
        LedgerField::Amount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerField::Name => "name",
            LedgerField::Memo => "memo",
            LedgerField::Date => "date",
            LedgerField::Account => "account",
            LedgerField::FromAccountId => "from_account_id",
            LedgerField::OriginalTransactionId => "original_transaction_id",
            LedgerField::TransactionType => "transaction_type",
            LedgerField::DepartmentId => "department_id",
            LedgerField::Amount => "amount",
        }
    }
}

// =============================================================================
// Dates
// =============================================================================

static ZERO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0+-0+-0+$").expect("valid zero-date pattern"));

static US_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("valid US date pattern"));

/// Normalize a report date cell.
///
/// Blank cells and all-zero sentinels such as `0-00-00` are missing (`None`).
/// ISO and `MM/DD/YYYY` dates come back as `YYYY-MM-DD`; anything else is
/// kept verbatim.
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || ZERO_DATE.is_match(raw) {
        return None;
    }

    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    if US_DATE.is_match(raw) {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }

    Some(raw.to_string())
}

/// Missing dates travel as `""` on the wire.
pub(crate) mod optional_date {
    use super::*;

    pub fn serialize<S: Serializer>(date: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(date.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.as_deref().and_then(normalize_date))
    }
}

// =============================================================================
// Ledger Row
// =============================================================================

/// Working record of the split reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub split_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default, with = "optional_date")]
    pub date: Option<String>,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub from_account_id: Option<String>,
    #[serde(default)]
    pub to_account_id: Option<String>,
    #[serde(default)]
    pub original_transaction_id: String,
    #[serde(default)]
    pub transaction_type: String,
    #[serde(default)]
    pub department_id: String,
    #[serde(default)]
    pub amount: String,
}

impl LedgerRow {
    /// Write a projected value into the matching field.
    pub fn set(&mut self, field: LedgerField, value: &str) {
        match field {
            LedgerField::Name => self.name = value.to_string(),
            LedgerField::Memo => self.memo = value.to_string(),
            LedgerField::Date => self.date = normalize_date(value),
            LedgerField::Account => self.account = value.to_string(),
            LedgerField::FromAccountId => self.from_account_id = non_blank(value),
            LedgerField::OriginalTransactionId => self.original_transaction_id = value.to_string(),
            LedgerField::TransactionType => self.transaction_type = value.to_string(),
            LedgerField::DepartmentId => self.department_id = value.to_string(),
            LedgerField::Amount => self.amount = value.to_string(),
        }
    }

    /// True when every projected field is blank.
    ///
    /// `id` and `split_id` are assigned by the reconstructor and do not count.
    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
            && self.memo.trim().is_empty()
            && self.date.is_none()
            && self.account.trim().is_empty()
            && is_unset(&self.from_account_id)
            && is_unset(&self.to_account_id)
            && self.original_transaction_id.trim().is_empty()
            && self.transaction_type.trim().is_empty()
            && self.department_id.trim().is_empty()
            && self.amount.trim().is_empty()
    }

    /// True when the row carries a transaction type.
    pub fn is_typed(&self) -> bool {
        !self.transaction_type.trim().is_empty()
    }

    /// Key of the split group this row belongs to: its `split_id`, or its own
    /// `id` when it anchors (or is) the group.
    pub fn group_key(&self) -> &str {
        if self.split_id.is_empty() {
            &self.id
        } else {
            &self.split_id
        }
    }
}

/// `None` for blank strings.
pub fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// True for `None` and blank references.
pub fn is_unset(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

// =============================================================================
// Split Group
// =============================================================================

/// One reconstructed transaction: the anchor line plus its split lines.
#[derive(Debug, Clone, Serialize)]
pub struct SplitGroup {
    /// The anchor row's `id`.
    pub split_id: String,
    pub name: String,
    #[serde(serialize_with = "optional_date::serialize")]
    pub date: Option<String>,
    pub transaction_type: String,
    pub from_account_id: Option<String>,
    pub to_account_id: Option<String>,
    /// Anchor first, then members in report order.
    pub lines: Vec<LedgerRow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_from_pair() {
        let cell = RawCell::from_json(&json!({ "value": "Checking", "id": "35" })).unwrap();
        assert_eq!(cell.value(), "Checking");
        assert_eq!(cell.id(), Some("35"));
    }

    #[test]
    fn test_cell_value_only() {
        let cell = RawCell::from_json(&json!({ "value": "Lunch" })).unwrap();
        assert_eq!(cell, RawCell::Pair { value: "Lunch".into(), id: None });
        assert_eq!(cell.id(), None);
    }

    #[test]
    fn test_cell_scalars() {
        assert_eq!(RawCell::from_json(&json!(12.5)).unwrap().value(), "12.5");
        assert_eq!(RawCell::from_json(&Value::Null).unwrap().value(), "");
        assert_eq!(RawCell::from_json(&json!("x")).unwrap(), RawCell::Scalar("x".into()));
    }

    #[test]
    fn test_cell_rejects_nested() {
        assert!(RawCell::from_json(&json!([1, 2])).is_err());
        assert!(RawCell::from_json(&json!({ "id": "1" })).is_err());
        assert!(RawCell::from_json(&json!({ "value": { "deep": true } })).is_err());
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("2024-03-05"), Some("2024-03-05".to_string()));
        assert_eq!(normalize_date("03/05/2024"), Some("2024-03-05".to_string()));
        assert_eq!(normalize_date("0-00-00"), None);
        assert_eq!(normalize_date("0000-00-00"), None);
        assert_eq!(normalize_date("  "), None);
        assert_eq!(normalize_date("Q1 2024"), Some("Q1 2024".to_string()));
    }

    #[test]
    fn test_blank_row() {
        let mut row = LedgerRow::default();
        assert!(row.is_blank());
        row.set(LedgerField::Date, "0-00-00");
        assert!(row.is_blank());
        row.set(LedgerField::Amount, "10.00");
        assert!(!row.is_blank());
    }

    #[test]
    fn test_set_from_account_blank_is_none() {
        let mut row = LedgerRow::default();
        row.set(LedgerField::FromAccountId, "  ");
        assert_eq!(row.from_account_id, None);
        row.set(LedgerField::FromAccountId, "42");
        assert_eq!(row.from_account_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_missing_date_serializes_blank() {
        let row = LedgerRow::default();
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["date"], "");
        assert_eq!(value["from_account_id"], Value::Null);
    }

    #[test]
    fn test_group_key() {
        let anchor = LedgerRow { id: "a".into(), ..Default::default() };
        let member = LedgerRow { id: "b".into(), split_id: "a".into(), ..Default::default() };
        assert_eq!(anchor.group_key(), "a");
        assert_eq!(member.group_key(), "a");
    }
}
