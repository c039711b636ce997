//! Serialize reconstructed ledger rows.
//!
//! Records always carry the same fields in the same order:
//!
//! `id, split_id, name, memo, date, account, from_account_id, to_account_id,
//! original_transaction_id, transaction_type, department_id, amount`
//!
//! Blank values are `""`. Unset account pointers are `null` in JSON and `""`
//! in CSV. The identity field can be emitted as `uid` instead of `id`.

use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::error::{EmitError, EmitResult};
use crate::models::{LedgerRow, SplitGroup};

/// Field names after the identity field, in output order.
const TAIL_FIELDS: [&str; 11] = [
    "split_id",
    "name",
    "memo",
    "date",
    "account",
    "from_account_id",
    "to_account_id",
    "original_transaction_id",
    "transaction_type",
    "department_id",
    "amount",
];

/// Name of the identity field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdField {
    #[default]
    Id,
    Uid,
}

impl IdField {
    pub fn key(&self) -> &'static str {
        match self {
            IdField::Id => "id",
            IdField::Uid => "uid",
        }
    }
}

/// Output format for flat records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Csv => f.write_str("csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown format '{}' (expected json or csv)", other)),
        }
    }
}

/// Column headers for a given identity field name.
pub fn field_names(id_field: IdField) -> Vec<&'static str> {
    let mut names = Vec::with_capacity(TAIL_FIELDS.len() + 1);
    names.push(id_field.key());
    names.extend(TAIL_FIELDS);
    names
}

/// One emitted record, serialized in fixed field order.
#[derive(Debug, Clone, Copy)]
pub struct LedgerRecord<'a> {
    pub row: &'a LedgerRow,
    pub id_field: IdField,
}

impl Serialize for LedgerRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let row = self.row;
        let mut record = serializer.serialize_struct("LedgerRecord", TAIL_FIELDS.len() + 1)?;
        record.serialize_field(self.id_field.key(), &row.id)?;
        record.serialize_field("split_id", &row.split_id)?;
        record.serialize_field("name", &row.name)?;
        record.serialize_field("memo", &row.memo)?;
        record.serialize_field("date", row.date.as_deref().unwrap_or(""))?;
        record.serialize_field("account", &row.account)?;
        record.serialize_field("from_account_id", &row.from_account_id)?;
        record.serialize_field("to_account_id", &row.to_account_id)?;
        record.serialize_field("original_transaction_id", &row.original_transaction_id)?;
        record.serialize_field("transaction_type", &row.transaction_type)?;
        record.serialize_field("department_id", &row.department_id)?;
        record.serialize_field("amount", &row.amount)?;
        record.end()
    }
}

/// One split group with its lines as emitted records.
#[derive(Debug, Serialize)]
struct GroupRecord<'a> {
    split_id: &'a str,
    name: &'a str,
    date: &'a str,
    transaction_type: &'a str,
    from_account_id: &'a Option<String>,
    to_account_id: &'a Option<String>,
    lines: Vec<LedgerRecord<'a>>,
}

impl<'a> GroupRecord<'a> {
    fn new(group: &'a SplitGroup, id_field: IdField) -> Self {
        Self {
            split_id: &group.split_id,
            name: &group.name,
            date: group.date.as_deref().unwrap_or(""),
            transaction_type: &group.transaction_type,
            from_account_id: &group.from_account_id,
            to_account_id: &group.to_account_id,
            lines: records(&group.lines, id_field),
        }
    }
}

fn records(rows: &[LedgerRow], id_field: IdField) -> Vec<LedgerRecord<'_>> {
    rows.iter().map(|row| LedgerRecord { row, id_field }).collect()
}

/// Flat records as JSON values.
pub fn record_values(rows: &[LedgerRow], id_field: IdField) -> EmitResult<Vec<Value>> {
    records(rows, id_field)
        .into_iter()
        .map(|r| serde_json::to_value(r).map_err(EmitError::from))
        .collect()
}

/// Split groups as JSON values.
pub fn group_values(groups: &[SplitGroup], id_field: IdField) -> EmitResult<Vec<Value>> {
    groups
        .iter()
        .map(|g| serde_json::to_value(GroupRecord::new(g, id_field)).map_err(EmitError::from))
        .collect()
}

/// Pretty JSON array of flat records.
pub fn to_json(rows: &[LedgerRow], id_field: IdField) -> EmitResult<String> {
    Ok(serde_json::to_string_pretty(&records(rows, id_field))?)
}

/// Pretty JSON array of split groups.
pub fn groups_to_json(groups: &[SplitGroup], id_field: IdField) -> EmitResult<String> {
    let groups: Vec<GroupRecord> = groups.iter().map(|g| GroupRecord::new(g, id_field)).collect();
    Ok(serde_json::to_string_pretty(&groups)?)
}

/// Write flat records as CSV with a header line.
pub fn write_csv<W: Write>(writer: W, rows: &[LedgerRow], id_field: IdField) -> EmitResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(field_names(id_field))?;

    for row in rows {
        csv.write_record([
            row.id.as_str(),
            row.split_id.as_str(),
            row.name.as_str(),
            row.memo.as_str(),
            row.date.as_deref().unwrap_or(""),
            row.account.as_str(),
            row.from_account_id.as_deref().unwrap_or(""),
            row.to_account_id.as_deref().unwrap_or(""),
            row.original_transaction_id.as_str(),
            row.transaction_type.as_str(),
            row.department_id.as_str(),
            row.amount.as_str(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// CSV document as a string.
pub fn to_csv(rows: &[LedgerRow], id_field: IdField) -> EmitResult<String> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, rows, id_field)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Serialize flat records in the requested format.
pub fn emit(rows: &[LedgerRow], format: OutputFormat, id_field: IdField) -> EmitResult<String> {
    match format {
        OutputFormat::Json => to_json(rows, id_field),
        OutputFormat::Csv => to_csv(rows, id_field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<LedgerRow> {
        vec![
            LedgerRow {
                id: "t-1".into(),
                name: "Acme, Inc.".into(),
                date: Some("2024-01-05".into()),
                account: "Checking".into(),
                from_account_id: Some("35".into()),
                to_account_id: Some("60".into()),
                transaction_type: "Expense".into(),
                amount: "-12.50".into(),
                ..Default::default()
            },
            LedgerRow {
                id: "t-2".into(),
                split_id: "t-1".into(),
                name: "Acme, Inc.".into(),
                account: "Supplies".into(),
                from_account_id: Some("60".into()),
                amount: "12.50".into(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_json_field_order() {
        let json = to_json(&sample(), IdField::Id).unwrap();
        let positions: Vec<usize> = field_names(IdField::Id)
            .iter()
            .map(|f| json.find(&format!("\"{}\"", f)).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_json_blank_and_null() {
        let values = record_values(&sample(), IdField::Id).unwrap();
        assert_eq!(values[1]["date"], "");
        assert_eq!(values[1]["memo"], "");
        assert_eq!(values[1]["to_account_id"], Value::Null);
        assert_eq!(values[0]["to_account_id"], "60");
    }

    #[test]
    fn test_uid_variant() {
        let values = record_values(&sample(), IdField::Uid).unwrap();
        assert_eq!(values[0]["uid"], "t-1");
        assert!(values[0].get("id").is_none());
    }

    #[test]
    fn test_csv_output() {
        let csv = to_csv(&sample(), IdField::Id).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,split_id,name,memo,date,account,from_account_id,to_account_id,original_transaction_id,transaction_type,department_id,amount"
        );
        assert_eq!(
            lines.next().unwrap(),
            "t-1,,\"Acme, Inc.\",,2024-01-05,Checking,35,60,,Expense,,-12.50"
        );
        assert_eq!(lines.next().unwrap(), "t-2,t-1,\"Acme, Inc.\",,,Supplies,60,,,,,12.50");
    }

    #[test]
    fn test_groups_json() {
        let groups = crate::transform::grouper::rows_to_groups(&sample());
        let values = group_values(&groups, IdField::Uid).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["split_id"], "t-1");
        assert_eq!(values[0]["lines"][1]["uid"], "t-2");
        assert!(groups_to_json(&groups, IdField::Id).unwrap().contains("\"lines\""));
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
