//! Collect reconstructed ledger rows into split transactions.
//!
//! ```text
//! Ledger rows (flat)                    Split groups
//! ┌──────────────────────────┐         ┌──────────────────────────┐
//! │ id: t1  split_id: ""     │         │ split_id: t1             │
//! │ id: t2  split_id: t1     │   →     │ lines: [t1, t2, t3]      │
//! │ id: t3  split_id: t1     │         ├──────────────────────────┤
//! │ id: t4  split_id: ""     │         │ split_id: t4             │
//! │ id: t5  split_id: t4     │         │ lines: [t4, t5]          │
//! └──────────────────────────┘         └──────────────────────────┘
//! ```
//!
//! Group order follows the first appearance of each group in the input.

use std::collections::HashMap;

use crate::models::{LedgerRow, SplitGroup};

/// Group rows by their split group key.
pub fn rows_to_groups(rows: &[LedgerRow]) -> Vec<SplitGroup> {
    let mut builders: Vec<GroupBuilder> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows.iter().filter(|r| !r.id.is_empty()) {
        let key = row.group_key();
        let slot = *index.entry(key).or_insert_with(|| {
            builders.push(GroupBuilder::new(key));
            builders.len() - 1
        });
        builders[slot].add_line(row);
    }

    builders.into_iter().map(GroupBuilder::build).collect()
}

/// Accumulates the lines of one group.
struct GroupBuilder {
    split_id: String,
    anchor: Option<LedgerRow>,
    members: Vec<LedgerRow>,
}

impl GroupBuilder {
    fn new(split_id: &str) -> Self {
        Self {
            split_id: split_id.to_string(),
            anchor: None,
            members: Vec::new(),
        }
    }

    fn add_line(&mut self, row: &LedgerRow) {
        if row.id == self.split_id {
            self.anchor = Some(row.clone());
        } else {
            self.members.push(row.clone());
        }
    }

    fn build(self) -> SplitGroup {
        // Header fields come from the anchor, or the first member when the
        // anchor was filtered out upstream.
        let head = self
            .anchor
            .clone()
            .or_else(|| self.members.first().cloned())
            .unwrap_or_default();

        let to_account_id = head.to_account_id.clone().or_else(|| {
            self.members
                .iter()
                .find_map(|m| m.to_account_id.clone())
        });

        let mut lines = Vec::with_capacity(self.members.len() + 1);
        lines.extend(self.anchor);
        lines.extend(self.members);

        SplitGroup {
            split_id: self.split_id,
            name: head.name,
            date: head.date,
            transaction_type: head.transaction_type,
            from_account_id: head.from_account_id,
            to_account_id,
            lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, split_id: &str, account: &str) -> LedgerRow {
        LedgerRow {
            id: id.into(),
            split_id: split_id.into(),
            from_account_id: Some(account.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_groups_in_first_appearance_order() {
        let mut anchor = row("t1", "", "A");
        anchor.name = "Office Depot".into();
        anchor.to_account_id = Some("B".into());
        let rows = vec![
            anchor,
            row("t2", "t1", "B"),
            row("t4", "", "C"),
            row("t5", "t4", "D"),
            row("t3", "t1", "E"),
        ];

        let groups = rows_to_groups(&rows);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].split_id, "t1");
        assert_eq!(groups[0].name, "Office Depot");
        assert_eq!(groups[0].from_account_id.as_deref(), Some("A"));
        assert_eq!(groups[0].to_account_id.as_deref(), Some("B"));
        let ids: Vec<&str> = groups[0].lines.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
        assert_eq!(groups[1].lines.len(), 2);
    }

    #[test]
    fn test_blank_rows_ignored() {
        let rows = vec![LedgerRow::default(), row("t1", "", "A")];
        let groups = rows_to_groups(&rows);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].lines.len(), 1);
    }

    #[test]
    fn test_members_without_anchor() {
        let rows = vec![row("t2", "t1", "B"), row("t3", "t1", "C")];
        let groups = rows_to_groups(&rows);
        assert_eq!(groups[0].from_account_id.as_deref(), Some("B"));
        assert_eq!(groups[0].lines.len(), 2);
    }
}
