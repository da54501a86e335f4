//! Foreign-key checks.
//!
//! A child row violates a foreign key when every constrained cell is
//! non-NULL and no parent row carries the same values in the referenced
//! columns. Rows with any NULL constrained cell are not checked.

use std::collections::BTreeSet;

use serde_json::json;
use vtmerge_store::{
    CellLocation, ConstraintViolation, RootValue, Table, TableName, Tuple, ViolationKind,
};

use super::{ConstraintError, column_names, locate_all, project, tuple_json};

fn values_at(table: &Table, locs: &[CellLocation]) -> BTreeSet<Tuple> {
    table
        .rows()
        .iter()
        .filter_map(|(k, v)| project(k, v, locs))
        .collect()
}

/// Violations of every foreign key whose child is `name`.
///
/// With `changed`, only changed child rows and child rows referencing parent
/// values that disappeared since `comparison` are checked.
pub(crate) fn foreign_key_violations(
    root: &RootValue,
    comparison: &RootValue,
    name: &TableName,
    child: &Table,
    changed: Option<&BTreeSet<Tuple>>,
) -> Result<Vec<ConstraintViolation>, ConstraintError> {
    let mut out = Vec::new();
    for fk in root.foreign_keys_of(name) {
        let parent = root
            .get_table(&fk.parent_table)
            .ok_or_else(|| ConstraintError::MissingTable {
                table: fk.parent_table.clone(),
            })?;
        let child_locs = locate_all(name, child.schema(), &fk.name, &fk.child_tags)?;
        let parent_locs = locate_all(&fk.parent_table, parent.schema(), &fk.name, &fk.parent_tags)?;
        let present = values_at(parent, &parent_locs);

        // Parent values that existed before and are gone now.
        let removed: Option<BTreeSet<Tuple>> = changed.and_then(|_| {
            let before = comparison.get_table(&fk.parent_table)?;
            let locs =
                locate_all(&fk.parent_table, before.schema(), &fk.name, &fk.parent_tags).ok()?;
            Some(values_at(before, &locs).difference(&present).cloned().collect())
        });

        let child_columns = column_names(child.schema(), &fk.child_tags);
        let parent_columns = column_names(parent.schema(), &fk.parent_tags);
        for (key, row) in child.rows() {
            let Some(value) = project(key, row, &child_locs) else {
                continue;
            };
            if let Some(changed) = changed {
                let touched = changed.contains(key);
                let orphaned = removed.as_ref().is_some_and(|r| r.contains(&value));
                if !touched && !orphaned {
                    continue;
                }
            }
            if present.contains(&value) {
                continue;
            }
            out.push(ConstraintViolation {
                kind: ViolationKind::ForeignKey,
                constraint: fk.name.clone(),
                key: key.clone(),
                row: row.clone(),
                info: json!({
                    "foreign_key": fk.name,
                    "parent_table": fk.parent_table.as_str(),
                    "child_columns": child_columns,
                    "parent_columns": parent_columns,
                    "value": tuple_json(&value),
                }),
            });
        }
    }
    Ok(out)
}
