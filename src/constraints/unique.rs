//! Unique-index checks.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;
use vtmerge_store::{ConstraintViolation, Table, TableName, Tuple, ViolationKind};

use super::{ConstraintError, column_names, locate_all, project, tuple_json};

/// Rows sharing a non-NULL value of a unique index.
///
/// With `changed`, only duplicate groups containing a changed key are
/// reported. Every row of a reported group gets a violation. A keyless row
/// stored with more than one copy duplicates itself.
pub(crate) fn unique_violations(
    name: &TableName,
    table: &Table,
    changed: Option<&BTreeSet<Tuple>>,
) -> Result<Vec<ConstraintViolation>, ConstraintError> {
    let schema = table.schema();
    let mut out = Vec::new();
    for index in schema.indexes().iter().filter(|i| i.unique) {
        let locs = locate_all(name, schema, &index.name, &index.tags)?;
        let mut groups: BTreeMap<Tuple, Vec<&Tuple>> = BTreeMap::new();
        let mut copies: BTreeMap<Tuple, u64> = BTreeMap::new();
        for (key, row) in table.rows() {
            let Some(value) = project(key, row, &locs) else {
                continue;
            };
            *copies.entry(value.clone()).or_insert(0) += row.cardinality;
            groups.entry(value).or_default().push(key);
        }
        let columns = column_names(schema, &index.tags);
        for (value, keys) in groups {
            if copies.get(&value).copied().unwrap_or(0) < 2 {
                continue;
            }
            if let Some(changed) = changed {
                if !keys.iter().any(|k| changed.contains(*k)) {
                    continue;
                }
            }
            for key in keys {
                let Some(row) = table.rows().get(key) else {
                    continue;
                };
                out.push(ConstraintViolation {
                    kind: ViolationKind::UniqueIndex,
                    constraint: index.name.clone(),
                    key: key.clone(),
                    row: row.clone(),
                    info: json!({
                        "index": index.name,
                        "columns": columns,
                        "value": tuple_json(&value),
                    }),
                });
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtmerge_store::{Column, ColumnType, IndexDef, RowSet, Schema, Value};

    #[test]
    fn keyless_duplicates_violate_unique_index() {
        let s = Schema::new(
            vec![Column::new(1, "code", ColumnType::Text)],
            vec![],
            vec![IndexDef::new("uniq_code", vec![1], true)],
        )
        .unwrap();
        let rows = RowSet::from_full_rows(
            &s,
            [vec![Value::from("x")], vec![Value::from("x")], vec![Value::from("y")]],
        )
        .unwrap();
        let t = Table::new(s, rows);
        let name = TableName::new("codes").unwrap();
        let found = unique_violations(&name, &t, None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].row.cardinality, 2);
        assert_eq!(found[0].info["columns"][0], "code");
    }

    #[test]
    fn non_unique_indexes_are_ignored() {
        let s = Schema::new(
            vec![
                Column::new(1, "id", ColumnType::Int).not_null(),
                Column::new(2, "tag", ColumnType::Text),
            ],
            vec![1],
            vec![IndexDef::new("by_tag", vec![2], false)],
        )
        .unwrap();
        let rows = RowSet::from_full_rows(
            &s,
            [
                vec![Value::Int(1), Value::from("t")],
                vec![Value::Int(2), Value::from("t")],
            ],
        )
        .unwrap();
        let name = TableName::new("items").unwrap();
        assert!(unique_violations(&name, &Table::new(s, rows), None).unwrap().is_empty());
    }
}
