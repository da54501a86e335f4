//! Detect merges that would overwrite uncommitted work.

use vtmerge_store::{RootValue, TableName, union_table_names};

fn changed_tables(from: &RootValue, to: &RootValue) -> Vec<TableName> {
    union_table_names([from, to])
        .into_iter()
        .filter(|name| from.table_hash(name) != to.table_hash(name))
        .collect()
}

/// Tables with uncommitted changes (`working` vs `head`) that the merge
/// (`merge_root` vs `head`) would also change.
///
/// A table counts even when both changes are identical: the caller's
/// working copy would still be replaced.
#[must_use]
pub fn merge_would_stomp_changes(
    head: &RootValue,
    working: &RootValue,
    merge_root: &RootValue,
) -> Vec<TableName> {
    if working.hash_of() == head.hash_of() {
        return Vec::new();
    }
    let merge_changes = changed_tables(head, merge_root);
    changed_tables(head, working)
        .into_iter()
        .filter(|name| merge_changes.contains(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtmerge_store::{Column, ColumnType, RowSet, Schema, Table, Value};

    fn t(v: i64) -> Table {
        let s = Schema::new(
            vec![Column::new(1, "id", ColumnType::Int).not_null()],
            vec![1],
            vec![],
        )
        .unwrap();
        let rows = RowSet::from_full_rows(&s, [vec![Value::Int(v)]]).unwrap();
        Table::new(s, rows)
    }

    fn root(tables: &[(&str, i64)]) -> RootValue {
        RootValue::new(
            tables
                .iter()
                .map(|(n, v)| (TableName::new(n).unwrap(), t(*v)))
                .collect(),
            vec![],
        )
    }

    #[test]
    fn only_tables_changed_by_both_are_reported() {
        let head = root(&[("a", 1), ("b", 1), ("c", 1)]);
        let working = root(&[("a", 2), ("b", 2), ("c", 1)]);
        let merged = root(&[("a", 3), ("b", 1), ("c", 3)]);
        let stomped = merge_would_stomp_changes(&head, &working, &merged);
        assert_eq!(stomped, vec![TableName::new("a").unwrap()]);
    }

    #[test]
    fn identical_changes_still_stomp() {
        let head = root(&[("a", 1)]);
        let changed = root(&[("a", 2)]);
        assert_eq!(merge_would_stomp_changes(&head, &changed, &changed).len(), 1);
        assert!(merge_would_stomp_changes(&head, &head, &changed).is_empty());
    }

    #[test]
    fn added_and_dropped_tables_count_as_changes() {
        let head = root(&[("a", 1)]);
        let working = root(&[("a", 1), ("n", 1)]);
        let merged = root(&[("n", 5)]);
        let stomped = merge_would_stomp_changes(&head, &working, &merged);
        assert_eq!(stomped, vec![TableName::new("n").unwrap()]);
        assert!(merged.table_hash(&TableName::new("a").unwrap()).is_none());
    }
}
