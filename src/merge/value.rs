//! Cell-level merge of a row both sides modified.
//!
//! When the two sides changed different columns of the same row, the
//! changes can be combined without asking anyone: each column takes the side
//! that changed it. Only when both sides changed the same column to
//! different values does the row become a conflict.
//!
//! All three tuples must already be in the merged schema's value layout.

use vtmerge_store::{ColumnTag, Schema, Tuple, Value};

/// Outcome of [`try_merge`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CellMerge {
    /// Every column merged; the combined value tuple.
    Merged(Tuple),
    /// These column tags were changed differently by both sides.
    Conflict(Vec<ColumnTag>),
}

/// Merge `ours` and `theirs` column by column against `base`.
#[must_use]
pub fn try_merge(schema: &Schema, base: &Tuple, ours: &Tuple, theirs: &Tuple) -> CellMerge {
    let mut merged = Vec::with_capacity(ours.len());
    let mut conflicts = Vec::new();
    let null = Value::Null;
    for (i, col) in schema.value_columns().enumerate() {
        let b = base.get(i).unwrap_or(&null);
        let o = ours.get(i).unwrap_or(&null);
        let t = theirs.get(i).unwrap_or(&null);
        if o == t || t == b {
            merged.push(o.clone());
        } else if o == b {
            merged.push(t.clone());
        } else {
            conflicts.push(col.tag);
        }
    }
    if conflicts.is_empty() {
        CellMerge::Merged(Tuple::new(merged))
    } else {
        CellMerge::Conflict(conflicts)
    }
}

/// Tags of value columns whose cells differ between two tuples.
#[must_use]
pub fn differing_columns(schema: &Schema, a: &Tuple, b: &Tuple) -> Vec<ColumnTag> {
    schema
        .value_columns()
        .enumerate()
        .filter(|(i, _)| a.get(*i) != b.get(*i))
        .map(|(_, col)| col.tag)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtmerge_store::{Column, ColumnType};

    fn schema() -> Schema {
        Schema::new(
            vec![
                Column::new(1, "id", ColumnType::Int).not_null(),
                Column::new(2, "a", ColumnType::Int),
                Column::new(3, "b", ColumnType::Int),
            ],
            vec![1],
            vec![],
        )
        .unwrap()
    }

    fn cells(a: i64, b: i64) -> Tuple {
        Tuple::new(vec![Value::Int(a), Value::Int(b)])
    }

    #[test]
    fn disjoint_column_changes_combine() {
        let out = try_merge(&schema(), &cells(1, 1), &cells(2, 1), &cells(1, 2));
        assert_eq!(out, CellMerge::Merged(cells(2, 2)));
    }

    #[test]
    fn same_column_changed_differently_conflicts() {
        let out = try_merge(&schema(), &cells(1, 1), &cells(2, 1), &cells(3, 1));
        assert_eq!(out, CellMerge::Conflict(vec![2]));
    }

    #[test]
    fn identical_change_is_not_a_conflict() {
        let out = try_merge(&schema(), &cells(1, 1), &cells(2, 5), &cells(2, 1));
        assert_eq!(out, CellMerge::Merged(cells(2, 5)));
    }

    #[test]
    fn differing_columns_lists_changed_tags() {
        assert_eq!(differing_columns(&schema(), &cells(1, 1), &cells(1, 2)), vec![3]);
    }
}
