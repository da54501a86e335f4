//! Root-level foreign-key merge.
//!
//! Foreign keys live on the root, not on a table, because they span two
//! tables. They are matched across base, ours, and theirs by the column pairs
//! they constrain (child table and tags, parent table and tags); the name is
//! an attribute that merges three-way like a column name does.
//!
//! After merging, [`prune_foreign_keys`] drops every key whose child or
//! parent table, or any constrained column, no longer exists in the merged
//! root.

use vtmerge_store::{ForeignKey, RootValue};

use crate::model::conflict::{SchemaConflict, SchemaConflictKind};

/// Merged foreign-key set plus anything that could not be reconciled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergedForeignKeys {
    /// The merged keys: common keys in our order, then ours-only, then
    /// theirs-only additions.
    pub foreign_keys: Vec<ForeignKey>,
    /// Conflicts, each reported on the child table.
    pub conflicts: Vec<SchemaConflict>,
}

fn find<'a>(set: &'a [ForeignKey], fk: &ForeignKey) -> Option<&'a ForeignKey> {
    set.iter().find(|other| other.same_columns(fk))
}

fn conflict(fk: &ForeignKey, detail: impl Into<String>) -> SchemaConflict {
    SchemaConflict::new(
        fk.child_table.clone(),
        SchemaConflictKind::ForeignKey {
            name: fk.name.clone(),
        },
        detail,
    )
}

/// Merge the foreign keys of `ours` and `theirs` against `base`.
#[must_use]
pub fn merge_foreign_keys(
    base: &[ForeignKey],
    ours: &[ForeignKey],
    theirs: &[ForeignKey],
) -> MergedForeignKeys {
    let mut out = MergedForeignKeys::default();

    for fk in ours {
        match (find(base, fk), find(theirs, fk)) {
            (Some(b), Some(t)) => {
                if fk.name == t.name || t.name == b.name {
                    out.foreign_keys.push(fk.clone());
                } else if fk.name == b.name {
                    out.foreign_keys.push(t.clone());
                } else {
                    out.conflicts.push(conflict(
                        fk,
                        format!("renamed to '{}' by ours and '{}' by theirs", fk.name, t.name),
                    ));
                }
            }
            (None, Some(t)) => {
                if fk.name == t.name {
                    out.foreign_keys.push(fk.clone());
                } else {
                    out.conflicts.push(conflict(
                        fk,
                        format!("added on both sides as '{}' and '{}'", fk.name, t.name),
                    ));
                }
            }
            (Some(b), None) => {
                if fk.name != b.name {
                    out.conflicts.push(conflict(fk, "dropped by theirs, renamed by ours"));
                }
            }
            (None, None) => out.foreign_keys.push(fk.clone()),
        }
    }
    for fk in theirs {
        if find(ours, fk).is_some() {
            continue;
        }
        match find(base, fk) {
            Some(b) if fk.name != b.name => {
                out.conflicts.push(conflict(fk, "dropped by ours, renamed by theirs"));
            }
            Some(_) => {}
            None => out.foreign_keys.push(fk.clone()),
        }
    }

    let merged = &out.foreign_keys;
    let collisions: Vec<SchemaConflict> = merged
        .iter()
        .enumerate()
        .filter(|(i, fk)| {
            merged[..*i]
                .iter()
                .any(|earlier| earlier.name.eq_ignore_ascii_case(&fk.name))
        })
        .map(|(_, fk)| conflict(fk, "name used by two different foreign keys"))
        .collect();
    out.conflicts.extend(collisions);
    out
}

/// Keep only the foreign keys whose tables and columns exist in `root`.
#[must_use]
pub fn prune_foreign_keys(root: &RootValue, foreign_keys: Vec<ForeignKey>) -> Vec<ForeignKey> {
    foreign_keys
        .into_iter()
        .filter(|fk| {
            let (Some(child), Some(parent)) =
                (root.get_table(&fk.child_table), root.get_table(&fk.parent_table))
            else {
                return false;
            };
            fk.child_tags.iter().all(|t| child.schema().column(*t).is_some())
                && fk.parent_tags.iter().all(|t| parent.schema().column(*t).is_some())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vtmerge_store::{Column, ColumnType, Schema, Table, TableName};

    fn name(s: &str) -> TableName {
        TableName::new(s).unwrap()
    }

    fn fk(n: &str, child_tag: u64) -> ForeignKey {
        ForeignKey {
            name: n.to_owned(),
            child_table: name("orders"),
            child_tags: vec![child_tag],
            parent_table: name("customers"),
            parent_tags: vec![1],
        }
    }

    #[test]
    fn one_sided_additions_and_renames_merge() {
        let base = vec![fk("fk_a", 2)];
        let ours = vec![fk("fk_a_renamed", 2)];
        let theirs = vec![fk("fk_a", 2), fk("fk_b", 3)];
        let merged = merge_foreign_keys(&base, &ours, &theirs);
        assert!(merged.conflicts.is_empty());
        let names: Vec<_> = merged.foreign_keys.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["fk_a_renamed", "fk_b"]);
    }

    #[test]
    fn divergent_renames_conflict_on_child_table() {
        let base = vec![fk("fk_a", 2)];
        let merged = merge_foreign_keys(&base, &[fk("x", 2)], &[fk("y", 2)]);
        assert_eq!(merged.conflicts.len(), 1);
        assert_eq!(merged.conflicts[0].table, name("orders"));
    }

    #[test]
    fn same_name_on_different_columns_collides() {
        let merged = merge_foreign_keys(&[], &[fk("fk", 2)], &[fk("FK", 3)]);
        assert_eq!(merged.foreign_keys.len(), 2);
        assert_eq!(merged.conflicts.len(), 1);
    }

    #[test]
    fn untouched_key_dropped_on_one_side_is_dropped() {
        let merged = merge_foreign_keys(&[fk("fk_a", 2)], &[fk("fk_a", 2)], &[]);
        assert!(merged.foreign_keys.is_empty());
        assert!(merged.conflicts.is_empty());
    }

    #[test]
    fn pruning_drops_keys_over_missing_tables_or_columns() {
        let customers = Schema::new(
            vec![Column::new(1, "id", ColumnType::Int).not_null()],
            vec![1],
            vec![],
        )
        .unwrap();
        let orders = Schema::new(
            vec![
                Column::new(1, "id", ColumnType::Int).not_null(),
                Column::new(2, "customer", ColumnType::Int),
            ],
            vec![1],
            vec![],
        )
        .unwrap();
        let root = RootValue::new(
            BTreeMap::from([
                (name("customers"), Table::empty(customers)),
                (name("orders"), Table::empty(orders)),
            ]),
            vec![],
        );
        let kept = prune_foreign_keys(&root, vec![fk("ok", 2), fk("missing_col", 3)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "ok");
        let without_parent = root.remove_table(&name("customers"));
        assert!(prune_foreign_keys(&without_parent, vec![fk("ok", 2)]).is_empty());
    }
}
