//! Integration tests for whole-commit merges.
//!
//! Coverage:
//! - disjoint column edits merge cell-wise; same-column edits conflict
//! - convergent edits record no conflict
//! - conflicted keys stay visibly unresolved until resolved
//! - resolution round trip, including accepting a delete
//! - primary-key change gating, default and strict
//! - schema conflicts: abort by default, skip the table when kept
//! - foreign-key, unique and NOT NULL violations surfaced as data after a merge
//! - keyless copy-count conflicts and their resolution
//! - fast-forward, up to date, and report status

mod common;

use common::{
    Repo, abc_schema, child_fk, child_schema, key, name, parent_schema, root, root_with_fks,
    row_of, table,
};
use vtmerge::merge::MergeOptions;
use vtmerge::model::conflict::SchemaConflictKind;
use vtmerge::model::report::{MergeReport, MergeStatus};
use vtmerge::model::stats::TableOperation;
use vtmerge::resolve::{ResolveError, resolve_in_root};
use vtmerge::{MergeError, Side};
use vtmerge_store::{
    Column, ColumnType, RowConflictKind, RowSet, RowState, Schema, Table, Tuple, Value,
    ViolationKind, keyless_key,
};

fn abc(rows: &[&[i64]]) -> vtmerge_store::RootValue {
    root(vec![("t", table(&abc_schema(), rows))])
}

// ---------------------------------------------------------------------------
// Row merges
// ---------------------------------------------------------------------------

#[test]
fn disjoint_column_edits_merge_cell_wise() {
    let mut repo = Repo::new();
    let (_, ours, theirs) =
        repo.diverge(abc(&[&[1, 1, 1]]), abc(&[&[1, 2, 1]]), abc(&[&[1, 1, 2]]));
    let out = repo.merge(&ours, &theirs, &MergeOptions::default()).unwrap();

    let t = out.root.get_table(&name("t")).unwrap();
    assert_eq!(row_of(t, 1), Some(vec![1, 2, 2]));
    assert!(!t.has_conflicts());
    assert!(!out.has_conflicts());
    assert_eq!(out.stats[&name("t")].operation, TableOperation::Modified);
    assert_eq!(out.stats[&name("t")].modifications, 1);
}

#[test]
fn same_column_edits_conflict_with_all_three_values() {
    let mut repo = Repo::new();
    let (_, ours, theirs) =
        repo.diverge(abc(&[&[1, 1, 1]]), abc(&[&[1, 2, 1]]), abc(&[&[1, 3, 1]]));
    let out = repo.merge(&ours, &theirs, &MergeOptions::default()).unwrap();

    let t = out.root.get_table(&name("t")).unwrap();
    assert_eq!(t.conflicts().len(), 1);
    let RowState::Conflicted { working, entry } = t.lookup(&key(1)) else {
        panic!("key 1 should be conflicted");
    };
    assert_eq!(entry.kind, RowConflictKind::ModifyModify);
    assert_eq!(entry.columns, vec![2]);
    assert!(entry.base.is_some() && entry.ours.is_some() && entry.theirs.is_some());
    assert_eq!(working, entry.ours.as_ref());
    assert_eq!(out.stats[&name("t")].data_conflicts, 1);
    assert_eq!(out.conflicted_tables(), vec![name("t")]);
}

#[test]
fn convergent_edits_do_not_conflict() {
    let mut repo = Repo::new();
    let (_, ours, theirs) = repo.diverge(
        abc(&[&[1, 1, 1], &[2, 2, 2]]),
        abc(&[&[1, 5, 1], &[2, 2, 2]]),
        abc(&[&[1, 5, 1], &[2, 2, 2], &[3, 3, 3]]),
    );
    let out = repo.merge(&ours, &theirs, &MergeOptions::default()).unwrap();

    let t = out.root.get_table(&name("t")).unwrap();
    assert!(!t.has_conflicts());
    assert_eq!(row_of(t, 1), Some(vec![1, 5, 1]));
    assert_eq!(row_of(t, 3), Some(vec![3, 3, 3]));
    assert_eq!(out.stats[&name("t")].adds, 1);
}

#[test]
fn delete_against_modify_conflicts_and_resolves_either_way() {
    let mut repo = Repo::new();
    let (_, ours, theirs) = repo.diverge(
        abc(&[&[1, 1, 1], &[2, 2, 2]]),
        abc(&[&[1, 1, 1]]),
        abc(&[&[1, 1, 1], &[2, 9, 2]]),
    );
    let out = repo.merge(&ours, &theirs, &MergeOptions::default()).unwrap();
    let t = out.root.get_table(&name("t")).unwrap();
    let entry = &t.conflicts()[&key(2)];
    assert_eq!(entry.kind, RowConflictKind::DeletedByOurs);
    assert!(entry.ours.is_none());

    let keep_delete = resolve_in_root(&out.root, &name("t"), &[key(2)], Side::Ours).unwrap();
    let resolved = keep_delete.get_table(&name("t")).unwrap();
    assert_eq!(resolved.lookup(&key(2)), RowState::Absent);
    assert!(keep_delete.tables_in_conflict().is_empty());

    let keep_edit = resolve_in_root(&out.root, &name("t"), &[key(2)], Side::Theirs).unwrap();
    assert_eq!(row_of(keep_edit.get_table(&name("t")).unwrap(), 2), Some(vec![2, 9, 2]));

    let again = resolve_in_root(&keep_edit, &name("t"), &[key(2)], Side::Theirs);
    assert!(matches!(again, Err(ResolveError::NoConflictsResolved { .. })));
}

// ---------------------------------------------------------------------------
// Schema gating
// ---------------------------------------------------------------------------

#[test]
fn primary_key_change_skips_table_or_fails_when_strict() {
    let rekeyed = Schema::new(
        vec![
            Column::new(1, "id", ColumnType::Int).not_null(),
            Column::new(2, "a", ColumnType::Int).not_null(),
            Column::new(3, "b", ColumnType::Int),
        ],
        vec![1, 2],
        vec![],
    )
    .unwrap();
    let mut repo = Repo::new();
    let (_, ours, theirs) = repo.diverge(
        root(vec![("t", table(&abc_schema(), &[&[1, 1, 1]])), ("u", table(&abc_schema(), &[]))]),
        root(vec![("t", table(&rekeyed, &[&[1, 1, 1]])), ("u", table(&abc_schema(), &[]))]),
        root(vec![
            ("t", table(&abc_schema(), &[&[1, 1, 1], &[2, 2, 2]])),
            ("u", table(&abc_schema(), &[&[7, 7, 7]])),
        ]),
    );

    let out = repo.merge(&ours, &theirs, &MergeOptions::default()).unwrap();
    assert_eq!(out.stats[&name("t")].operation, TableOperation::Skipped);
    assert_eq!(out.schema_conflicts.len(), 1);
    assert_eq!(out.schema_conflicts[0].kind, SchemaConflictKind::PrimaryKeyChange);
    assert_eq!(out.root.get_table(&name("t")), ours.root().get_table(&name("t")));
    assert_eq!(row_of(out.root.get_table(&name("u")).unwrap(), 7), Some(vec![7, 7, 7]));

    let strict = MergeOptions {
        strict_primary_keys: true,
        ..MergeOptions::default()
    };
    let err = repo.merge(&ours, &theirs, &strict).unwrap_err();
    assert!(matches!(err, MergeError::PrimaryKeyChange { .. }));
}

#[test]
fn column_definition_conflict_aborts_unless_kept() {
    let widened = |ty| {
        Schema::new(
            vec![
                Column::new(1, "id", ColumnType::Int).not_null(),
                Column::new(2, "a", ty),
                Column::new(3, "b", ColumnType::Int),
            ],
            vec![1],
            vec![],
        )
        .unwrap()
    };
    let mut repo = Repo::new();
    let (_, ours, theirs) = repo.diverge(
        root(vec![("t", table(&abc_schema(), &[])), ("u", table(&abc_schema(), &[]))]),
        root(vec![
            ("t", table(&widened(ColumnType::Text), &[])),
            ("u", table(&abc_schema(), &[])),
        ]),
        root(vec![
            ("t", table(&widened(ColumnType::Float), &[])),
            ("u", table(&abc_schema(), &[&[1, 1, 1]])),
        ]),
    );

    let err = repo.merge(&ours, &theirs, &MergeOptions::default()).unwrap_err();
    match &err {
        MergeError::SchemaConflict { table, conflicts } => {
            assert_eq!(table, &name("t"));
            assert_eq!(conflicts[0].kind, SchemaConflictKind::ColumnDefinition { tag: 2 });
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(MergeReport::from_result(&Err(err)).status, MergeStatus::Aborted);

    let keep = MergeOptions {
        keep_schema_conflicts: true,
        ..MergeOptions::default()
    };
    let out = repo.merge(&ours, &theirs, &keep).unwrap();
    assert_eq!(out.stats[&name("t")].operation, TableOperation::Skipped);
    assert_eq!(out.root.get_table(&name("u")).unwrap().rows().len(), 1);
    let report = MergeReport::from_result(&Ok(out));
    assert_eq!(report.status, MergeStatus::CompletedWithConflicts);
    assert_eq!(report.schema_conflicts.len(), 1);
}

// ---------------------------------------------------------------------------
// Constraint violations
// ---------------------------------------------------------------------------

#[test]
fn orphaned_child_is_reported_as_violation() {
    let parents = |rows: &[&[i64]]| table(&parent_schema(), rows);
    let children = |rows: &[&[i64]]| table(&child_schema(), rows);
    let mut repo = Repo::new();
    let (_, ours, theirs) = repo.diverge(
        root_with_fks(
            vec![("parent", parents(&[&[1], &[2]])), ("child", children(&[]))],
            vec![child_fk()],
        ),
        root_with_fks(
            vec![("parent", parents(&[&[2]])), ("child", children(&[]))],
            vec![child_fk()],
        ),
        root_with_fks(
            vec![("parent", parents(&[&[1], &[2]])), ("child", children(&[&[100, 1]]))],
            vec![child_fk()],
        ),
    );
    let out = repo.merge(&ours, &theirs, &MergeOptions::default()).unwrap();

    assert!(out.violating_tables.contains(&name("child")));
    let child = out.root.get_table(&name("child")).unwrap();
    assert_eq!(child.violations().len(), 1);
    let v = child.violations().values().next().unwrap();
    assert_eq!(v.kind, ViolationKind::ForeignKey);
    assert_eq!(v.constraint, "fk_child_parent");
    assert_eq!(v.key, key(100));
    assert_eq!(out.stats[&name("child")].constraint_violations, 1);
    assert_eq!(MergeStatus::of(&Ok(out)), MergeStatus::CompletedWithConflicts);
}

#[test]
fn rows_added_on_both_sides_can_break_a_unique_index() {
    let parents = table(&parent_schema(), &[&[1]]);
    let mut repo = Repo::new();
    let (_, ours, theirs) = repo.diverge(
        root_with_fks(
            vec![("parent", parents.clone()), ("child", table(&child_schema(), &[]))],
            vec![child_fk()],
        ),
        root_with_fks(
            vec![("parent", parents.clone()), ("child", table(&child_schema(), &[&[1, 1]]))],
            vec![child_fk()],
        ),
        root_with_fks(
            vec![("parent", parents), ("child", table(&child_schema(), &[&[2, 1]]))],
            vec![child_fk()],
        ),
    );
    let out = repo.merge(&ours, &theirs, &MergeOptions::default()).unwrap();

    let child = out.root.get_table(&name("child")).unwrap();
    assert_eq!(child.rows().len(), 2);
    assert!(!child.has_conflicts());
    assert_eq!(child.violations().len(), 2);
    assert!(child.violations().values().all(|v| v.kind == ViolationKind::UniqueIndex));
}

#[test]
fn null_kept_in_a_column_tightened_to_not_null_is_a_violation() {
    let schema = |a: Column| {
        Schema::new(vec![Column::new(1, "id", ColumnType::Int).not_null(), a], vec![1], vec![])
            .expect("valid schema")
    };
    let nullable = schema(Column::new(2, "a", ColumnType::Int));
    let required = schema(Column::new(2, "a", ColumnType::Int).not_null());
    let t = |s: &Schema, rows: Vec<Vec<Value>>| {
        let rows = RowSet::from_full_rows(s, rows).expect("valid rows");
        root(vec![("t", Table::new(s.clone(), rows))])
    };
    let one = vec![Value::Int(1), Value::Int(1)];
    let mut repo = Repo::new();
    let (_, ours, theirs) = repo.diverge(
        t(&nullable, vec![one.clone()]),
        t(&required, vec![one.clone()]),
        t(&nullable, vec![one, vec![Value::Int(2), Value::Null]]),
    );
    let out = repo.merge(&ours, &theirs, &MergeOptions::default()).unwrap();

    let merged = out.root.get_table(&name("t")).unwrap();
    assert!(!merged.schema().column(2).unwrap().nullable);
    assert!(!merged.has_conflicts());
    assert_eq!(merged.violations().len(), 1);
    let v = merged.violations().values().next().unwrap();
    assert_eq!(v.kind, ViolationKind::NotNull);
    assert_eq!(v.key, key(2));
    assert_eq!(v.info["columns"][0], "a");
    assert!(out.violating_tables.contains(&name("t")));
    assert_eq!(out.stats[&name("t")].constraint_violations, 1);
    assert_eq!(MergeStatus::of(&Ok(out)), MergeStatus::CompletedWithConflicts);
}

// ---------------------------------------------------------------------------
// Keyless tables
// ---------------------------------------------------------------------------

#[test]
fn keyless_copy_count_conflict_resolves_to_theirs() {
    let bag = Schema::new(vec![Column::new(1, "v", ColumnType::Int)], vec![], vec![])
        .expect("valid schema");
    let bags = |rows: &[&[i64]]| root(vec![("bag", table(&bag, rows))]);
    let mut repo = Repo::new();
    let (_, ours, theirs) = repo.diverge(
        bags(&[&[1], &[2]]),
        bags(&[&[1], &[1], &[2]]),
        bags(&[&[1], &[1], &[1], &[2]]),
    );
    let out = repo.merge(&ours, &theirs, &MergeOptions::default()).unwrap();

    let one = keyless_key(&Tuple::new(vec![Value::Int(1)]));
    let t = out.root.get_table(&name("bag")).unwrap();
    assert_eq!(t.conflicts()[&one].kind, RowConflictKind::Keyless);
    assert_eq!(t.rows().get(&one).map(|r| r.cardinality), Some(2));
    assert_eq!(out.stats[&name("bag")].data_conflicts, 1);

    let resolved = resolve_in_root(&out.root, &name("bag"), &[one.clone()], Side::Theirs).unwrap();
    let t = resolved.get_table(&name("bag")).unwrap();
    assert!(!t.has_conflicts());
    assert_eq!(t.rows().get(&one).map(|r| r.cardinality), Some(3));
    assert_eq!(t.rows().row_count(), 4);
}

// ---------------------------------------------------------------------------
// Short-circuits
// ---------------------------------------------------------------------------

#[test]
fn fast_forward_and_up_to_date_skip_the_differ() {
    let mut repo = Repo::new();
    let a = repo.commit(&[], abc(&[&[1, 1, 1]]));
    let b = repo.commit(&[&a], abc(&[&[1, 1, 1], &[2, 2, 2]]));

    let ff = repo.merge(&a, &b, &MergeOptions::default()).unwrap();
    assert!(ff.fast_forwarded);
    assert!(ff.stats.is_empty());
    assert_eq!(ff.root.hash_of(), b.root().hash_of());

    let noop = repo.merge(&a, &a, &MergeOptions::default()).unwrap();
    assert!(noop.up_to_date);
    assert_eq!(noop.root.hash_of(), a.root().hash_of());
    assert_eq!(MergeReport::from_result(&Ok(noop)).status, MergeStatus::Clean);

    let both = MergeOptions {
        squash: true,
        no_ff: true,
        ..MergeOptions::default()
    };
    assert!(matches!(
        repo.merge(&a, &b, &both),
        Err(MergeError::IncompatibleOptions { .. })
    ));
}
