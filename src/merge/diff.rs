//! Three-way row differ.
//!
//! [`ThreeWayDiff`] walks the base, ours, and theirs row sets of one table
//! as a single merge-join over three sorted streams and yields one
//! [`RowDiff`] per key that changed on at least one side. Keys unchanged on
//! both sides are skipped.
//!
//! # Classification
//!
//! | base | ours | theirs | Result |
//! |------|------|--------|--------|
//! | x | x | y | [`DiffKind::Theirs`] (add, modify, or delete from theirs) |
//! | x | y | x | [`DiffKind::Ours`] |
//! | x | y | y | [`DiffKind::Convergent`] |
//! | - | y | z | conflict, add/add |
//! | x | - | y | conflict, delete/modify |
//! | x | y | - | conflict, modify/delete |
//! | x | y | z | [`DiffKind::CellMerged`] if the changed columns are disjoint, else conflict, modify/modify |
//!
//! Keyless tables have no column-level granularity: a row's key is the hash
//! of its cells and a "modify" is a delete plus an add. Any change of the same
//! row hash on both sides, identical or not, is a keyless conflict.
//!
//! # Layout
//!
//! Each side's rows are remapped into the merged schema's value layout as
//! they stream past. Columns a side does not have take the merged column's
//! default, or `NULL`. Keyless sides whose layout changes are remapped up
//! front, since the new cells hash to new keys and may collapse duplicates.
//!
//! # Determinism
//!
//! Output follows the row sets' key order (`BTreeMap`), never hash-map
//! iteration, so the same inputs always produce the same sequence.

use std::iter::Peekable;

use vtmerge_store::{
    CellLocation, ColumnTag, ConflictEntry, RowConflictKind, RowSet, RowValue, Schema, Table,
    Tuple, Value, keyless_key,
};

use super::value::{CellMerge, differing_columns, try_merge};

// ---------------------------------------------------------------------------
// Row layout mapping
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
enum Source {
    Cell(usize),
    Fill(Value),
}

/// Maps value tuples from one schema's layout into another's, by column tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowMapping {
    sources: Vec<Source>,
    identity: bool,
}

impl RowMapping {
    /// Mapping from rows stored under `from` to rows stored under `to`.
    #[must_use]
    pub fn between(from: &Schema, to: &Schema) -> Self {
        let sources: Vec<Source> = to
            .value_columns()
            .map(|col| match from.locate(col.tag) {
                Some(CellLocation::Value(i)) => Source::Cell(i),
                _ => Source::Fill(col.fill_value()),
            })
            .collect();
        let identity = sources.len() == from.value_columns().count()
            && sources
                .iter()
                .enumerate()
                .all(|(i, s)| matches!(s, Source::Cell(j) if *j == i));
        Self { sources, identity }
    }

    /// Returns `true` if the mapping leaves tuples unchanged.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.identity
    }

    /// Remap one value tuple.
    #[must_use]
    pub fn apply(&self, cells: &Tuple) -> Tuple {
        if self.identity {
            return cells.clone();
        }
        self.sources
            .iter()
            .map(|s| match s {
                Source::Cell(i) => cells.get(*i).cloned().unwrap_or(Value::Null),
                Source::Fill(v) => v.clone(),
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn apply_row(&self, row: &RowValue) -> RowValue {
        RowValue {
            cells: self.apply(&row.cells),
            cardinality: row.cardinality,
        }
    }
}

/// Remap a whole row set. Keyless rows are re-keyed by their new content
/// hash, and rows that become identical merge their cardinalities.
#[must_use]
pub fn remap_rows(rows: &RowSet, mapping: &RowMapping, keyless: bool) -> RowSet {
    if mapping.is_identity() {
        return rows.clone();
    }
    if !keyless {
        return rows
            .iter()
            .map(|(k, v)| (k.clone(), mapping.apply_row(v)))
            .collect();
    }
    let mut out = RowSet::new();
    for (_, row) in rows {
        let cells = mapping.apply(&row.cells);
        let key = keyless_key(&cells);
        let copies = out.get(&key).map_or(0, |r| r.cardinality) + row.cardinality;
        out.insert(key, RowValue::with_cardinality(cells, copies));
    }
    out
}

// ---------------------------------------------------------------------------
// RowDiff
// ---------------------------------------------------------------------------

/// How one key changed across the three sides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffKind {
    /// Only our side changed it.
    Ours,
    /// Only their side changed it.
    Theirs,
    /// Both sides made the same change.
    Convergent,
    /// Both sides changed disjoint columns; the changes were combined.
    CellMerged,
    /// The changes cannot be reconciled.
    Conflict {
        /// Conflict classification.
        kind: RowConflictKind,
        /// Columns changed differently by both sides (modify/modify and
        /// add/add only).
        columns: Vec<ColumnTag>,
    },
}

/// Net effect of a diff on our side's table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowChange {
    /// Row inserted.
    Added,
    /// Row value replaced.
    Modified,
    /// Row removed.
    Deleted,
}

/// One changed key. Values are in the merged schema's layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowDiff {
    /// Row key.
    pub key: Tuple,
    /// Base value.
    pub base: Option<RowValue>,
    /// Our value.
    pub ours: Option<RowValue>,
    /// Their value.
    pub theirs: Option<RowValue>,
    /// Classification.
    pub kind: DiffKind,
    /// The merged value. `None` means deleted. For conflicts this is our
    /// value, kept as the working row until the conflict is resolved.
    pub merged: Option<RowValue>,
}

impl RowDiff {
    /// Returns `true` if the key could not be merged.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.kind, DiffKind::Conflict { .. })
    }

    /// What applying this diff does to our side's row.
    #[must_use]
    pub fn change(&self) -> Option<RowChange> {
        if self.is_conflict() {
            return None;
        }
        match (&self.ours, &self.merged) {
            (None, Some(_)) => Some(RowChange::Added),
            (Some(_), None) => Some(RowChange::Deleted),
            (Some(a), Some(b)) if a != b => Some(RowChange::Modified),
            _ => None,
        }
    }

    /// The conflict record for a conflicting key.
    #[must_use]
    pub fn conflict_entry(&self) -> Option<ConflictEntry> {
        let DiffKind::Conflict { kind, columns } = &self.kind else {
            return None;
        };
        Some(ConflictEntry {
            key: self.key.clone(),
            base: self.base.clone(),
            ours: self.ours.clone(),
            theirs: self.theirs.clone(),
            kind: *kind,
            columns: columns.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// ThreeWayDiff
// ---------------------------------------------------------------------------

type Stream<'a> = Peekable<Box<dyn Iterator<Item = (Tuple, RowValue)> + 'a>>;

fn stream<'a>(table: &'a Table, merged: &Schema) -> Stream<'a> {
    let mapping = RowMapping::between(table.schema(), merged);
    let rows = table.rows();
    let iter: Box<dyn Iterator<Item = (Tuple, RowValue)> + 'a> = if merged.is_keyless() {
        Box::new(remap_rows(rows, &mapping, true).into_iter())
    } else if mapping.is_identity() {
        Box::new(rows.iter().map(|(k, v)| (k.clone(), v.clone())))
    } else {
        Box::new(
            rows.iter()
                .map(move |(k, v)| (k.clone(), mapping.apply_row(v))),
        )
    };
    iter.peekable()
}

fn take(stream: &mut Stream<'_>, key: &Tuple) -> Option<RowValue> {
    stream.next_if(|(k, _)| k == key).map(|(_, v)| v)
}

/// Lazy, single-pass three-way diff of one table.
pub struct ThreeWayDiff<'a> {
    schema: &'a Schema,
    base: Stream<'a>,
    ours: Stream<'a>,
    theirs: Stream<'a>,
}

impl<'a> ThreeWayDiff<'a> {
    /// Diff `ours` and `theirs` against `base`, remapping every side into
    /// `merged`. All three tables must have the same primary key as `merged`.
    #[must_use]
    pub fn new(merged: &'a Schema, base: &'a Table, ours: &'a Table, theirs: &'a Table) -> Self {
        Self {
            schema: merged,
            base: stream(base, merged),
            ours: stream(ours, merged),
            theirs: stream(theirs, merged),
        }
    }

    fn next_key(&mut self) -> Option<Tuple> {
        [self.base.peek(), self.ours.peek(), self.theirs.peek()]
            .into_iter()
            .flatten()
            .map(|(k, _)| k)
            .min()
            .cloned()
    }
}

impl Iterator for ThreeWayDiff<'_> {
    type Item = RowDiff;

    fn next(&mut self) -> Option<RowDiff> {
        loop {
            let key = self.next_key()?;
            let base = take(&mut self.base, &key);
            let ours = take(&mut self.ours, &key);
            let theirs = take(&mut self.theirs, &key);
            let classified = if self.schema.is_keyless() {
                classify_keyless(base.as_ref(), ours.as_ref(), theirs.as_ref())
            } else {
                classify_keyed(self.schema, base.as_ref(), ours.as_ref(), theirs.as_ref())
            };
            if let Some((kind, merged)) = classified {
                return Some(RowDiff {
                    key,
                    base,
                    ours,
                    theirs,
                    kind,
                    merged,
                });
            }
        }
    }
}

/// Diff one table three ways. See [`ThreeWayDiff`].
#[must_use]
pub fn three_way_diff<'a>(
    merged: &'a Schema,
    base: &'a Table,
    ours: &'a Table,
    theirs: &'a Table,
) -> ThreeWayDiff<'a> {
    ThreeWayDiff::new(merged, base, ours, theirs)
}

type Classified = Option<(DiffKind, Option<RowValue>)>;

fn conflict(kind: RowConflictKind, columns: Vec<ColumnTag>, ours: Option<&RowValue>) -> Classified {
    Some((DiffKind::Conflict { kind, columns }, ours.cloned()))
}

fn classify_keyed(
    schema: &Schema,
    base: Option<&RowValue>,
    ours: Option<&RowValue>,
    theirs: Option<&RowValue>,
) -> Classified {
    if ours == theirs {
        if ours == base {
            return None;
        }
        return Some((DiffKind::Convergent, ours.cloned()));
    }
    if ours == base {
        return Some((DiffKind::Theirs, theirs.cloned()));
    }
    if theirs == base {
        return Some((DiffKind::Ours, ours.cloned()));
    }
    match (base, ours, theirs) {
        (None, Some(o), Some(t)) => conflict(
            RowConflictKind::AddAdd,
            differing_columns(schema, &o.cells, &t.cells),
            ours,
        ),
        (Some(_), None, Some(_)) => conflict(RowConflictKind::DeletedByOurs, Vec::new(), ours),
        (Some(_), Some(_), None) => conflict(RowConflictKind::DeletedByTheirs, Vec::new(), ours),
        (Some(b), Some(o), Some(t)) => match try_merge(schema, &b.cells, &o.cells, &t.cells) {
            CellMerge::Merged(cells) => Some((DiffKind::CellMerged, Some(RowValue::new(cells)))),
            CellMerge::Conflict(columns) => conflict(RowConflictKind::ModifyModify, columns, ours),
        },
        // Every other presence pattern has two equal sides and was handled
        // above.
        _ => None,
    }
}

fn classify_keyless(
    base: Option<&RowValue>,
    ours: Option<&RowValue>,
    theirs: Option<&RowValue>,
) -> Classified {
    match (ours == base, theirs == base) {
        (true, true) => None,
        (true, false) => Some((DiffKind::Theirs, theirs.cloned())),
        (false, true) => Some((DiffKind::Ours, ours.cloned())),
        (false, false) => conflict(RowConflictKind::Keyless, Vec::new(), ours),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
