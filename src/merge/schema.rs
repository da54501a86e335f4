//! SCHEMA step: three-way merge of one table's schema.
//!
//! Columns and indexes are matched by stable identity (column tag, indexed
//! tag list), never by name or position, so a rename on one side still lines
//! up with its base counterpart.
//!
//! # Columns
//!
//! For a tag present in base, ours, and theirs, each attribute (name, type,
//! nullability, default, generated expression, auto-increment) is merged on
//! its own: unchanged on one side means take the other side's value; changed
//! identically on both means take it; changed differently means a
//! [`ColumnDefinition`] conflict. A column dropped on one side and modified on
//! the other is a [`ColumnDropModify`] conflict; dropped on one side and
//! untouched on the other, it is dropped. Two distinct tags that end up with
//! the same case-insensitive name are a [`ColumnNameCollision`].
//!
//! # Column order
//!
//! Columns present on both sides (in our order), then columns only we added,
//! then columns only they added.
//!
//! # Primary keys
//!
//! [`primary_key_conflict`] is checked before anything else: if either side
//! changed the key columns, their order, or their types, rows cannot be
//! matched key-for-key and no schema or data merge is attempted.
//!
//! [`ColumnDefinition`]: SchemaConflictKind::ColumnDefinition
//! [`ColumnDropModify`]: SchemaConflictKind::ColumnDropModify
//! [`ColumnNameCollision`]: SchemaConflictKind::ColumnNameCollision

use std::collections::BTreeMap;

use vtmerge_store::{
    Column, ColumnTag, IndexDef, Schema, StoreError, TableName, primary_key_sets_diffable,
};

use crate::model::conflict::{SchemaConflict, SchemaConflictKind};

/// Result of merging one table's schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedSchema {
    /// The merged schema. Equal to our schema when `conflicts` is non-empty.
    pub schema: Schema,
    /// Conflicts that block data merge for this table.
    pub conflicts: Vec<SchemaConflict>,
}

impl MergedSchema {
    /// Returns `true` if the schema merged without conflicts.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Three-way outcome of a single attribute.
fn merge3<T: PartialEq + Clone>(base: &T, ours: &T, theirs: &T) -> Option<T> {
    if ours == theirs || theirs == base {
        Some(ours.clone())
    } else if ours == base {
        Some(theirs.clone())
    } else {
        None
    }
}

/// Report a primary-key change on either side relative to base.
#[must_use]
pub fn primary_key_conflict(
    table: &TableName,
    base: &Schema,
    ours: &Schema,
    theirs: &Schema,
) -> Option<SchemaConflict> {
    if primary_key_sets_diffable(base, ours) && primary_key_sets_diffable(base, theirs) {
        return None;
    }
    let detail = format!(
        "base {}, ours {}, theirs {}",
        describe_key(base),
        describe_key(ours),
        describe_key(theirs)
    );
    Some(SchemaConflict::new(
        table.clone(),
        SchemaConflictKind::PrimaryKeyChange,
        detail,
    ))
}

fn describe_key(schema: &Schema) -> String {
    let cols: Vec<String> = schema
        .key_columns()
        .map(|c| format!("{} {}", c.name, c.ty))
        .collect();
    format!("({})", cols.join(", "))
}

fn describe_column(col: &Column) -> String {
    let mut s = format!("{} {}", col.name, col.ty);
    if !col.nullable {
        s.push_str(" NOT NULL");
    }
    if let Some(d) = &col.default {
        s.push_str(&format!(" DEFAULT {d}"));
    }
    if let Some(g) = &col.generated {
        s.push_str(&format!(" AS ({g})"));
    }
    if col.auto_increment {
        s.push_str(" AUTO_INCREMENT");
    }
    s
}

/// Merge `ours` and `theirs` against `base`.
///
/// Callers must check [`primary_key_conflict`] first; key columns are taken
/// from our side.
///
/// # Errors
/// [`StoreError::InvalidSchema`] if the merged definition fails validation
/// in a way the conflict checks do not cover.
pub fn merge_schema(
    table: &TableName,
    base: &Schema,
    ours: &Schema,
    theirs: &Schema,
) -> Result<MergedSchema, StoreError> {
    if ours == theirs {
        return Ok(MergedSchema {
            schema: ours.clone(),
            conflicts: Vec::new(),
        });
    }
    let mut conflicts = Vec::new();
    let columns = merge_columns(table, base, ours, theirs, &mut conflicts);
    let indexes = merge_indexes(table, &columns, base, ours, theirs, &mut conflicts);
    if !conflicts.is_empty() {
        return Ok(MergedSchema {
            schema: ours.clone(),
            conflicts,
        });
    }
    let schema = Schema::new(columns, ours.primary_key().to_vec(), indexes)?;
    Ok(MergedSchema {
        schema,
        conflicts,
    })
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

fn by_tag(schema: &Schema) -> BTreeMap<ColumnTag, &Column> {
    schema.columns().iter().map(|c| (c.tag, c)).collect()
}

fn merge_column(base: &Column, ours: &Column, theirs: &Column) -> Option<Column> {
    Some(Column {
        tag: ours.tag,
        name: merge3(&base.name, &ours.name, &theirs.name)?,
        ty: merge3(&base.ty, &ours.ty, &theirs.ty)?,
        nullable: merge3(&base.nullable, &ours.nullable, &theirs.nullable)?,
        default: merge3(&base.default, &ours.default, &theirs.default)?,
        generated: merge3(&base.generated, &ours.generated, &theirs.generated)?,
        auto_increment: merge3(&base.auto_increment, &ours.auto_increment, &theirs.auto_increment)?,
    })
}

fn merge_columns(
    table: &TableName,
    base: &Schema,
    ours: &Schema,
    theirs: &Schema,
    conflicts: &mut Vec<SchemaConflict>,
) -> Vec<Column> {
    let base_cols = by_tag(base);
    let our_cols = by_tag(ours);
    let their_cols = by_tag(theirs);

    let mut common = Vec::new();
    let mut ours_new = Vec::new();
    for col in ours.columns() {
        let in_base = base_cols.get(&col.tag);
        match (in_base, their_cols.get(&col.tag)) {
            (Some(b), Some(t)) => match merge_column(b, col, t) {
                Some(merged) => common.push(merged),
                None => conflicts.push(SchemaConflict::new(
                    table.clone(),
                    SchemaConflictKind::ColumnDefinition { tag: col.tag },
                    format!(
                        "base {}, ours {}, theirs {}",
                        describe_column(b),
                        describe_column(col),
                        describe_column(t)
                    ),
                )),
            },
            (None, Some(t)) => {
                if col == *t {
                    common.push(col.clone());
                } else {
                    conflicts.push(SchemaConflict::new(
                        table.clone(),
                        SchemaConflictKind::ColumnDefinition { tag: col.tag },
                        format!(
                            "added on both sides: ours {}, theirs {}",
                            describe_column(col),
                            describe_column(t)
                        ),
                    ));
                }
            }
            (Some(b), None) => {
                if col != *b {
                    conflicts.push(SchemaConflict::new(
                        table.clone(),
                        SchemaConflictKind::ColumnDropModify { tag: col.tag },
                        format!(
                            "theirs dropped {}, ours changed it to {}",
                            b.name,
                            describe_column(col)
                        ),
                    ));
                }
            }
            (None, None) => ours_new.push(col.clone()),
        }
    }

    let mut theirs_new = Vec::new();
    for col in theirs.columns() {
        if our_cols.contains_key(&col.tag) {
            continue;
        }
        match base_cols.get(&col.tag) {
            Some(b) if col != *b => conflicts.push(SchemaConflict::new(
                table.clone(),
                SchemaConflictKind::ColumnDropModify { tag: col.tag },
                format!("ours dropped {}, theirs changed it to {}", b.name, describe_column(col)),
            )),
            Some(_) => {}
            None => theirs_new.push(col.clone()),
        }
    }

    let merged: Vec<Column> = common.into_iter().chain(ours_new).chain(theirs_new).collect();
    for (i, col) in merged.iter().enumerate() {
        let collides = merged[..i]
            .iter()
            .any(|earlier| earlier.name.eq_ignore_ascii_case(&col.name));
        if collides {
            conflicts.push(SchemaConflict::new(
                table.clone(),
                SchemaConflictKind::ColumnNameCollision {
                    name: col.name.clone(),
                },
                format!("column {} reuses an existing name", col.tag),
            ));
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// Indexes
// ---------------------------------------------------------------------------

fn by_columns(schema: &Schema) -> BTreeMap<&[ColumnTag], &IndexDef> {
    schema
        .indexes()
        .iter()
        .map(|i| (i.tags.as_slice(), i))
        .collect()
}

fn merge_indexes(
    table: &TableName,
    columns: &[Column],
    base: &Schema,
    ours: &Schema,
    theirs: &Schema,
    conflicts: &mut Vec<SchemaConflict>,
) -> Vec<IndexDef> {
    let base_idx = by_columns(base);
    let our_idx = by_columns(ours);
    let their_idx = by_columns(theirs);
    let conflict = |idx: &IndexDef, detail: String| {
        SchemaConflict::new(
            table.clone(),
            SchemaConflictKind::Index {
                name: idx.name.clone(),
            },
            detail,
        )
    };

    let mut merged = Vec::new();
    for idx in ours.indexes() {
        let key = idx.tags.as_slice();
        match (base_idx.get(key), their_idx.get(key)) {
            (Some(b), Some(t)) => {
                let name = merge3(&b.name, &idx.name, &t.name);
                let unique = merge3(&b.unique, &idx.unique, &t.unique);
                match (name, unique) {
                    (Some(name), Some(unique)) => {
                        merged.push(IndexDef::new(name, idx.tags.clone(), unique));
                    }
                    _ => conflicts.push(conflict(
                        idx,
                        "changed differently on both sides".to_owned(),
                    )),
                }
            }
            (None, Some(t)) => {
                if idx == *t {
                    merged.push(idx.clone());
                } else {
                    conflicts.push(conflict(
                        idx,
                        format!("added on both sides as '{}' and '{}'", idx.name, t.name),
                    ));
                }
            }
            (Some(b), None) => {
                if idx != *b {
                    conflicts.push(conflict(idx, "dropped by theirs, changed by ours".to_owned()));
                }
            }
            (None, None) => merged.push(idx.clone()),
        }
    }
    for idx in theirs.indexes() {
        let key = idx.tags.as_slice();
        if our_idx.contains_key(key) {
            continue;
        }
        match base_idx.get(key) {
            Some(b) if idx != *b => {
                conflicts.push(conflict(idx, "dropped by ours, changed by theirs".to_owned()));
            }
            Some(_) => {}
            None => merged.push(idx.clone()),
        }
    }

    merged.retain(|idx| {
        idx.tags
            .iter()
            .all(|t| columns.iter().any(|c| c.tag == *t))
    });
    for (i, idx) in merged.iter().enumerate() {
        if merged[..i]
            .iter()
            .any(|earlier| earlier.name.eq_ignore_ascii_case(&idx.name))
        {
            conflicts.push(conflict(idx, "name used by two different indexes".to_owned()));
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
