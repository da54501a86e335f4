//! JSON fixture repositories.
//!
//! A fixture describes a small commit history in one document. Each commit
//! lists its full table contents; column references in keys, indexes, and
//! foreign keys are by column name and are resolved to tags at load time.
//!
//! ```json
//! {
//!   "commits": [
//!     {
//!       "id": "base",
//!       "parents": [],
//!       "message": "initial",
//!       "tables": {
//!         "people": {
//!           "columns": [
//!             { "tag": 1, "name": "id", "type": "int", "nullable": false },
//!             { "tag": 2, "name": "name", "type": "varchar(64)" }
//!           ],
//!           "primary_key": ["id"],
//!           "indexes": [{ "name": "uniq_name", "columns": ["name"], "unique": true }],
//!           "rows": [[1, "ada"], [2, "grace"]]
//!         }
//!       }
//!     }
//!   ],
//!   "refs": { "main": "base" }
//! }
//! ```
//!
//! Every commit id is also registered as a ref, so fixtures can be addressed
//! by id without a `refs` entry.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::commit::CommitMeta;
use crate::error::StoreError;
use crate::graph::CommitGraph;
use crate::memory::MemoryGraph;
use crate::root::RootValue;
use crate::row::RowSet;
use crate::schema::{Column, ColumnTag, ForeignKey, IndexDef, Schema, TableName};
use crate::table::{Table, TableParts};
use crate::value::ColumnType;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureDoc {
    commits: Vec<CommitDoc>,
    #[serde(default)]
    refs: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommitDoc {
    id: String,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    tables: BTreeMap<String, TableDoc>,
    #[serde(default)]
    foreign_keys: Vec<ForeignKeyDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableDoc {
    columns: Vec<ColumnDoc>,
    #[serde(default)]
    primary_key: Vec<String>,
    #[serde(default)]
    indexes: Vec<IndexDoc>,
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    auto_increment: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnDoc {
    tag: ColumnTag,
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default = "default_nullable")]
    nullable: bool,
    #[serde(default)]
    default: Option<serde_json::Value>,
    #[serde(default)]
    generated: Option<String>,
    #[serde(default)]
    auto_increment: bool,
}

const fn default_nullable() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndexDoc {
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    unique: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ForeignKeyDoc {
    name: String,
    child_table: String,
    child_columns: Vec<String>,
    parent_table: String,
    parent_columns: Vec<String>,
}

/// Load a fixture file into a [`MemoryGraph`].
///
/// # Errors
/// I/O and JSON failures, plus [`StoreError::InvalidFixture`] /
/// [`StoreError::InvalidSchema`] / [`StoreError::InvalidRow`] for documents
/// that describe an impossible repository.
pub fn load_fixture(path: &Path) -> Result<MemoryGraph, StoreError> {
    let text = std::fs::read_to_string(path)?;
    parse_fixture(&text)
}

/// Parse a fixture document from a string.
///
/// # Errors
/// See [`load_fixture`].
pub fn parse_fixture(text: &str) -> Result<MemoryGraph, StoreError> {
    let doc: FixtureDoc = serde_json::from_str(text)?;
    let mut graph = MemoryGraph::new();
    let mut ids = BTreeMap::new();
    for c in doc.commits {
        if ids.contains_key(&c.id) {
            return Err(invalid(format!("duplicate commit id '{}'", c.id)));
        }
        let parents = c
            .parents
            .iter()
            .map(|p| {
                ids.get(p)
                    .copied()
                    .ok_or_else(|| invalid(format!("commit '{}' has unknown parent '{p}'", c.id)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let root = build_root(&c)?;
        let meta = CommitMeta {
            author: c.author,
            message: c.message,
            timestamp: c.timestamp,
        };
        let commit = graph.commit_with(&parents, meta, root)?;
        graph.set_ref(c.id.clone(), commit.hash())?;
        debug!(id = %c.id, hash = %commit.hash(), "fixture commit");
        ids.insert(c.id, commit.hash());
    }
    for (name, target) in doc.refs {
        let commit = graph
            .resolve(&target)
            .map_err(|_| invalid(format!("ref '{name}' points at unknown '{target}'")))?;
        graph.set_ref(name, commit.hash())?;
    }
    Ok(graph)
}

fn build_root(c: &CommitDoc) -> Result<RootValue, StoreError> {
    let mut tables = BTreeMap::new();
    for (name, doc) in &c.tables {
        let table = build_table(doc).map_err(|e| match e {
            StoreError::InvalidSchema { message } => StoreError::InvalidSchema {
                message: format!("{}.{name}: {message}", c.id),
            },
            StoreError::InvalidRow { message } => StoreError::InvalidRow {
                message: format!("{}.{name}: {message}", c.id),
            },
            other => other,
        })?;
        tables.insert(TableName::new(name)?, table);
    }
    let mut foreign_keys = Vec::with_capacity(c.foreign_keys.len());
    for fk in &c.foreign_keys {
        let child_table = TableName::new(&fk.child_table)?;
        let parent_table = TableName::new(&fk.parent_table)?;
        let child_tags = resolve_fk_columns(&tables, &child_table, &fk.child_columns, &fk.name)?;
        let parent_tags = resolve_fk_columns(&tables, &parent_table, &fk.parent_columns, &fk.name)?;
        if child_tags.len() != parent_tags.len() || child_tags.is_empty() {
            return Err(invalid(format!(
                "foreign key '{}' must pair equal, non-zero column counts",
                fk.name
            )));
        }
        foreign_keys.push(ForeignKey {
            name: fk.name.clone(),
            child_table,
            child_tags,
            parent_table,
            parent_tags,
        });
    }
    Ok(RootValue::new(tables, foreign_keys))
}

fn build_table(doc: &TableDoc) -> Result<Table, StoreError> {
    let mut columns = Vec::with_capacity(doc.columns.len());
    for c in &doc.columns {
        let ty: ColumnType = c.ty.parse()?;
        let default = c.default.as_ref().map(|d| ty.value_from_json(d)).transpose()?;
        columns.push(Column {
            tag: c.tag,
            name: c.name.clone(),
            ty,
            nullable: c.nullable,
            default,
            generated: c.generated.clone(),
            auto_increment: c.auto_increment,
        });
    }
    let tag_of = |name: &str| {
        columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.tag)
            .ok_or_else(|| StoreError::InvalidSchema {
                message: format!("unknown column '{name}'"),
            })
    };
    let primary_key = doc
        .primary_key
        .iter()
        .map(|n| tag_of(n))
        .collect::<Result<Vec<_>, _>>()?;
    let indexes = doc
        .indexes
        .iter()
        .map(|i| {
            let tags = i
                .columns
                .iter()
                .map(|n| tag_of(n))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(IndexDef::new(i.name.clone(), tags, i.unique))
        })
        .collect::<Result<Vec<_>, StoreError>>()?;
    let schema = Schema::new(columns, primary_key, indexes)?;
    let rows = doc
        .rows
        .iter()
        .map(|row| {
            if row.len() != schema.columns().len() {
                return Err(StoreError::InvalidRow {
                    message: format!(
                        "expected {} cells, got {}",
                        schema.columns().len(),
                        row.len()
                    ),
                });
            }
            schema
                .columns()
                .iter()
                .zip(row)
                .map(|(col, cell)| col.ty.value_from_json(cell))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    let rows = RowSet::from_full_rows(&schema, rows)?;
    let table = Table::new(schema, rows);
    Ok(match doc.auto_increment {
        Some(next) => {
            let mut parts: TableParts = table.to_parts();
            parts.auto_increment = next;
            Table::from_parts(parts)
        }
        None => table,
    })
}

fn resolve_fk_columns(
    tables: &BTreeMap<TableName, Table>,
    table: &TableName,
    columns: &[String],
    fk: &str,
) -> Result<Vec<ColumnTag>, StoreError> {
    let t = tables
        .get(table)
        .ok_or_else(|| invalid(format!("foreign key '{fk}' references missing table '{table}'")))?;
    columns
        .iter()
        .map(|n| {
            t.schema().column_by_name(n).map(|c| c.tag).ok_or_else(|| {
                invalid(format!("foreign key '{fk}' references missing column '{table}.{n}'"))
            })
        })
        .collect()
}

fn invalid(message: String) -> StoreError {
    StoreError::InvalidFixture { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Tuple;
    use crate::value::Value;

    const DOC: &str = r#"{
      "commits": [
        { "id": "base", "tables": {
            "parent": { "columns": [{ "tag": 1, "name": "id", "type": "int", "nullable": false }],
                        "primary_key": ["id"], "rows": [[1], [2]] },
            "child": { "columns": [
                          { "tag": 10, "name": "id", "type": "int", "nullable": false, "auto_increment": true },
                          { "tag": 11, "name": "pid", "type": "int" },
                          { "tag": 12, "name": "note", "type": "text", "default": "n/a" }],
                       "primary_key": ["id"],
                       "indexes": [{ "name": "by_pid", "columns": ["pid"] }],
                       "rows": [[5, 1, "x"]] } },
          "foreign_keys": [{ "name": "fk_pid", "child_table": "child", "child_columns": ["pid"],
                             "parent_table": "parent", "parent_columns": ["id"] }] },
        { "id": "next", "parents": ["base"], "message": "second", "tables": {} }
      ],
      "refs": { "main": "next" }
    }"#;

    #[test]
    fn loads_commits_refs_and_foreign_keys() {
        let g = parse_fixture(DOC).unwrap();
        let main = g.resolve("main").unwrap();
        assert_eq!(main.meta().message, "second");
        let base = g.resolve("base").unwrap();
        assert_eq!(g.resolve("main~1").unwrap(), base);
        let root = base.root();
        assert_eq!(root.foreign_keys().len(), 1);
        assert_eq!(root.foreign_keys()[0].child_tags, vec![11]);
        let child = root.get_table(&TableName::new("child").unwrap()).unwrap();
        assert_eq!(child.auto_increment(), 6);
        assert_eq!(
            child.schema().column(12).and_then(|c| c.default.clone()),
            Some(Value::from("n/a"))
        );
        assert!(child.rows().contains(&Tuple::new(vec![Value::Int(5)])));
    }

    #[test]
    fn unknown_parent_is_reported() {
        let doc = r#"{ "commits": [{ "id": "a", "parents": ["ghost"] }] }"#;
        let err = parse_fixture(doc).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFixture { .. }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let doc = r#"{ "commits": [], "bogus": 1 }"#;
        assert!(matches!(parse_fixture(doc), Err(StoreError::Json(_))));
    }

    #[test]
    fn row_errors_name_the_table() {
        let doc = r#"{ "commits": [{ "id": "a", "tables": { "t": {
            "columns": [{ "tag": 1, "name": "id", "type": "int", "nullable": false }],
            "primary_key": ["id"], "rows": [[1], [1]] } } }] }"#;
        let err = parse_fixture(doc).unwrap_err();
        assert!(err.to_string().contains("a.t"));
    }
}
