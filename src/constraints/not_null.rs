//! NOT NULL checks.

use std::collections::BTreeSet;

use serde_json::json;
use vtmerge_store::{CellLocation, ConstraintViolation, Table, TableName, Tuple, ViolationKind};

use super::{ConstraintError, locate_all};

/// Constraint name recorded on NOT NULL violations.
pub const NOT_NULL: &str = "not null";

/// Rows holding `NULL` in a column the table's schema declares NOT NULL.
///
/// One violation per row, listing every offending column. With `changed`,
/// only those keys are checked.
pub(crate) fn not_null_violations(
    name: &TableName,
    table: &Table,
    changed: Option<&BTreeSet<Tuple>>,
) -> Result<Vec<ConstraintViolation>, ConstraintError> {
    let schema = table.schema();
    let required: Vec<_> = schema.columns().iter().filter(|c| !c.nullable).collect();
    if required.is_empty() {
        return Ok(Vec::new());
    }
    let tags: Vec<_> = required.iter().map(|c| c.tag).collect();
    let locs = locate_all(name, schema, NOT_NULL, &tags)?;

    let mut out = Vec::new();
    for (key, row) in table.rows() {
        if changed.is_some_and(|c| !c.contains(key)) {
            continue;
        }
        let columns: Vec<_> = required
            .iter()
            .zip(&locs)
            .filter(|(_, loc)| {
                let cell = match loc {
                    CellLocation::Key(i) => key.get(*i),
                    CellLocation::Value(i) => row.cells.get(*i),
                };
                cell.is_none_or(|v| v.is_null())
            })
            .map(|(c, _)| c.name.clone())
            .collect();
        if columns.is_empty() {
            continue;
        }
        out.push(ConstraintViolation {
            kind: ViolationKind::NotNull,
            constraint: NOT_NULL.to_owned(),
            key: key.clone(),
            row: row.clone(),
            info: json!({ "columns": columns }),
        });
    }
    Ok(out)
}
