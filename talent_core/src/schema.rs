//! Header normalization for loaded tables
//!
//! Every header goes through one rule: trim, lowercase, and collapse each run
//! of whitespace, `_` or `-` into a single `_`. Rule targets, projections and
//! fuzzy column resolution all work on names in this form.

use crate::error::{QueryError, Result};
use crate::table::{Column, Table, Value};
use ahash::AHashMap;
use tracing::debug;

/// Columns whose cell values are trimmed at load time
pub const NAME_COLUMNS: &[&str] = &["talent_name", "name"];

/// Canonical form of a column header
pub fn normalize_header(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.trim().chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(c.to_lowercase());
    }

    out
}

/// Normalize a batch of headers, rejecting collisions.
pub fn normalize_headers<S: AsRef<str>>(names: &[S]) -> Result<Vec<String>> {
    let mut seen: AHashMap<String, &str> = AHashMap::with_capacity(names.len());
    let mut out = Vec::with_capacity(names.len());

    for name in names {
        let original = name.as_ref();
        let normalized = normalize_header(original);
        if let Some(first) = seen.get(&normalized) {
            return Err(QueryError::SchemaConflict {
                first: first.to_string(),
                second: original.to_string(),
                normalized,
            });
        }
        seen.insert(normalized.clone(), original);
        out.push(normalized);
    }

    Ok(out)
}

/// Normalize every header of a table and trim name-role values.
pub fn normalize_table(table: Table) -> Result<Table> {
    let names: Vec<String> = table.columns().iter().map(|c| c.name.clone()).collect();
    let normalized = normalize_headers(&names)?;

    let columns = table
        .into_columns()
        .into_iter()
        .zip(normalized)
        .map(|(column, name)| {
            if column.name != name {
                debug!("normalized header {:?} -> {:?}", column.name, name);
            }
            let values = if NAME_COLUMNS.contains(&name.as_str()) {
                column.values.into_iter().map(trim_text).collect()
            } else {
                column.values
            };
            Column {
                name,
                kind: column.kind,
                values,
            }
        })
        .collect();

    Table::new(columns)
}

/// Comparison form of a cell value: trimmed, lowercase display text
pub fn normalize_value(value: &Value) -> String {
    value.to_string().trim().to_lowercase()
}

fn trim_text(value: Value) -> Value {
    match value {
        Value::Text(s) => Value::Text(s.trim().to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" Talent Name "), "talent_name");
        assert_eq!(normalize_header("Deployment  Status"), "deployment_status");
        assert_eq!(normalize_header("training-status"), "training_status");
        assert_eq!(normalize_header("__Email__"), "email");
        assert_eq!(normalize_header("department"), "department");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let headers = ["Talent Name", " EMAIL", "deployment_status", "Training - Status", "x"];
        let once = normalize_headers(&headers).unwrap();
        let twice = normalize_headers(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_conflict_is_an_error() {
        let result = normalize_headers(&["Talent Name", "talent_name"]);
        match result {
            Err(QueryError::SchemaConflict { first, second, normalized }) => {
                assert_eq!(first, "Talent Name");
                assert_eq!(second, "talent_name");
                assert_eq!(normalized, "talent_name");
            }
            other => panic!("Expected schema conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_name_values_trimmed() {
        let table = Table::new(vec![
            Column::from_raw("Talent Name", &["  talent_1 ", "talent_2"]),
            Column::from_raw("Notes", &["  keep  ", "x"]),
        ])
        .unwrap();

        let normalized = normalize_table(table).unwrap();
        assert_eq!(
            normalized.cell(0, "talent_name"),
            Some(&Value::Text("talent_1".to_string()))
        );
        assert_eq!(
            normalized.cell(0, "notes"),
            Some(&Value::Text("  keep  ".to_string()))
        );
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value(&Value::Text(" On Bench ".to_string())), "on bench");
        assert_eq!(normalize_value(&Value::Missing), "");
    }
}
