use std::collections::HashSet;

use serde_json::{Map, Value};

/// One seed row: column name to value.
pub type SeedRow = Map<String, Value>;

/// Natural identifier columns preferred for seed deduplication, in order.
pub const PREFERRED_IDENTIFIERS: [&str; 5] = ["id", "key", "code", "slug", "name"];

/// Comparable text form of an identifier value. `None` for nulls and composite values.
pub fn identifier_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Picks the column every row carries a usable value for, preferring the
/// conventional identifier names, then the table's single-column primary key.
pub fn choose_identifier(rows: &[SeedRow], primary_key: &[String]) -> Option<String> {
    let every_row_has = |column: &str| {
        !rows.is_empty()
            && rows
                .iter()
                .all(|row| row.get(column).and_then(identifier_key).is_some())
    };

    for column in PREFERRED_IDENTIFIERS {
        if every_row_has(column) {
            return Some(column.to_string());
        }
    }

    match primary_key {
        [column] if every_row_has(column.as_str()) => Some(column.clone()),
        _ => None,
    }
}

/// Distinct identifier values in first-seen order.
pub fn identifier_values(rows: &[SeedRow], column: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(column).and_then(identifier_key))
        .filter(|key| seen.insert(key.clone()))
        .collect()
}
