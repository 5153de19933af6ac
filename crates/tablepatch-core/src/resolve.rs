//! Cross-table reference resolution and category exclusion

use crate::error::{Error, Result};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How an unresolved foreign lookup is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Unresolved lookup is a terminal referential error
    Strict,
    /// Unresolved lookup returns nothing; the caller logs a skip
    Lenient,
}

impl Default for Strictness {
    fn default() -> Self {
        Strictness::Lenient
    }
}

/// Resolve a foreign-key-style reference to a record index.
///
/// The lookup itself never mutates the table. A missing key column is a
/// missing-column error in either mode; a missing row is a referential
/// error in strict mode and `None` in lenient mode.
pub fn resolve_foreign_row(
    table: &Table,
    table_name: &str,
    key_column: &str,
    key: &str,
    mode: Strictness,
) -> Result<Option<usize>> {
    if !table.has_column(key_column) {
        return Err(Error::MissingColumn {
            table: table_name.to_string(),
            column: key_column.to_string(),
        });
    }
    match table.find_record(key_column, key) {
        Some(idx) => Ok(Some(idx)),
        None => match mode {
            Strictness::Strict => Err(Error::Referential {
                table: table_name.to_string(),
                key_column: key_column.to_string(),
                key: key.to_string(),
            }),
            Strictness::Lenient => Ok(None),
        },
    }
}

/// Write a field only when it differs; reports whether anything changed
pub fn set_field_if_changed(table: &mut Table, record: usize, field: &str, value: &str) -> bool {
    table.set_value(record, field, value)
}

/// Parameters for classification-table-driven category exclusion: records
/// whose type code belongs to an excluded class are off-limits to a
/// transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryExclusion {
    /// Classification table (relative path in the registry)
    pub class_table: String,
    /// Column of the classification table holding the class
    pub class_column: String,
    /// Column of the classification table holding the type code
    pub code_column: String,
    /// Classes whose type codes are excluded
    pub excluded_classes: Vec<String>,
    /// Columns of the target table carrying a record's one or two type codes
    pub type_columns: Vec<String>,
}

/// Scan the classification table once and collect the type codes of every
/// row whose class field is in the excluded set. Codes are compared
/// trimmed and case-insensitively.
pub fn excluded_type_codes(
    class_table: &Table,
    exclusion: &CategoryExclusion,
) -> Result<HashSet<String>> {
    for column in [&exclusion.class_column, &exclusion.code_column] {
        if !class_table.has_column(column) {
            return Err(Error::MissingColumn {
                table: exclusion.class_table.clone(),
                column: column.clone(),
            });
        }
    }
    let excluded: HashSet<String> = exclusion
        .excluded_classes
        .iter()
        .map(|c| c.trim().to_ascii_lowercase())
        .collect();

    let mut codes = HashSet::new();
    for row in 0..class_table.record_count() {
        let class = class_table
            .value(row, &exclusion.class_column)
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if !excluded.contains(&class) {
            continue;
        }
        let code = class_table
            .value(row, &exclusion.code_column)
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if !code.is_empty() {
            codes.insert(code);
        }
    }
    Ok(codes)
}

/// Whether any of a record's type fields names an excluded category
pub fn is_excluded_category(type_fields: &[&str], excluded_codes: &HashSet<String>) -> bool {
    type_fields.iter().any(|f| {
        let code = f.trim().to_ascii_lowercase();
        !code.is_empty() && excluded_codes.contains(&code)
    })
}
