//! Referential-integrity gate
//!
//! A pure read-only check run exactly once, after all mutating steps and
//! before any serialization. It rejects structural drift; it never repairs.

use crate::error::{DuplicateExample, Error, IntegrityViolation, Result};
use crate::table::Table;
use std::collections::HashMap;

/// Maximum offending tuples reported for a duplicate-key violation
const MAX_DUPLICATE_EXAMPLES: usize = 5;

/// Validate a mutated table against its reference snapshot.
///
/// Headers must match order-for-order, record counts must be equal, and the
/// key column (when given) must carry pairwise-distinct non-empty values.
pub fn validate(
    name: &str,
    candidate: &Table,
    reference: &Table,
    key_column: Option<&str>,
) -> Result<()> {
    check_header(name, candidate, reference)?;
    if candidate.record_count() != reference.record_count() {
        return Err(IntegrityViolation::RowCountDrift {
            table: name.to_string(),
            expected: reference.record_count(),
            actual: candidate.record_count(),
        }
        .into());
    }
    if let Some(key) = key_column {
        check_key_uniqueness(name, candidate, key)?;
    }
    Ok(())
}

/// Validate a table a merge step legitimately grows: the candidate must
/// carry the reference records unchanged as a prefix, with appended records
/// after them.
pub fn validate_append_only(
    name: &str,
    candidate: &Table,
    reference: &Table,
    key_column: Option<&str>,
) -> Result<()> {
    check_header(name, candidate, reference)?;
    if candidate.record_count() < reference.record_count() {
        return Err(IntegrityViolation::RowCountDrift {
            table: name.to_string(),
            expected: reference.record_count(),
            actual: candidate.record_count(),
        }
        .into());
    }
    for (index, reference_record) in reference.records.iter().enumerate() {
        if &candidate.records[index] != reference_record {
            return Err(IntegrityViolation::RowDrift {
                table: name.to_string(),
                index,
            }
            .into());
        }
    }
    if let Some(key) = key_column {
        check_key_uniqueness(name, candidate, key)?;
    }
    Ok(())
}

fn check_header(name: &str, candidate: &Table, reference: &Table) -> Result<()> {
    if candidate.header != reference.header {
        return Err(IntegrityViolation::HeaderDrift {
            table: name.to_string(),
            expected: reference.header.len(),
            found: candidate.header.len(),
        }
        .into());
    }
    Ok(())
}

fn check_key_uniqueness(name: &str, candidate: &Table, key_column: &str) -> Result<()> {
    let Some(idx) = candidate.column_index_ci(key_column) else {
        // a missing key column is foundational, not an optional convention
        return Err(Error::MissingColumn {
            table: name.to_string(),
            column: key_column.to_string(),
        });
    };

    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut examples = Vec::new();
    for (row, record) in candidate.records.iter().enumerate() {
        let value = record.get(idx).unwrap_or("").trim();
        if value.is_empty() {
            continue;
        }
        match first_seen.get(value) {
            Some(&first) => {
                if examples.len() < MAX_DUPLICATE_EXAMPLES {
                    examples.push(DuplicateExample {
                        value: value.to_string(),
                        first,
                        second: row,
                    });
                }
            }
            None => {
                first_seen.insert(value.to_string(), row);
            }
        }
    }
    if !examples.is_empty() {
        return Err(IntegrityViolation::DuplicateKey {
            table: name.to_string(),
            column: key_column.to_string(),
            examples,
        }
        .into());
    }
    Ok(())
}
