//! Signature-based deduplicated row merging
//!
//! A signature is a deterministic fingerprint of selected record fields.
//! Multi-valued slot groups (e.g. the numbered "input N" columns of a recipe
//! table) are sorted before folding so the signature is invariant to slot
//! ordering. Signatures are used only for membership tests, never persisted.

use crate::pattern::columns_with_prefix;
use crate::table::{Gate, Record, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which fields participate in a record's signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureSpec {
    /// Identity columns, concatenated in the given order (unsorted)
    pub columns: Vec<String>,
    /// Column-name prefixes naming multi-valued slot groups; each group is
    /// trimmed, empties dropped, sorted, and folded into one sub-string
    #[serde(default)]
    pub multi_prefixes: Vec<String>,
}

/// Compute the signature of one record
pub fn compute_signature(table: &Table, record: usize, spec: &SignatureSpec) -> String {
    let mut parts: Vec<String> = Vec::new();
    for column in &spec.columns {
        let value = table.value(record, column).unwrap_or("").trim().to_string();
        parts.push(value);
    }
    for prefix in &spec.multi_prefixes {
        let mut slots: Vec<String> = columns_with_prefix(&table.header, prefix)
            .iter()
            .filter_map(|c| table.value(record, c))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        slots.sort();
        parts.push(slots.join("+"));
    }
    parts.join("|")
}

/// Merge candidate records into the destination without duplication.
///
/// A candidate is appended when it passes the enabled gate and its signature
/// is not already present in the destination; it is projected onto the
/// destination's header (absent columns become empty). Existing destination
/// records are never reordered or mutated. Returns the number of records
/// appended; a second run against the merged output appends zero.
pub fn merge(
    dest: &mut Table,
    candidates: &Table,
    spec: &SignatureSpec,
    enabled: Option<&Gate>,
) -> usize {
    let mut seen: HashSet<String> = (0..dest.record_count())
        .map(|i| compute_signature(dest, i, spec))
        .collect();

    let mut appended = 0;
    for row in 0..candidates.record_count() {
        if let Some(gate) = enabled {
            if !gate.matches(candidates, row) {
                continue;
            }
        }
        let sig = compute_signature(candidates, row, spec);
        if seen.contains(&sig) {
            continue;
        }
        let values: Vec<String> = dest
            .header
            .iter()
            .map(|col| {
                candidates
                    .value(row, col)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            })
            .collect();
        dest.records.push(Record::new(values));
        seen.insert(sig);
        appended += 1;
    }
    appended
}
