//! Force-equal transform: copy a target column's value into its paired
//! source column for every eligible record

use crate::table::{Gate, Table};

/// Counts of records and cells a transform changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCount {
    pub rows: usize,
    pub cells: usize,
}

impl ChangeCount {
    pub fn add(&mut self, other: ChangeCount) {
        self.rows += other.rows;
        self.cells += other.cells;
    }
}

/// For every gated record and every (source, target) pair, copy the target
/// value into the source when the target is non-empty and differs. An empty
/// target never clobbers the source. Pairs are independent within a record,
/// so pair order cannot affect the result, and a second run on an unchanged
/// table reports zero changes.
pub fn force_equal(table: &mut Table, pairs: &[(String, String)], gate: Option<&Gate>) -> ChangeCount {
    let indexed: Vec<(usize, usize)> = pairs
        .iter()
        .filter_map(|(src, tgt)| {
            Some((table.column_index_ci(src)?, table.column_index_ci(tgt)?))
        })
        .collect();

    let mut count = ChangeCount::default();
    for row in 0..table.record_count() {
        if let Some(gate) = gate {
            if !gate.admits(table, row) {
                continue;
            }
        }
        let mut row_changed = false;
        for &(src, tgt) in &indexed {
            let target_value = table.records[row].values[tgt].trim().to_string();
            if target_value.is_empty() {
                continue;
            }
            if table.records[row].values[src].trim() != target_value {
                table.records[row].values[src] = target_value;
                count.cells += 1;
                row_changed = true;
            }
        }
        if row_changed {
            count.rows += 1;
        }
    }
    count
}
