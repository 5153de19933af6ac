//! Pipeline driver: ordered steps over a shared table registry
//!
//! Steps receive the working registry, the read-only reference snapshot,
//! the overlay registry, and the report log explicitly; there is no
//! ambient state. Soft problems (a missing optional column convention, an
//! absent overlay table) are caught at the step boundary, recorded as a
//! report line, and the run continues; hard problems abort the whole run.

use crate::equalize::{force_equal, ChangeCount};
use crate::error::{Error, Result};
use crate::pattern::paired_columns;
use crate::plan::{StepOp, StepSpec};
use crate::report::ReportLog;
use crate::resolve::{
    excluded_type_codes, is_excluded_category, resolve_foreign_row, set_field_if_changed,
};
use crate::signature;
use crate::table::{normalize_column, Table};
use std::collections::BTreeMap;

/// Tables keyed by normalized baseline-relative path
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: BTreeMap<String, Table>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, table: Table) {
        self.tables.insert(name.into(), table);
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Everything a step may touch, passed explicitly
pub struct PipelineContext<'a> {
    /// Mutable working tables, seeded from the reference at pipeline start
    pub working: &'a mut TableRegistry,
    /// Read-only baseline snapshot; source of truth for seeding, cloning,
    /// classification scans, and the integrity gate
    pub reference: &'a TableRegistry,
    /// Read-only overlay tables; absence of one is a soft condition
    pub overlays: &'a TableRegistry,
    /// Append-only run report
    pub report: &'a mut ReportLog,
}

/// Execute the steps in the caller-specified order. Optional steps run only
/// when their name appears in `enabled_optional`.
pub fn run_steps(
    steps: &[StepSpec],
    enabled_optional: &[String],
    ctx: &mut PipelineContext,
) -> Result<()> {
    for step in steps {
        if step.optional {
            let enabled = step
                .name
                .as_deref()
                .is_some_and(|n| enabled_optional.iter().any(|e| e == n));
            if !enabled {
                ctx.report
                    .push(format!("[{}] optional step disabled (skipped)", step.label()));
                continue;
            }
        }
        match apply(step, ctx) {
            Ok(()) => {}
            Err(e) if e.is_soft() => {
                ctx.report.push(format!("[{}] {} (skipped)", step.label(), e));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn apply(step: &StepSpec, ctx: &mut PipelineContext) -> Result<()> {
    let label = step.label().to_string();
    match &step.op {
        StepOp::ForceEqual {
            table,
            conventions,
            gate,
        } => {
            let t = working_table(ctx.working, table)?;
            let mut pairs = Vec::new();
            for convention in conventions {
                for pair in paired_columns(&t.header, convention) {
                    let key = (normalize_column(&pair.0), normalize_column(&pair.1));
                    if !pairs
                        .iter()
                        .any(|p: &(String, String)| (normalize_column(&p.0), normalize_column(&p.1)) == key)
                    {
                        pairs.push(pair);
                    }
                }
            }
            if pairs.is_empty() {
                ctx.report.push(format!(
                    "[{label}] {table}: no matching column pairs (skipped)"
                ));
                return Ok(());
            }
            let count = force_equal(t, &pairs, gate.as_ref());
            ctx.report.push(format!(
                "[{label}] {table}: equalized {} column pair(s) (rows changed: {}, cells: {})",
                pairs.len(),
                count.rows,
                count.cells
            ));
        }

        StepOp::SetCells {
            table,
            key_column,
            assignments,
        } => {
            let t = working_table(ctx.working, table)?;
            require_column(t, table, key_column)?;
            for a in assignments {
                require_column(t, table, &a.column)?;
            }
            let key_idx = t.column_index_ci(key_column).unwrap();
            let mut cells = 0;
            for a in assignments {
                for row in 0..t.record_count() {
                    if t.records[row].values[key_idx].trim() != a.key.trim() {
                        continue;
                    }
                    if set_field_if_changed(t, row, &a.column, &a.value) {
                        cells += 1;
                    }
                }
            }
            ctx.report.push(format!(
                "[{label}] {table}: applied {} assignment(s) (cells changed: {cells})",
                assignments.len()
            ));
        }

        StepOp::SetColumn {
            table,
            column,
            value,
            gate,
            unless,
            exclude,
        } => {
            let excluded = match exclude {
                Some(ex) => {
                    let class_table = ctx
                        .reference
                        .get(&ex.class_table)
                        .ok_or_else(|| Error::TableNotLoaded(ex.class_table.clone()))?;
                    Some((excluded_type_codes(class_table, ex)?, ex.type_columns.clone()))
                }
                None => None,
            };
            let t = working_table(ctx.working, table)?;
            require_column(t, table, column)?;
            let mut count = ChangeCount::default();
            let mut excluded_rows = 0;
            for row in 0..t.record_count() {
                if let Some(gate) = gate {
                    if !gate.admits(t, row) {
                        continue;
                    }
                }
                if let Some(unless) = unless {
                    if unless.matches(t, row) {
                        continue;
                    }
                }
                if let Some((codes, type_columns)) = &excluded {
                    let fields: Vec<String> = type_columns
                        .iter()
                        .map(|c| t.value(row, c).unwrap_or("").to_string())
                        .collect();
                    let refs: Vec<&str> = fields.iter().map(|s| s.as_str()).collect();
                    if is_excluded_category(&refs, codes) {
                        excluded_rows += 1;
                        continue;
                    }
                }
                if set_field_if_changed(t, row, column, value) {
                    count.rows += 1;
                    count.cells += 1;
                }
            }
            let mut line = format!(
                "[{label}] {table}: set {column}={value} (rows changed: {})",
                count.rows
            );
            if excluded_rows > 0 {
                line.push_str(&format!(", excluded category rows: {excluded_rows}"));
            }
            ctx.report.push(line);
        }

        StepOp::CopyRow {
            table,
            key_column,
            pairs,
            strictness,
        } => {
            let t = working_table(ctx.working, table)?;
            require_column(t, table, key_column)?;
            let key_idx = t.column_index_ci(key_column).unwrap();
            let mut count = ChangeCount::default();
            let mut missing: Vec<String> = Vec::new();
            for pair in pairs {
                let dest = resolve_foreign_row(t, table, key_column, &pair.dest, *strictness)?;
                let source = resolve_foreign_row(t, table, key_column, &pair.source, *strictness)?;
                let (Some(dest), Some(source)) = (dest, source) else {
                    missing.push(format!("{}<-{}", pair.dest, pair.source));
                    continue;
                };
                let source_values = t.records[source].values.clone();
                let mut row_changed = false;
                for (idx, value) in source_values.iter().enumerate() {
                    if idx == key_idx {
                        continue;
                    }
                    if &t.records[dest].values[idx] != value {
                        t.records[dest].values[idx] = value.clone();
                        count.cells += 1;
                        row_changed = true;
                    }
                }
                if row_changed {
                    count.rows += 1;
                }
            }
            if !missing.is_empty() {
                ctx.report.push(format!(
                    "[{label}] {table}: missing pair(s): {}",
                    missing.join(", ")
                ));
            }
            ctx.report.push(format!(
                "[{label}] {table}: copied rows (rows changed: {}, cells: {})",
                count.rows, count.cells
            ));
        }

        StepOp::ReferenceOverride {
            table,
            overlay,
            key_column,
            columns,
        } => {
            let Some(src) = ctx.overlays.get(overlay) else {
                ctx.report.push(format!(
                    "[{label}] overlay '{overlay}' not present (skipped)"
                ));
                return Ok(());
            };
            if !src.has_column(key_column) {
                return Err(Error::MissingColumn {
                    table: overlay.clone(),
                    column: key_column.clone(),
                });
            }
            let t = working_table(ctx.working, table)?;
            require_column(t, table, key_column)?;

            let apply_columns: Vec<String> = match columns {
                Some(explicit) => {
                    for c in explicit {
                        require_column(t, table, c)?;
                        if !src.has_column(c) {
                            return Err(Error::MissingColumn {
                                table: overlay.clone(),
                                column: c.clone(),
                            });
                        }
                    }
                    explicit.clone()
                }
                None => t
                    .header
                    .iter()
                    .filter(|c| {
                        normalize_column(c) != normalize_column(key_column) && src.has_column(c)
                    })
                    .cloned()
                    .collect(),
            };

            // key -> overlay row, first occurrence wins
            let mut by_key: BTreeMap<String, usize> = BTreeMap::new();
            for row in (0..src.record_count()).rev() {
                let key = src
                    .value(row, key_column)
                    .unwrap_or("")
                    .trim()
                    .to_ascii_lowercase();
                if !key.is_empty() {
                    by_key.insert(key, row);
                }
            }

            let mut count = ChangeCount::default();
            for row in 0..t.record_count() {
                let key = t
                    .value(row, key_column)
                    .unwrap_or("")
                    .trim()
                    .to_ascii_lowercase();
                let Some(&src_row) = by_key.get(&key) else {
                    continue;
                };
                let mut row_changed = false;
                for column in &apply_columns {
                    let value = src.value(src_row, column).unwrap_or("").to_string();
                    if value.trim().is_empty() {
                        continue;
                    }
                    if t.value(row, column) != Some(value.as_str())
                        && set_field_if_changed(t, row, column, &value)
                    {
                        count.cells += 1;
                        row_changed = true;
                    }
                }
                if row_changed {
                    count.rows += 1;
                }
            }
            ctx.report.push(format!(
                "[{label}] {table}: applied overrides from '{overlay}' (rows changed: {}, cells: {})",
                count.rows, count.cells
            ));
        }

        StepOp::CloneRow {
            table,
            from_reference,
            key_column,
            key,
            set,
            guard,
            strictness,
        } => {
            let t = working_table_ref(ctx.working, table)?;
            if let Some(guard) = guard {
                if (0..t.record_count()).any(|row| guard.matches(t, row)) {
                    ctx.report.push(format!(
                        "[{label}] {table}: guarded row already present (skipped)"
                    ));
                    return Ok(());
                }
            }
            let source_table = if *from_reference {
                ctx.reference
                    .get(table)
                    .ok_or_else(|| Error::TableNotLoaded(table.clone()))?
            } else {
                t
            };
            let Some(source) =
                resolve_foreign_row(source_table, table, key_column, key, *strictness)?
            else {
                ctx.report.push(format!(
                    "[{label}] {table}: no source row with {key_column}='{key}' (skipped)"
                ));
                return Ok(());
            };
            let mut values: Vec<String> = t
                .header
                .iter()
                .map(|col| {
                    source_table
                        .value(source, col)
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                })
                .collect();
            let header = t.header.clone();
            for cv in set {
                if let Some(idx) = header
                    .iter()
                    .position(|c| normalize_column(c) == normalize_column(&cv.column))
                {
                    values[idx] = cv.value.clone();
                }
            }
            let t = working_table(ctx.working, table)?;
            t.push_record(values);
            ctx.report.push(format!(
                "[{label}] {table}: cloned row {key_column}='{key}' (overrides: {})",
                set.len()
            ));
        }

        StepOp::MergeRows {
            table,
            overlay,
            signature: spec,
            enabled,
        } => {
            let Some(src) = ctx.overlays.get(overlay) else {
                ctx.report.push(format!(
                    "[{label}] overlay '{overlay}' not present (skipped)"
                ));
                return Ok(());
            };
            let t = working_table(ctx.working, table)?;
            let added = signature::merge(t, src, spec, enabled.as_ref());
            if added == 0 {
                ctx.report.push(format!(
                    "[{label}] {table}: no new rows to merge (already present)"
                ));
            } else {
                ctx.report.push(format!(
                    "[{label}] {table}: merged rows from '{overlay}' (added: {added})"
                ));
            }
        }
    }
    Ok(())
}

fn working_table<'a>(registry: &'a mut TableRegistry, name: &str) -> Result<&'a mut Table> {
    registry
        .get_mut(name)
        .ok_or_else(|| Error::TableNotLoaded(name.to_string()))
}

fn working_table_ref<'a>(registry: &'a TableRegistry, name: &str) -> Result<&'a Table> {
    registry
        .get(name)
        .ok_or_else(|| Error::TableNotLoaded(name.to_string()))
}

fn require_column(table: &Table, table_name: &str, column: &str) -> Result<()> {
    if table.has_column(column) {
        return Ok(());
    }
    Err(Error::MissingColumn {
        table: table_name.to_string(),
        column: column.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PairConvention;
    use crate::plan::{CellAssignment, ColumnValue, RowCopy, StepOp, StepSpec};
    use crate::resolve::Strictness;
    use crate::signature::SignatureSpec;
    use crate::store::parse;
    use crate::table::Gate;

    fn step(op: StepOp) -> StepSpec {
        StepSpec {
            name: None,
            optional: false,
            op,
        }
    }

    struct Fixture {
        working: TableRegistry,
        reference: TableRegistry,
        overlays: TableRegistry,
        report: ReportLog,
    }

    impl Fixture {
        fn new() -> Self {
            let mut reference = TableRegistry::new();
            reference.insert(
                "items.txt",
                parse(
                    "code\tversion\tmin1\tmax1\nxyz\t0\t5\t10\nabc\t100\t1\t9\n",
                    "items.txt",
                )
                .unwrap(),
            );
            reference.insert(
                "misc.txt",
                parse("code\tmaxstack\nkey\t12\ntbk\t20\n", "misc.txt").unwrap(),
            );
            reference.insert(
                "recipes.txt",
                parse(
                    "enabled\toutput\tinput 1\tinput 2\n1\tA\tx\ty\n",
                    "recipes.txt",
                )
                .unwrap(),
            );
            let working = reference.clone();
            let mut overlays = TableRegistry::new();
            overlays.insert(
                "recipes.txt",
                parse(
                    "enabled\toutput\tinput 1\tinput 2\n1\tA\ty\tx\n1\tB\tz\t\n0\tC\tq\t\n",
                    "overlay-recipes.txt",
                )
                .unwrap(),
            );
            Fixture {
                working,
                reference,
                overlays,
                report: ReportLog::new(),
            }
        }

        fn run(&mut self, steps: &[StepSpec]) -> Result<()> {
            let mut ctx = PipelineContext {
                working: &mut self.working,
                reference: &self.reference,
                overlays: &self.overlays,
                report: &mut self.report,
            };
            run_steps(steps, &[], &mut ctx)
        }
    }

    #[test]
    fn test_force_equal_step() {
        let mut fx = Fixture::new();
        let steps = vec![step(StepOp::ForceEqual {
            table: "items.txt".into(),
            conventions: vec![PairConvention::PrefixNumber {
                source: "min".into(),
                target: "max".into(),
            }],
            gate: Some(Gate::new("version", "0")),
        })];
        fx.run(&steps).unwrap();
        let t = fx.working.get("items.txt").unwrap();
        assert_eq!(t.value(0, "min1"), Some("10"));
        assert_eq!(t.value(1, "min1"), Some("1"));
        assert!(fx.report.lines()[0].contains("rows changed: 1"));
    }

    #[test]
    fn test_set_cells_step() {
        let mut fx = Fixture::new();
        let steps = vec![step(StepOp::SetCells {
            table: "misc.txt".into(),
            key_column: "code".into(),
            assignments: vec![
                CellAssignment {
                    key: "key".into(),
                    column: "maxstack".into(),
                    value: "50".into(),
                },
                CellAssignment {
                    key: "tbk".into(),
                    column: "maxstack".into(),
                    value: "80".into(),
                },
            ],
        })];
        fx.run(&steps).unwrap();
        let t = fx.working.get("misc.txt").unwrap();
        assert_eq!(t.value(0, "maxstack"), Some("50"));
        assert_eq!(t.value(1, "maxstack"), Some("80"));
    }

    #[test]
    fn test_missing_column_is_soft_and_run_continues() {
        let mut fx = Fixture::new();
        let steps = vec![
            step(StepOp::SetCells {
                table: "misc.txt".into(),
                key_column: "nosuch".into(),
                assignments: vec![],
            }),
            step(StepOp::SetCells {
                table: "misc.txt".into(),
                key_column: "code".into(),
                assignments: vec![CellAssignment {
                    key: "key".into(),
                    column: "maxstack".into(),
                    value: "50".into(),
                }],
            }),
        ];
        fx.run(&steps).unwrap();
        assert!(fx.report.lines()[0].contains("skipped"));
        assert_eq!(fx.working.get("misc.txt").unwrap().value(0, "maxstack"), Some("50"));
    }

    #[test]
    fn test_unknown_table_is_hard() {
        let mut fx = Fixture::new();
        let steps = vec![step(StepOp::SetColumn {
            table: "ghost.txt".into(),
            column: "x".into(),
            value: "1".into(),
            gate: None,
            unless: None,
            exclude: None,
        })];
        let err = fx.run(&steps).unwrap_err();
        assert!(matches!(err, Error::TableNotLoaded(_)));
    }

    #[test]
    fn test_set_column_with_unless() {
        let mut fx = Fixture::new();
        fx.reference.insert(
            "armor.txt",
            parse(
                "name\tShowLevel\nCap\t0\nExpansion\t0\nHelm\t\n",
                "armor.txt",
            )
            .unwrap(),
        );
        fx.working = fx.reference.clone();
        let steps = vec![step(StepOp::SetColumn {
            table: "armor.txt".into(),
            column: "ShowLevel".into(),
            value: "1".into(),
            gate: None,
            unless: Some(Gate::new("name", "Expansion")),
            exclude: None,
        })];
        fx.run(&steps).unwrap();
        let t = fx.working.get("armor.txt").unwrap();
        assert_eq!(t.value(0, "ShowLevel"), Some("1"));
        assert_eq!(t.value(1, "ShowLevel"), Some("0"));
        assert_eq!(t.value(2, "ShowLevel"), Some("1"));
    }

    #[test]
    fn test_set_column_category_exclusion() {
        let mut fx = Fixture::new();
        fx.reference.insert(
            "uniques.txt",
            parse(
                "index\ttype\tlvlreq\nSword of Test\tswor\t30\nBow of Test\tabow\t30\n",
                "uniques.txt",
            )
            .unwrap(),
        );
        fx.reference.insert(
            "itemtypes.txt",
            parse(
                "Code\tClass\nabow\tama\nswor\t\n",
                "itemtypes.txt",
            )
            .unwrap(),
        );
        fx.working = fx.reference.clone();
        let steps = vec![step(StepOp::SetColumn {
            table: "uniques.txt".into(),
            column: "lvlreq".into(),
            value: "0".into(),
            gate: None,
            unless: None,
            exclude: Some(crate::resolve::CategoryExclusion {
                class_table: "itemtypes.txt".into(),
                class_column: "Class".into(),
                code_column: "Code".into(),
                excluded_classes: vec!["ama".into()],
                type_columns: vec!["type".into()],
            }),
        })];
        fx.run(&steps).unwrap();
        let t = fx.working.get("uniques.txt").unwrap();
        assert_eq!(t.value(0, "lvlreq"), Some("0"));
        assert_eq!(t.value(1, "lvlreq"), Some("30"));
        assert!(fx.report.lines()[0].contains("excluded category rows: 1"));
    }

    #[test]
    fn test_copy_row_lenient_missing_pair() {
        let mut fx = Fixture::new();
        fx.reference.insert(
            "drops.txt",
            parse(
                "Treasure Class\tItem1\tProb1\nAndariel\tgold\t10\nAndarielq\tring\t60\n",
                "drops.txt",
            )
            .unwrap(),
        );
        fx.working = fx.reference.clone();
        let steps = vec![step(StepOp::CopyRow {
            table: "drops.txt".into(),
            key_column: "Treasure Class".into(),
            pairs: vec![
                RowCopy {
                    dest: "Andariel".into(),
                    source: "Andarielq".into(),
                },
                RowCopy {
                    dest: "Mephisto".into(),
                    source: "Mephistoq".into(),
                },
            ],
            strictness: Strictness::Lenient,
        })];
        fx.run(&steps).unwrap();
        let t = fx.working.get("drops.txt").unwrap();
        // dest keeps its own name but takes the source's payload
        assert_eq!(t.value(0, "Treasure Class"), Some("Andariel"));
        assert_eq!(t.value(0, "Item1"), Some("ring"));
        assert_eq!(t.value(0, "Prob1"), Some("60"));
        assert!(fx.report.lines()[0].contains("Mephisto<-Mephistoq"));
    }

    #[test]
    fn test_copy_row_strict_aborts() {
        let mut fx = Fixture::new();
        fx.reference.insert(
            "drops.txt",
            parse("Treasure Class\tItem1\nAndariel\tgold\n", "drops.txt").unwrap(),
        );
        fx.working = fx.reference.clone();
        let steps = vec![step(StepOp::CopyRow {
            table: "drops.txt".into(),
            key_column: "Treasure Class".into(),
            pairs: vec![RowCopy {
                dest: "Andariel".into(),
                source: "Missing".into(),
            }],
            strictness: Strictness::Strict,
        })];
        let err = fx.run(&steps).unwrap_err();
        assert!(matches!(err, Error::Referential { .. }));
    }

    #[test]
    fn test_reference_override_restricted_columns() {
        let mut fx = Fixture::new();
        fx.reference.insert(
            "skills.txt",
            parse(
                "skill\tInTown\tmana\nTeleport\t0\t24\nFrost Nova\t0\t9\n",
                "skills.txt",
            )
            .unwrap(),
        );
        fx.working = fx.reference.clone();
        fx.overlays.insert(
            "skills.ref.txt",
            parse(
                "skill\tInTown\tmana\nTeleport\t1\t1\n",
                "skills.ref.txt",
            )
            .unwrap(),
        );
        let steps = vec![step(StepOp::ReferenceOverride {
            table: "skills.txt".into(),
            overlay: "skills.ref.txt".into(),
            key_column: "skill".into(),
            columns: Some(vec!["InTown".into()]),
        })];
        fx.run(&steps).unwrap();
        let t = fx.working.get("skills.txt").unwrap();
        assert_eq!(t.value(0, "InTown"), Some("1"));
        // mana not in the restricted column list
        assert_eq!(t.value(0, "mana"), Some("24"));
        assert_eq!(t.value(1, "InTown"), Some("0"));
    }

    #[test]
    fn test_reference_override_missing_overlay_is_soft() {
        let mut fx = Fixture::new();
        let steps = vec![step(StepOp::ReferenceOverride {
            table: "misc.txt".into(),
            overlay: "absent.txt".into(),
            key_column: "code".into(),
            columns: None,
        })];
        fx.run(&steps).unwrap();
        assert!(fx.report.lines()[0].contains("not present (skipped)"));
    }

    #[test]
    fn test_clone_row_from_reference_with_guard() {
        let mut fx = Fixture::new();
        fx.reference.insert(
            "uniques.txt",
            parse(
                "index\tcode\tversion\tenabled\nThe Atlantean\t9wd\t100\t1\n",
                "uniques.txt",
            )
            .unwrap(),
        );
        fx.working = fx.reference.clone();
        let clone = step(StepOp::CloneRow {
            table: "uniques.txt".into(),
            from_reference: true,
            key_column: "index".into(),
            key: "The Atlantean".into(),
            set: vec![ColumnValue {
                column: "version".into(),
                value: "0".into(),
            }],
            guard: Some(Gate::new("version", "0")),
            strictness: Strictness::Strict,
        });
        fx.run(std::slice::from_ref(&clone)).unwrap();
        let t = fx.working.get("uniques.txt").unwrap();
        assert_eq!(t.record_count(), 2);
        assert_eq!(t.value(1, "version"), Some("0"));
        assert_eq!(t.value(1, "index"), Some("The Atlantean"));

        // second application is guarded off
        fx.run(std::slice::from_ref(&clone)).unwrap();
        assert_eq!(fx.working.get("uniques.txt").unwrap().record_count(), 2);
        assert!(fx
            .report
            .lines()
            .last()
            .unwrap()
            .contains("already present"));
    }

    #[test]
    fn test_merge_rows_step_idempotent() {
        let mut fx = Fixture::new();
        let steps = vec![step(StepOp::MergeRows {
            table: "recipes.txt".into(),
            overlay: "recipes.txt".into(),
            signature: SignatureSpec {
                columns: vec!["output".into()],
                multi_prefixes: vec!["input".into()],
            },
            enabled: Some(Gate::new("enabled", "1")),
        })];
        fx.run(&steps).unwrap();
        assert_eq!(fx.working.get("recipes.txt").unwrap().record_count(), 2);
        fx.run(&steps).unwrap();
        assert_eq!(fx.working.get("recipes.txt").unwrap().record_count(), 2);
        assert!(fx
            .report
            .lines()
            .last()
            .unwrap()
            .contains("no new rows to merge"));
    }

    #[test]
    fn test_optional_step_disabled_by_default() {
        let mut fx = Fixture::new();
        let steps = vec![StepSpec {
            name: Some("cowtest".into()),
            optional: true,
            op: StepOp::SetCells {
                table: "misc.txt".into(),
                key_column: "code".into(),
                assignments: vec![CellAssignment {
                    key: "key".into(),
                    column: "maxstack".into(),
                    value: "999".into(),
                }],
            },
        }];
        fx.run(&steps).unwrap();
        assert_eq!(fx.working.get("misc.txt").unwrap().value(0, "maxstack"), Some("12"));
        assert!(fx.report.lines()[0].contains("optional step disabled"));

        // explicitly enabled, it runs
        let mut ctx = PipelineContext {
            working: &mut fx.working,
            reference: &fx.reference,
            overlays: &fx.overlays,
            report: &mut fx.report,
        };
        run_steps(&steps, &["cowtest".to_string()], &mut ctx).unwrap();
        assert_eq!(fx.working.get("misc.txt").unwrap().value(0, "maxstack"), Some("999"));
    }
}
