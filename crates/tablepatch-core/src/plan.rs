//! Plan files: the ordered step list and verification rules, as data
//!
//! All business policy (which columns to equalize, which rows to clone,
//! which tables the gate checks) lives in a JSON plan, never in engine
//! logic. Tables are addressed by their baseline-relative path.

use crate::error::{Error, Result};
use crate::pattern::PairConvention;
use crate::resolve::{CategoryExclusion, Strictness};
use crate::signature::SignatureSpec;
use crate::table::Gate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// A complete pipeline plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Ordered transform steps; order is part of the contract
    pub steps: Vec<StepSpec>,
    /// Integrity checks run once after all steps
    #[serde(default)]
    pub verify: Vec<VerifySpec>,
    /// Overlay-relative paths of opaque side files copied through unmodified
    #[serde(default)]
    pub passthrough: Vec<String>,
}

/// One named step of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Optional step name, used for report lines and for enabling
    /// optional steps
    #[serde(default)]
    pub name: Option<String>,
    /// Optional steps run only when explicitly enabled; they are strictly
    /// additive and disabling one never breaks another step
    #[serde(default)]
    pub optional: bool,
    #[serde(flatten)]
    pub op: StepOp,
}

impl StepSpec {
    /// Tag used to prefix this step's report lines
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.op.kind_name())
    }
}

/// The transform a step performs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOp {
    /// Copy target into source for every convention-resolved column pair
    ForceEqual {
        table: String,
        conventions: Vec<PairConvention>,
        #[serde(default)]
        gate: Option<Gate>,
    },
    /// Point assignments: for each (key, column, value), set the column on
    /// every record whose key column matches
    SetCells {
        table: String,
        key_column: String,
        assignments: Vec<CellAssignment>,
    },
    /// Set one column to a fixed value on every gated record
    SetColumn {
        table: String,
        column: String,
        value: String,
        #[serde(default)]
        gate: Option<Gate>,
        /// Records matching this gate are left alone
        #[serde(default)]
        unless: Option<Gate>,
        /// Records of an excluded category are left alone
        #[serde(default)]
        exclude: Option<CategoryExclusion>,
    },
    /// Copy every non-key column from a source record onto a destination
    /// record, both addressed by key
    CopyRow {
        table: String,
        key_column: String,
        pairs: Vec<RowCopy>,
        #[serde(default)]
        strictness: Strictness,
    },
    /// Override matching rows from an overlay table keyed by a shared
    /// column; empty overlay values never override
    ReferenceOverride {
        table: String,
        overlay: String,
        key_column: String,
        /// Restrict the override to these columns; all shared columns
        /// when absent
        #[serde(default)]
        columns: Option<Vec<String>>,
    },
    /// Clone a keyed record (from the reference snapshot or the working
    /// table) with field overrides, guarded against double application
    CloneRow {
        table: String,
        /// Clone from the untouched reference snapshot instead of the
        /// working table
        #[serde(default)]
        from_reference: bool,
        key_column: String,
        key: String,
        #[serde(default)]
        set: Vec<ColumnValue>,
        /// When a record matching this gate already exists the step only
        /// reports
        #[serde(default)]
        guard: Option<Gate>,
        #[serde(default)]
        strictness: Strictness,
    },
    /// Append overlay records absent from the destination, deduplicated by
    /// signature
    MergeRows {
        table: String,
        overlay: String,
        signature: SignatureSpec,
        #[serde(default)]
        enabled: Option<Gate>,
    },
}

impl StepOp {
    pub fn kind_name(&self) -> &'static str {
        match self {
            StepOp::ForceEqual { .. } => "force_equal",
            StepOp::SetCells { .. } => "set_cells",
            StepOp::SetColumn { .. } => "set_column",
            StepOp::CopyRow { .. } => "copy_row",
            StepOp::ReferenceOverride { .. } => "reference_override",
            StepOp::CloneRow { .. } => "clone_row",
            StepOp::MergeRows { .. } => "merge_rows",
        }
    }

    /// The working table this step mutates
    pub fn table(&self) -> &str {
        match self {
            StepOp::ForceEqual { table, .. }
            | StepOp::SetCells { table, .. }
            | StepOp::SetColumn { table, .. }
            | StepOp::CopyRow { table, .. }
            | StepOp::ReferenceOverride { table, .. }
            | StepOp::CloneRow { table, .. }
            | StepOp::MergeRows { table, .. } => table,
        }
    }

    /// The overlay table this step consults, if any
    pub fn overlay(&self) -> Option<&str> {
        match self {
            StepOp::ReferenceOverride { overlay, .. } | StepOp::MergeRows { overlay, .. } => {
                Some(overlay)
            }
            _ => None,
        }
    }
}

/// One (key, column, value) point assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellAssignment {
    pub key: String,
    pub column: String,
    pub value: String,
}

/// Destination and source keys of a whole-row copy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowCopy {
    pub dest: String,
    pub source: String,
}

/// A column/value override applied to a cloned record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnValue {
    pub column: String,
    pub value: String,
}

/// How the integrity gate checks one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySpec {
    pub table: String,
    #[serde(default)]
    pub key_column: Option<String>,
    #[serde(default)]
    pub rows: RowCheck,
}

/// Row-count expectation for a verified table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowCheck {
    /// Record count must equal the reference snapshot
    Exact,
    /// Reference records must survive unchanged as a prefix; appended
    /// records after them are legitimate
    AppendOnly,
}

impl Default for RowCheck {
    fn default() -> Self {
        RowCheck::Exact
    }
}

impl Plan {
    /// Load a plan from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the plan as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Every baseline table the plan touches: step targets, classification
    /// tables, and verified tables
    pub fn baseline_tables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for step in &self.steps {
            names.insert(step.op.table().to_string());
            if let StepOp::SetColumn {
                exclude: Some(exclusion),
                ..
            } = &step.op
            {
                names.insert(exclusion.class_table.clone());
            }
        }
        for v in &self.verify {
            names.insert(v.table.clone());
        }
        names
    }

    /// Every overlay table any step consults
    pub fn overlay_tables(&self) -> BTreeSet<String> {
        self.steps
            .iter()
            .filter_map(|s| s.op.overlay())
            .map(|s| s.to_string())
            .collect()
    }

    /// A small self-describing plan, used by `create-plan`
    pub fn template() -> Self {
        Plan {
            steps: vec![
                StepSpec {
                    name: Some("max-rolls".into()),
                    optional: false,
                    op: StepOp::ForceEqual {
                        table: "data/items.txt".into(),
                        conventions: vec![PairConvention::PrefixNumber {
                            source: "min".into(),
                            target: "max".into(),
                        }],
                        gate: Some(Gate::new("version", "0")),
                    },
                },
                StepSpec {
                    name: Some("stack-sizes".into()),
                    optional: false,
                    op: StepOp::SetCells {
                        table: "data/misc.txt".into(),
                        key_column: "code".into(),
                        assignments: vec![CellAssignment {
                            key: "key".into(),
                            column: "maxstack".into(),
                            value: "50".into(),
                        }],
                    },
                },
                StepSpec {
                    name: Some("recipes".into()),
                    optional: false,
                    op: StepOp::MergeRows {
                        table: "data/recipes.txt".into(),
                        overlay: "recipes.txt".into(),
                        signature: SignatureSpec {
                            columns: vec!["op".into(), "version".into(), "output".into()],
                            multi_prefixes: vec!["input".into()],
                        },
                        enabled: Some(Gate::new("enabled", "1")),
                    },
                },
            ],
            verify: vec![
                VerifySpec {
                    table: "data/items.txt".into(),
                    key_column: Some("code".into()),
                    rows: RowCheck::Exact,
                },
                VerifySpec {
                    table: "data/recipes.txt".into(),
                    key_column: None,
                    rows: RowCheck::AppendOnly,
                },
            ],
            passthrough: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_json_round_trip() {
        let plan = Plan::template();
        let json = serde_json::to_string_pretty(&plan).unwrap();
        let loaded: Plan = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.steps.len(), plan.steps.len());
        assert_eq!(loaded.verify.len(), 2);
        assert!(matches!(loaded.steps[0].op, StepOp::ForceEqual { .. }));
        assert!(matches!(loaded.steps[2].op, StepOp::MergeRows { .. }));
    }

    #[test]
    fn test_step_label_falls_back_to_kind() {
        let mut plan = Plan::template();
        assert_eq!(plan.steps[0].label(), "max-rolls");
        plan.steps[0].name = None;
        assert_eq!(plan.steps[0].label(), "force_equal");
    }

    #[test]
    fn test_baseline_and_overlay_collection() {
        let plan = Plan::template();
        let tables = plan.baseline_tables();
        assert!(tables.contains("data/items.txt"));
        assert!(tables.contains("data/misc.txt"));
        assert!(tables.contains("data/recipes.txt"));
        let overlays = plan.overlay_tables();
        assert_eq!(overlays.len(), 1);
        assert!(overlays.contains("recipes.txt"));
    }

    #[test]
    fn test_parse_minimal_step_json() {
        let json = r#"{
            "steps": [
                {"kind": "set_column", "table": "t.txt", "column": "ShowLevel",
                 "value": "1", "unless": {"column": "name", "equals": "Expansion"}}
            ]
        }"#;
        let plan: Plan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].label(), "set_column");
        assert!(plan.verify.is_empty());
        match &plan.steps[0].op {
            StepOp::SetColumn { unless, exclude, .. } => {
                assert!(unless.is_some());
                assert!(exclude.is_none());
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_strictness_defaults_to_lenient() {
        let json = r#"{
            "steps": [
                {"kind": "copy_row", "table": "t.txt", "key_column": "Treasure Class",
                 "pairs": [{"dest": "Andariel", "source": "Andarielq"}]}
            ]
        }"#;
        let plan: Plan = serde_json::from_str(json).unwrap();
        match &plan.steps[0].op {
            StepOp::CopyRow { strictness, .. } => {
                assert_eq!(*strictness, Strictness::Lenient);
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }
}
