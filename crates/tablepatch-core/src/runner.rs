//! End-to-end run orchestration: load, transform, verify, commit
//!
//! A run stages its entire output in a sibling temporary directory and
//! renames it into place only after every table serialized and the report
//! was written. A failed run leaves any previous output untouched.

use crate::error::{Error, Result};
use crate::integrity;
use crate::pipeline::{run_steps, PipelineContext, TableRegistry};
use crate::plan::{Plan, RowCheck};
use crate::report::ReportLog;
use crate::store;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use walkdir::WalkDir;

/// Name of the run report written into the output root
pub const REPORT_FILE_NAME: &str = "log.txt";

/// Inputs for one pipeline run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Root of the pristine baseline tree
    pub baseline_root: PathBuf,
    /// Root of the overlay tree, when one participates in the run
    pub overlay_root: Option<PathBuf>,
    /// Output root; replaced atomically on success
    pub output_root: PathBuf,
    /// The step plan to execute
    pub plan: Plan,
    /// Names of optional steps to enable for this run
    pub enabled_optional_steps: Vec<String>,
}

/// Execute the full pipeline: seed the working set from the baseline,
/// apply the plan, verify against the reference snapshot, and commit the
/// output tree.
pub fn run_pipeline(config: &RunConfig) -> Result<ReportLog> {
    let mut report = ReportLog::new();
    report.push(format!(
        "run started {}",
        report.started().to_rfc3339()
    ));

    let reference = load_baseline(&config.baseline_root, &config.plan)?;
    let mut working = reference.clone();
    let overlays = load_overlays(config.overlay_root.as_deref(), &config.plan, &mut report)?;

    let mut ctx = PipelineContext {
        working: &mut working,
        reference: &reference,
        overlays: &overlays,
        report: &mut report,
    };
    run_steps(&config.plan.steps, &config.enabled_optional_steps, &mut ctx)?;

    verify(&config.plan, &working, &reference, &mut report)?;

    commit(config, &working, &report)?;
    report.push(format!("output committed to {}", config.output_root.display()));
    Ok(report)
}

/// Every table a plan step names must exist in the baseline.
fn load_baseline(root: &Path, plan: &Plan) -> Result<TableRegistry> {
    let mut registry = TableRegistry::new();
    for name in plan.baseline_tables() {
        let path = root.join(&name);
        let table = store::read_table(&path)?;
        registry.insert(name, table);
    }
    Ok(registry)
}

/// Overlay tables are opportunistic: an absent file is recorded and the
/// run continues, but a present-yet-malformed one aborts the run.
fn load_overlays(
    root: Option<&Path>,
    plan: &Plan,
    report: &mut ReportLog,
) -> Result<TableRegistry> {
    let mut registry = TableRegistry::new();
    let Some(root) = root else {
        return Ok(registry);
    };
    for name in plan.overlay_tables() {
        let path = root.join(&name);
        if !path.is_file() {
            report.push(format!("[load] overlay '{name}' not found (skipped)"));
            continue;
        }
        let table = store::read_table(&path)?;
        registry.insert(name, table);
    }
    Ok(registry)
}

fn verify(
    plan: &Plan,
    working: &TableRegistry,
    reference: &TableRegistry,
    report: &mut ReportLog,
) -> Result<()> {
    for check in &plan.verify {
        let candidate = working
            .get(&check.table)
            .ok_or_else(|| Error::TableNotLoaded(check.table.clone()))?;
        let baseline = reference
            .get(&check.table)
            .ok_or_else(|| Error::TableNotLoaded(check.table.clone()))?;
        let key = check.key_column.as_deref();
        match check.rows {
            RowCheck::Exact => {
                integrity::validate(&check.table, candidate, baseline, key)?;
            }
            RowCheck::AppendOnly => {
                integrity::validate_append_only(&check.table, candidate, baseline, key)?;
            }
        }
        report.push(format!("[verify] {}: ok", check.table));
    }
    Ok(())
}

/// Stage the output tree next to its destination and rename it into place.
fn commit(config: &RunConfig, working: &TableRegistry, report: &ReportLog) -> Result<()> {
    let staging = staging_dir(&config.output_root);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    let result = stage(config, working, report, &staging);
    if result.is_err() {
        let _ = fs::remove_dir_all(&staging);
        return result;
    }
    if config.output_root.exists() {
        fs::remove_dir_all(&config.output_root)?;
    }
    fs::rename(&staging, &config.output_root)?;
    Ok(())
}

fn stage(
    config: &RunConfig,
    working: &TableRegistry,
    report: &ReportLog,
    staging: &Path,
) -> Result<()> {
    fs::create_dir_all(staging)?;

    let table_names: BTreeSet<&str> = working.names().collect();
    for (name, table) in working.iter() {
        store::write_table(staging.join(name), table)?;
    }

    // Baseline files that are not managed tables ride along unchanged.
    for entry in WalkDir::new(&config.baseline_root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(&config.baseline_root)
            .map_err(|_| Error::Format {
                path: entry.path().to_path_buf(),
                message: "file outside baseline root".to_string(),
            })?;
        let key = relative.to_string_lossy().replace('\\', "/");
        if table_names.contains(key.as_str()) {
            continue;
        }
        let dest = staging.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &dest)?;
    }

    // Overlay assets named by the plan are copied verbatim, never parsed.
    if let Some(overlay_root) = &config.overlay_root {
        for asset in &config.plan.passthrough {
            let src = overlay_root.join(asset);
            if !src.is_file() {
                continue;
            }
            let dest = staging.join(asset);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&src, &dest)?;
        }
    }
    fs::write(staging.join(REPORT_FILE_NAME), report.to_text())?;
    Ok(())
}

fn staging_dir(output_root: &Path) -> PathBuf {
    let name = output_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    let staged = format!(".{name}.staging-{}", process::id());
    match output_root.parent() {
        Some(parent) if parent.as_os_str().is_empty() => PathBuf::from(staged),
        Some(parent) => parent.join(staged),
        None => PathBuf::from(staged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PairConvention;
    use crate::plan::{StepOp, StepSpec, VerifySpec};
    use crate::table::Gate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static DIR_SEQ: AtomicUsize = AtomicUsize::new(0);

    /// Unique scratch directory per test invocation
    fn scratch(label: &str) -> PathBuf {
        let seq = DIR_SEQ.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "tablepatch-runner-{}-{}-{}",
            label,
            process::id(),
            seq
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_baseline(root: &Path) {
        fs::write(
            root.join("items.txt"),
            "code\tversion\tmin1\tmax1\nxyz\t0\t5\t10\nabc\t100\t1\t9\n",
        )
        .unwrap();
        fs::write(root.join("readme.txt"), "not a managed table\n").unwrap();
    }

    fn force_equal_plan() -> Plan {
        Plan {
            steps: vec![StepSpec {
                name: Some("equalize".into()),
                optional: false,
                op: StepOp::ForceEqual {
                    table: "items.txt".into(),
                    conventions: vec![PairConvention::PrefixNumber {
                        source: "min".into(),
                        target: "max".into(),
                    }],
                    gate: Some(Gate::new("version", "0")),
                },
            }],
            verify: vec![VerifySpec {
                table: "items.txt".into(),
                key_column: Some("code".into()),
                rows: RowCheck::Exact,
            }],
            passthrough: vec![],
        }
    }

    #[test]
    fn test_run_pipeline_commits_output() {
        let root = scratch("commit");
        let baseline = root.join("baseline");
        fs::create_dir_all(&baseline).unwrap();
        write_baseline(&baseline);

        let config = RunConfig {
            baseline_root: baseline,
            overlay_root: None,
            output_root: root.join("out"),
            plan: force_equal_plan(),
            enabled_optional_steps: vec![],
        };
        let report = run_pipeline(&config).unwrap();

        let table = store::read_table(&config.output_root.join("items.txt")).unwrap();
        assert_eq!(table.value(0, "min1"), Some("10"));
        assert_eq!(table.value(1, "min1"), Some("1"));

        // unmanaged baseline file rides along
        let readme = fs::read_to_string(config.output_root.join("readme.txt")).unwrap();
        assert_eq!(readme, "not a managed table\n");

        // report lands in the output and matches the returned log
        let log = fs::read_to_string(config.output_root.join(REPORT_FILE_NAME)).unwrap();
        assert_eq!(log, report.to_text());
        assert!(log.contains("[verify] items.txt: ok"));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_baseline_table_aborts_without_output() {
        let root = scratch("missing");
        let baseline = root.join("baseline");
        fs::create_dir_all(&baseline).unwrap();
        // items.txt intentionally absent

        let config = RunConfig {
            baseline_root: baseline,
            overlay_root: None,
            output_root: root.join("out"),
            plan: force_equal_plan(),
            enabled_optional_steps: vec![],
        };
        let err = run_pipeline(&config).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
        assert!(!config.output_root.exists());

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_failed_run_preserves_previous_output() {
        let root = scratch("preserve");
        let baseline = root.join("baseline");
        fs::create_dir_all(&baseline).unwrap();
        write_baseline(&baseline);

        let out = root.join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("marker.txt"), "previous run\n").unwrap();

        let mut plan = force_equal_plan();
        plan.steps.push(StepSpec {
            name: None,
            optional: false,
            op: StepOp::SetColumn {
                table: "ghost.txt".into(),
                column: "x".into(),
                value: "1".into(),
                gate: None,
                unless: None,
                exclude: None,
            },
        });
        let config = RunConfig {
            baseline_root: baseline,
            overlay_root: None,
            output_root: out.clone(),
            plan,
            enabled_optional_steps: vec![],
        };
        let err = run_pipeline(&config).unwrap_err();
        assert!(matches!(err, Error::TableNotLoaded(_)));
        let marker = fs::read_to_string(out.join("marker.txt")).unwrap();
        assert_eq!(marker, "previous run\n");

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_overlay_merge_and_passthrough() {
        let root = scratch("overlay");
        let baseline = root.join("baseline");
        let overlay = root.join("overlay");
        fs::create_dir_all(&baseline).unwrap();
        fs::create_dir_all(&overlay).unwrap();
        fs::write(
            baseline.join("recipes.txt"),
            "enabled\toutput\tinput 1\tinput 2\n1\tA\tx\ty\n",
        )
        .unwrap();
        fs::write(
            overlay.join("recipes.txt"),
            "enabled\toutput\tinput 1\tinput 2\n1\tB\tz\t\n",
        )
        .unwrap();
        fs::write(overlay.join("profile.json"), "{\"hud\": true}\n").unwrap();

        let plan = Plan {
            steps: vec![StepSpec {
                name: Some("merge recipes".into()),
                optional: false,
                op: StepOp::MergeRows {
                    table: "recipes.txt".into(),
                    overlay: "recipes.txt".into(),
                    signature: crate::signature::SignatureSpec {
                        columns: vec!["output".into()],
                        multi_prefixes: vec!["input".into()],
                    },
                    enabled: Some(Gate::new("enabled", "1")),
                },
            }],
            verify: vec![VerifySpec {
                table: "recipes.txt".into(),
                key_column: None,
                rows: RowCheck::AppendOnly,
            }],
            passthrough: vec!["profile.json".into()],
        };
        let config = RunConfig {
            baseline_root: baseline,
            overlay_root: Some(overlay),
            output_root: root.join("out"),
            plan,
            enabled_optional_steps: vec![],
        };
        run_pipeline(&config).unwrap();

        let merged = store::read_table(&config.output_root.join("recipes.txt")).unwrap();
        assert_eq!(merged.record_count(), 2);
        assert_eq!(merged.value(1, "output"), Some("B"));
        let profile = fs::read_to_string(config.output_root.join("profile.json")).unwrap();
        assert_eq!(profile, "{\"hud\": true}\n");

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_exact_verify_fails_after_row_growth() {
        let root = scratch("verify");
        let baseline = root.join("baseline");
        let overlay = root.join("overlay");
        fs::create_dir_all(&baseline).unwrap();
        fs::create_dir_all(&overlay).unwrap();
        fs::write(
            baseline.join("recipes.txt"),
            "enabled\toutput\tinput 1\n1\tA\tx\n",
        )
        .unwrap();
        fs::write(
            overlay.join("recipes.txt"),
            "enabled\toutput\tinput 1\n1\tB\tz\n",
        )
        .unwrap();

        let plan = Plan {
            steps: vec![StepSpec {
                name: None,
                optional: false,
                op: StepOp::MergeRows {
                    table: "recipes.txt".into(),
                    overlay: "recipes.txt".into(),
                    signature: crate::signature::SignatureSpec {
                        columns: vec!["output".into()],
                        multi_prefixes: vec!["input".into()],
                    },
                    enabled: None,
                },
            }],
            verify: vec![VerifySpec {
                table: "recipes.txt".into(),
                key_column: None,
                rows: RowCheck::Exact,
            }],
            passthrough: vec![],
        };
        let config = RunConfig {
            baseline_root: baseline,
            overlay_root: Some(overlay),
            output_root: root.join("out"),
            plan,
            enabled_optional_steps: vec![],
        };
        let err = run_pipeline(&config).unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity(crate::error::IntegrityViolation::RowCountDrift { .. })
        ));
        assert!(!config.output_root.exists());

        fs::remove_dir_all(&root).unwrap();
    }
}
