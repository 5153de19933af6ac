//! tablepatch CLI
//!
//! Command-line tool for running table patch plans against a baseline data
//! tree and inspecting delimited table files.

use clap::{Parser, Subcommand};
use tablepatch_core::{read_table, run_pipeline, Plan, RunConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tablepatch")]
#[command(about = "Deterministic patcher for delimited game data tables", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a plan against a baseline tree and commit the patched output
    Run {
        /// Root of the pristine baseline data tree
        #[arg(short, long)]
        baseline: PathBuf,

        /// Root of an overlay tree contributing merge rows and overrides
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Output directory, replaced atomically on success
        #[arg(short, long)]
        out: PathBuf,

        /// Path to the plan file (JSON)
        #[arg(short, long)]
        plan: PathBuf,

        /// Optional steps to enable, by name
        #[arg(short, long)]
        enable: Vec<String>,
    },

    /// Parse and display a single table file
    Parse {
        /// Path to the table file
        #[arg(short, long)]
        file: PathBuf,

        /// Emit the parsed table as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Maximum number of rows to display
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Create a plan file template
    CreatePlan {
        /// Output path for the plan file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> tablepatch_core::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            baseline,
            overlay,
            out,
            plan,
            enable,
        } => cmd_run(&baseline, overlay, &out, &plan, enable),
        Commands::Parse { file, json, limit } => cmd_parse(&file, json, limit),
        Commands::CreatePlan { output } => cmd_create_plan(&output),
    }
}

fn cmd_run(
    baseline: &PathBuf,
    overlay: Option<PathBuf>,
    out: &PathBuf,
    plan_path: &PathBuf,
    enable: Vec<String>,
) -> tablepatch_core::Result<()> {
    let plan = Plan::load(plan_path)?;
    let config = RunConfig {
        baseline_root: baseline.clone(),
        overlay_root: overlay,
        output_root: out.clone(),
        plan,
        enabled_optional_steps: enable,
    };
    let report = run_pipeline(&config)?;

    for line in report.lines() {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_parse(file: &PathBuf, json: bool, limit: Option<usize>) -> tablepatch_core::Result<()> {
    let table = read_table(file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&table).map_err(tablepatch_core::Error::Json)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Columns: {}", table.column_count());
    println!("Records: {}", table.record_count());
    println!();
    println!("{}", table.header.join("\t"));
    println!("{}", "-".repeat(table.header.len() * 12));

    let row_limit = limit.unwrap_or(table.record_count());
    for record in table.records.iter().take(row_limit) {
        println!("{}", record.values.join("\t"));
    }
    if table.record_count() > row_limit {
        println!("... ({} more rows)", table.record_count() - row_limit);
    }

    Ok(())
}

fn cmd_create_plan(output: &PathBuf) -> tablepatch_core::Result<()> {
    let plan = Plan::template();
    plan.save(output)?;
    println!("Created plan template: {}", output.display());
    println!("Edit the step list, then apply it with 'tablepatch run'.");
    Ok(())
}
