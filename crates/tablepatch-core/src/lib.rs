//! tablepatch-core: Core library for deterministic patching of delimited
//! game data tables
//!
//! This library provides functionality to:
//! - Parse TSV/CSV tables while preserving delimiter and line-ending
//!   conventions
//! - Resolve paired columns (min/max style) from naming conventions
//! - Force paired columns equal, assign cells, and clone or copy rows
//! - Merge overlay rows by content signature without duplicates
//! - Verify patched tables against the pristine baseline
//! - Run a JSON plan end to end and commit the output tree atomically

pub mod equalize;
pub mod error;
pub mod integrity;
pub mod pattern;
pub mod pipeline;
pub mod plan;
pub mod report;
pub mod resolve;
pub mod runner;
pub mod signature;
pub mod store;
pub mod table;

pub use equalize::{force_equal, ChangeCount};
pub use error::{DuplicateExample, Error, IntegrityViolation, Result};
pub use integrity::{validate, validate_append_only};
pub use pattern::{paired_columns, PairConvention};
pub use pipeline::{run_steps, PipelineContext, TableRegistry};
pub use plan::{Plan, RowCheck, StepOp, StepSpec, VerifySpec};
pub use report::ReportLog;
pub use resolve::{resolve_foreign_row, CategoryExclusion, Strictness};
pub use runner::{run_pipeline, RunConfig, REPORT_FILE_NAME};
pub use signature::{compute_signature, merge, SignatureSpec};
pub use store::{parse, read_table, serialize, write_table};
pub use table::{Delimiter, Gate, LineEnding, Record, Table};
