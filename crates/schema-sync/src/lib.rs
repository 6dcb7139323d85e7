//! Schema diff and migration planning for relational databases.
//!
//! This crate provides:
//! - Structural comparison of two schema snapshots ([`diff`])
//! - Dependency-ordered DDL planning ([`plan`])
//! - Deterministic SQL, report and plan rendering ([`render`], [`render_report`], [`render_plan`])
//! - Concurrent comparison of many environments ([`validate`])
//!
//! Snapshots come from any [`SnapshotSource`]; [`FixtureFile`] reads the JSON
//! snapshot format. No database driver is linked here.
//!
//! ```ignore
//! let source = FixtureFile::new("snapshots/staging.json").snapshot()?;
//! let target = FixtureFile::new("snapshots/production.json").snapshot()?;
//!
//! let diff = schema_sync::diff(&source, &target, &DiffOptions::default());
//! let plan = schema_sync::plan(&diff)?;
//! println!("{}", schema_sync::render(plan.operations(), Dialect::Postgres)?);
//! ```

mod diff;
mod error;
mod options;
mod planner;
pub mod render;
mod snapshot;
mod validate;

pub use diff::{
    ColumnChanges, Difference, DifferenceKind, SchemaDiff, TableSummary, diff, try_diff,
};
pub use error::{ConfigError, Error, PlanError, RenderError, SnapshotError};
pub use options::{CompareOptions, DiffOptions};
pub use planner::{MigrationPlan, Operation, OperationId, OperationKind, plan};
pub use render::{
    Dialect, MigrationWarning, WarningKind, render, render_plan, render_report, warnings,
};
pub use snapshot::{
    FixtureFile, RawColumn, RawConstraint, RawIndex, RawSchema, RawTable, SnapshotSource,
};
pub use validate::{
    Environment, Outcome, PairOutcome, Topology, ValidationReport, Verdict, validate,
};

// Re-export the schema model for convenience
pub use schema_sync_model::*;

pub type Result<T, E = Error> = std::result::Result<T, E>;
