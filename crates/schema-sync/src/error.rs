use crate::planner::OperationId;
use schema_sync_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Malformed options, rejected before any comparison runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("ignore_tables contains an empty entry")]
    EmptyIgnoreEntry,

    #[error("ignore_tables entry '{0}' has surrounding whitespace")]
    PaddedIgnoreEntry(String),

    #[error("ignore_tables lists '{0}' more than once")]
    DuplicateIgnoreEntry(String),

    #[error("need at least 2 environments to validate, got {0}")]
    TooFewEnvironments(usize),

    #[error("environment '{0}' is defined more than once")]
    DuplicateEnvironment(String),

    #[error("baseline environment '{0}' is not defined")]
    UnknownBaseline(String),

    #[error("unknown SQL dialect '{0}' (expected postgres, mysql or sqlite)")]
    UnknownDialect(String),

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("snapshot names collide under the configured casing: {0}")]
    AmbiguousNames(ModelError),
}

/// A collaborator could not produce a schema snapshot. Never retried here.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse snapshot {path}: {message}")]
    Parse { path: String, message: String },

    #[error("table '{table}': {message}")]
    Normalize { table: String, message: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("snapshot source '{source_name}' is unavailable: {message}")]
    Unavailable {
        source_name: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("dependency cycle detected, cannot order: {}", format_ids(.operations))]
    CyclicDependency { operations: Vec<OperationId> },
}

fn format_ids(ids: &[OperationId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("{operation} cannot be rendered for {dialect}")]
    UnsupportedOperation {
        operation: OperationId,
        dialect: &'static str,
    },

    #[error("no {dialect} type mapping for {logical_type} (in {operation})")]
    UnknownTypeMapping {
        operation: OperationId,
        logical_type: String,
        dialect: &'static str,
    },
}
