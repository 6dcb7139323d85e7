//! Comparison options, passed explicitly into every diff.

use crate::ConfigError;
use schema_sync_model::Casing;
use std::collections::HashSet;

/// Which optional categories the diff engine computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareOptions {
    pub check_indexes: bool,
    pub check_constraints: bool,
    pub check_defaults: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            check_indexes: true,
            check_constraints: true,
            check_defaults: true,
        }
    }
}

/// Immutable options for one comparison run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOptions {
    ignore_tables: Vec<String>,
    compare: CompareOptions,
    casing: Casing,
}

impl DiffOptions {
    /// Validate and build options. Ignore entries must be non-empty, unpadded
    /// and unique under `casing`.
    pub fn new(
        ignore_tables: impl IntoIterator<Item = impl Into<String>>,
        compare: CompareOptions,
        casing: Casing,
    ) -> Result<Self, ConfigError> {
        let ignore_tables: Vec<String> = ignore_tables.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for entry in &ignore_tables {
            if entry.trim().is_empty() {
                return Err(ConfigError::EmptyIgnoreEntry);
            }
            if entry.trim() != entry {
                return Err(ConfigError::PaddedIgnoreEntry(entry.clone()));
            }
            if !seen.insert(casing.key(entry)) {
                return Err(ConfigError::DuplicateIgnoreEntry(entry.clone()));
            }
        }
        Ok(Self {
            ignore_tables,
            compare,
            casing,
        })
    }

    pub fn compare(&self) -> CompareOptions {
        self.compare
    }

    pub fn casing(&self) -> Casing {
        self.casing
    }

    pub fn ignore_tables(&self) -> &[String] {
        &self.ignore_tables
    }

    pub fn is_ignored(&self, table: &str) -> bool {
        self.ignore_tables
            .iter()
            .any(|ignored| self.casing.same(ignored, table))
    }
}
