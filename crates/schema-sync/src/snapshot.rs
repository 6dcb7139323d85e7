//! Snapshot acquisition.
//!
//! A [`SnapshotSource`] produces one normalized [`Schema`]. Vendor-specific
//! rows are normalized here, at the boundary, so the diff engine only ever
//! sees canonical types, defaults and constraint kinds.
//!
//! [`FixtureFile`] reads a JSON snapshot with this shape:
//!
//! ```json
//! {
//!   "tables": [
//!     {
//!       "name": "users",
//!       "columns": [
//!         { "name": "id", "type": "integer", "nullable": false },
//!         { "name": "email", "type": "character varying(255)", "nullable": false }
//!       ],
//!       "primary_key": ["id"],
//!       "indexes": [{ "name": "idx_users_email", "columns": ["email"], "unique": true }],
//!       "constraints": []
//!     }
//!   ]
//! }
//! ```

use crate::SnapshotError;
use camino::{Utf8Path, Utf8PathBuf};
use facet::Facet;
use schema_sync_model::{
    Casing, Column, Constraint, ConstraintTag, FkAction, Index, LogicalType, Schema, Table,
};

/// Anything that can produce a schema snapshot.
///
/// Implementations are called from a blocking thread pool and never retried.
pub trait SnapshotSource: Send + Sync {
    /// Short human-readable description (a path, a redacted URL).
    fn describe(&self) -> String;

    fn snapshot(&self) -> Result<Schema, SnapshotError>;
}

/// An already-built schema, handy for tests and embedding.
impl SnapshotSource for Schema {
    fn describe(&self) -> String {
        format!("in-memory schema ({} tables)", self.len())
    }

    fn snapshot(&self) -> Result<Schema, SnapshotError> {
        Ok(self.clone())
    }
}

/// A JSON snapshot file on disk.
#[derive(Debug, Clone)]
pub struct FixtureFile {
    path: Utf8PathBuf,
    casing: Casing,
}

impl FixtureFile {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            casing: Casing::Sensitive,
        }
    }

    pub fn with_casing(mut self, casing: Casing) -> Self {
        self.casing = casing;
        self
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl SnapshotSource for FixtureFile {
    fn describe(&self) -> String {
        self.path.to_string()
    }

    fn snapshot(&self) -> Result<Schema, SnapshotError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| SnapshotError::Io {
            path: self.path.to_string(),
            source,
        })?;
        let raw: RawSchema = facet_json::from_str(&content).map_err(|e| SnapshotError::Parse {
            path: self.path.to_string(),
            message: e.to_string(),
        })?;
        let schema = raw.normalize(self.casing)?;
        tracing::debug!(path = %self.path, tables = schema.len(), "loaded snapshot fixture");
        Ok(schema)
    }
}

/// Raw snapshot rows as an introspector reports them.
#[derive(Debug, Clone, Default, Facet)]
pub struct RawSchema {
    #[facet(default)]
    pub tables: Vec<RawTable>,
}

#[derive(Debug, Clone, Facet)]
pub struct RawTable {
    pub name: String,
    #[facet(default)]
    pub columns: Vec<RawColumn>,
    /// Primary key columns, when the introspector reports them separately
    #[facet(default)]
    pub primary_key: Vec<String>,
    #[facet(default)]
    pub indexes: Vec<RawIndex>,
    #[facet(default)]
    pub constraints: Vec<RawConstraint>,
}

#[derive(Debug, Clone, Facet)]
pub struct RawColumn {
    pub name: String,
    /// Vendor type spelling, e.g. `character varying(255)` or `int(11)`
    #[facet(rename = "type")]
    pub data_type: String,
    /// Defaults to nullable when absent
    #[facet(default)]
    pub nullable: Option<bool>,
    #[facet(default)]
    pub default: Option<String>,
    #[facet(default)]
    pub ordinal: Option<u32>,
}

#[derive(Debug, Clone, Facet)]
pub struct RawIndex {
    pub name: String,
    pub columns: Vec<String>,
    #[facet(default)]
    pub unique: bool,
    #[facet(default)]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Facet)]
pub struct RawConstraint {
    pub name: String,
    /// `primary_key`, `foreign_key`, `unique`, `check` or `not_null`
    pub kind: String,
    #[facet(default)]
    pub columns: Vec<String>,
    #[facet(default)]
    pub references_table: Option<String>,
    #[facet(default)]
    pub references_columns: Vec<String>,
    #[facet(default)]
    pub on_delete: Option<String>,
    #[facet(default)]
    pub on_update: Option<String>,
    #[facet(default)]
    pub expression: Option<String>,
}

impl RawSchema {
    /// Normalize raw rows into a validated [`Schema`].
    pub fn normalize(&self, casing: Casing) -> Result<Schema, SnapshotError> {
        let tables = self
            .tables
            .iter()
            .map(RawTable::normalize)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Schema::from_tables_with_casing(tables, casing)?)
    }
}

impl RawTable {
    fn normalize(&self) -> Result<Table, SnapshotError> {
        let error = |message: String| SnapshotError::Normalize {
            table: self.name.clone(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(error("table name is empty".to_string()));
        }

        let mut table = Table::new(&self.name);

        for (position, raw) in self.columns.iter().enumerate() {
            if raw.name.trim().is_empty() {
                return Err(error(format!("column #{} has an empty name", position + 1)));
            }
            let mut column = Column::new(&raw.name, LogicalType::parse(&raw.data_type))
                .with_ordinal(raw.ordinal.unwrap_or(position as u32 + 1));
            column.nullable = raw.nullable.unwrap_or(true);
            if let Some(default) = &raw.default {
                column = column.with_default(default);
            }
            table = table.column(column);
        }

        for raw in &self.indexes {
            let columns: Vec<&str> = raw.columns.iter().map(String::as_str).collect();
            let mut index = if raw.unique {
                Index::unique(&raw.name, &columns)
            } else {
                Index::new(&raw.name, &columns)
            };
            if let Some(method) = &raw.method {
                index = index.with_method(method);
            }
            table = table.index(index);
        }

        for raw in &self.constraints {
            table = table.constraint(raw.normalize().map_err(error)?);
        }

        // some introspectors report the primary key as a bare column list
        if !self.primary_key.is_empty() && table.primary_key().is_none() {
            let columns: Vec<&str> = self.primary_key.iter().map(String::as_str).collect();
            table = table.constraint(Constraint::primary_key(
                format!("{}_pkey", self.name),
                &columns,
            ));
        }

        Ok(table)
    }
}

impl RawConstraint {
    fn normalize(&self) -> Result<Constraint, String> {
        let columns: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        let tag = parse_kind(&self.kind)
            .ok_or_else(|| format!("constraint '{}' has unknown kind '{}'", self.name, self.kind))?;

        let constraint = match tag {
            ConstraintTag::PrimaryKey => Constraint::primary_key(&self.name, &columns),
            ConstraintTag::Unique => Constraint::unique(&self.name, &columns),
            ConstraintTag::NotNull => {
                let [column] = columns.as_slice() else {
                    return Err(format!(
                        "NOT NULL constraint '{}' must name exactly one column",
                        self.name
                    ));
                };
                Constraint::not_null(&self.name, column)
            }
            ConstraintTag::Check => {
                let expression = self.expression.as_deref().ok_or_else(|| {
                    format!("CHECK constraint '{}' has no expression", self.name)
                })?;
                Constraint::check(&self.name, &columns, expression)
            }
            ConstraintTag::ForeignKey => {
                let references_table = self.references_table.as_deref().ok_or_else(|| {
                    format!("foreign key '{}' has no referenced table", self.name)
                })?;
                if columns.is_empty() || columns.len() != self.references_columns.len() {
                    return Err(format!(
                        "foreign key '{}' pairs {} column(s) with {} referenced column(s)",
                        self.name,
                        columns.len(),
                        self.references_columns.len()
                    ));
                }
                let references: Vec<&str> =
                    self.references_columns.iter().map(String::as_str).collect();
                let action = |raw: &Option<String>| match raw.as_deref() {
                    None => Ok(FkAction::NoAction),
                    Some(raw) => FkAction::parse(raw).ok_or_else(|| {
                        format!("foreign key '{}' has unknown action '{}'", self.name, raw)
                    }),
                };
                Constraint::foreign_key(&self.name, &columns, references_table, &references)
                    .with_actions(action(&self.on_delete)?, action(&self.on_update)?)
            }
        };

        Ok(constraint)
    }
}

fn parse_kind(raw: &str) -> Option<ConstraintTag> {
    let normalized: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect();
    match normalized.as_str() {
        "primary_key" | "pk" => Some(ConstraintTag::PrimaryKey),
        "foreign_key" | "fk" => Some(ConstraintTag::ForeignKey),
        "unique" => Some(ConstraintTag::Unique),
        "check" => Some(ConstraintTag::Check),
        "not_null" => Some(ConstraintTag::NotNull),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str, nullable: bool) -> RawColumn {
        RawColumn {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: Some(nullable),
            default: None,
            ordinal: None,
        }
    }

    fn constraint(name: &str, kind: &str, columns: &[&str]) -> RawConstraint {
        RawConstraint {
            name: name.to_string(),
            kind: kind.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            references_table: None,
            references_columns: Vec::new(),
            on_delete: None,
            on_update: None,
            expression: None,
        }
    }

    fn table(name: &str) -> RawTable {
        RawTable {
            name: name.to_string(),
            columns: vec![
                column("id", "int4", false),
                column("email", "character varying(255)", true),
            ],
            primary_key: Vec::new(),
            indexes: Vec::new(),
            constraints: Vec::new(),
        }
    }

    #[test]
    fn test_normalize_types_and_ordinals() {
        let schema = RawSchema {
            tables: vec![table("users")],
        }
        .normalize(Casing::Sensitive)
        .unwrap();

        let users = schema.get_table("users").unwrap();
        assert_eq!(users.columns[0].data_type, LogicalType::Integer);
        assert!(!users.columns[0].nullable);
        assert_eq!(users.columns[1].data_type, LogicalType::Varchar(Some(255)));
        assert_eq!(users.columns[1].ordinal, 2);
    }

    #[test]
    fn test_primary_key_list_becomes_constraint() {
        let mut raw = table("users");
        raw.primary_key = vec!["id".to_string()];
        let schema = RawSchema { tables: vec![raw] }
            .normalize(Casing::Sensitive)
            .unwrap();

        let pk = schema.get_table("users").unwrap().primary_key().unwrap();
        assert_eq!(pk.name, "users_pkey");
        assert_eq!(pk.columns, vec!["id".to_string()]);
    }

    #[test]
    fn test_explicit_primary_key_wins() {
        let mut raw = table("users");
        raw.primary_key = vec!["id".to_string()];
        raw.constraints = vec![constraint("pk_users", "PRIMARY KEY", &["id"])];
        let schema = RawSchema { tables: vec![raw] }
            .normalize(Casing::Sensitive)
            .unwrap();

        let users = schema.get_table("users").unwrap();
        assert_eq!(users.constraints.len(), 1);
        assert_eq!(users.constraints[0].name, "pk_users");
    }

    #[test]
    fn test_foreign_key_actions() {
        let mut fk = constraint("orders_user_fkey", "foreign_key", &["user_id"]);
        fk.references_table = Some("users".to_string());
        fk.references_columns = vec!["id".to_string()];
        fk.on_delete = Some("CASCADE".to_string());
        let normalized = fk.normalize().unwrap();

        let target = normalized.foreign_key_ref().unwrap();
        assert_eq!(target.references_table, "users");
        assert_eq!(target.on_delete, FkAction::Cascade);
        assert_eq!(target.on_update, FkAction::NoAction);
    }

    #[test]
    fn test_rejects_malformed_constraints() {
        let unknown = constraint("weird", "exclusion", &["id"]);
        assert!(unknown.normalize().unwrap_err().contains("unknown kind"));

        let dangling = constraint("fk", "foreign_key", &["user_id"]);
        assert!(dangling.normalize().unwrap_err().contains("no referenced table"));

        let check = constraint("ck", "check", &["price"]);
        assert!(check.normalize().unwrap_err().contains("no expression"));
    }

    #[test]
    fn test_duplicate_columns_surface_as_model_error() {
        let mut raw = table("users");
        raw.columns.push(column("id", "bigint", false));
        let err = RawSchema { tables: vec![raw] }
            .normalize(Casing::Sensitive)
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Model(_)));
    }

    #[test]
    fn test_missing_fixture_is_io_error() {
        let err = FixtureFile::new("/nonexistent/schema-sync/snapshot.json")
            .snapshot()
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
    }
}
