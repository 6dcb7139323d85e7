//! Schema model types for schema-sync.
//!
//! This crate contains the normalized, dialect-independent schema
//! representation shared between the snapshot loaders, the diff engine and the
//! migration planner. Snapshots are built once, compared, and dropped; nothing
//! in here is mutated after construction.

use indexmap::IndexMap;
use std::fmt;

mod default;
mod types;

pub use default::{ColumnDefault, normalize as normalize_default};
pub use types::LogicalType;


/// Errors raised while assembling a schema snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("duplicate table '{table}' in schema snapshot")]
    DuplicateTable { table: String },

    #[error("duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },
}

/// How object names are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Casing {
    /// Names match byte-for-byte.
    #[default]
    Sensitive,
    /// Names match after ASCII lowercasing.
    Insensitive,
}

impl Casing {
    /// The lookup key for a name under this casing.
    pub fn key(&self, name: &str) -> String {
        match self {
            Casing::Sensitive => name.to_string(),
            Casing::Insensitive => name.to_ascii_lowercase(),
        }
    }

    /// Whether two names refer to the same object.
    pub fn same(&self, a: &str, b: &str) -> bool {
        match self {
            Casing::Sensitive => a == b,
            Casing::Insensitive => a.eq_ignore_ascii_case(b),
        }
    }
}

/// A database column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Normalized type
    pub data_type: LogicalType,
    /// Whether the column allows NULL
    pub nullable: bool,
    /// Default value expression (if any)
    pub default: Option<ColumnDefault>,
    /// 1-based position within the table; 0 means "assign on insert"
    pub ordinal: u32,
}

impl Column {
    /// A nullable column without a default.
    pub fn new(name: impl Into<String>, data_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            default: None,
            ordinal: 0,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, raw: impl Into<String>) -> Self {
        self.default = Some(ColumnDefault::new(raw));
        self
    }

    pub fn with_ordinal(mut self, ordinal: u32) -> Self {
        self.ordinal = ordinal;
        self
    }
}

/// A database index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    /// Index name
    pub name: String,
    /// Indexed columns, in index order
    pub columns: Vec<String>,
    /// Whether this is a unique index
    pub unique: bool,
    /// Access method (btree, hash, ...), compared opaquely
    pub method: Option<String>,
}

/// Name-independent identity of an index: sorted columns + uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexSignature {
    pub unique: bool,
    pub columns: Vec<String>,
}

impl Index {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
            method: None,
        }
    }

    pub fn unique(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            unique: true,
            ..Self::new(name, columns)
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Compare by columns (not name, since names may differ between environments).
    pub fn signature(&self, casing: Casing) -> IndexSignature {
        let mut columns: Vec<String> = self.columns.iter().map(|c| casing.key(c)).collect();
        columns.sort();
        IndexSignature {
            unique: self.unique,
            columns,
        }
    }

    pub fn uses_column(&self, casing: Casing, column: &str) -> bool {
        self.columns.iter().any(|c| casing.same(c, column))
    }
}

/// Referential action for ON DELETE / ON UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum FkAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl FkAction {
    /// Parse an action as reported by information_schema (`NO ACTION`, `set null`, ...).
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw
            .split(|c: char| c.is_whitespace() || c == '_')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        match normalized.as_str() {
            "NO ACTION" => Some(FkAction::NoAction),
            "RESTRICT" => Some(FkAction::Restrict),
            "CASCADE" => Some(FkAction::Cascade),
            "SET NULL" => Some(FkAction::SetNull),
            "SET DEFAULT" => Some(FkAction::SetDefault),
            _ => None,
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            FkAction::NoAction => "NO ACTION",
            FkAction::Restrict => "RESTRICT",
            FkAction::Cascade => "CASCADE",
            FkAction::SetNull => "SET NULL",
            FkAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// The referenced side of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    /// Referenced table
    pub references_table: String,
    /// Referenced column(s), paired positionally with the constraint's columns
    pub references_columns: Vec<String>,
    pub on_delete: FkAction,
    pub on_update: FkAction,
}

/// Constraint kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey(ForeignKey),
    Unique,
    Check { expression: String },
    NotNull,
}

/// Discriminant of [`ConstraintKind`], used for ordering and signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintTag {
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
    NotNull,
}

impl fmt::Display for ConstraintTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintTag::PrimaryKey => write!(f, "PRIMARY KEY"),
            ConstraintTag::ForeignKey => write!(f, "FOREIGN KEY"),
            ConstraintTag::Unique => write!(f, "UNIQUE"),
            ConstraintTag::Check => write!(f, "CHECK"),
            ConstraintTag::NotNull => write!(f, "NOT NULL"),
        }
    }
}

/// A table constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Constraint name
    pub name: String,
    /// Participating column(s) in this table
    pub columns: Vec<String>,
    pub kind: ConstraintKind,
}

/// Name-independent identity of a constraint.
///
/// Foreign keys additionally carry their target and actions, checks their
/// whitespace-collapsed expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintSignature {
    pub tag: ConstraintTag,
    pub columns: Vec<String>,
    pub detail: String,
}

impl Constraint {
    fn with_kind(name: impl Into<String>, columns: &[&str], kind: ConstraintKind) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            kind,
        }
    }

    pub fn primary_key(name: impl Into<String>, columns: &[&str]) -> Self {
        Self::with_kind(name, columns, ConstraintKind::PrimaryKey)
    }

    pub fn unique(name: impl Into<String>, columns: &[&str]) -> Self {
        Self::with_kind(name, columns, ConstraintKind::Unique)
    }

    pub fn not_null(name: impl Into<String>, column: &str) -> Self {
        Self::with_kind(name, &[column], ConstraintKind::NotNull)
    }

    pub fn check(name: impl Into<String>, columns: &[&str], expression: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            columns,
            ConstraintKind::Check {
                expression: expression.into(),
            },
        )
    }

    pub fn foreign_key(
        name: impl Into<String>,
        columns: &[&str],
        references_table: impl Into<String>,
        references_columns: &[&str],
    ) -> Self {
        Self::with_kind(
            name,
            columns,
            ConstraintKind::ForeignKey(ForeignKey {
                references_table: references_table.into(),
                references_columns: references_columns.iter().map(|c| c.to_string()).collect(),
                on_delete: FkAction::NoAction,
                on_update: FkAction::NoAction,
            }),
        )
    }

    /// Set referential actions; no-op for non-foreign-key constraints.
    pub fn with_actions(mut self, on_delete: FkAction, on_update: FkAction) -> Self {
        if let ConstraintKind::ForeignKey(fk) = &mut self.kind {
            fk.on_delete = on_delete;
            fk.on_update = on_update;
        }
        self
    }

    pub fn tag(&self) -> ConstraintTag {
        match self.kind {
            ConstraintKind::PrimaryKey => ConstraintTag::PrimaryKey,
            ConstraintKind::ForeignKey(_) => ConstraintTag::ForeignKey,
            ConstraintKind::Unique => ConstraintTag::Unique,
            ConstraintKind::Check { .. } => ConstraintTag::Check,
            ConstraintKind::NotNull => ConstraintTag::NotNull,
        }
    }

    pub fn foreign_key_ref(&self) -> Option<&ForeignKey> {
        match &self.kind {
            ConstraintKind::ForeignKey(fk) => Some(fk),
            _ => None,
        }
    }

    pub fn uses_column(&self, casing: Casing, column: &str) -> bool {
        self.columns.iter().any(|c| casing.same(c, column))
    }

    /// Whether this is a foreign key pointing at `table` (and, if given, at `column`).
    pub fn references(&self, casing: Casing, table: &str, column: Option<&str>) -> bool {
        let Some(fk) = self.foreign_key_ref() else {
            return false;
        };
        if !casing.same(&fk.references_table, table) {
            return false;
        }
        match column {
            Some(column) => fk.references_columns.iter().any(|c| casing.same(c, column)),
            None => true,
        }
    }

    pub fn signature(&self, casing: Casing) -> ConstraintSignature {
        match &self.kind {
            ConstraintKind::ForeignKey(fk) => {
                // keep local/referenced columns paired while sorting
                let mut pairs: Vec<(String, String)> = self
                    .columns
                    .iter()
                    .zip(fk.references_columns.iter())
                    .map(|(local, remote)| (casing.key(local), casing.key(remote)))
                    .collect();
                pairs.sort();
                let (columns, remote): (Vec<String>, Vec<String>) = pairs.into_iter().unzip();
                ConstraintSignature {
                    tag: ConstraintTag::ForeignKey,
                    columns,
                    detail: format!(
                        "{}({}) ON DELETE {} ON UPDATE {}",
                        casing.key(&fk.references_table),
                        remote.join(","),
                        fk.on_delete.to_sql(),
                        fk.on_update.to_sql()
                    ),
                }
            }
            kind => {
                let mut columns: Vec<String> = self.columns.iter().map(|c| casing.key(c)).collect();
                columns.sort();
                let detail = match kind {
                    ConstraintKind::Check { expression } => {
                        expression.split_whitespace().collect::<Vec<_>>().join(" ")
                    }
                    _ => String::new(),
                };
                ConstraintSignature {
                    tag: self.tag(),
                    columns,
                    detail,
                }
            }
        }
    }
}

/// A database table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Table name
    pub name: String,
    /// Columns, in rendering order
    pub columns: Vec<Column>,
    /// Indices
    pub indexes: Vec<Index>,
    /// Constraints
    pub constraints: Vec<Constraint>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Append a column, assigning the next ordinal if it has none.
    pub fn column(mut self, mut column: Column) -> Self {
        if column.ordinal == 0 {
            column.ordinal = self.columns.len() as u32 + 1;
        }
        self.columns.push(column);
        self
    }

    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn find_column(&self, casing: Casing, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| casing.same(&c.name, name))
    }

    pub fn primary_key(&self) -> Option<&Constraint> {
        self.constraints
            .iter()
            .find(|c| c.kind == ConstraintKind::PrimaryKey)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.foreign_key_ref().is_some())
    }

    /// Check that column names stay distinct when matched under `casing`.
    pub fn check_casing(&self, casing: Casing) -> Result<(), ModelError> {
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(casing.key(&column.name)) {
                return Err(ModelError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A complete schema snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// Tables keyed by [`Casing::key`] of their name, in insertion order
    tables: IndexMap<String, Table>,
    casing: Casing,
}

impl Schema {
    /// Create a new empty, case-sensitive schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a case-sensitive schema, rejecting duplicate table or column names.
    pub fn from_tables(tables: impl IntoIterator<Item = Table>) -> Result<Self, ModelError> {
        Self::from_tables_with_casing(tables, Casing::Sensitive)
    }

    pub fn from_tables_with_casing(
        tables: impl IntoIterator<Item = Table>,
        casing: Casing,
    ) -> Result<Self, ModelError> {
        let mut map = IndexMap::new();
        for table in tables {
            table.check_casing(casing)?;
            let key = casing.key(&table.name);
            if map.contains_key(&key) {
                return Err(ModelError::DuplicateTable { table: table.name });
            }
            map.insert(key, table);
        }
        Ok(Self { tables: map, casing })
    }

    pub fn casing(&self) -> Casing {
        self.casing
    }

    /// Get a table by name.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&self.casing.key(name))
    }

    /// Iterate over all tables.
    pub fn iter_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
