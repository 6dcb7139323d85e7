//! Schema diffing - compare two schema snapshots.
//!
//! [`diff`] compares a source snapshot against a target snapshot and produces
//! the flat, ordered list of [`Difference`]s needed to turn the source into the
//! target.
//!
//! Matching rules:
//! - tables and columns match by name (under the options' [`Casing`]),
//! - indexes match by canonical signature (sorted columns + uniqueness),
//! - constraints match by kind + canonical column signature.
//!
//! Renames are never guessed: a renamed column shows up as a removal plus an
//! addition.
//!
//! ## Ordering
//!
//! Output is sorted by table name, then difference kind, then object name, so
//! identical snapshots always produce byte-identical reports regardless of the
//! order the introspector returned objects in.

use crate::{CompareOptions, ConfigError, DiffOptions, Outcome};
use indexmap::IndexMap;
use schema_sync_model::{
    Casing, Column, Constraint, ConstraintSignature, Index, IndexSignature, ModelError, Schema,
    Table,
};
use std::collections::HashSet;
use std::fmt;

/// The ordered differences between two schemas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    differences: Vec<Difference>,
    casing: Casing,
}

impl SchemaDiff {
    /// Name casing the differences were matched under.
    pub fn casing(&self) -> Casing {
        self.casing
    }

    /// Returns true if there are no differences.
    pub fn is_empty(&self) -> bool {
        self.differences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.differences.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Difference> {
        self.differences.iter()
    }

    pub fn differences(&self) -> &[Difference] {
        &self.differences
    }

    /// Count changes, not counting [`Difference::TableModified`] headers.
    pub fn change_count(&self) -> usize {
        self.differences
            .iter()
            .filter(|d| !matches!(d, Difference::TableModified(_)))
            .count()
    }

    /// Differences touching one table.
    pub fn for_table<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Difference> {
        self.differences.iter().filter(move |d| d.table() == table)
    }

    pub fn outcome(&self) -> Outcome {
        if self.is_empty() {
            Outcome::NoDifferences
        } else {
            Outcome::DifferencesFound
        }
    }
}

impl<'a> IntoIterator for &'a SchemaDiff {
    type Item = &'a Difference;
    type IntoIter = std::slice::Iter<'a, Difference>;

    fn into_iter(self) -> Self::IntoIter {
        self.differences.iter()
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No differences.");
        }
        writeln!(f, "Differences found:\n")?;
        for difference in &self.differences {
            if difference.is_table_level() {
                writeln!(f, "{}", difference)?;
            } else {
                writeln!(f, "    {}", difference)?;
            }
        }
        Ok(())
    }
}

/// Per-category counts for a table present on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub table: String,
    pub columns: usize,
    pub indexes: usize,
    pub constraints: usize,
}

/// Which aspects of a column changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnChanges {
    pub data_type: bool,
    pub nullability: bool,
    pub default: bool,
}

impl ColumnChanges {
    pub fn any(&self) -> bool {
        self.data_type || self.nullability || self.default
    }
}

/// A single structural discrepancy.
///
/// Every variant owns the objects it talks about, so it outlives the snapshots
/// it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub enum Difference {
    /// A table only the target has.
    TableAdded(Table),
    /// A table only the source has.
    TableRemoved(Table),
    /// Header for a table present on both sides with nested differences.
    TableModified(TableSummary),
    ColumnAdded {
        table: String,
        column: Column,
    },
    ColumnRemoved {
        table: String,
        column: Column,
    },
    ColumnModified {
        table: String,
        from: Column,
        to: Column,
        changes: ColumnChanges,
    },
    IndexAdded {
        table: String,
        index: Index,
    },
    IndexRemoved {
        table: String,
        index: Index,
    },
    ConstraintAdded {
        table: String,
        constraint: Constraint,
    },
    ConstraintRemoved {
        table: String,
        constraint: Constraint,
    },
}

/// Variant rank, in the order differences are reported within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DifferenceKind {
    TableAdded,
    TableRemoved,
    TableModified,
    ColumnAdded,
    ColumnRemoved,
    ColumnModified,
    IndexAdded,
    IndexRemoved,
    ConstraintAdded,
    ConstraintRemoved,
}

impl Difference {
    pub fn kind(&self) -> DifferenceKind {
        match self {
            Difference::TableAdded(_) => DifferenceKind::TableAdded,
            Difference::TableRemoved(_) => DifferenceKind::TableRemoved,
            Difference::TableModified(_) => DifferenceKind::TableModified,
            Difference::ColumnAdded { .. } => DifferenceKind::ColumnAdded,
            Difference::ColumnRemoved { .. } => DifferenceKind::ColumnRemoved,
            Difference::ColumnModified { .. } => DifferenceKind::ColumnModified,
            Difference::IndexAdded { .. } => DifferenceKind::IndexAdded,
            Difference::IndexRemoved { .. } => DifferenceKind::IndexRemoved,
            Difference::ConstraintAdded { .. } => DifferenceKind::ConstraintAdded,
            Difference::ConstraintRemoved { .. } => DifferenceKind::ConstraintRemoved,
        }
    }

    /// The table this difference belongs to.
    pub fn table(&self) -> &str {
        match self {
            Difference::TableAdded(t) | Difference::TableRemoved(t) => &t.name,
            Difference::TableModified(summary) => &summary.table,
            Difference::ColumnAdded { table, .. }
            | Difference::ColumnRemoved { table, .. }
            | Difference::ColumnModified { table, .. }
            | Difference::IndexAdded { table, .. }
            | Difference::IndexRemoved { table, .. }
            | Difference::ConstraintAdded { table, .. }
            | Difference::ConstraintRemoved { table, .. } => table,
        }
    }

    /// The name of the affected object (the table itself for table-level entries).
    pub fn object_name(&self) -> &str {
        match self {
            Difference::TableAdded(_)
            | Difference::TableRemoved(_)
            | Difference::TableModified(_) => self.table(),
            Difference::ColumnAdded { column, .. } | Difference::ColumnRemoved { column, .. } => {
                &column.name
            }
            Difference::ColumnModified { to, .. } => &to.name,
            Difference::IndexAdded { index, .. } | Difference::IndexRemoved { index, .. } => {
                &index.name
            }
            Difference::ConstraintAdded { constraint, .. }
            | Difference::ConstraintRemoved { constraint, .. } => &constraint.name,
        }
    }

    /// Whether this is a table-level entry (rendered without indentation).
    pub fn is_table_level(&self) -> bool {
        matches!(
            self,
            Difference::TableAdded(_) | Difference::TableRemoved(_) | Difference::TableModified(_)
        )
    }

    fn sort_key(&self, casing: Casing) -> (String, DifferenceKind, String) {
        (
            casing.key(self.table()),
            self.kind(),
            casing.key(self.object_name()),
        )
    }
}

fn describe_column(column: &Column) -> String {
    let nullable = if column.nullable { " (nullable)" } else { "" };
    let default = column
        .default
        .as_ref()
        .map(|d| format!(" default {}", d))
        .unwrap_or_default();
    format!("{}: {}{}{}", column.name, column.data_type, nullable, default)
}

pub(crate) fn describe_constraint(constraint: &Constraint) -> String {
    let columns = constraint.columns.join(", ");
    match &constraint.kind {
        schema_sync_model::ConstraintKind::ForeignKey(fk) => format!(
            "FOREIGN KEY ({}) -> {}({})",
            columns,
            fk.references_table,
            fk.references_columns.join(", ")
        ),
        schema_sync_model::ConstraintKind::Check { expression } => {
            format!("CHECK ({})", expression)
        }
        _ => format!("{} ({})", constraint.tag(), columns),
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difference::TableAdded(t) => write!(f, "+ table {}", t.name),
            Difference::TableRemoved(t) => write!(f, "- table {}", t.name),
            Difference::TableModified(summary) => write!(f, "~ table {}", summary.table),
            Difference::ColumnAdded { column, .. } => {
                write!(f, "+ column {}", describe_column(column))
            }
            Difference::ColumnRemoved { column, .. } => write!(f, "- column {}", column.name),
            Difference::ColumnModified {
                from, to, changes, ..
            } => {
                let mut parts = Vec::new();
                if changes.data_type {
                    parts.push(format!("{} -> {}", from.data_type, to.data_type));
                }
                if changes.nullability {
                    let nullness = |nullable: bool| if nullable { "nullable" } else { "not null" };
                    parts.push(format!(
                        "{} -> {}",
                        nullness(from.nullable),
                        nullness(to.nullable)
                    ));
                }
                if changes.default {
                    let shown = |d: &Option<schema_sync_model::ColumnDefault>| {
                        d.as_ref()
                            .map(|d| d.raw().to_string())
                            .unwrap_or_else(|| "(none)".to_string())
                    };
                    parts.push(format!("default {} -> {}", shown(&from.default), shown(&to.default)));
                }
                write!(f, "~ column {}: {}", to.name, parts.join(", "))
            }
            Difference::IndexAdded { index, .. } => {
                let unique = if index.unique { "unique " } else { "" };
                write!(
                    f,
                    "+ {}index {} ({})",
                    unique,
                    index.name,
                    index.columns.join(", ")
                )
            }
            Difference::IndexRemoved { index, .. } => write!(f, "- index {}", index.name),
            Difference::ConstraintAdded { constraint, .. } => write!(
                f,
                "+ constraint {}: {}",
                constraint.name,
                describe_constraint(constraint)
            ),
            Difference::ConstraintRemoved { constraint, .. } => {
                write!(f, "- constraint {}", constraint.name)
            }
        }
    }
}

/// Like [`diff`], but first rejects snapshots whose table or column names
/// collide under the options' casing, such as `Users` and `users` in a
/// case-sensitive snapshot compared case-insensitively.
pub fn try_diff(
    source: &Schema,
    target: &Schema,
    options: &DiffOptions,
) -> Result<SchemaDiff, ConfigError> {
    let casing = options.casing();
    for schema in [source, target] {
        let mut seen = HashSet::new();
        for table in schema.iter_tables().filter(|t| !options.is_ignored(&t.name)) {
            if !seen.insert(casing.key(&table.name)) {
                return Err(ConfigError::AmbiguousNames(ModelError::DuplicateTable {
                    table: table.name.clone(),
                }));
            }
            table
                .check_casing(casing)
                .map_err(ConfigError::AmbiguousNames)?;
        }
    }
    Ok(diff(source, target, options))
}

/// Compare `source` against `target`.
///
/// Returns the differences that transform `source` into `target`. Tables in the
/// options' ignore list are dropped before anything is compared, and disabled
/// categories are never computed.
///
/// # Example
///
/// ```ignore
/// let diff = schema_sync::diff(&staging, &production, &DiffOptions::default());
/// for difference in &diff {
///     println!("{}", difference);
/// }
/// ```
///
/// Both schemas are assumed to keep their table and column names distinct
/// under the options' casing; [`try_diff`] checks that first.
pub fn diff(source: &Schema, target: &Schema, options: &DiffOptions) -> SchemaDiff {
    let casing = options.casing();
    let compare = options.compare();

    let index_tables = |schema: &Schema| -> IndexMap<String, &Table> {
        let mut tables = IndexMap::new();
        for table in schema.iter_tables().filter(|t| !options.is_ignored(&t.name)) {
            if let Some(first) = tables.insert(casing.key(&table.name), table) {
                tracing::warn!(first = %first.name, second = %table.name, "table names collide");
            }
        }
        tables
    };
    let source_tables = index_tables(source);
    let target_tables = index_tables(target);

    let mut differences = Vec::new();

    // Tables only in target
    for (key, table) in &target_tables {
        if !source_tables.contains_key(key) {
            differences.push(Difference::TableAdded(strip_disabled(table, compare)));
        }
    }

    // Tables only in source
    for (key, table) in &source_tables {
        if !target_tables.contains_key(key) {
            differences.push(Difference::TableRemoved(strip_disabled(table, compare)));
        }
    }

    // Tables in both - diff columns, indexes and constraints
    for (key, source_table) in &source_tables {
        let Some(target_table) = target_tables.get(key) else {
            continue;
        };
        let nested = diff_table(source_table, target_table, options);
        if nested.is_empty() {
            continue;
        }
        let count = |pred: fn(&Difference) -> bool| nested.iter().filter(|d| pred(d)).count();
        differences.push(Difference::TableModified(TableSummary {
            table: source_table.name.clone(),
            columns: count(|d| {
                matches!(
                    d,
                    Difference::ColumnAdded { .. }
                        | Difference::ColumnRemoved { .. }
                        | Difference::ColumnModified { .. }
                )
            }),
            indexes: count(|d| {
                matches!(
                    d,
                    Difference::IndexAdded { .. } | Difference::IndexRemoved { .. }
                )
            }),
            constraints: count(|d| {
                matches!(
                    d,
                    Difference::ConstraintAdded { .. } | Difference::ConstraintRemoved { .. }
                )
            }),
        }));
        differences.extend(nested);
    }

    differences.sort_by_cached_key(|d| d.sort_key(casing));

    tracing::debug!(
        source_tables = source_tables.len(),
        target_tables = target_tables.len(),
        differences = differences.len(),
        "schema diff computed"
    );

    SchemaDiff {
        differences,
        casing,
    }
}

/// Drop categories the options disabled from a whole-table payload.
fn strip_disabled(table: &Table, compare: CompareOptions) -> Table {
    let mut table = table.clone();
    if !compare.check_indexes {
        table.indexes.clear();
    }
    if !compare.check_constraints {
        table.constraints.clear();
    }
    table
}

/// Diff two tables with the same name.
fn diff_table(source: &Table, target: &Table, options: &DiffOptions) -> Vec<Difference> {
    let compare = options.compare();
    let casing = options.casing();
    let mut differences = diff_columns(source, target, options);

    if compare.check_indexes {
        differences.extend(diff_indexes(source, target, casing));
    }

    if compare.check_constraints {
        differences.extend(diff_constraints(source, target, casing));
    }

    differences
}

/// Diff columns between source and target state.
fn diff_columns(source: &Table, target: &Table, options: &DiffOptions) -> Vec<Difference> {
    let casing = options.casing();
    let mut differences = Vec::new();

    // Columns to add
    for column in &target.columns {
        if source.find_column(casing, &column.name).is_none() {
            differences.push(Difference::ColumnAdded {
                table: source.name.clone(),
                column: column.clone(),
            });
        }
    }

    // Columns to drop
    for column in &source.columns {
        if target.find_column(casing, &column.name).is_none() {
            differences.push(Difference::ColumnRemoved {
                table: source.name.clone(),
                column: column.clone(),
            });
        }
    }

    // Columns in both - check for changes
    for from in &source.columns {
        let Some(to) = target.find_column(casing, &from.name) else {
            continue;
        };
        let changes = ColumnChanges {
            data_type: from.data_type != to.data_type,
            nullability: from.nullable != to.nullable,
            default: options.compare().check_defaults && from.default != to.default,
        };
        if changes.any() {
            differences.push(Difference::ColumnModified {
                table: source.name.clone(),
                from: from.clone(),
                to: to.clone(),
                changes,
            });
        }
    }

    differences
}

/// Diff indexes by signature (not name, since names may differ).
fn diff_indexes(source: &Table, target: &Table, casing: Casing) -> Vec<Difference> {
    let source_keys: HashSet<IndexSignature> =
        source.indexes.iter().map(|i| i.signature(casing)).collect();
    let target_keys: HashSet<IndexSignature> =
        target.indexes.iter().map(|i| i.signature(casing)).collect();

    let added = target
        .indexes
        .iter()
        .filter(|i| !source_keys.contains(&i.signature(casing)))
        .map(|index| Difference::IndexAdded {
            table: source.name.clone(),
            index: index.clone(),
        });

    let removed = source
        .indexes
        .iter()
        .filter(|i| !target_keys.contains(&i.signature(casing)))
        .map(|index| Difference::IndexRemoved {
            table: source.name.clone(),
            index: index.clone(),
        });

    added.chain(removed).collect()
}

/// Diff constraints by kind + canonical column signature.
fn diff_constraints(source: &Table, target: &Table, casing: Casing) -> Vec<Difference> {
    let source_keys: HashSet<ConstraintSignature> =
        source.constraints.iter().map(|c| c.signature(casing)).collect();
    let target_keys: HashSet<ConstraintSignature> =
        target.constraints.iter().map(|c| c.signature(casing)).collect();

    let added = target
        .constraints
        .iter()
        .filter(|c| !source_keys.contains(&c.signature(casing)))
        .map(|constraint| Difference::ConstraintAdded {
            table: source.name.clone(),
            constraint: constraint.clone(),
        });

    let removed = source
        .constraints
        .iter()
        .filter(|c| !target_keys.contains(&c.signature(casing)))
        .map(|constraint| Difference::ConstraintRemoved {
            table: source.name.clone(),
            constraint: constraint.clone(),
        });

    added.chain(removed).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_sync_model::LogicalType;

    fn users() -> Table {
        Table::new("users")
            .column(Column::new("id", LogicalType::Integer).not_null())
            .column(Column::new("email", LogicalType::Text).not_null())
            .constraint(Constraint::primary_key("users_pkey", &["id"]))
    }

    fn schema(tables: Vec<Table>) -> Schema {
        Schema::from_tables(tables).unwrap()
    }

    fn options() -> DiffOptions {
        DiffOptions::default()
    }

    #[test]
    fn test_diff_empty_schemas() {
        let diff = diff(&Schema::new(), &Schema::new(), &options());
        assert!(diff.is_empty());
    }

    #[test]
    fn test_diff_add_table() {
        let diff = diff(&Schema::new(), &schema(vec![users()]), &options());
        assert_eq!(diff.len(), 1);
        assert!(matches!(&diff.differences()[0], Difference::TableAdded(t) if t.name == "users"));
    }

    #[test]
    fn test_diff_drop_table() {
        let diff = diff(&schema(vec![users()]), &Schema::new(), &options());
        assert_eq!(diff.len(), 1);
        assert!(matches!(&diff.differences()[0], Difference::TableRemoved(t) if t.name == "users"));
    }

    #[test]
    fn test_diff_add_column_emits_header_first() {
        let target = users().column(Column::new("bio", LogicalType::Text));
        let diff = diff(&schema(vec![users()]), &schema(vec![target]), &options());

        assert_eq!(diff.len(), 2);
        assert_eq!(diff.change_count(), 1);
        assert!(matches!(
            &diff.differences()[0],
            Difference::TableModified(TableSummary { table, columns: 1, indexes: 0, constraints: 0 })
                if table == "users"
        ));
        assert!(matches!(
            &diff.differences()[1],
            Difference::ColumnAdded { column, .. } if column.name == "bio"
        ));
    }

    #[test]
    fn test_diff_drop_column() {
        let source = users().column(Column::new("bio", LogicalType::Text));
        let diff = diff(&schema(vec![source]), &schema(vec![users()]), &options());
        assert!(diff.iter().any(|d| matches!(
            d,
            Difference::ColumnRemoved { column, .. } if column.name == "bio"
        )));
    }

    #[test]
    fn test_diff_alter_column_type_and_nullability() {
        let target = Table::new("users")
            .column(Column::new("id", LogicalType::BigInt).not_null())
            .column(Column::new("email", LogicalType::Text))
            .constraint(Constraint::primary_key("users_pkey", &["id"]));
        let diff = diff(&schema(vec![users()]), &schema(vec![target]), &options());

        let modified: Vec<_> = diff
            .iter()
            .filter_map(|d| match d {
                Difference::ColumnModified { to, changes, .. } => Some((to.name.as_str(), *changes)),
                _ => None,
            })
            .collect();
        assert_eq!(
            modified,
            vec![
                (
                    "email",
                    ColumnChanges {
                        data_type: false,
                        nullability: true,
                        default: false
                    }
                ),
                (
                    "id",
                    ColumnChanges {
                        data_type: true,
                        nullability: false,
                        default: false
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_diff_default_uses_equivalence_class() {
        let source = Table::new("events").column(
            Column::new("created_at", LogicalType::Timestamp).with_default("now()"),
        );
        let target = Table::new("events").column(
            Column::new("created_at", LogicalType::Timestamp).with_default("CURRENT_TIMESTAMP"),
        );
        let diff = diff(&schema(vec![source]), &schema(vec![target]), &options());
        assert!(diff.is_empty());
    }

    #[test]
    fn test_diff_defaults_can_be_disabled() {
        let source =
            Table::new("events").column(Column::new("status", LogicalType::Text).with_default("'new'"));
        let target =
            Table::new("events").column(Column::new("status", LogicalType::Text).with_default("'open'"));

        let with_defaults = diff(&schema(vec![source.clone()]), &schema(vec![target.clone()]), &options());
        assert_eq!(with_defaults.change_count(), 1);

        let opts = DiffOptions::new(
            Vec::<String>::new(),
            CompareOptions {
                check_defaults: false,
                ..CompareOptions::default()
            },
            Casing::Sensitive,
        )
        .unwrap();
        assert!(diff(&schema(vec![source]), &schema(vec![target]), &opts).is_empty());
    }

    #[test]
    fn test_diff_index_matches_by_signature_not_name() {
        let source = users().index(Index::new("idx_email", &["email"]));
        let target = users().index(Index::new("users_email_idx", &["email"]));
        let diff = diff(&schema(vec![source]), &schema(vec![target]), &options());
        assert!(diff.is_empty());
    }

    #[test]
    fn test_diff_uniqueness_change_is_remove_plus_add() {
        let source = users().index(Index::new("idx_email", &["email"]));
        let target = users().index(Index::unique("idx_email", &["email"]));
        let diff = diff(&schema(vec![source]), &schema(vec![target]), &options());
        let kinds: Vec<_> = diff.iter().map(|d| d.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                DifferenceKind::TableModified,
                DifferenceKind::IndexAdded,
                DifferenceKind::IndexRemoved
            ]
        );
    }

    #[test]
    fn test_diff_constraint_matches_by_signature_not_name() {
        let source = users().constraint(Constraint::unique("uq_email", &["email"]));
        let target = users().constraint(Constraint::unique("users_email_key", &["email"]));
        let diff = diff(&schema(vec![source]), &schema(vec![target]), &options());
        assert!(diff.is_empty());
    }

    #[test]
    fn test_diff_column_rename_is_not_detected() {
        let target = Table::new("users")
            .column(Column::new("id", LogicalType::Integer).not_null())
            .column(Column::new("email_address", LogicalType::Text).not_null())
            .constraint(Constraint::primary_key("users_pkey", &["id"]));
        let diff = diff(&schema(vec![users()]), &schema(vec![target]), &options());
        let kinds: Vec<_> = diff.iter().map(|d| (d.kind(), d.object_name())).collect();
        assert_eq!(
            kinds,
            vec![
                (DifferenceKind::TableModified, "users"),
                (DifferenceKind::ColumnAdded, "email_address"),
                (DifferenceKind::ColumnRemoved, "email"),
            ]
        );
    }

    #[test]
    fn test_diff_case_insensitive_matching() {
        let source = Schema::from_tables_with_casing(
            vec![Table::new("Users").column(Column::new("ID", LogicalType::Integer))],
            Casing::Insensitive,
        )
        .unwrap();
        let target = Schema::from_tables_with_casing(
            vec![Table::new("users").column(Column::new("id", LogicalType::Integer))],
            Casing::Insensitive,
        )
        .unwrap();
        let opts =
            DiffOptions::new(Vec::<String>::new(), CompareOptions::default(), Casing::Insensitive)
                .unwrap();
        assert!(diff(&source, &target, &opts).is_empty());
        assert_eq!(diff(&source, &target, &options()).change_count(), 2);
    }

    #[test]
    fn test_diff_sorted_by_table_then_kind() {
        let target = schema(vec![
            Table::new("zebra"),
            users().column(Column::new("bio", LogicalType::Text)),
            Table::new("alpha"),
        ]);
        let diff = diff(&schema(vec![users()]), &target, &options());
        let order: Vec<_> = diff.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            order,
            vec![
                "+ table alpha",
                "~ table users",
                "+ column bio: TEXT (nullable)",
                "+ table zebra",
            ]
        );
    }

    #[test]
    fn test_display_column_modified() {
        let target = Table::new("users")
            .column(Column::new("id", LogicalType::Integer).not_null())
            .column(
                Column::new("email", LogicalType::Varchar(Some(255)))
                    .with_default("''"),
            )
            .constraint(Constraint::primary_key("users_pkey", &["id"]));
        let diff = diff(&schema(vec![users()]), &schema(vec![target]), &options());
        assert_eq!(
            diff.differences()[1].to_string(),
            "~ column email: TEXT -> VARCHAR(255), not null -> nullable, default (none) -> ''"
        );
    }

    #[test]
    fn test_try_diff_rejects_names_that_fold_together() {
        let folded = |ignore: &[&str]| {
            DiffOptions::new(
                ignore.iter().map(|t| t.to_string()),
                CompareOptions::default(),
                Casing::Insensitive,
            )
            .unwrap()
        };
        let source = schema(vec![Table::new("Users"), users()]);
        let target = schema(vec![users()]);

        assert_eq!(
            try_diff(&source, &target, &folded(&[])).unwrap_err(),
            ConfigError::AmbiguousNames(ModelError::DuplicateTable {
                table: "users".to_string()
            })
        );
        assert!(try_diff(&source, &target, &options()).is_ok());
        assert!(try_diff(&source, &target, &folded(&["users"])).unwrap().is_empty());

        let shouty = users().column(Column::new("EMAIL", LogicalType::Text));
        assert!(matches!(
            try_diff(&schema(vec![users()]), &schema(vec![shouty]), &folded(&[])),
            Err(ConfigError::AmbiguousNames(ModelError::DuplicateColumn { column, .. }))
                if column == "EMAIL"
        ));
    }
}
