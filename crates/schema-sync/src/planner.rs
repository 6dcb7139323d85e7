//! Migration planner - turns differences into ordered DDL operations.
//!
//! Planning happens in three steps:
//! 1. Expand every [`Difference`] into atomic [`Operation`]s
//! 2. Link operations with explicit dependency edges
//! 3. Order them with a Kahn topological sort whose ready set is ordered by
//!    kind priority, table, object name and id, so the result is stable
//!
//! ## Example Problem
//!
//! ```text
//! -- This fails:
//! CREATE TABLE orders (..., FOREIGN KEY (customer_id) REFERENCES customers (id));
//! CREATE TABLE customers (..., FOREIGN KEY (last_order_id) REFERENCES orders (id));
//!
//! -- This works:
//! CREATE TABLE customers (...);
//! CREATE TABLE orders (...);
//! ALTER TABLE customers ADD CONSTRAINT ... FOREIGN KEY (last_order_id) REFERENCES orders (id);
//! ALTER TABLE orders ADD CONSTRAINT ... FOREIGN KEY (customer_id) REFERENCES customers (id);
//! ```
//!
//! New tables are created without their foreign keys, which are added in a
//! second pass. Mutual references between new tables therefore never form a
//! cycle.

use crate::{Difference, PlanError, SchemaDiff};
use schema_sync_model::{Casing, Column, Constraint, ConstraintTag, Index, Table};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Stable identifier of an operation: `<kind>:<table>[.<object>]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(kind: &str, table: &str, object: Option<&str>) -> Self {
        match object {
            Some(object) => Self(format!("{}:{}.{}", kind, table, object)),
            None => Self(format!("{}:{}", kind, table)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an operation does. Column alterations carry both sides so renderers
/// and warning checks can see what changes.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    /// Create a table with its non-foreign-key constraints inline.
    CreateTable(Table),
    DropTable(Table),
    AddColumn(Column),
    DropColumn(Column),
    AlterColumnType { from: Column, to: Column },
    AlterColumnNullability { from: Column, to: Column },
    AlterColumnDefault { from: Column, to: Column },
    AddIndex(Index),
    DropIndex(Index),
    AddConstraint(Constraint),
    DropConstraint(Constraint),
}

impl OperationKind {
    /// The kind segment of an [`OperationId`].
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::CreateTable(_) => "create_table",
            OperationKind::DropTable(_) => "drop_table",
            OperationKind::AddColumn(_) => "add_column",
            OperationKind::DropColumn(_) => "drop_column",
            OperationKind::AlterColumnType { .. } => "alter_column_type",
            OperationKind::AlterColumnNullability { .. } => "alter_column_nullability",
            OperationKind::AlterColumnDefault { .. } => "alter_column_default",
            OperationKind::AddIndex(_) => "add_index",
            OperationKind::DropIndex(_) => "drop_index",
            OperationKind::AddConstraint(_) => "add_constraint",
            OperationKind::DropConstraint(_) => "drop_constraint",
        }
    }

    /// Name of the affected column, index or constraint.
    pub fn object_name(&self) -> Option<&str> {
        match self {
            OperationKind::CreateTable(_) | OperationKind::DropTable(_) => None,
            OperationKind::AddColumn(column) | OperationKind::DropColumn(column) => {
                Some(&column.name)
            }
            OperationKind::AlterColumnType { to, .. }
            | OperationKind::AlterColumnNullability { to, .. }
            | OperationKind::AlterColumnDefault { to, .. } => Some(&to.name),
            OperationKind::AddIndex(index) | OperationKind::DropIndex(index) => Some(&index.name),
            OperationKind::AddConstraint(constraint) | OperationKind::DropConstraint(constraint) => {
                Some(&constraint.name)
            }
        }
    }

    /// Scheduling priority among ready operations, lowest first.
    fn priority(&self) -> u8 {
        match self {
            OperationKind::DropConstraint(c) if c.tag() == ConstraintTag::ForeignKey => 0,
            OperationKind::DropConstraint(_) => 1,
            OperationKind::DropIndex(_) => 2,
            OperationKind::DropColumn(_) => 3,
            OperationKind::DropTable(_) => 4,
            OperationKind::CreateTable(_) => 5,
            OperationKind::AddColumn(_) => 6,
            OperationKind::AlterColumnType { .. } => 7,
            OperationKind::AlterColumnNullability { .. } => 8,
            OperationKind::AlterColumnDefault { .. } => 9,
            OperationKind::AddConstraint(c) if c.tag() != ConstraintTag::ForeignKey => 10,
            OperationKind::AddIndex(_) => 11,
            OperationKind::AddConstraint(_) => 12,
        }
    }
}

/// An atomic DDL intent with its dependencies.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub id: OperationId,
    /// Table the statement runs against
    pub table: String,
    pub kind: OperationKind,
    /// Operations that must run first, sorted
    pub depends_on: Vec<OperationId>,
}

impl Operation {
    pub fn new(table: impl Into<String>, kind: OperationKind) -> Self {
        let table = table.into();
        let id = OperationId::new(kind.name(), &table, kind.object_name());
        Self {
            id,
            table,
            kind,
            depends_on: Vec::new(),
        }
    }

    /// One-line human description, used as the comment above each statement.
    pub fn description(&self) -> String {
        let table = &self.table;
        match &self.kind {
            OperationKind::CreateTable(_) => format!("Create table {}", table),
            OperationKind::DropTable(_) => format!("Drop table {}", table),
            OperationKind::AddColumn(column) => {
                format!("Add column {}.{} ({})", table, column.name, column.data_type)
            }
            OperationKind::DropColumn(column) => format!("Drop column {}.{}", table, column.name),
            OperationKind::AlterColumnType { from, to } => format!(
                "Change type of {}.{} from {} to {}",
                table, to.name, from.data_type, to.data_type
            ),
            OperationKind::AlterColumnNullability { to, .. } => {
                if to.nullable {
                    format!("Drop NOT NULL on {}.{}", table, to.name)
                } else {
                    format!("Set {}.{} NOT NULL", table, to.name)
                }
            }
            OperationKind::AlterColumnDefault { to, .. } => match &to.default {
                Some(default) => format!("Set default of {}.{} to {}", table, to.name, default),
                None => format!("Drop default of {}.{}", table, to.name),
            },
            OperationKind::AddIndex(index) => {
                let unique = if index.unique { "unique " } else { "" };
                format!("Add {}index {} on {}", unique, index.name, table)
            }
            OperationKind::DropIndex(index) => format!("Drop index {} on {}", index.name, table),
            OperationKind::AddConstraint(c) => {
                format!("Add {} constraint {} on {}", c.tag(), c.name, table)
            }
            OperationKind::DropConstraint(c) => {
                format!("Drop {} constraint {} on {}", c.tag(), c.name, table)
            }
        }
    }

    fn sort_key(&self, casing: Casing) -> (u8, String, String, OperationId) {
        (
            self.kind.priority(),
            casing.key(&self.table),
            casing.key(self.kind.object_name().unwrap_or("")),
            self.id.clone(),
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Operations in an order that satisfies every dependency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationPlan {
    operations: Vec<Operation>,
}

impl MigrationPlan {
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    /// Position of the first operation with this id.
    pub fn position(&self, id: &OperationId) -> Option<usize> {
        self.operations.iter().position(|op| &op.id == id)
    }

    /// Check that every dependency appears before its dependent.
    pub fn verify(&self) -> bool {
        self.operations.iter().enumerate().all(|(i, op)| {
            op.depends_on
                .iter()
                .all(|dep| self.position(dep).is_some_and(|p| p < i))
        })
    }
}

impl<'a> IntoIterator for &'a MigrationPlan {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

/// Plan the ordered operations realizing `diff`.
pub fn plan(diff: &SchemaDiff) -> Result<MigrationPlan, PlanError> {
    let casing = diff.casing();
    let removed: Vec<&str> = diff
        .iter()
        .filter_map(|d| match d {
            Difference::TableRemoved(table) => Some(table.name.as_str()),
            _ => None,
        })
        .collect();

    let mut operations = Vec::new();
    for difference in diff {
        expand(difference, &removed, casing, &mut operations);
    }

    link(&mut operations, casing);
    let operations = schedule(operations, casing)?;

    tracing::debug!(
        differences = diff.len(),
        operations = operations.len(),
        "migration plan ordered"
    );

    Ok(MigrationPlan { operations })
}

/// Expand one difference into its operations.
fn expand(difference: &Difference, removed: &[&str], casing: Casing, out: &mut Vec<Operation>) {
    match difference {
        Difference::TableAdded(table) => {
            let mut created = table.clone();
            created.indexes.clear();
            created
                .constraints
                .retain(|c| c.tag() != ConstraintTag::ForeignKey);
            out.push(Operation::new(
                &table.name,
                OperationKind::CreateTable(created),
            ));
            for index in &table.indexes {
                out.push(Operation::new(
                    &table.name,
                    OperationKind::AddIndex(index.clone()),
                ));
            }
            // second pass: foreign keys once every table exists
            for fk in table.foreign_keys() {
                out.push(Operation::new(
                    &table.name,
                    OperationKind::AddConstraint(fk.clone()),
                ));
            }
        }
        Difference::TableRemoved(table) => {
            for fk in table.foreign_keys() {
                let Some(target) = fk.foreign_key_ref() else {
                    continue;
                };
                let between_removed = !casing.same(&target.references_table, &table.name)
                    && removed
                        .iter()
                        .any(|name| casing.same(name, &target.references_table));
                if between_removed {
                    out.push(Operation::new(
                        &table.name,
                        OperationKind::DropConstraint(fk.clone()),
                    ));
                }
            }
            out.push(Operation::new(
                &table.name,
                OperationKind::DropTable(table.clone()),
            ));
        }
        Difference::TableModified(_) => {}
        Difference::ColumnAdded { table, column } => {
            out.push(Operation::new(table, OperationKind::AddColumn(column.clone())));
        }
        Difference::ColumnRemoved { table, column } => {
            out.push(Operation::new(table, OperationKind::DropColumn(column.clone())));
        }
        Difference::ColumnModified {
            table,
            from,
            to,
            changes,
        } => {
            let (from, to) = (from.clone(), to.clone());
            if changes.data_type {
                out.push(Operation::new(
                    table,
                    OperationKind::AlterColumnType {
                        from: from.clone(),
                        to: to.clone(),
                    },
                ));
            }
            if changes.nullability {
                out.push(Operation::new(
                    table,
                    OperationKind::AlterColumnNullability {
                        from: from.clone(),
                        to: to.clone(),
                    },
                ));
            }
            if changes.default {
                out.push(Operation::new(
                    table,
                    OperationKind::AlterColumnDefault { from, to },
                ));
            }
        }
        Difference::IndexAdded { table, index } => {
            out.push(Operation::new(table, OperationKind::AddIndex(index.clone())));
        }
        Difference::IndexRemoved { table, index } => {
            out.push(Operation::new(table, OperationKind::DropIndex(index.clone())));
        }
        Difference::ConstraintAdded { table, constraint } => {
            out.push(Operation::new(
                table,
                OperationKind::AddConstraint(constraint.clone()),
            ));
        }
        Difference::ConstraintRemoved { table, constraint } => {
            out.push(Operation::new(
                table,
                OperationKind::DropConstraint(constraint.clone()),
            ));
        }
    }
}

/// Fill in `depends_on` for every operation.
fn link(operations: &mut [Operation], casing: Casing) {
    // names freed by a drop; a key reusing one is a replacement, not a handover
    let dropped: HashSet<String> = operations
        .iter()
        .filter(|op| {
            matches!(
                op.kind,
                OperationKind::DropIndex(_) | OperationKind::DropConstraint(_)
            )
        })
        .filter_map(|op| op.kind.object_name())
        .map(|name| casing.key(name))
        .collect();

    let edges: Vec<Vec<OperationId>> = operations
        .iter()
        .enumerate()
        .map(|(i, op)| {
            let mut deps: Vec<OperationId> = operations
                .iter()
                .enumerate()
                .filter(|(j, before)| {
                    *j != i
                        && (must_precede(before, op, casing)
                            || hands_over_key(before, op, &dropped, casing))
                })
                .map(|(_, before)| before.id.clone())
                .collect();
            deps.sort();
            deps.dedup();
            deps
        })
        .collect();

    for (op, deps) in operations.iter_mut().zip(edges) {
        op.depends_on = deps;
    }
}

/// A key moving to a new name on the same columns is added before the old one
/// is dropped, so foreign keys into it always have a key to point at.
fn hands_over_key(
    new: &Operation,
    old: &Operation,
    dropped: &HashSet<String>,
    casing: Casing,
) -> bool {
    let adds = matches!(new.kind, OperationKind::AddIndex(_) | OperationKind::AddConstraint(_));
    let drops = matches!(old.kind, OperationKind::DropIndex(_) | OperationKind::DropConstraint(_));
    if !adds || !drops || !casing.same(&new.table, &old.table) {
        return false;
    }
    let (Some((new_name, new_columns)), Some((_, old_columns))) =
        (key_columns(&new.kind), key_columns(&old.kind))
    else {
        return false;
    };
    !dropped.contains(&casing.key(new_name))
        && column_set(new_columns, casing) == column_set(old_columns, casing)
}

/// Whether `fk` is a foreign key on some table pointing at exactly `key_columns` of `table`.
fn fk_targets_key(fk: &Constraint, table: &str, key_columns: &[String], casing: Casing) -> bool {
    let Some(target) = fk.foreign_key_ref() else {
        return false;
    };
    if !casing.same(&target.references_table, table) {
        return false;
    }
    column_set(&target.references_columns, casing) == column_set(key_columns, casing)
}

fn column_set(columns: &[String], casing: Casing) -> Vec<String> {
    let mut keys: Vec<String> = columns.iter().map(|c| casing.key(c)).collect();
    keys.sort();
    keys.dedup();
    keys
}

/// The columns of a primary key, unique constraint or unique index.
fn key_columns(kind: &OperationKind) -> Option<(&str, &[String])> {
    match kind {
        OperationKind::AddConstraint(c) | OperationKind::DropConstraint(c)
            if matches!(c.tag(), ConstraintTag::PrimaryKey | ConstraintTag::Unique) =>
        {
            Some((&c.name, &c.columns))
        }
        OperationKind::AddIndex(i) | OperationKind::DropIndex(i) if i.unique => {
            Some((&i.name, &i.columns))
        }
        _ => None,
    }
}

/// Whether `a` has to run before `b`.
fn must_precede(a: &Operation, b: &Operation, casing: Casing) -> bool {
    use OperationKind::*;

    let same_table = casing.same(&a.table, &b.table);
    match (&a.kind, &b.kind) {
        // A new table exists before anything is added to it
        (CreateTable(_), AddColumn(_) | AddIndex(_) | AddConstraint(_)) if same_table => true,
        (CreateTable(_), AddConstraint(fk)) => fk.references(casing, &a.table, None),

        // Additions need their columns, foreign keys need their targets
        (AddColumn(column), AddIndex(index)) => {
            same_table && index.uses_column(casing, &column.name)
        }
        (AddColumn(column), AddConstraint(c)) => {
            (same_table && c.uses_column(casing, &column.name))
                || c.references(casing, &a.table, Some(&column.name))
        }
        (AlterColumnType { to, .. }, AddConstraint(fk)) if fk.tag() == ConstraintTag::ForeignKey => {
            (same_table && fk.uses_column(casing, &to.name))
                || fk.references(casing, &a.table, Some(&to.name))
        }
        (AddConstraint(key), AddConstraint(fk)) => {
            matches!(key.tag(), ConstraintTag::PrimaryKey | ConstraintTag::Unique)
                && fk_targets_key(fk, &a.table, &key.columns, casing)
        }
        (AddIndex(index), AddConstraint(fk)) => {
            index.unique && fk_targets_key(fk, &a.table, &index.columns, casing)
        }

        // Drops clear the way for column drops and type changes
        (DropIndex(index), DropColumn(column)) => {
            same_table && index.uses_column(casing, &column.name)
        }
        (DropIndex(index), AlterColumnType { to, .. }) => {
            same_table && index.uses_column(casing, &to.name)
        }
        (DropConstraint(c), DropColumn(column)) => {
            (same_table && c.uses_column(casing, &column.name))
                || c.references(casing, &b.table, Some(&column.name))
        }
        (DropConstraint(c), AlterColumnType { to, .. }) => {
            (same_table && c.uses_column(casing, &to.name))
                || c.references(casing, &b.table, Some(&to.name))
        }
        (DropConstraint(c), DropTable(_)) => same_table || c.references(casing, &b.table, None),
        (DropIndex(_), DropTable(_)) => same_table,

        // A dropped table's foreign keys go with it, before their targets change
        (DropTable(removed), DropColumn(column)) => removed
            .foreign_keys()
            .any(|fk| fk.references(casing, &b.table, Some(&column.name))),
        (DropTable(removed), AlterColumnType { to, .. }) => removed
            .foreign_keys()
            .any(|fk| fk.references(casing, &b.table, Some(&to.name))),
        (DropTable(removed), DropConstraint(key)) => {
            matches!(key.tag(), ConstraintTag::PrimaryKey | ConstraintTag::Unique)
                && removed
                    .foreign_keys()
                    .any(|fk| fk.references(casing, &b.table, None))
        }
        (DropTable(removed), DropIndex(index)) => {
            index.unique
                && removed
                    .foreign_keys()
                    .any(|fk| fk.references(casing, &b.table, None))
        }

        (DropConstraint(fk), DropConstraint(key)) => {
            matches!(key.tag(), ConstraintTag::PrimaryKey | ConstraintTag::Unique)
                && fk.references(casing, &b.table, None)
        }
        (DropConstraint(fk), DropIndex(index)) => {
            index.unique && fk.references(casing, &b.table, None)
        }

        // Replacing an object under the same name
        (DropIndex(old), AddIndex(new)) => casing.same(&old.name, &new.name),
        (DropConstraint(old), AddConstraint(new)) => {
            same_table && casing.same(&old.name, &new.name)
        }

        _ => false,
    }
}

/// Kahn topological sort over `depends_on`, ready set ordered by priority.
fn schedule(operations: Vec<Operation>, casing: Casing) -> Result<Vec<Operation>, PlanError> {
    let mut by_id: HashMap<&OperationId, Vec<usize>> = HashMap::new();
    for (i, op) in operations.iter().enumerate() {
        by_id.entry(&op.id).or_default().push(i);
    }

    let mut in_degree = vec![0usize; operations.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); operations.len()];
    for (i, op) in operations.iter().enumerate() {
        for dep in &op.depends_on {
            // dependencies on operations outside this set are already satisfied
            let Some(sources) = by_id.get(dep) else {
                continue;
            };
            for &j in sources {
                if j != i {
                    dependents[j].push(i);
                    in_degree[i] += 1;
                }
            }
        }
    }

    let keys: Vec<_> = operations.iter().map(|op| op.sort_key(casing)).collect();
    let mut ready: BTreeSet<(&(u8, String, String, OperationId), usize)> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(i, _)| (&keys[i], i))
        .collect();

    let mut order = Vec::with_capacity(operations.len());
    while let Some((_, i)) = ready.pop_first() {
        order.push(i);
        for &next in &dependents[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert((&keys[next], next));
            }
        }
    }

    if order.len() < operations.len() {
        let mut stuck: Vec<&Operation> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree > 0)
            .map(|(i, _)| &operations[i])
            .collect();
        stuck.sort_by_key(|op| op.sort_key(casing));
        return Err(PlanError::CyclicDependency {
            operations: stuck.into_iter().map(|op| op.id.clone()).collect(),
        });
    }

    let mut slots: Vec<Option<Operation>> = operations.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}
