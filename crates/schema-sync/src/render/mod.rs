//! Migration serializer - SQL scripts, diff reports and plan listings.
//!
//! Rendering is all-or-nothing: if any operation cannot be expressed in the
//! chosen dialect, no partial script is returned.

mod dialect;
mod warnings;

pub use dialect::{Dialect, DialectSpec, MYSQL, POSTGRES, SQLITE, StatementKind, TypeKey, fill};
pub use warnings::{MigrationWarning, WarningKind, is_narrowing, warnings};

use crate::{MigrationPlan, Operation, OperationKind, RenderError, SchemaDiff};
use schema_sync_model::{Column, Constraint, ConstraintKind, ConstraintTag, FkAction, LogicalType};

/// Render operations as one SQL script.
///
/// Each operation becomes a `-- description` comment, any `-- WARNING:` lines,
/// and exactly one statement, in the given order.
pub fn render(operations: &[Operation], dialect: Dialect) -> Result<String, RenderError> {
    let spec = dialect.spec();
    let mut sql = String::new();
    sql.push_str("-- Auto-generated migration script\n");
    sql.push_str(&format!("-- Generated by schema-sync for {}\n", spec.name));

    if operations.is_empty() {
        sql.push_str("\n-- No changes.\n");
        return Ok(sql);
    }

    for operation in operations {
        let statement = render_statement(operation, spec)?;
        sql.push('\n');
        sql.push_str(&format!("-- {}\n", operation.description()));
        for warning in warnings(operation) {
            sql.push_str(&format!("-- WARNING: {}\n", warning));
        }
        sql.push_str(&statement);
        sql.push('\n');
    }

    tracing::debug!(
        operations = operations.len(),
        dialect = spec.name,
        "rendered migration script"
    );

    Ok(sql)
}

/// Human-readable `+`/`-`/`~` report of a diff.
pub fn render_report(diff: &SchemaDiff) -> String {
    diff.to_string()
}

/// Numbered listing of a plan with each operation's dependencies.
pub fn render_plan(plan: &MigrationPlan) -> String {
    if plan.is_empty() {
        return "No operations.\n".to_string();
    }
    let mut out = String::new();
    for (i, operation) in plan.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, operation.id));
        if !operation.depends_on.is_empty() {
            let deps: Vec<&str> = operation.depends_on.iter().map(|d| d.as_str()).collect();
            out.push_str(&format!("   after: {}\n", deps.join(", ")));
        }
    }
    out
}

/// Render the single statement for an operation.
pub fn render_statement(operation: &Operation, spec: &DialectSpec) -> Result<String, RenderError> {
    let template = |kind: StatementKind| {
        spec.statement(kind)
            .ok_or_else(|| RenderError::UnsupportedOperation {
                operation: operation.id.clone(),
                dialect: spec.name,
            })
    };
    let table = spec.quote(&operation.table);

    let sql = match &operation.kind {
        OperationKind::CreateTable(created) => {
            let template = template(StatementKind::CreateTable)?;
            let body = create_table_body(operation, &created.columns, &created.constraints, spec)?;
            fill(template, &[("table", table.as_str()), ("body", body.as_str())])
        }
        OperationKind::DropTable(_) => {
            fill(template(StatementKind::DropTable)?, &[("table", table.as_str())])
        }
        OperationKind::AddColumn(column) => {
            let template = template(StatementKind::AddColumn)?;
            let definition = column_definition(operation, column, spec)?;
            fill(template, &[("table", table.as_str()), ("definition", definition.as_str())])
        }
        OperationKind::DropColumn(column) => fill(
            template(StatementKind::DropColumn)?,
            &[("table", table.as_str()), ("column", spec.quote(&column.name).as_str())],
        ),
        OperationKind::AlterColumnType { to, .. } => {
            let template = template(StatementKind::AlterColumnType)?;
            let ty = type_name(operation, &to.data_type, spec)?;
            let definition = column_definition(operation, to, spec)?;
            fill(
                template,
                &[
                    ("table", table.as_str()),
                    ("column", spec.quote(&to.name).as_str()),
                    ("type", ty.as_str()),
                    ("definition", definition.as_str()),
                ],
            )
        }
        OperationKind::AlterColumnNullability { to, .. } => {
            let kind = if to.nullable {
                StatementKind::DropNotNull
            } else {
                StatementKind::SetNotNull
            };
            let template = template(kind)?;
            let definition = column_definition(operation, to, spec)?;
            fill(
                template,
                &[
                    ("table", table.as_str()),
                    ("column", spec.quote(&to.name).as_str()),
                    ("definition", definition.as_str()),
                ],
            )
        }
        OperationKind::AlterColumnDefault { to, .. } => {
            let column = spec.quote(&to.name);
            match &to.default {
                Some(default) => fill(
                    template(StatementKind::SetDefault)?,
                    &[
                        ("table", table.as_str()),
                        ("column", column.as_str()),
                        ("default", default.raw()),
                    ],
                ),
                None => fill(
                    template(StatementKind::DropDefault)?,
                    &[("table", table.as_str()), ("column", column.as_str())],
                ),
            }
        }
        OperationKind::AddIndex(index) => {
            let kind = if index.unique {
                StatementKind::AddUniqueIndex
            } else {
                StatementKind::AddIndex
            };
            fill(
                template(kind)?,
                &[
                    ("table", table.as_str()),
                    ("name", spec.quote(&index.name).as_str()),
                    ("columns", quote_list(&index.columns, spec).as_str()),
                ],
            )
        }
        OperationKind::DropIndex(index) => fill(
            template(StatementKind::DropIndex)?,
            &[("table", table.as_str()), ("name", spec.quote(&index.name).as_str())],
        ),
        OperationKind::AddConstraint(constraint) => {
            if constraint.tag() == ConstraintTag::NotNull {
                let template = template(StatementKind::AddNotNullConstraint)?;
                let column = not_null_column(operation, constraint, spec)?;
                fill(template, &[("table", table.as_str()), ("column", column.as_str())])
            } else {
                fill(
                    template(StatementKind::AddConstraint)?,
                    &[
                        ("table", table.as_str()),
                        ("name", spec.quote(&constraint.name).as_str()),
                        ("body", constraint_body(constraint, spec).as_str()),
                    ],
                )
            }
        }
        OperationKind::DropConstraint(constraint) => {
            let kind = match constraint.tag() {
                ConstraintTag::ForeignKey => StatementKind::DropForeignKey,
                ConstraintTag::PrimaryKey => StatementKind::DropPrimaryKey,
                ConstraintTag::NotNull => StatementKind::DropNotNullConstraint,
                ConstraintTag::Unique | ConstraintTag::Check => StatementKind::DropConstraint,
            };
            let template = template(kind)?;
            let column = if kind == StatementKind::DropNotNullConstraint {
                not_null_column(operation, constraint, spec)?
            } else {
                String::new()
            };
            fill(
                template,
                &[
                    ("table", table.as_str()),
                    ("name", spec.quote(&constraint.name).as_str()),
                    ("column", column.as_str()),
                ],
            )
        }
    };

    Ok(sql)
}

fn type_name(
    operation: &Operation,
    ty: &LogicalType,
    spec: &DialectSpec,
) -> Result<String, RenderError> {
    spec.type_name(ty)
        .ok_or_else(|| RenderError::UnknownTypeMapping {
            operation: operation.id.clone(),
            logical_type: ty.to_string(),
            dialect: spec.name,
        })
}

fn column_definition(
    operation: &Operation,
    column: &Column,
    spec: &DialectSpec,
) -> Result<String, RenderError> {
    let mut definition = format!(
        "{} {}",
        spec.quote(&column.name),
        type_name(operation, &column.data_type, spec)?
    );
    if !column.nullable {
        definition.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        definition.push_str(&format!(" DEFAULT {}", default.raw()));
    }
    Ok(definition)
}

fn create_table_body(
    operation: &Operation,
    columns: &[Column],
    constraints: &[Constraint],
    spec: &DialectSpec,
) -> Result<String, RenderError> {
    let mut ordered: Vec<&Column> = columns.iter().collect();
    ordered.sort_by_key(|c| c.ordinal);

    let mut lines = Vec::with_capacity(columns.len() + constraints.len());
    for column in ordered {
        lines.push(format!("    {}", column_definition(operation, column, spec)?));
    }
    // NOT NULL is carried by the column definitions
    for constraint in constraints
        .iter()
        .filter(|c| !matches!(c.tag(), ConstraintTag::NotNull | ConstraintTag::ForeignKey))
    {
        lines.push(format!(
            "    CONSTRAINT {} {}",
            spec.quote(&constraint.name),
            constraint_body(constraint, spec)
        ));
    }
    Ok(lines.join(",\n"))
}

fn quote_list(names: &[String], spec: &DialectSpec) -> String {
    names
        .iter()
        .map(|name| spec.quote(name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn constraint_body(constraint: &Constraint, spec: &DialectSpec) -> String {
    let columns = quote_list(&constraint.columns, spec);
    match &constraint.kind {
        ConstraintKind::PrimaryKey => format!("PRIMARY KEY ({})", columns),
        ConstraintKind::Unique => format!("UNIQUE ({})", columns),
        ConstraintKind::Check { expression } => format!("CHECK ({})", expression),
        ConstraintKind::NotNull => format!("CHECK ({} IS NOT NULL)", columns),
        ConstraintKind::ForeignKey(fk) => {
            let mut body = format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                columns,
                spec.quote(&fk.references_table),
                quote_list(&fk.references_columns, spec)
            );
            if fk.on_delete != FkAction::NoAction {
                body.push_str(&format!(" ON DELETE {}", fk.on_delete.to_sql()));
            }
            if fk.on_update != FkAction::NoAction {
                body.push_str(&format!(" ON UPDATE {}", fk.on_update.to_sql()));
            }
            body
        }
    }
}

fn not_null_column(
    operation: &Operation,
    constraint: &Constraint,
    spec: &DialectSpec,
) -> Result<String, RenderError> {
    constraint
        .columns
        .first()
        .map(|column| spec.quote(column))
        .ok_or_else(|| RenderError::UnsupportedOperation {
            operation: operation.id.clone(),
            dialect: spec.name,
        })
}

#[cfg(test)]
mod tests;
