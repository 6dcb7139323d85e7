//! Risk annotations for operations that can lose data or fail on live rows.

use crate::{Operation, OperationId, OperationKind};
use schema_sync_model::LogicalType;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// Dropping a table or column deletes its data.
    DataLoss,
    /// The new type cannot hold every value of the old one.
    Narrowing,
    /// Existing NULLs make the statement fail.
    SetNotNull,
    /// Existing rows have no value for the new column.
    NotNullWithoutDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationWarning {
    pub operation: OperationId,
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for MigrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Warnings for a single operation, in a fixed order.
pub fn warnings(operation: &Operation) -> Vec<MigrationWarning> {
    let warn = |kind, message: String| MigrationWarning {
        operation: operation.id.clone(),
        kind,
        message,
    };
    let table = &operation.table;

    match &operation.kind {
        OperationKind::DropTable(_) => vec![warn(
            WarningKind::DataLoss,
            format!("dropping table {} deletes all of its rows", table),
        )],
        OperationKind::DropColumn(column) => vec![warn(
            WarningKind::DataLoss,
            format!(
                "dropping column {}.{} deletes its data",
                table, column.name
            ),
        )],
        OperationKind::AlterColumnType { from, to } if is_narrowing(&from.data_type, &to.data_type) => {
            vec![warn(
                WarningKind::Narrowing,
                format!(
                    "{}.{} narrows from {} to {}; existing values may not fit",
                    table, to.name, from.data_type, to.data_type
                ),
            )]
        }
        OperationKind::AlterColumnNullability { from, to } if from.nullable && !to.nullable => {
            vec![warn(
                WarningKind::SetNotNull,
                format!(
                    "{}.{} becomes NOT NULL; fails if existing rows contain NULL",
                    table, to.name
                ),
            )]
        }
        OperationKind::AddColumn(column) if !column.nullable && column.default.is_none() => {
            vec![warn(
                WarningKind::NotNullWithoutDefault,
                format!(
                    "{}.{} is NOT NULL without a default; fails if the table has rows",
                    table, column.name
                ),
            )]
        }
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Integer,
    Float,
    Decimal,
    Text,
    Boolean,
    Temporal,
    Interval,
    Uuid,
    Json,
    Binary,
    Other,
}

fn family(ty: &LogicalType) -> Family {
    match ty {
        LogicalType::SmallInt | LogicalType::Integer | LogicalType::BigInt => Family::Integer,
        LogicalType::Real | LogicalType::DoublePrecision => Family::Float,
        LogicalType::Numeric(_) => Family::Decimal,
        LogicalType::Text | LogicalType::Varchar(_) | LogicalType::Char(_) => Family::Text,
        LogicalType::Boolean => Family::Boolean,
        LogicalType::Date
        | LogicalType::Time
        | LogicalType::Timestamp
        | LogicalType::Timestamptz => Family::Temporal,
        LogicalType::Interval => Family::Interval,
        LogicalType::Uuid => Family::Uuid,
        LogicalType::Json | LogicalType::Jsonb => Family::Json,
        LogicalType::Bytea => Family::Binary,
        LogicalType::Other(_) => Family::Other,
    }
}

/// Maximum length of a textual type; `None` is unbounded.
fn text_capacity(ty: &LogicalType) -> Option<u32> {
    match ty {
        LogicalType::Varchar(Some(n)) | LogicalType::Char(n) => Some(*n),
        _ => None,
    }
}

/// Whether converting `from` to `to` can fail or lose information.
pub fn is_narrowing(from: &LogicalType, to: &LogicalType) -> bool {
    if from == to {
        return false;
    }
    match (family(from), family(to)) {
        (Family::Integer, Family::Integer) => {
            matches!((from.integer_width(), to.integer_width()), (Some(a), Some(b)) if b < a)
        }
        (Family::Text, Family::Text) => match (text_capacity(from), text_capacity(to)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(a), Some(b)) => b < a,
        },
        (Family::Decimal, Family::Decimal) => match (from, to) {
            (LogicalType::Numeric(Some((p1, s1))), LogicalType::Numeric(Some((p2, s2)))) => {
                p2 < p1 || s2 < s1
            }
            (LogicalType::Numeric(None), LogicalType::Numeric(Some(_))) => true,
            _ => false,
        },
        (Family::Float, Family::Float) => {
            matches!((from, to), (LogicalType::DoublePrecision, LogicalType::Real))
        }
        (Family::Temporal, Family::Temporal) => matches!(
            (from, to),
            (
                LogicalType::Timestamp | LogicalType::Timestamptz,
                LogicalType::Date | LogicalType::Time
            ) | (LogicalType::Date, LogicalType::Time)
                | (LogicalType::Time, LogicalType::Date)
        ),
        (Family::Json, Family::Json) => false,
        // widening into a roomier family
        (Family::Integer, Family::Float | Family::Decimal) => false,
        (_, Family::Text) => text_capacity(to).is_some(),
        _ => true,
    }
}
