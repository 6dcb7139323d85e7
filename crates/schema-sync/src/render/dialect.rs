//! SQL dialects as data.
//!
//! Each dialect is a [`DialectSpec`]: an identifier quote pair, a type mapping
//! table and a statement template table. Templates use `{placeholder}` slots
//! that the renderer fills in. A missing statement entry means the dialect
//! cannot express that operation.

use crate::ConfigError;
use schema_sync_model::LogicalType;
use std::fmt;
use std::str::FromStr;

/// Target SQL dialect for rendered migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn spec(&self) -> &'static DialectSpec {
        match self {
            Dialect::Postgres => &POSTGRES,
            Dialect::MySql => &MYSQL,
            Dialect::Sqlite => &SQLITE,
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }
}

impl FromStr for Dialect {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(ConfigError::UnknownDialect(s.to_string())),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key into a dialect's type table. Parameterized types get a separate key
/// for their parameterized spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKey {
    SmallInt,
    Integer,
    BigInt,
    Real,
    DoublePrecision,
    Numeric,
    NumericPrecision,
    Text,
    Varchar,
    VarcharLength,
    Char,
    Boolean,
    Date,
    Time,
    Timestamp,
    Timestamptz,
    Interval,
    Uuid,
    Json,
    Jsonb,
    Bytea,
}

impl TypeKey {
    /// Key and template arguments for a logical type; `None` for `Other`.
    fn of(ty: &LogicalType) -> Option<(TypeKey, Vec<(&'static str, String)>)> {
        let key = match ty {
            LogicalType::SmallInt => TypeKey::SmallInt,
            LogicalType::Integer => TypeKey::Integer,
            LogicalType::BigInt => TypeKey::BigInt,
            LogicalType::Real => TypeKey::Real,
            LogicalType::DoublePrecision => TypeKey::DoublePrecision,
            LogicalType::Numeric(None) => TypeKey::Numeric,
            LogicalType::Numeric(Some((p, s))) => {
                return Some((
                    TypeKey::NumericPrecision,
                    vec![("p", p.to_string()), ("s", s.to_string())],
                ));
            }
            LogicalType::Text => TypeKey::Text,
            LogicalType::Varchar(None) => TypeKey::Varchar,
            LogicalType::Varchar(Some(n)) => {
                return Some((TypeKey::VarcharLength, vec![("n", n.to_string())]));
            }
            LogicalType::Char(n) => return Some((TypeKey::Char, vec![("n", n.to_string())])),
            LogicalType::Boolean => TypeKey::Boolean,
            LogicalType::Date => TypeKey::Date,
            LogicalType::Time => TypeKey::Time,
            LogicalType::Timestamp => TypeKey::Timestamp,
            LogicalType::Timestamptz => TypeKey::Timestamptz,
            LogicalType::Interval => TypeKey::Interval,
            LogicalType::Uuid => TypeKey::Uuid,
            LogicalType::Json => TypeKey::Json,
            LogicalType::Jsonb => TypeKey::Jsonb,
            LogicalType::Bytea => TypeKey::Bytea,
            LogicalType::Other(_) => return None,
        };
        Some((key, Vec::new()))
    }
}

/// Key into a dialect's statement table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    CreateTable,
    DropTable,
    AddColumn,
    DropColumn,
    AlterColumnType,
    SetNotNull,
    DropNotNull,
    SetDefault,
    DropDefault,
    AddIndex,
    AddUniqueIndex,
    DropIndex,
    AddConstraint,
    DropConstraint,
    DropForeignKey,
    DropPrimaryKey,
    AddNotNullConstraint,
    DropNotNullConstraint,
}

/// A dialect described entirely by lookup tables.
#[derive(Debug)]
pub struct DialectSpec {
    pub name: &'static str,
    /// Opening and closing identifier quote
    pub quote: (char, char),
    pub types: &'static [(TypeKey, &'static str)],
    pub statements: &'static [(StatementKind, &'static str)],
    /// Vendor types outside the logical set that this dialect spells verbatim
    pub native_types: &'static [&'static str],
}

impl DialectSpec {
    pub fn statement(&self, kind: StatementKind) -> Option<&'static str> {
        self.statements
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, template)| *template)
    }

    /// Spell a logical type. `None` means the dialect has no entry for it;
    /// `Other` types only resolve when listed in `native_types`.
    pub fn type_name(&self, ty: &LogicalType) -> Option<String> {
        let Some((key, args)) = TypeKey::of(ty) else {
            let LogicalType::Other(name) = ty else {
                return None;
            };
            return self
                .native_types
                .iter()
                .any(|native| native.eq_ignore_ascii_case(name))
                .then(|| name.clone());
        };
        let template = self
            .types
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, template)| *template)?;
        let args: Vec<(&str, &str)> = args.iter().map(|(k, v)| (*k, v.as_str())).collect();
        Some(fill(template, &args))
    }

    /// Quote an identifier, doubling any embedded closing quote.
    pub fn quote(&self, name: &str) -> String {
        let (open, close) = self.quote;
        let mut quoted = String::with_capacity(name.len() + 2);
        quoted.push(open);
        for c in name.chars() {
            if c == close {
                quoted.push(close);
            }
            quoted.push(c);
        }
        quoted.push(close);
        quoted
    }
}

/// Substitute `{key}` slots in one pass. Unknown slots are kept as-is, and
/// substituted values are never rescanned.
pub fn fill(template: &str, args: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let slot = after.find('}').map(|end| &after[..end]);
        match slot.and_then(|name| args.iter().find(|(k, _)| *k == name)) {
            Some((name, value)) => {
                out.push_str(value);
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub static POSTGRES: DialectSpec = DialectSpec {
    name: "postgres",
    quote: ('"', '"'),
    types: &[
        (TypeKey::SmallInt, "SMALLINT"),
        (TypeKey::Integer, "INTEGER"),
        (TypeKey::BigInt, "BIGINT"),
        (TypeKey::Real, "REAL"),
        (TypeKey::DoublePrecision, "DOUBLE PRECISION"),
        (TypeKey::Numeric, "NUMERIC"),
        (TypeKey::NumericPrecision, "NUMERIC({p},{s})"),
        (TypeKey::Text, "TEXT"),
        (TypeKey::Varchar, "VARCHAR"),
        (TypeKey::VarcharLength, "VARCHAR({n})"),
        (TypeKey::Char, "CHAR({n})"),
        (TypeKey::Boolean, "BOOLEAN"),
        (TypeKey::Date, "DATE"),
        (TypeKey::Time, "TIME"),
        (TypeKey::Timestamp, "TIMESTAMP"),
        (TypeKey::Timestamptz, "TIMESTAMPTZ"),
        (TypeKey::Interval, "INTERVAL"),
        (TypeKey::Uuid, "UUID"),
        (TypeKey::Json, "JSON"),
        (TypeKey::Jsonb, "JSONB"),
        (TypeKey::Bytea, "BYTEA"),
    ],
    statements: &[
        (StatementKind::CreateTable, "CREATE TABLE {table} (\n{body}\n);"),
        (StatementKind::DropTable, "DROP TABLE {table};"),
        (StatementKind::AddColumn, "ALTER TABLE {table} ADD COLUMN {definition};"),
        (StatementKind::DropColumn, "ALTER TABLE {table} DROP COLUMN {column};"),
        (
            StatementKind::AlterColumnType,
            "ALTER TABLE {table} ALTER COLUMN {column} TYPE {type} USING {column}::{type};",
        ),
        (
            StatementKind::SetNotNull,
            "ALTER TABLE {table} ALTER COLUMN {column} SET NOT NULL;",
        ),
        (
            StatementKind::DropNotNull,
            "ALTER TABLE {table} ALTER COLUMN {column} DROP NOT NULL;",
        ),
        (
            StatementKind::SetDefault,
            "ALTER TABLE {table} ALTER COLUMN {column} SET DEFAULT {default};",
        ),
        (
            StatementKind::DropDefault,
            "ALTER TABLE {table} ALTER COLUMN {column} DROP DEFAULT;",
        ),
        (StatementKind::AddIndex, "CREATE INDEX {name} ON {table} ({columns});"),
        (
            StatementKind::AddUniqueIndex,
            "CREATE UNIQUE INDEX {name} ON {table} ({columns});",
        ),
        (StatementKind::DropIndex, "DROP INDEX {name};"),
        (
            StatementKind::AddConstraint,
            "ALTER TABLE {table} ADD CONSTRAINT {name} {body};",
        ),
        (
            StatementKind::DropConstraint,
            "ALTER TABLE {table} DROP CONSTRAINT {name};",
        ),
        (
            StatementKind::DropForeignKey,
            "ALTER TABLE {table} DROP CONSTRAINT {name};",
        ),
        (
            StatementKind::DropPrimaryKey,
            "ALTER TABLE {table} DROP CONSTRAINT {name};",
        ),
        (
            StatementKind::AddNotNullConstraint,
            "ALTER TABLE {table} ALTER COLUMN {column} SET NOT NULL;",
        ),
        (
            StatementKind::DropNotNullConstraint,
            "ALTER TABLE {table} ALTER COLUMN {column} DROP NOT NULL;",
        ),
    ],
    native_types: &[
        "TSVECTOR", "TSQUERY", "INET", "CIDR", "MACADDR", "CITEXT", "XML", "MONEY",
    ],
};

pub static MYSQL: DialectSpec = DialectSpec {
    name: "mysql",
    quote: ('`', '`'),
    types: &[
        (TypeKey::SmallInt, "SMALLINT"),
        (TypeKey::Integer, "INT"),
        (TypeKey::BigInt, "BIGINT"),
        (TypeKey::Real, "FLOAT"),
        (TypeKey::DoublePrecision, "DOUBLE"),
        (TypeKey::Numeric, "DECIMAL"),
        (TypeKey::NumericPrecision, "DECIMAL({p},{s})"),
        (TypeKey::Text, "TEXT"),
        (TypeKey::VarcharLength, "VARCHAR({n})"),
        (TypeKey::Char, "CHAR({n})"),
        (TypeKey::Boolean, "TINYINT(1)"),
        (TypeKey::Date, "DATE"),
        (TypeKey::Time, "TIME"),
        (TypeKey::Timestamp, "DATETIME"),
        (TypeKey::Timestamptz, "TIMESTAMP"),
        (TypeKey::Uuid, "CHAR(36)"),
        (TypeKey::Json, "JSON"),
        (TypeKey::Jsonb, "JSON"),
        (TypeKey::Bytea, "LONGBLOB"),
    ],
    statements: &[
        (StatementKind::CreateTable, "CREATE TABLE {table} (\n{body}\n);"),
        (StatementKind::DropTable, "DROP TABLE {table};"),
        (StatementKind::AddColumn, "ALTER TABLE {table} ADD COLUMN {definition};"),
        (StatementKind::DropColumn, "ALTER TABLE {table} DROP COLUMN {column};"),
        (
            StatementKind::AlterColumnType,
            "ALTER TABLE {table} MODIFY COLUMN {definition};",
        ),
        (
            StatementKind::SetNotNull,
            "ALTER TABLE {table} MODIFY COLUMN {definition};",
        ),
        (
            StatementKind::DropNotNull,
            "ALTER TABLE {table} MODIFY COLUMN {definition};",
        ),
        (
            StatementKind::SetDefault,
            "ALTER TABLE {table} ALTER COLUMN {column} SET DEFAULT {default};",
        ),
        (
            StatementKind::DropDefault,
            "ALTER TABLE {table} ALTER COLUMN {column} DROP DEFAULT;",
        ),
        (StatementKind::AddIndex, "CREATE INDEX {name} ON {table} ({columns});"),
        (
            StatementKind::AddUniqueIndex,
            "CREATE UNIQUE INDEX {name} ON {table} ({columns});",
        ),
        (StatementKind::DropIndex, "DROP INDEX {name} ON {table};"),
        (
            StatementKind::AddConstraint,
            "ALTER TABLE {table} ADD CONSTRAINT {name} {body};",
        ),
        (
            StatementKind::DropConstraint,
            "ALTER TABLE {table} DROP CONSTRAINT {name};",
        ),
        (
            StatementKind::DropForeignKey,
            "ALTER TABLE {table} DROP FOREIGN KEY {name};",
        ),
        (StatementKind::DropPrimaryKey, "ALTER TABLE {table} DROP PRIMARY KEY;"),
    ],
    native_types: &["YEAR"],
};

pub static SQLITE: DialectSpec = DialectSpec {
    name: "sqlite",
    quote: ('"', '"'),
    types: &[
        (TypeKey::SmallInt, "INTEGER"),
        (TypeKey::Integer, "INTEGER"),
        (TypeKey::BigInt, "INTEGER"),
        (TypeKey::Real, "REAL"),
        (TypeKey::DoublePrecision, "REAL"),
        (TypeKey::Numeric, "NUMERIC"),
        (TypeKey::NumericPrecision, "NUMERIC"),
        (TypeKey::Text, "TEXT"),
        (TypeKey::Varchar, "TEXT"),
        (TypeKey::VarcharLength, "VARCHAR({n})"),
        (TypeKey::Char, "CHAR({n})"),
        (TypeKey::Boolean, "INTEGER"),
        (TypeKey::Date, "TEXT"),
        (TypeKey::Time, "TEXT"),
        (TypeKey::Timestamp, "TEXT"),
        (TypeKey::Timestamptz, "TEXT"),
        (TypeKey::Uuid, "TEXT"),
        (TypeKey::Json, "TEXT"),
        (TypeKey::Jsonb, "TEXT"),
        (TypeKey::Bytea, "BLOB"),
    ],
    statements: &[
        (StatementKind::CreateTable, "CREATE TABLE {table} (\n{body}\n);"),
        (StatementKind::DropTable, "DROP TABLE {table};"),
        (StatementKind::AddColumn, "ALTER TABLE {table} ADD COLUMN {definition};"),
        (StatementKind::DropColumn, "ALTER TABLE {table} DROP COLUMN {column};"),
        (StatementKind::AddIndex, "CREATE INDEX {name} ON {table} ({columns});"),
        (
            StatementKind::AddUniqueIndex,
            "CREATE UNIQUE INDEX {name} ON {table} ({columns});",
        ),
        (StatementKind::DropIndex, "DROP INDEX {name};"),
    ],
    native_types: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("postgres".parse::<Dialect>(), Ok(Dialect::Postgres));
        assert_eq!("PostgreSQL".parse::<Dialect>(), Ok(Dialect::Postgres));
        assert_eq!("pg".parse::<Dialect>(), Ok(Dialect::Postgres));
        assert_eq!("mysql".parse::<Dialect>(), Ok(Dialect::MySql));
        assert_eq!("sqlite".parse::<Dialect>(), Ok(Dialect::Sqlite));
        assert_eq!(
            "oracle".parse::<Dialect>(),
            Err(ConfigError::UnknownDialect("oracle".to_string()))
        );
    }

    #[test]
    fn test_fill_single_pass() {
        assert_eq!(
            fill("SET DEFAULT {default};", &[("default", "'{table}'"), ("table", "x")]),
            "SET DEFAULT '{table}';"
        );
        assert_eq!(fill("{missing} {a}", &[("a", "1")]), "{missing} 1");
        assert_eq!(fill("unterminated {a", &[("a", "1")]), "unterminated {a");
    }

    #[test]
    fn test_quote_doubles_embedded_quotes() {
        assert_eq!(POSTGRES.quote("user"), "\"user\"");
        assert_eq!(POSTGRES.quote("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(MYSQL.quote("order"), "`order`");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(
            POSTGRES.type_name(&LogicalType::Numeric(Some((10, 2)))),
            Some("NUMERIC(10,2)".to_string())
        );
        assert_eq!(
            MYSQL.type_name(&LogicalType::Boolean),
            Some("TINYINT(1)".to_string())
        );
        assert_eq!(MYSQL.type_name(&LogicalType::Interval), None);
    }

    #[test]
    fn test_other_types_need_a_native_entry() {
        let tsvector = LogicalType::Other("TSVECTOR".to_string());
        assert_eq!(POSTGRES.type_name(&tsvector), Some("TSVECTOR".to_string()));
        assert_eq!(MYSQL.type_name(&tsvector), None);
        assert_eq!(SQLITE.type_name(&tsvector), None);
        assert_eq!(
            POSTGRES.type_name(&LogicalType::Other("GEOMETRY(POINT, 4326)".to_string())),
            None
        );
    }

    #[test]
    fn test_sqlite_has_no_alter_column() {
        assert!(SQLITE.statement(StatementKind::AlterColumnType).is_none());
        assert!(SQLITE.statement(StatementKind::AddConstraint).is_none());
        assert!(SQLITE.statement(StatementKind::AddColumn).is_some());
    }
}
