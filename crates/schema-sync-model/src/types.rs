//! Logical column types.

use std::fmt;

/// Dialect-independent column type.
///
/// Introspectors report types in vendor spelling (`character varying(255)`,
/// `int4`, `datetime`); [`LogicalType::parse`] folds those into one of these
/// variants so two snapshots from different drivers compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// SMALLINT (2 bytes)
    SmallInt,
    /// INTEGER (4 bytes)
    Integer,
    /// BIGINT (8 bytes)
    BigInt,
    /// REAL (4 bytes floating point)
    Real,
    /// DOUBLE PRECISION (8 bytes floating point)
    DoublePrecision,
    /// NUMERIC, optionally with (precision, scale)
    Numeric(Option<(u32, u32)>),
    /// TEXT
    Text,
    /// VARCHAR, optionally with a length limit
    Varchar(Option<u32>),
    /// CHAR(n)
    Char(u32),
    /// BOOLEAN
    Boolean,
    /// DATE
    Date,
    /// TIME
    Time,
    /// TIMESTAMP (without time zone)
    Timestamp,
    /// TIMESTAMPTZ
    Timestamptz,
    /// INTERVAL
    Interval,
    /// UUID
    Uuid,
    /// JSON
    Json,
    /// JSONB
    Jsonb,
    /// BYTEA / BLOB
    Bytea,
    /// A type the normalizer does not know, kept by its uppercased name.
    Other(String),
}

impl LogicalType {
    /// Normalize a vendor type spelling.
    ///
    /// Never fails: unknown spellings become [`LogicalType::Other`].
    pub fn parse(raw: &str) -> Self {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let lower = collapsed.to_lowercase();

        // "timestamp(6) with time zone" -> base "timestamp with time zone", params [6]
        let (base, params) = match (lower.find('('), lower.rfind(')')) {
            (Some(open), Some(close)) if open < close => {
                let head = lower[..open].trim();
                let tail = lower[close + 1..].trim();
                let base = if tail.is_empty() {
                    head.to_string()
                } else {
                    format!("{} {}", head, tail)
                };
                let params: Vec<u32> = lower[open + 1..close]
                    .split(',')
                    .filter_map(|p| p.trim().parse().ok())
                    .collect();
                (base, params)
            }
            _ => (lower.clone(), Vec::new()),
        };

        match base.as_str() {
            "smallint" | "int2" | "smallserial" | "serial2" => LogicalType::SmallInt,
            "tinyint" if params == [1] => LogicalType::Boolean,
            "tinyint" => LogicalType::SmallInt,
            "integer" | "int" | "int4" | "mediumint" | "serial" | "serial4" => {
                LogicalType::Integer
            }
            "bigint" | "int8" | "bigserial" | "serial8" => LogicalType::BigInt,
            "real" | "float4" | "float" => LogicalType::Real,
            "double precision" | "double" | "float8" => LogicalType::DoublePrecision,
            "numeric" | "decimal" => match params.as_slice() {
                [] => LogicalType::Numeric(None),
                [p] => LogicalType::Numeric(Some((*p, 0))),
                [p, s, ..] => LogicalType::Numeric(Some((*p, *s))),
            },
            "text" | "tinytext" | "mediumtext" | "longtext" | "clob" => LogicalType::Text,
            "varchar" | "character varying" | "nvarchar" => {
                LogicalType::Varchar(params.first().copied())
            }
            "char" | "character" | "bpchar" | "nchar" => {
                LogicalType::Char(params.first().copied().unwrap_or(1))
            }
            "boolean" | "bool" => LogicalType::Boolean,
            "date" => LogicalType::Date,
            "time" | "time without time zone" => LogicalType::Time,
            "timestamp" | "timestamp without time zone" | "datetime" => LogicalType::Timestamp,
            "timestamptz" | "timestamp with time zone" => LogicalType::Timestamptz,
            "interval" => LogicalType::Interval,
            "uuid" => LogicalType::Uuid,
            "json" => LogicalType::Json,
            "jsonb" => LogicalType::Jsonb,
            "bytea" | "blob" | "tinyblob" | "mediumblob" | "longblob" => LogicalType::Bytea,
            _ => LogicalType::Other(collapsed.to_uppercase()),
        }
    }

    /// Byte width of integer types, used to classify narrowing changes.
    pub fn integer_width(&self) -> Option<u8> {
        match self {
            LogicalType::SmallInt => Some(2),
            LogicalType::Integer => Some(4),
            LogicalType::BigInt => Some(8),
            _ => None,
        }
    }

    /// Whether this is a character type (TEXT, VARCHAR, CHAR).
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            LogicalType::Text | LogicalType::Varchar(_) | LogicalType::Char(_)
        )
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::SmallInt => write!(f, "SMALLINT"),
            LogicalType::Integer => write!(f, "INTEGER"),
            LogicalType::BigInt => write!(f, "BIGINT"),
            LogicalType::Real => write!(f, "REAL"),
            LogicalType::DoublePrecision => write!(f, "DOUBLE PRECISION"),
            LogicalType::Numeric(None) => write!(f, "NUMERIC"),
            LogicalType::Numeric(Some((p, s))) => write!(f, "NUMERIC({},{})", p, s),
            LogicalType::Text => write!(f, "TEXT"),
            LogicalType::Varchar(None) => write!(f, "VARCHAR"),
            LogicalType::Varchar(Some(n)) => write!(f, "VARCHAR({})", n),
            LogicalType::Char(n) => write!(f, "CHAR({})", n),
            LogicalType::Boolean => write!(f, "BOOLEAN"),
            LogicalType::Date => write!(f, "DATE"),
            LogicalType::Time => write!(f, "TIME"),
            LogicalType::Timestamp => write!(f, "TIMESTAMP"),
            LogicalType::Timestamptz => write!(f, "TIMESTAMPTZ"),
            LogicalType::Interval => write!(f, "INTERVAL"),
            LogicalType::Uuid => write!(f, "UUID"),
            LogicalType::Json => write!(f, "JSON"),
            LogicalType::Jsonb => write!(f, "JSONB"),
            LogicalType::Bytea => write!(f, "BYTEA"),
            LogicalType::Other(name) => write!(f, "{}", name),
        }
    }
}
