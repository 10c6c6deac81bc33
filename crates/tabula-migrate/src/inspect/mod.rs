//! Live-schema introspection.
//!
//! Inspectors read table structures out of a running database and
//! produce the dialect-neutral model the resolver works on. SQLite goes
//! through its PRAGMA interface, MySQL through `information_schema`.

mod mysql;
mod sqlite;

pub use mysql::MySqlInspector;
pub use sqlite::SqliteInspector;

use std::sync::OnceLock;

use regex::Regex;
use tabula_schema::schema::ColumnType;

static TYPE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn type_pattern() -> &'static Regex {
    TYPE_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^([a-z]+)\s*(?:\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?")
            .expect("type pattern is valid")
    })
}

/// Parses a declared column type string ("varchar(255)", "bigint
/// unsigned", "decimal(10,2)", …) into a model type plus signedness.
///
/// Returns `None` for types the engine does not model. `tinyint(1)`
/// follows the MySQL convention and maps to [`ColumnType::Boolean`].
#[must_use]
pub fn parse_column_type(raw: &str) -> Option<(ColumnType, bool)> {
    let caps = type_pattern().captures(raw.trim())?;
    let base = caps[1].to_lowercase();
    let length = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
    let scale = caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok());

    let column_type = match base.as_str() {
        "tinyint" if length == Some(1) => ColumnType::Boolean,
        "tinyint" => ColumnType::TinyInt,
        "smallint" => ColumnType::SmallInt,
        "int" | "integer" | "mediumint" => ColumnType::Int,
        "bigint" => ColumnType::BigInt,
        "decimal" | "numeric" => ColumnType::Decimal(
            u8::try_from(length.unwrap_or(10)).unwrap_or(10),
            u8::try_from(scale.unwrap_or(0)).unwrap_or(0),
        ),
        "float" => ColumnType::Float,
        "double" | "real" => ColumnType::Double,
        "char" => ColumnType::Char(length.unwrap_or(1)),
        "varchar" | "character" => ColumnType::Varchar(length.unwrap_or(255)),
        "text" | "clob" | "tinytext" => ColumnType::Text,
        "mediumtext" => ColumnType::MediumText,
        "longtext" => ColumnType::LongText,
        "binary" => ColumnType::Binary(length.unwrap_or(1)),
        "varbinary" => ColumnType::VarBinary(length.unwrap_or(255)),
        "blob" | "tinyblob" => ColumnType::Blob,
        "mediumblob" => ColumnType::MediumBlob,
        "longblob" => ColumnType::LongBlob,
        "date" => ColumnType::Date,
        "time" => ColumnType::Time,
        "datetime" => ColumnType::DateTime,
        "timestamp" => ColumnType::Timestamp,
        "year" => ColumnType::Year,
        "boolean" | "bool" => ColumnType::Boolean,
        "json" => ColumnType::Json,
        _ => return None,
    };

    let unsigned =
        raw.to_lowercase().contains("unsigned") && column_type.accepts_unsigned();
    Some((column_type, unsigned))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_types() {
        assert_eq!(parse_column_type("INTEGER"), Some((ColumnType::Int, false)));
        assert_eq!(parse_column_type("bigint"), Some((ColumnType::BigInt, false)));
        assert_eq!(parse_column_type("TEXT"), Some((ColumnType::Text, false)));
        assert_eq!(parse_column_type("JSON"), Some((ColumnType::Json, false)));
    }

    #[test]
    fn test_parse_parameterized_types() {
        assert_eq!(
            parse_column_type("varchar(255)"),
            Some((ColumnType::Varchar(255), false))
        );
        assert_eq!(
            parse_column_type("CHAR(36)"),
            Some((ColumnType::Char(36), false))
        );
        assert_eq!(
            parse_column_type("decimal(10, 2)"),
            Some((ColumnType::Decimal(10, 2), false))
        );
    }

    #[test]
    fn test_parse_unsigned() {
        assert_eq!(
            parse_column_type("bigint unsigned"),
            Some((ColumnType::BigInt, true))
        );
        assert_eq!(
            parse_column_type("INT UNSIGNED"),
            Some((ColumnType::Int, true))
        );
        // UNSIGNED on non-numeric types is meaningless and ignored.
        assert_eq!(
            parse_column_type("varchar(16) unsigned"),
            Some((ColumnType::Varchar(16), false))
        );
    }

    #[test]
    fn test_parse_boolean_conventions() {
        assert_eq!(
            parse_column_type("tinyint(1)"),
            Some((ColumnType::Boolean, false))
        );
        assert_eq!(
            parse_column_type("tinyint(4)"),
            Some((ColumnType::TinyInt, false))
        );
        assert_eq!(
            parse_column_type("BOOLEAN"),
            Some((ColumnType::Boolean, false))
        );
    }

    #[test]
    fn test_parse_unknown_type() {
        assert_eq!(parse_column_type("geometry"), None);
        assert_eq!(parse_column_type(""), None);
    }
}
