//! Schema representation types.
//!
//! These types describe the structure of database tables as the engine
//! sees them: either introspected from a live database or produced by
//! merging a change request. They are dialect-neutral; rendering to SQL
//! happens in [`crate::dialect`].

use serde::{Deserialize, Serialize};

/// Concrete SQL column types across the supported dialects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// 8-bit integer.
    TinyInt,
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    BigInt,
    /// Fixed-point decimal with precision and scale.
    Decimal(u8, u8),
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// Fixed-length character string.
    Char(u32),
    /// Variable-length character string with a bound.
    Varchar(u32),
    /// Unbounded text.
    Text,
    /// Unbounded text, medium variant.
    MediumText,
    /// Unbounded text, long variant.
    LongText,
    /// Fixed-length binary.
    Binary(u32),
    /// Variable-length binary with a bound.
    VarBinary(u32),
    /// Unbounded binary.
    Blob,
    /// Unbounded binary, medium variant.
    MediumBlob,
    /// Unbounded binary, long variant.
    LongBlob,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    DateTime,
    /// Date and time, timestamp semantics.
    Timestamp,
    /// Year only.
    Year,
    /// Boolean.
    Boolean,
    /// JSON document.
    Json,
}

/// Coarse classification of key-eligible column types.
///
/// Used when validating foreign-key column pairs: both sides must carry
/// the same kind, and within a kind the rules differ (integers must match
/// exactly, text must match collation, `DateTime`/`Timestamp` are one
/// coarse temporal type). Types with no kind (unbounded text, unbounded
/// binary, JSON) can never participate in a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Integer family.
    Integer,
    /// Fixed-point decimal.
    Decimal,
    /// Floating point.
    Float,
    /// Bounded character data.
    Text,
    /// Bounded binary data.
    Binary,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date-and-time (covers both `DateTime` and `Timestamp`).
    DateTime,
    /// Year.
    Year,
    /// Boolean.
    Boolean,
}

impl ColumnType {
    /// Returns the key classification of this type, or `None` when the
    /// type can never be part of an index used by a foreign key.
    #[must_use]
    pub fn key_kind(&self) -> Option<KeyKind> {
        match self {
            Self::TinyInt | Self::SmallInt | Self::Int | Self::BigInt => Some(KeyKind::Integer),
            Self::Decimal(_, _) => Some(KeyKind::Decimal),
            Self::Float | Self::Double => Some(KeyKind::Float),
            Self::Char(_) | Self::Varchar(_) => Some(KeyKind::Text),
            Self::Binary(_) | Self::VarBinary(_) => Some(KeyKind::Binary),
            Self::Date => Some(KeyKind::Date),
            Self::Time => Some(KeyKind::Time),
            Self::DateTime | Self::Timestamp => Some(KeyKind::DateTime),
            Self::Year => Some(KeyKind::Year),
            Self::Boolean => Some(KeyKind::Boolean),
            Self::Text
            | Self::MediumText
            | Self::LongText
            | Self::Blob
            | Self::MediumBlob
            | Self::LongBlob
            | Self::Json => None,
        }
    }

    /// Returns true for character types that carry a collation.
    #[must_use]
    pub fn is_character(&self) -> bool {
        matches!(
            self,
            Self::Char(_)
                | Self::Varchar(_)
                | Self::Text
                | Self::MediumText
                | Self::LongText
        )
    }

    /// Returns true for types that accept the `UNSIGNED` attribute.
    #[must_use]
    pub fn accepts_unsigned(&self) -> bool {
        matches!(
            self,
            Self::TinyInt
                | Self::SmallInt
                | Self::Int
                | Self::BigInt
                | Self::Decimal(_, _)
                | Self::Float
                | Self::Double
        )
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// No default value.
    None,
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// SQL expression (e.g., "CURRENT_TIMESTAMP").
    Expression(String),
}

impl DefaultValue {
    /// Returns the SQL representation of this default value.
    #[must_use]
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Null => Some("NULL".to_string()),
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            Self::Expression(expr) => Some(expr.clone()),
        }
    }
}

/// Foreign key referential action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefAction {
    /// No action.
    #[default]
    NoAction,
    /// Restrict.
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the referencing column(s) to NULL.
    SetNull,
    /// Set the referencing column(s) to their default.
    SetDefault,
}

impl RefAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses the SQL keyword form, as reported by database metadata.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NO ACTION" => Some(Self::NoAction),
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

/// Schema definition for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// SQL data type.
    pub column_type: ColumnType,
    /// Whether the numeric type is unsigned.
    pub unsigned: bool,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Default value.
    pub default: DefaultValue,
    /// Whether this column auto-increments.
    pub auto_increment: bool,
    /// Collation, for character types.
    pub collation: Option<String>,
    /// Column comment.
    pub comment: Option<String>,
}

impl Column {
    /// Creates a new column definition.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            unsigned: false,
            nullable: true,
            default: DefaultValue::None,
            auto_increment: false,
            collation: None,
            comment: None,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the numeric type unsigned.
    #[must_use]
    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = value;
        self
    }

    /// Marks the column auto-increment. Auto-increment columns are
    /// always NOT NULL.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self.nullable = false;
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Sets the column comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Returns the key classification of this column's type.
    #[must_use]
    pub fn key_kind(&self) -> Option<KeyKind> {
        self.column_type.key_kind()
    }
}

/// Index type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// The primary key.
    Primary,
    /// Unique index.
    Unique,
    /// Plain index.
    Index,
    /// Fulltext index (MySQL).
    Fulltext,
}

impl IndexKind {
    /// Returns true for kinds that guarantee uniqueness.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        matches!(self, Self::Primary | Self::Unique)
    }
}

/// Schema definition for an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// Index name. The primary key is always named `PRIMARY`.
    pub name: String,
    /// Index type.
    pub kind: IndexKind,
    /// Ordered columns included in the index.
    pub columns: Vec<String>,
    /// Whether the server created this index automatically (rowid
    /// primary keys, foreign-key backing indexes) rather than the user
    /// declaring it.
    #[serde(default)]
    pub implicit: bool,
}

/// Conventional name of the primary-key index.
pub const PRIMARY_INDEX: &str = "PRIMARY";

impl Index {
    /// Creates a plain index.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: IndexKind::Index,
            columns,
            implicit: false,
        }
    }

    /// Creates a unique index.
    #[must_use]
    pub fn unique(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: IndexKind::Unique,
            columns,
            implicit: false,
        }
    }

    /// Creates the primary-key index.
    #[must_use]
    pub fn primary(columns: Vec<String>) -> Self {
        Self {
            name: PRIMARY_INDEX.to_string(),
            kind: IndexKind::Primary,
            columns,
            implicit: false,
        }
    }

    /// Marks the index as server-created.
    #[must_use]
    pub fn implicit(mut self) -> Self {
        self.implicit = true;
        self
    }

    /// Returns true when the index's leading columns match `columns`.
    #[must_use]
    pub fn covers(&self, columns: &[String]) -> bool {
        columns.len() <= self.columns.len()
            && self.columns.iter().zip(columns).all(|(a, b)| a == b)
    }
}

/// Schema definition for a foreign-key constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Column(s) in the referencing table.
    pub columns: Vec<String>,
    /// Referenced table name.
    pub references_table: String,
    /// Referenced column(s).
    pub references_columns: Vec<String>,
    /// Action on update.
    #[serde(default)]
    pub on_update: RefAction,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: RefAction,
}

impl ForeignKey {
    /// Creates a new foreign key.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        references_table: impl Into<String>,
        references_columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            references_table: references_table.into(),
            references_columns,
            on_update: RefAction::NoAction,
            on_delete: RefAction::NoAction,
        }
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: RefAction) -> Self {
        self.on_update = action;
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: RefAction) -> Self {
        self.on_delete = action;
        self
    }
}

/// Complete schema definition for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Column definitions, in order.
    pub columns: Vec<Column>,
    /// Index definitions.
    pub indexes: Vec<Index>,
    /// Foreign-key definitions.
    pub foreign_keys: Vec<ForeignKey>,
    /// Storage engine (MySQL).
    #[serde(default)]
    pub engine: Option<String>,
    /// Default character set (MySQL).
    #[serde(default)]
    pub charset: Option<String>,
    /// Default collation (MySQL).
    #[serde(default)]
    pub collation: Option<String>,
}

impl Table {
    /// Creates a new empty table definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            engine: None,
            charset: None,
            collation: None,
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Gets an index by name.
    #[must_use]
    pub fn get_index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Gets a foreign key by name.
    #[must_use]
    pub fn get_foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.name == name)
    }

    /// Returns the primary-key index, if any.
    #[must_use]
    pub fn primary_index(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.kind == IndexKind::Primary)
    }

    /// Returns the auto-increment column, if any.
    #[must_use]
    pub fn auto_increment_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.auto_increment)
    }

    /// Returns true when some index's leading columns match `columns`.
    #[must_use]
    pub fn has_index_covering(&self, columns: &[String]) -> bool {
        self.indexes.iter().any(|i| i.covers(columns))
    }

    /// Returns true when a primary or unique index matches `columns`
    /// exactly, in order.
    #[must_use]
    pub fn has_unique_index_on(&self, columns: &[String]) -> bool {
        self.indexes
            .iter()
            .any(|i| i.kind.is_unique() && i.columns == columns)
    }
}

/// The set of tables the engine resolves changes against, usually the
/// introspected live database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// All known tables.
    pub tables: Vec<Table>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table.
    #[must_use]
    pub fn table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Gets a mutable table by name.
    #[must_use]
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    /// Returns table names.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_builder() {
        let col = Column::new("id", ColumnType::BigInt)
            .unsigned()
            .auto_increment();

        assert_eq!(col.name, "id");
        assert!(col.unsigned);
        assert!(col.auto_increment);
        assert!(!col.nullable);
    }

    #[test]
    fn test_default_value_to_sql() {
        assert_eq!(DefaultValue::None.to_sql(), None);
        assert_eq!(DefaultValue::Null.to_sql(), Some("NULL".to_string()));
        assert_eq!(DefaultValue::Bool(true).to_sql(), Some("1".to_string()));
        assert_eq!(DefaultValue::Integer(42).to_sql(), Some("42".to_string()));
        assert_eq!(
            DefaultValue::String("it's".to_string()).to_sql(),
            Some("'it''s'".to_string())
        );
        assert_eq!(
            DefaultValue::Expression("CURRENT_TIMESTAMP".to_string()).to_sql(),
            Some("CURRENT_TIMESTAMP".to_string())
        );
    }

    #[test]
    fn test_key_kinds() {
        assert_eq!(ColumnType::Int.key_kind(), Some(KeyKind::Integer));
        assert_eq!(ColumnType::Varchar(64).key_kind(), Some(KeyKind::Text));
        assert_eq!(ColumnType::DateTime.key_kind(), Some(KeyKind::DateTime));
        assert_eq!(ColumnType::Timestamp.key_kind(), Some(KeyKind::DateTime));
        assert_eq!(ColumnType::Text.key_kind(), None);
        assert_eq!(ColumnType::Blob.key_kind(), None);
        assert_eq!(ColumnType::Json.key_kind(), None);
    }

    #[test]
    fn test_ref_action_round_trip() {
        for action in [
            RefAction::NoAction,
            RefAction::Restrict,
            RefAction::Cascade,
            RefAction::SetNull,
            RefAction::SetDefault,
        ] {
            assert_eq!(RefAction::parse(action.as_sql()), Some(action));
        }
        assert_eq!(RefAction::parse("cascade"), Some(RefAction::Cascade));
        assert_eq!(RefAction::parse("bogus"), None);
    }

    #[test]
    fn test_index_covers_prefix() {
        let idx = Index::new("idx_ab", vec!["a".to_string(), "b".to_string()]);
        assert!(idx.covers(&["a".to_string()]));
        assert!(idx.covers(&["a".to_string(), "b".to_string()]));
        assert!(!idx.covers(&["b".to_string()]));
        assert!(!idx.covers(&["a".to_string(), "b".to_string(), "c".to_string()]));
    }

    #[test]
    fn test_table_lookups() {
        let table = Table::new("users")
            .column(Column::new("id", ColumnType::BigInt).auto_increment())
            .column(Column::new("email", ColumnType::Varchar(255)).not_null())
            .index(Index::primary(vec!["id".to_string()]))
            .index(Index::unique("uniq_email", vec!["email".to_string()]));

        assert!(table.get_column("email").is_some());
        assert!(table.get_column("missing").is_none());
        assert_eq!(table.primary_index().unwrap().columns, vec!["id"]);
        assert_eq!(table.auto_increment_column().unwrap().name, "id");
        assert!(table.has_unique_index_on(&["email".to_string()]));
        assert!(!table.has_unique_index_on(&["id".to_string(), "email".to_string()]));
    }

    #[test]
    fn test_catalog_lookups() {
        let catalog = Catalog::new()
            .table(Table::new("users"))
            .table(Table::new("posts"));

        assert!(catalog.get_table("users").is_some());
        assert!(catalog.get_table("comments").is_none());
        let names: Vec<&str> = catalog.table_names().collect();
        assert_eq!(names, vec!["users", "posts"]);
    }
}
