//! Declarative change requests.
//!
//! A [`TableChange`] describes what a table should look like after the
//! change as a set of `add`/`alter`/`drop` operations on columns,
//! indexes and foreign keys. The resolver in [`crate::merge`] merges it
//! against the current structure; nothing here touches a database.

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnType, DefaultValue, IndexKind, RefAction};

/// What a single change request does to its target object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Create the object.
    Add,
    /// Modify the object; unset attributes keep their current value.
    Alter,
    /// Remove the object.
    Drop,
}

impl Command {
    /// Returns the lowercase keyword form, for error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Alter => "alter",
            Self::Drop => "drop",
        }
    }
}

/// Where a column should sit after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnPosition {
    /// First column of the table.
    First,
    /// Directly after the named column.
    After(String),
}

/// A requested column operation.
///
/// On `Alter`, every `None` attribute inherits the current column's
/// value, so a change request only states what actually changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnChange {
    /// The operation.
    pub command: Command,
    /// Target column name (the current name when altering).
    pub name: String,
    /// New name, when renaming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    /// Requested position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<ColumnPosition>,
    /// New data type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<ColumnType>,
    /// New signedness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsigned: Option<bool>,
    /// New nullability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// New default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// New auto-increment flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_increment: Option<bool>,
    /// New collation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// New comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnChange {
    fn new(command: Command, name: impl Into<String>) -> Self {
        Self {
            command,
            name: name.into(),
            rename: None,
            position: None,
            column_type: None,
            unsigned: None,
            nullable: None,
            default: None,
            auto_increment: None,
            collation: None,
            comment: None,
        }
    }

    /// Requests a new column of the given type.
    #[must_use]
    pub fn add(name: impl Into<String>, column_type: ColumnType) -> Self {
        let mut change = Self::new(Command::Add, name);
        change.column_type = Some(column_type);
        change
    }

    /// Requests an alteration of an existing column.
    #[must_use]
    pub fn alter(name: impl Into<String>) -> Self {
        Self::new(Command::Alter, name)
    }

    /// Requests dropping an existing column.
    #[must_use]
    pub fn drop(name: impl Into<String>) -> Self {
        Self::new(Command::Drop, name)
    }

    /// Renames the column.
    #[must_use]
    pub fn rename_to(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    /// Places the column first.
    #[must_use]
    pub fn first(mut self) -> Self {
        self.position = Some(ColumnPosition::First);
        self
    }

    /// Places the column after another.
    #[must_use]
    pub fn after(mut self, column: impl Into<String>) -> Self {
        self.position = Some(ColumnPosition::After(column.into()));
        self
    }

    /// Sets the data type.
    #[must_use]
    pub fn set_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    /// Sets the signedness.
    #[must_use]
    pub fn set_unsigned(mut self, unsigned: bool) -> Self {
        self.unsigned = Some(unsigned);
        self
    }

    /// Sets the nullability.
    #[must_use]
    pub fn set_nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn set_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Sets the auto-increment flag.
    #[must_use]
    pub fn set_auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = Some(auto_increment);
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn set_collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn set_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// A requested index operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexChange {
    /// The operation.
    pub command: Command,
    /// Target index name (`PRIMARY` for the primary key).
    pub name: String,
    /// Index type; inherited on alter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<IndexKind>,
    /// Column list; inherited on alter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

impl IndexChange {
    /// Requests a new index.
    #[must_use]
    pub fn add(name: impl Into<String>, kind: IndexKind, columns: Vec<String>) -> Self {
        Self {
            command: Command::Add,
            name: name.into(),
            kind: Some(kind),
            columns: Some(columns),
        }
    }

    /// Requests a new primary key.
    #[must_use]
    pub fn add_primary(columns: Vec<String>) -> Self {
        Self::add(crate::schema::PRIMARY_INDEX, IndexKind::Primary, columns)
    }

    /// Requests an alteration of an existing index.
    #[must_use]
    pub fn alter(name: impl Into<String>) -> Self {
        Self {
            command: Command::Alter,
            name: name.into(),
            kind: None,
            columns: None,
        }
    }

    /// Requests dropping an existing index.
    #[must_use]
    pub fn drop(name: impl Into<String>) -> Self {
        Self {
            command: Command::Drop,
            name: name.into(),
            kind: None,
            columns: None,
        }
    }

    /// Sets the column list.
    #[must_use]
    pub fn set_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Sets the index type.
    #[must_use]
    pub fn set_kind(mut self, kind: IndexKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// A requested foreign-key operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyChange {
    /// The operation.
    pub command: Command,
    /// Target constraint name.
    pub name: String,
    /// Local column list; inherited on alter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Referenced table; inherited on alter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references_table: Option<String>,
    /// Referenced column list; inherited on alter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references_columns: Option<Vec<String>>,
    /// ON UPDATE action; inherited on alter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<RefAction>,
    /// ON DELETE action; inherited on alter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<RefAction>,
}

impl ForeignKeyChange {
    /// Requests a new foreign key.
    #[must_use]
    pub fn add(
        name: impl Into<String>,
        columns: Vec<String>,
        references_table: impl Into<String>,
        references_columns: Vec<String>,
    ) -> Self {
        Self {
            command: Command::Add,
            name: name.into(),
            columns: Some(columns),
            references_table: Some(references_table.into()),
            references_columns: Some(references_columns),
            on_update: None,
            on_delete: None,
        }
    }

    /// Requests an alteration of an existing foreign key.
    #[must_use]
    pub fn alter(name: impl Into<String>) -> Self {
        Self {
            command: Command::Alter,
            name: name.into(),
            columns: None,
            references_table: None,
            references_columns: None,
            on_update: None,
            on_delete: None,
        }
    }

    /// Requests dropping an existing foreign key.
    #[must_use]
    pub fn drop(name: impl Into<String>) -> Self {
        Self {
            command: Command::Drop,
            name: name.into(),
            columns: None,
            references_table: None,
            references_columns: None,
            on_update: None,
            on_delete: None,
        }
    }

    /// Sets the local column list.
    #[must_use]
    pub fn set_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Sets the referenced table and columns.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>, columns: Vec<String>) -> Self {
        self.references_table = Some(table.into());
        self.references_columns = Some(columns);
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn set_on_update(mut self, action: RefAction) -> Self {
        self.on_update = Some(action);
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn set_on_delete(mut self, action: RefAction) -> Self {
        self.on_delete = Some(action);
        self
    }
}

/// A complete change request for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableChange {
    /// Target table name (the current name when altering).
    pub table: String,
    /// Build a new table rather than alter an existing one.
    #[serde(default)]
    pub create: bool,
    /// New table name, when renaming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    /// Storage engine override (MySQL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    /// Character-set override (MySQL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    /// Collation override (MySQL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// Column operations.
    #[serde(default)]
    pub columns: Vec<ColumnChange>,
    /// Index operations.
    #[serde(default)]
    pub indexes: Vec<IndexChange>,
    /// Foreign-key operations.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyChange>,
}

impl TableChange {
    fn new(table: impl Into<String>, create: bool) -> Self {
        Self {
            table: table.into(),
            create,
            rename: None,
            engine: None,
            charset: None,
            collation: None,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Starts a change that builds a new table.
    #[must_use]
    pub fn create(table: impl Into<String>) -> Self {
        Self::new(table, true)
    }

    /// Starts a change that alters an existing table.
    #[must_use]
    pub fn alter(table: impl Into<String>) -> Self {
        Self::new(table, false)
    }

    /// Renames the table.
    #[must_use]
    pub fn rename_to(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    /// Sets the storage engine.
    #[must_use]
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    /// Sets the character set.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Adds a column operation.
    #[must_use]
    pub fn column(mut self, change: ColumnChange) -> Self {
        self.columns.push(change);
        self
    }

    /// Adds an index operation.
    #[must_use]
    pub fn index(mut self, change: IndexChange) -> Self {
        self.indexes.push(change);
        self
    }

    /// Adds a foreign-key operation.
    #[must_use]
    pub fn foreign_key(mut self, change: ForeignKeyChange) -> Self {
        self.foreign_keys.push(change);
        self
    }

    /// Returns true if the change requests nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.create
            && self.rename.is_none()
            && self.engine.is_none()
            && self.charset.is_none()
            && self.collation.is_none()
            && self.columns.is_empty()
            && self.indexes.is_empty()
            && self.foreign_keys.is_empty()
    }
}

/// A named batch of table changes, the unit the CLI applies and
/// journals. Deserializable from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Batch name, recorded in the journal.
    pub name: String,
    /// Table changes, applied in order.
    pub changes: Vec<TableChange>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            changes: Vec::new(),
        }
    }

    /// Adds a table change.
    #[must_use]
    pub fn change(mut self, change: TableChange) -> Self {
        self.changes.push(change);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_change_builders() {
        let add = ColumnChange::add("email", ColumnType::Varchar(255));
        assert_eq!(add.command, Command::Add);
        assert_eq!(add.column_type, Some(ColumnType::Varchar(255)));

        let alter = ColumnChange::alter("email")
            .rename_to("mail")
            .set_nullable(false)
            .after("id");
        assert_eq!(alter.command, Command::Alter);
        assert_eq!(alter.rename.as_deref(), Some("mail"));
        assert_eq!(alter.nullable, Some(false));
        assert_eq!(alter.position, Some(ColumnPosition::After("id".to_string())));
        assert!(alter.column_type.is_none());
    }

    #[test]
    fn test_table_change_builders() {
        let change = TableChange::create("users")
            .column(ColumnChange::add("id", ColumnType::BigInt).set_auto_increment(true))
            .index(IndexChange::add_primary(vec!["id".to_string()]));

        assert!(change.create);
        assert_eq!(change.columns.len(), 1);
        assert_eq!(change.indexes[0].name, "PRIMARY");
        assert!(!change.is_empty());
        assert!(TableChange::alter("users").is_empty());
    }

    #[test]
    fn test_change_set_json_round_trip() {
        let set = ChangeSet::new("0002_emails")
            .change(
                TableChange::alter("users")
                    .column(
                        ColumnChange::add("email", ColumnType::Varchar(255))
                            .set_nullable(false)
                            .set_collation("utf8mb4_general_ci"),
                    )
                    .index(IndexChange::add(
                        "uniq_email",
                        IndexKind::Unique,
                        vec!["email".to_string()],
                    )),
            );

        let json = serde_json::to_string(&set).unwrap();
        let back: ChangeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
    }

    #[test]
    fn test_change_set_from_plain_json() {
        let json = r#"{
            "name": "0001_initial",
            "changes": [{
                "table": "users",
                "create": true,
                "columns": [
                    {"command": "add", "name": "id", "column_type": "big_int", "auto_increment": true, "nullable": false},
                    {"command": "add", "name": "email", "column_type": {"varchar": 255}}
                ],
                "indexes": [
                    {"command": "add", "name": "PRIMARY", "kind": "primary", "columns": ["id"]}
                ]
            }]
        }"#;

        let set: ChangeSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.changes.len(), 1);
        assert!(set.changes[0].create);
        assert_eq!(
            set.changes[0].columns[1].column_type,
            Some(ColumnType::Varchar(255))
        );
    }
}
