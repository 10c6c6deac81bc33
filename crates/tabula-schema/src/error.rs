//! Error types for schema resolution.
//!
//! Every invariant the resolver enforces maps to a descriptive variant
//! here, raised before any DDL is rendered or executed.

/// Errors raised while merging a change request against a live schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The target table does not exist in the catalog.
    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    /// A table with that name already exists.
    #[error("Table '{0}' already exists")]
    TableExists(String),

    /// Add requested for a column name that is already taken.
    #[error("Column '{column}' already exists in table '{table}'")]
    ColumnExists {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Alter/drop requested for a column that does not exist.
    #[error("Column '{column}' does not exist in table '{table}'")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Alter/drop commands are not valid when creating a table.
    #[error("Cannot {command} '{name}' while creating table '{table}'")]
    InvalidCreateCommand {
        /// Table being created.
        table: String,
        /// The offending command (`alter` or `drop`).
        command: String,
        /// Target object name.
        name: String,
    },

    /// Add requested for a column without a data type.
    #[error("Column '{column}' added to table '{table}' has no data type")]
    MissingColumnType {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A column position referenced a column that does not exist.
    #[error("Cannot place column '{column}' after unknown column '{after}' in table '{table}'")]
    PositionNotFound {
        /// Table name.
        table: String,
        /// Column being placed.
        column: String,
        /// The missing anchor column.
        after: String,
    },

    /// More than one auto-increment column after the merge.
    #[error("Table '{table}' would have multiple auto-increment columns ('{first}' and '{second}')")]
    MultipleAutoIncrement {
        /// Table name.
        table: String,
        /// First auto-increment column.
        first: String,
        /// Second auto-increment column.
        second: String,
    },

    /// The auto-increment column is not covered by the primary key.
    #[error("Auto-increment column '{column}' in table '{table}' must be covered by the primary key")]
    AutoIncrementNotPrimary {
        /// Table name.
        table: String,
        /// The auto-increment column.
        column: String,
    },

    /// More than one primary index after the merge.
    #[error("Table '{table}' would have multiple primary keys ('{first}' and '{second}')")]
    MultiplePrimaryKeys {
        /// Table name.
        table: String,
        /// First primary index name.
        first: String,
        /// Second primary index name.
        second: String,
    },

    /// Add requested for an index name that is already taken.
    #[error("Index '{index}' already exists on table '{table}'")]
    IndexExists {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
    },

    /// Alter/drop requested for an index that does not exist.
    #[error("Index '{index}' does not exist on table '{table}'")]
    IndexNotFound {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
    },

    /// An index definition has no columns.
    #[error("Index '{index}' on table '{table}' has no columns")]
    EmptyIndex {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
    },

    /// An index references a column the merge leaves missing.
    #[error(
        "Index '{index}' on table '{table}' references column '{column}' \
         which is dropped or unknown; drop or alter the index in the same change"
    )]
    IndexColumnMissing {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
        /// Missing column.
        column: String,
    },

    /// Add requested for a foreign-key name that is already taken.
    #[error("Foreign key '{constraint}' already exists on table '{table}'")]
    ForeignKeyExists {
        /// Table name.
        table: String,
        /// Constraint name.
        constraint: String,
    },

    /// Alter/drop requested for a foreign key that does not exist.
    #[error("Foreign key '{constraint}' does not exist on table '{table}'")]
    ForeignKeyNotFound {
        /// Table name.
        table: String,
        /// Constraint name.
        constraint: String,
    },

    /// A foreign key's local column the merge leaves missing.
    #[error(
        "Foreign key '{constraint}' on table '{table}' uses column '{column}' \
         which is dropped or unknown; drop or alter the constraint in the same change"
    )]
    ForeignKeyColumnMissing {
        /// Table name.
        table: String,
        /// Constraint name.
        constraint: String,
        /// Missing column.
        column: String,
    },

    /// Add requested for a foreign key without columns or references.
    #[error("Foreign key '{constraint}' added to table '{table}' is missing columns or references")]
    IncompleteForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        constraint: String,
    },

    /// Local and referenced column counts differ.
    #[error(
        "Foreign key '{constraint}' on table '{table}' maps {local} local \
         column(s) to {referenced} referenced column(s)"
    )]
    ForeignKeyArity {
        /// Table name.
        table: String,
        /// Constraint name.
        constraint: String,
        /// Local column count.
        local: usize,
        /// Referenced column count.
        referenced: usize,
    },

    /// The referenced table does not exist.
    #[error("Foreign key '{constraint}' on table '{table}' references unknown table '{references}'")]
    ReferencedTableNotFound {
        /// Table name.
        table: String,
        /// Constraint name.
        constraint: String,
        /// Referenced table name.
        references: String,
    },

    /// A referenced column does not exist in the referenced table.
    #[error(
        "Foreign key '{constraint}' on table '{table}' references unknown \
         column '{references}.{column}'"
    )]
    ReferencedColumnNotFound {
        /// Table name.
        table: String,
        /// Constraint name.
        constraint: String,
        /// Referenced table name.
        references: String,
        /// Missing referenced column.
        column: String,
    },

    /// Local and referenced column types are incompatible.
    #[error(
        "Foreign key '{constraint}' on table '{table}': column '{local}' is \
         incompatible with '{references}.{referenced}' ({reason})"
    )]
    IncompatibleKeyColumns {
        /// Table name.
        table: String,
        /// Constraint name.
        constraint: String,
        /// Local column name.
        local: String,
        /// Referenced table name.
        references: String,
        /// Referenced column name.
        referenced: String,
        /// Human-readable mismatch description.
        reason: String,
    },

    /// The local column list is not covered by any index.
    #[error(
        "Foreign key '{constraint}' on table '{table}' requires an index \
         covering ({columns})"
    )]
    ForeignKeyNotIndexed {
        /// Table name.
        table: String,
        /// Constraint name.
        constraint: String,
        /// The uncovered column list.
        columns: String,
    },

    /// The referenced columns are not a primary or unique key.
    #[error(
        "Foreign key '{constraint}' on table '{table}' references \
         ({columns}) in '{references}' which is not a primary or unique key"
    )]
    ReferencedColumnsNotUnique {
        /// Table name.
        table: String,
        /// Constraint name.
        constraint: String,
        /// Referenced table name.
        references: String,
        /// The referenced column list.
        columns: String,
    },

    /// A column referenced by another table's foreign key was dropped.
    #[error(
        "Column '{table}.{column}' is referenced by foreign key \
         '{constraint}' on table '{referencing}' and cannot be dropped"
    )]
    ReferencedColumnDropped {
        /// Table owning the dropped column.
        table: String,
        /// The dropped column.
        column: String,
        /// Table whose foreign key references it.
        referencing: String,
        /// The dependent constraint name.
        constraint: String,
    },
}

/// Result type for schema resolution.
pub type Result<T> = std::result::Result<T, SchemaError>;
