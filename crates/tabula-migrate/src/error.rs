//! Error types for introspection and execution.

use std::path::PathBuf;

/// Errors raised while inspecting a live database or executing plans.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A change request violated a schema invariant.
    #[error("Schema error: {0}")]
    Schema(#[from] tabula_schema::error::SchemaError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading change-set or snapshot files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The live database reported a column type the engine does not
    /// model.
    #[error("Unsupported column type '{column_type}' on '{table}.{column}'")]
    UnsupportedType {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// The raw type string from database metadata.
        column_type: String,
    },

    /// The requested table does not exist in the live database.
    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    /// A journal record was expected but missing.
    #[error("Change set '{0}' is not recorded as applied")]
    NotApplied(String),

    /// The change-set file does not exist.
    #[error("Change set file not found: {0}")]
    ChangeSetNotFound(PathBuf),
}

/// Result type for migrate operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
