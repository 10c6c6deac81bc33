//! Live-schema introspection and transactional DDL execution.
//!
//! `tabula-migrate` is the operational half of the engine: it reads
//! table structures out of a running SQLite or MySQL database, feeds
//! them to the resolver in `tabula-schema`, and executes the resulting
//! plans inside transactions — with savepoint nesting and, for SQLite
//! rebuilds, foreign-key-check suspension. A change journal records
//! which named change sets have been applied.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabula_migrate::prelude::*;
//! use tabula_schema::prelude::*;
//!
//! let pool = sqlx::sqlite::SqlitePool::connect("sqlite:app.db").await?;
//! let catalog = SqliteInspector::new(pool.clone()).snapshot().await?;
//!
//! let change = TableChange::alter("users")
//!     .column(ColumnChange::add("nick", ColumnType::Varchar(32)));
//! let plan = Resolver::new(&catalog).resolve(&change)?;
//!
//! SqliteExecutor::new(pool).apply(&plan).await?;
//! ```

pub mod error;
pub mod executor;
pub mod inspect;
pub mod journal;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::{MySqlExecutor, SqliteExecutor};
    pub use crate::inspect::{parse_column_type, MySqlInspector, SqliteInspector};
    pub use crate::journal::{AppliedChange, ChangeJournal};
}
