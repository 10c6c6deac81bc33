//! Schema-diff and DDL-generation engine.
//!
//! `tabula-schema` takes a declarative batch of add/alter/drop
//! operations for one table, merges it against the current database
//! structure, validates referential integrity up front, and renders
//! dialect-specific ordered DDL.
//!
//! # Architecture
//!
//! - **Schema** — dialect-neutral table/column/index/foreign-key model,
//!   usually produced by introspection.
//! - **Change** — declarative change requests with `add`/`alter`/`drop`
//!   command tags; `alter` inherits unset attributes.
//! - **Merge** — the resolver: three ordered passes (columns, indexes,
//!   foreign keys) with rename propagation and invariant validation,
//!   plus cross-table checks for foreign keys declared elsewhere.
//! - **Plan** — the resolved output a dialect renders.
//! - **Dialect** — MySQL emits direct `ALTER TABLE` DDL; SQLite falls
//!   back to the copy-rebuild strategy where needed.
//!
//! # Example
//!
//! ```rust
//! use tabula_schema::prelude::*;
//!
//! let catalog = Catalog::new().table(
//!     Table::new("users")
//!         .column(Column::new("id", ColumnType::BigInt).auto_increment())
//!         .column(Column::new("email", ColumnType::Varchar(255)).not_null())
//!         .index(Index::primary(vec!["id".to_string()])),
//! );
//!
//! let change = TableChange::alter("users")
//!     .column(ColumnChange::add("nick", ColumnType::Varchar(32)))
//!     .index(IndexChange::add(
//!         "uniq_nick",
//!         IndexKind::Unique,
//!         vec!["nick".to_string()],
//!     ));
//!
//! let plan = Resolver::new(&catalog).resolve(&change)?;
//! let ddl = MySqlDialect::new().render_plan(&plan);
//! assert!(ddl[0].contains("ADD COLUMN `nick` VARCHAR(32)"));
//! # Ok::<(), tabula_schema::error::SchemaError>(())
//! ```

pub mod change;
pub mod dialect;
pub mod error;
pub mod merge;
pub mod plan;
pub mod schema;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::change::{
        ChangeSet, ColumnChange, ColumnPosition, Command, ForeignKeyChange, IndexChange,
        TableChange,
    };
    pub use crate::dialect::{Dialect, MySqlDialect, SqliteDialect};
    pub use crate::error::{Result, SchemaError};
    pub use crate::merge::Resolver;
    pub use crate::plan::{DependentRewrite, TablePlan};
    pub use crate::schema::{
        Catalog, Column, ColumnType, DefaultValue, ForeignKey, Index, IndexKind, KeyKind,
        RefAction, Table, PRIMARY_INDEX,
    };
}
