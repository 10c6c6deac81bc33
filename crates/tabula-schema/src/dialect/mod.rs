//! Database dialect implementations.
//!
//! Each dialect renders a resolved [`TablePlan`] into ordered DDL
//! statements specific to that database system. MySQL alters tables in
//! place; SQLite falls back to the copy-rebuild strategy for anything
//! it cannot express as an `ALTER TABLE`.

mod mysql;
mod sqlite;

pub use mysql::MySqlDialect;
pub use sqlite::SqliteDialect;

use crate::plan::TablePlan;
use crate::schema::{Column, ForeignKey, RefAction, Table};

/// Trait for database-specific DDL generation.
pub trait Dialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Quotes an identifier (table name, column name, etc.).
    fn quote(&self, ident: &str) -> String;

    /// Renders the SQL type of a column, including signedness where the
    /// dialect supports it.
    fn type_sql(&self, column: &Column) -> String;

    /// Renders a full column definition clause.
    fn column_sql(&self, column: &Column) -> String;

    /// Returns whether this dialect can alter a column definition in
    /// place.
    fn supports_alter_column(&self) -> bool;

    /// Returns whether this dialect can add or drop constraints on an
    /// existing table.
    fn supports_add_constraint(&self) -> bool;

    /// Renders the statements that build a table from scratch.
    fn create_table(&self, table: &Table) -> Vec<String>;

    /// Renders the ordered statements for a resolved plan. Returns an
    /// empty list for a no-op plan.
    fn render_plan(&self, plan: &TablePlan) -> Vec<String>;

    /// Quotes and joins a column list.
    fn quote_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Renders a foreign-key constraint clause.
    fn foreign_key_clause(&self, fk: &ForeignKey) -> String {
        let mut sql = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote(&fk.name),
            self.quote_list(&fk.columns),
            self.quote(&fk.references_table),
            self.quote_list(&fk.references_columns),
        );
        if fk.on_update != RefAction::NoAction {
            sql.push_str(" ON UPDATE ");
            sql.push_str(fk.on_update.as_sql());
        }
        if fk.on_delete != RefAction::NoAction {
            sql.push_str(" ON DELETE ");
            sql.push_str(fk.on_delete.as_sql());
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    #[test]
    fn test_foreign_key_clause_actions() {
        let dialect = SqliteDialect::new();
        let fk = ForeignKey::new(
            "fk_posts_user",
            vec!["user_id".to_string()],
            "users",
            vec!["id".to_string()],
        )
        .on_delete(RefAction::Cascade);

        let clause = dialect.foreign_key_clause(&fk);
        assert_eq!(
            clause,
            "CONSTRAINT \"fk_posts_user\" FOREIGN KEY (\"user_id\") \
             REFERENCES \"users\" (\"id\") ON DELETE CASCADE"
        );
    }

    #[test]
    fn test_dialect_capabilities() {
        assert!(MySqlDialect::new().supports_alter_column());
        assert!(MySqlDialect::new().supports_add_constraint());
        assert!(!SqliteDialect::new().supports_alter_column());
        assert!(!SqliteDialect::new().supports_add_constraint());
    }

    #[test]
    fn test_quoting_differs() {
        let column = Column::new("id", ColumnType::BigInt);
        assert!(MySqlDialect::new().column_sql(&column).starts_with("`id`"));
        assert!(SqliteDialect::new().column_sql(&column).starts_with("\"id\""));
    }
}
