//! SQLite dialect.
//!
//! SQLite can add, rename and index columns in place, but cannot change
//! a column's definition, reorder columns, or touch constraints on an
//! existing table. Plans that need any of that take the copy-rebuild
//! route: copy the data aside, drop the original, create the definitive
//! table, copy the data back with old→new column remapping, drop the
//! copy. Tables whose foreign keys reference rebuilt columns are
//! rebuilt the same way, transitively.
//!
//! The executor suspends foreign-key checking around rebuild sequences;
//! statement generation here assumes that.

use crate::plan::TablePlan;
use crate::schema::{Column, ColumnType, DefaultValue, Index, IndexKind, Table, PRIMARY_INDEX};

use super::Dialect;

/// SQLite DDL generation.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns true when the plan cannot be expressed as in-place
    /// `ALTER TABLE` statements and the table must be rebuilt.
    #[must_use]
    pub fn requires_rebuild(&self, plan: &TablePlan) -> bool {
        if plan.create {
            return false;
        }
        !plan.redefined_columns.is_empty()
            || !plan.dropped_columns.is_empty()
            || !plan.positions.is_empty()
            || plan.foreign_keys_changed()
            || self.primary_key_changed(plan)
            || self.added_column_needs_rebuild(plan)
    }

    fn primary_key_changed(&self, plan: &TablePlan) -> bool {
        let touches_primary_name = plan
            .dropped_indexes
            .iter()
            .chain(&plan.added_indexes)
            .chain(&plan.altered_indexes)
            .any(|name| name == PRIMARY_INDEX);
        let touches_primary_kind = plan.table.indexes.iter().any(|i| {
            i.kind == IndexKind::Primary
                && (plan.added_indexes.contains(&i.name) || plan.altered_indexes.contains(&i.name))
        });
        touches_primary_name || touches_primary_kind
    }

    /// `ALTER TABLE ADD COLUMN` cannot add NOT NULL columns without a
    /// constant default, nor auto-increment columns.
    fn added_column_needs_rebuild(&self, plan: &TablePlan) -> bool {
        plan.table
            .columns
            .iter()
            .filter(|c| plan.added_columns.contains(&c.name))
            .any(|c| {
                c.auto_increment
                    || (!c.nullable && c.default == DefaultValue::None)
                    || matches!(c.default, DefaultValue::Expression(_))
            })
    }

    /// Returns the single-column auto-increment name when it can be
    /// declared inline as `INTEGER PRIMARY KEY AUTOINCREMENT`.
    fn inline_rowid_column<'t>(&self, table: &'t Table) -> Option<&'t str> {
        let auto = table.auto_increment_column()?;
        let primary = table.primary_index()?;
        if primary.columns.len() == 1 && primary.columns[0] == auto.name {
            Some(&auto.name)
        } else {
            None
        }
    }

    fn create_table_sql(&self, table: &Table) -> String {
        let inline = self.inline_rowid_column(table);
        let mut clauses: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                if inline == Some(c.name.as_str()) {
                    format!(
                        "{} INTEGER PRIMARY KEY AUTOINCREMENT",
                        self.quote(&c.name)
                    )
                } else {
                    self.column_sql(c)
                }
            })
            .collect();

        if inline.is_none() {
            if let Some(primary) = table.primary_index() {
                clauses.push(format!("PRIMARY KEY ({})", self.quote_list(&primary.columns)));
            }
        }
        for fk in &table.foreign_keys {
            clauses.push(self.foreign_key_clause(fk));
        }

        format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote(&table.name),
            clauses.join(",\n  ")
        )
    }

    fn create_index_sql(&self, table: &str, index: &Index) -> String {
        let unique = if index.kind == IndexKind::Unique {
            "UNIQUE "
        } else {
            ""
        };
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            unique,
            self.quote(&index.name),
            self.quote(table),
            self.quote_list(&index.columns)
        )
    }

    fn create_indexes(&self, table: &Table) -> Vec<String> {
        table
            .indexes
            .iter()
            .filter(|i| !i.implicit && i.kind != IndexKind::Primary)
            .map(|i| self.create_index_sql(&table.name, i))
            .collect()
    }

    /// The copy-rebuild sequence: temp copy, drop, create definitive,
    /// copy back with remapping, drop temp, recreate indexes.
    ///
    /// `plan` is given for the primary table so added columns are left
    /// out of the copy-back and renamed columns read from their old
    /// name; dependent rebuilds copy one-to-one.
    fn rebuild_statements(
        &self,
        table: &Table,
        old_name: &str,
        plan: Option<&TablePlan>,
    ) -> Vec<String> {
        let copy_name = format!("{old_name}__copy");
        let mut statements = vec![
            format!(
                "CREATE TABLE {} AS SELECT * FROM {}",
                self.quote(&copy_name),
                self.quote(old_name)
            ),
            format!("DROP TABLE {}", self.quote(old_name)),
            self.create_table_sql(table),
        ];

        let mut target_columns = Vec::new();
        let mut source_columns = Vec::new();
        for column in &table.columns {
            if let Some(plan) = plan {
                if plan.added_columns.contains(&column.name) {
                    continue;
                }
                source_columns.push(self.quote(plan.old_column_name(&column.name)));
            } else {
                source_columns.push(self.quote(&column.name));
            }
            target_columns.push(self.quote(&column.name));
        }
        statements.push(format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            self.quote(&table.name),
            target_columns.join(", "),
            source_columns.join(", "),
            self.quote(&copy_name)
        ));
        statements.push(format!("DROP TABLE {}", self.quote(&copy_name)));
        statements.extend(self.create_indexes(table));
        statements
    }

    fn in_place_statements(&self, plan: &TablePlan) -> Vec<String> {
        let mut statements = Vec::new();
        let table = self.quote(&plan.old_name);

        for name in plan.dropped_indexes.iter().chain(&plan.altered_indexes) {
            statements.push(format!("DROP INDEX {}", self.quote(name)));
        }
        for name in &plan.altered_columns {
            let old = plan.old_column_name(name);
            if old != name {
                statements.push(format!(
                    "ALTER TABLE {} RENAME COLUMN {} TO {}",
                    table,
                    self.quote(old),
                    self.quote(name)
                ));
            }
        }
        for column in plan
            .table
            .columns
            .iter()
            .filter(|c| plan.added_columns.contains(&c.name))
        {
            statements.push(format!(
                "ALTER TABLE {} ADD COLUMN {}",
                table,
                self.column_sql(column)
            ));
        }
        for index in plan.table.indexes.iter().filter(|i| {
            plan.added_indexes.contains(&i.name) || plan.altered_indexes.contains(&i.name)
        }) {
            statements.push(self.create_index_sql(&plan.old_name, index));
        }
        if plan.renamed() {
            statements.push(format!(
                "ALTER TABLE {} RENAME TO {}",
                table,
                self.quote(&plan.table.name)
            ));
        }
        statements
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote(&self, ident: &str) -> String {
        format!("\"{ident}\"")
    }

    fn type_sql(&self, column: &Column) -> String {
        let base = match &column.column_type {
            ColumnType::TinyInt => "TINYINT".to_string(),
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Int => "INTEGER".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Decimal(p, s) => format!("DECIMAL({p}, {s})"),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Double => "DOUBLE".to_string(),
            ColumnType::Char(n) => format!("CHAR({n})"),
            ColumnType::Varchar(n) => format!("VARCHAR({n})"),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::MediumText => "MEDIUMTEXT".to_string(),
            ColumnType::LongText => "LONGTEXT".to_string(),
            ColumnType::Binary(n) => format!("BINARY({n})"),
            ColumnType::VarBinary(n) => format!("VARBINARY({n})"),
            ColumnType::Blob => "BLOB".to_string(),
            ColumnType::MediumBlob => "MEDIUMBLOB".to_string(),
            ColumnType::LongBlob => "LONGBLOB".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::DateTime => "DATETIME".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Year => "YEAR".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Json => "JSON".to_string(),
        };
        // The declared type keeps the UNSIGNED marker; SQLite maps it
        // to INTEGER affinity anyway and introspection reads it back.
        if column.unsigned && column.column_type.accepts_unsigned() {
            format!("{base} UNSIGNED")
        } else {
            base
        }
    }

    fn column_sql(&self, column: &Column) -> String {
        let mut sql = format!("{} {}", self.quote(&column.name), self.type_sql(column));
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = column.default.to_sql() {
            sql.push_str(&format!(" DEFAULT {default}"));
        }
        sql
    }

    fn supports_alter_column(&self) -> bool {
        false
    }

    fn supports_add_constraint(&self) -> bool {
        false
    }

    fn create_table(&self, table: &Table) -> Vec<String> {
        let mut statements = vec![self.create_table_sql(table)];
        statements.extend(self.create_indexes(table));
        statements
    }

    fn render_plan(&self, plan: &TablePlan) -> Vec<String> {
        if plan.create {
            return self.create_table(&plan.table);
        }
        if plan.is_noop() {
            return Vec::new();
        }

        if self.requires_rebuild(plan) {
            let mut statements = self.rebuild_statements(&plan.table, &plan.old_name, Some(plan));
            for dep in &plan.dependents {
                statements.extend(self.rebuild_statements(&dep.table, &dep.table.name, None));
            }
            statements
        } else {
            // Renames propagate into referencing tables on their own;
            // dependent definitions need no DDL here.
            self.in_place_statements(plan)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ColumnChange, ForeignKeyChange, IndexChange, TableChange};
    use crate::merge::Resolver;
    use crate::schema::{Catalog, ForeignKey, RefAction};

    fn dialect() -> SqliteDialect {
        SqliteDialect::new()
    }

    fn catalog() -> Catalog {
        Catalog::new()
            .table(
                Table::new("users")
                    .column(Column::new("id", ColumnType::Int).auto_increment())
                    .column(Column::new("email", ColumnType::Varchar(255)).not_null())
                    .index(Index::primary(vec!["id".to_string()]))
                    .index(Index::unique("uniq_email", vec!["email".to_string()])),
            )
            .table(
                Table::new("posts")
                    .column(Column::new("id", ColumnType::Int).auto_increment())
                    .column(Column::new("user_id", ColumnType::Int).not_null())
                    .index(Index::primary(vec!["id".to_string()]))
                    .index(Index::new("idx_user", vec!["user_id".to_string()]))
                    .foreign_key(
                        ForeignKey::new(
                            "fk_posts_user",
                            vec!["user_id".to_string()],
                            "users",
                            vec!["id".to_string()],
                        )
                        .on_delete(RefAction::Cascade),
                    ),
            )
    }

    #[test]
    fn test_create_table_inlines_rowid_primary_key() {
        let catalog = catalog();
        let sql = dialect().create_table(catalog.get_table("users").unwrap());

        assert_eq!(sql.len(), 2);
        assert!(sql[0].contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(!sql[0].contains("PRIMARY KEY (\"id\")"));
        assert_eq!(
            sql[1],
            "CREATE UNIQUE INDEX \"uniq_email\" ON \"users\" (\"email\")"
        );
    }

    #[test]
    fn test_create_table_composite_primary_key() {
        let table = Table::new("follows")
            .column(Column::new("follower", ColumnType::Int).not_null())
            .column(Column::new("followed", ColumnType::Int).not_null())
            .index(Index::primary(vec![
                "follower".to_string(),
                "followed".to_string(),
            ]));

        let sql = dialect().create_table(&table);
        assert!(sql[0].contains("PRIMARY KEY (\"follower\", \"followed\")"));
    }

    #[test]
    fn test_in_place_add_rename_and_index() {
        let catalog = catalog();
        let change = TableChange::alter("users")
            .column(ColumnChange::add("nick", ColumnType::Varchar(32)))
            .column(ColumnChange::alter("email").rename_to("mail"))
            .index(IndexChange::drop("uniq_email"))
            .index(IndexChange::add(
                "uniq_mail",
                IndexKind::Unique,
                vec!["mail".to_string()],
            ));

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        assert!(!dialect().requires_rebuild(&plan));

        let sql = dialect().render_plan(&plan);
        assert_eq!(
            sql,
            vec![
                "DROP INDEX \"uniq_email\"".to_string(),
                "ALTER TABLE \"users\" RENAME COLUMN \"email\" TO \"mail\"".to_string(),
                "ALTER TABLE \"users\" ADD COLUMN \"nick\" VARCHAR(32)".to_string(),
                "CREATE UNIQUE INDEX \"uniq_mail\" ON \"users\" (\"mail\")".to_string(),
            ]
        );
    }

    #[test]
    fn test_retype_triggers_rebuild_sequence() {
        let catalog = catalog();
        let change = TableChange::alter("users")
            .column(ColumnChange::alter("email").set_type(ColumnType::Text).rename_to("bio"))
            .index(IndexChange::drop("uniq_email"));

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        assert!(dialect().requires_rebuild(&plan));

        let sql = dialect().render_plan(&plan);
        assert_eq!(
            sql[0],
            "CREATE TABLE \"users__copy\" AS SELECT * FROM \"users\""
        );
        assert_eq!(sql[1], "DROP TABLE \"users\"");
        assert!(sql[2].starts_with("CREATE TABLE \"users\" ("));
        assert!(sql[2].contains("\"bio\" TEXT NOT NULL"));
        // Copy back reads the renamed column from its old name.
        assert_eq!(
            sql[3],
            "INSERT INTO \"users\" (\"id\", \"bio\") SELECT \"id\", \"email\" FROM \"users__copy\""
        );
        assert_eq!(sql[4], "DROP TABLE \"users__copy\"");
    }

    #[test]
    fn test_rebuild_skips_added_columns_in_copy_back() {
        let catalog = catalog();
        // NOT NULL without default forces the rebuild path.
        let change = TableChange::alter("users").column(
            ColumnChange::add("karma", ColumnType::Int).set_nullable(false),
        );

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        assert!(dialect().requires_rebuild(&plan));

        let sql = dialect().render_plan(&plan);
        let copy_back = sql.iter().find(|s| s.starts_with("INSERT INTO")).unwrap();
        assert_eq!(
            copy_back,
            "INSERT INTO \"users\" (\"id\", \"email\") SELECT \"id\", \"email\" FROM \"users__copy\""
        );
    }

    #[test]
    fn test_foreign_key_change_triggers_rebuild() {
        let catalog = catalog();
        let change = TableChange::alter("posts").foreign_key(
            ForeignKeyChange::alter("fk_posts_user").set_on_delete(RefAction::SetNull),
        );

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        assert!(dialect().requires_rebuild(&plan));

        let sql = dialect().render_plan(&plan);
        assert!(sql[2].contains("ON DELETE SET NULL"));
    }

    #[test]
    fn test_dependent_tables_rebuilt_transitively() {
        let catalog = catalog();
        // Redefine the referenced column (comment only keeps the pair
        // compatible) so the referencing table must be regenerated.
        let change = TableChange::alter("users")
            .column(ColumnChange::alter("id").set_comment("surrogate key"));

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        let sql = dialect().render_plan(&plan);

        let posts_rebuild_start = sql
            .iter()
            .position(|s| s == "CREATE TABLE \"posts__copy\" AS SELECT * FROM \"posts\"")
            .expect("posts should be rebuilt");
        assert!(sql[posts_rebuild_start + 2].contains(
            "CONSTRAINT \"fk_posts_user\" FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\")"
        ));
        // The users rebuild comes first.
        assert!(sql[0].contains("\"users__copy\""));
    }

    #[test]
    fn test_rename_table_in_place() {
        let catalog = catalog();
        let change = TableChange::alter("users").rename_to("accounts");

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        assert!(!dialect().requires_rebuild(&plan));
        let sql = dialect().render_plan(&plan);
        assert_eq!(sql, vec!["ALTER TABLE \"users\" RENAME TO \"accounts\"".to_string()]);
    }

    #[test]
    fn test_noop_renders_nothing() {
        let catalog = catalog();
        let plan = Resolver::new(&catalog)
            .resolve(&TableChange::alter("posts"))
            .unwrap();
        assert!(dialect().render_plan(&plan).is_empty());
    }
}
