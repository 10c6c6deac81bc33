//! MySQL dialect.
//!
//! MySQL can express every plan as direct `ALTER TABLE` DDL. Statement
//! order matters when constraints are involved: dependent foreign keys
//! in other tables are dropped first, re-created last, and the table
//! rename happens before constraints that reference the new name.

use crate::change::ColumnPosition;
use crate::plan::TablePlan;
use crate::schema::{Column, ColumnType, Index, IndexKind, Table, PRIMARY_INDEX};

use super::Dialect;

/// MySQL DDL generation.
#[derive(Debug, Clone, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn index_clause(&self, index: &Index) -> String {
        match index.kind {
            IndexKind::Primary => format!("PRIMARY KEY ({})", self.quote_list(&index.columns)),
            IndexKind::Unique => format!(
                "UNIQUE KEY {} ({})",
                self.quote(&index.name),
                self.quote_list(&index.columns)
            ),
            IndexKind::Index => format!(
                "KEY {} ({})",
                self.quote(&index.name),
                self.quote_list(&index.columns)
            ),
            IndexKind::Fulltext => format!(
                "FULLTEXT KEY {} ({})",
                self.quote(&index.name),
                self.quote_list(&index.columns)
            ),
        }
    }

    fn position_clause(&self, position: &ColumnPosition) -> String {
        match position {
            ColumnPosition::First => " FIRST".to_string(),
            ColumnPosition::After(column) => format!(" AFTER {}", self.quote(column)),
        }
    }

    fn table_options(&self, table: &Table) -> String {
        let mut options = String::new();
        if let Some(engine) = &table.engine {
            options.push_str(&format!(" ENGINE={engine}"));
        }
        if let Some(charset) = &table.charset {
            options.push_str(&format!(" DEFAULT CHARSET={charset}"));
        }
        if let Some(collation) = &table.collation {
            options.push_str(&format!(" COLLATE={collation}"));
        }
        options
    }

    fn drop_index_clause(&self, name: &str) -> String {
        if name == PRIMARY_INDEX {
            "DROP PRIMARY KEY".to_string()
        } else {
            format!("DROP INDEX {}", self.quote(name))
        }
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote(&self, ident: &str) -> String {
        format!("`{ident}`")
    }

    fn type_sql(&self, column: &Column) -> String {
        let base = match &column.column_type {
            ColumnType::TinyInt => "TINYINT".to_string(),
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Int => "INT".to_string(),
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
            ColumnType::Boolean => "TINYINT(1)".to_string(),
            ColumnType::Json => "JSON".to_string(),
        };
        if column.unsigned && column.column_type.accepts_unsigned() {
            format!("{base} UNSIGNED")
        } else {
            base
        }
    }

    fn column_sql(&self, column: &Column) -> String {
        let mut sql = format!("{} {}", self.quote(&column.name), self.type_sql(column));
        if column.column_type.is_character() {
            if let Some(collation) = &column.collation {
                sql.push_str(&format!(" COLLATE {collation}"));
            }
        }
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = column.default.to_sql() {
            sql.push_str(&format!(" DEFAULT {default}"));
        }
        if column.auto_increment {
            sql.push_str(" AUTO_INCREMENT");
        }
        if let Some(comment) = &column.comment {
            sql.push_str(&format!(" COMMENT '{}'", comment.replace('\'', "''")));
        }
        sql
    }

    fn supports_alter_column(&self) -> bool {
        true
    }

    fn supports_add_constraint(&self) -> bool {
        true
    }

    fn create_table(&self, table: &Table) -> Vec<String> {
        let mut clauses: Vec<String> =
            table.columns.iter().map(|c| self.column_sql(c)).collect();

        for index in table.indexes.iter().filter(|i| !i.implicit) {
            clauses.push(self.index_clause(index));
        }
        for fk in &table.foreign_keys {
            clauses.push(self.foreign_key_clause(fk));
        }

        vec![format!(
            "CREATE TABLE {} (\n  {}\n){}",
            self.quote(&table.name),
            clauses.join(",\n  "),
            self.table_options(table),
        )]
    }

    fn render_plan(&self, plan: &TablePlan) -> Vec<String> {
        if plan.create {
            return self.create_table(&plan.table);
        }
        if plan.is_noop() {
            return Vec::new();
        }

        let mut statements = Vec::new();
        let old_table = self.quote(&plan.old_name);

        // Dependent constraints out of the way first.
        for dep in &plan.dependents {
            for name in &dep.rewritten {
                statements.push(format!(
                    "ALTER TABLE {} DROP FOREIGN KEY {}",
                    self.quote(&dep.table.name),
                    self.quote(name)
                ));
            }
        }

        // Own constraints being dropped or redefined.
        for name in plan
            .dropped_foreign_keys
            .iter()
            .chain(&plan.altered_foreign_keys)
        {
            statements.push(format!(
                "ALTER TABLE {} DROP FOREIGN KEY {}",
                old_table,
                self.quote(name)
            ));
        }

        let mut clauses = Vec::new();
        for name in plan.dropped_indexes.iter().chain(&plan.altered_indexes) {
            clauses.push(self.drop_index_clause(name));
        }
        for name in &plan.dropped_columns {
            clauses.push(format!("DROP COLUMN {}", self.quote(name)));
        }
        for column in plan
            .table
            .columns
            .iter()
            .filter(|c| plan.altered_columns.contains(&c.name))
        {
            let mut clause = format!(
                "CHANGE COLUMN {} {}",
                self.quote(plan.old_column_name(&column.name)),
                self.column_sql(column)
            );
            if let Some(position) = plan.positions.get(&column.name) {
                clause.push_str(&self.position_clause(position));
            }
            clauses.push(clause);
        }
        for column in plan
            .table
            .columns
            .iter()
            .filter(|c| plan.added_columns.contains(&c.name))
        {
            let mut clause = format!("ADD COLUMN {}", self.column_sql(column));
            if let Some(position) = plan.positions.get(&column.name) {
                clause.push_str(&self.position_clause(position));
            }
            clauses.push(clause);
        }
        for index in plan.table.indexes.iter().filter(|i| {
            plan.added_indexes.contains(&i.name) || plan.altered_indexes.contains(&i.name)
        }) {
            clauses.push(format!("ADD {}", self.index_clause(index)));
        }
        if plan.options_changed {
            if let Some(engine) = &plan.table.engine {
                clauses.push(format!("ENGINE={engine}"));
            }
            if let Some(charset) = &plan.table.charset {
                clauses.push(format!("DEFAULT CHARSET={charset}"));
            }
            if let Some(collation) = &plan.table.collation {
                clauses.push(format!("COLLATE={collation}"));
            }
        }
        if !clauses.is_empty() {
            statements.push(format!(
                "ALTER TABLE {}\n  {}",
                old_table,
                clauses.join(",\n  ")
            ));
        }

        // Rename before adding constraints that reference the new name.
        if plan.renamed() {
            statements.push(format!(
                "ALTER TABLE {} RENAME TO {}",
                old_table,
                self.quote(&plan.table.name)
            ));
        }

        let final_table = self.quote(&plan.table.name);
        for fk in plan.table.foreign_keys.iter().filter(|fk| {
            plan.added_foreign_keys.contains(&fk.name)
                || plan.altered_foreign_keys.contains(&fk.name)
        }) {
            statements.push(format!(
                "ALTER TABLE {} ADD {}",
                final_table,
                self.foreign_key_clause(fk)
            ));
        }

        for dep in &plan.dependents {
            for fk in dep
                .table
                .foreign_keys
                .iter()
                .filter(|fk| dep.rewritten.contains(&fk.name))
            {
                statements.push(format!(
                    "ALTER TABLE {} ADD {}",
                    self.quote(&dep.table.name),
                    self.foreign_key_clause(fk)
                ));
            }
        }

        statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ColumnChange, ForeignKeyChange, IndexChange, TableChange};
    use crate::merge::Resolver;
    use crate::schema::{Catalog, ForeignKey, RefAction};

    fn dialect() -> MySqlDialect {
        MySqlDialect::new()
    }

    fn catalog() -> Catalog {
        Catalog::new()
            .table(
                Table::new("users")
                    .column(
                        Column::new("id", ColumnType::BigInt)
                            .unsigned()
                            .auto_increment(),
                    )
                    .column(Column::new("email", ColumnType::Varchar(255)).not_null())
                    .index(Index::primary(vec!["id".to_string()]))
                    .index(Index::unique("uniq_email", vec!["email".to_string()])),
            )
            .table(
                Table::new("posts")
                    .column(
                        Column::new("id", ColumnType::BigInt)
                            .unsigned()
                            .auto_increment(),
                    )
                    .column(
                        Column::new("user_id", ColumnType::BigInt)
                            .unsigned()
                            .not_null(),
                    )
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
    fn test_create_table() {
        let catalog = catalog();
        let sql = dialect().create_table(catalog.get_table("posts").unwrap());
        assert_eq!(sql.len(), 1);
        assert!(sql[0].starts_with("CREATE TABLE `posts` ("));
        assert!(sql[0].contains("`id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT"));
        assert!(sql[0].contains("PRIMARY KEY (`id`)"));
        assert!(sql[0].contains("KEY `idx_user` (`user_id`)"));
        assert!(sql[0].contains(
            "CONSTRAINT `fk_posts_user` FOREIGN KEY (`user_id`) \
             REFERENCES `users` (`id`) ON DELETE CASCADE"
        ));
    }

    #[test]
    fn test_create_table_options() {
        let table = Table {
            engine: Some("InnoDB".to_string()),
            charset: Some("utf8mb4".to_string()),
            collation: Some("utf8mb4_general_ci".to_string()),
            ..Table::new("tags")
        }
        .column(Column::new("id", ColumnType::Int));

        let sql = dialect().create_table(&table);
        assert!(sql[0].ends_with("ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_general_ci"));
    }

    #[test]
    fn test_boolean_renders_tinyint1() {
        let column = Column::new("active", ColumnType::Boolean).not_null();
        assert_eq!(dialect().column_sql(&column), "`active` TINYINT(1) NOT NULL");
    }

    #[test]
    fn test_noop_plan_renders_nothing() {
        let catalog = catalog();
        let plan = Resolver::new(&catalog)
            .resolve(&TableChange::alter("users"))
            .unwrap();
        assert!(dialect().render_plan(&plan).is_empty());
    }

    #[test]
    fn test_alter_fragments_in_one_statement() {
        let catalog = catalog();
        let change = TableChange::alter("users")
            .column(ColumnChange::add("nick", ColumnType::Varchar(32)).after("id"))
            .column(ColumnChange::alter("email").rename_to("mail"))
            .index(IndexChange::drop("uniq_email"))
            .index(IndexChange::add(
                "uniq_mail",
                IndexKind::Unique,
                vec!["mail".to_string()],
            ));

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        let sql = dialect().render_plan(&plan);
        assert_eq!(sql.len(), 1);
        assert!(sql[0].starts_with("ALTER TABLE `users`"));
        assert!(sql[0].contains("DROP INDEX `uniq_email`"));
        assert!(sql[0].contains("CHANGE COLUMN `email` `mail` VARCHAR(255) NOT NULL"));
        assert!(sql[0].contains("ADD COLUMN `nick` VARCHAR(32) AFTER `id`"));
        assert!(sql[0].contains("ADD UNIQUE KEY `uniq_mail` (`mail`)"));
    }

    #[test]
    fn test_rename_referenced_column_repoints_dependents() {
        let catalog = catalog();
        let change = TableChange::alter("users")
            .column(ColumnChange::alter("id").rename_to("user_id"));

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        let sql = dialect().render_plan(&plan);

        assert_eq!(
            sql.first().unwrap(),
            "ALTER TABLE `posts` DROP FOREIGN KEY `fk_posts_user`"
        );
        assert!(sql[1].contains("CHANGE COLUMN `id` `user_id`"));
        assert!(sql.last().unwrap().contains(
            "ALTER TABLE `posts` ADD CONSTRAINT `fk_posts_user` FOREIGN KEY (`user_id`) \
             REFERENCES `users` (`user_id`)"
        ));
    }

    #[test]
    fn test_table_rename_orders_constraint_adds_after_rename() {
        let catalog = catalog();
        let change = TableChange::alter("users").rename_to("accounts");

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        let sql = dialect().render_plan(&plan);

        let drop_at = sql
            .iter()
            .position(|s| s.contains("DROP FOREIGN KEY"))
            .unwrap();
        let rename_at = sql
            .iter()
            .position(|s| s.contains("RENAME TO `accounts`"))
            .unwrap();
        let add_at = sql
            .iter()
            .position(|s| s.contains("ADD CONSTRAINT `fk_posts_user`"))
            .unwrap();
        assert!(drop_at < rename_at && rename_at < add_at);
        assert!(sql[add_at].contains("REFERENCES `accounts` (`id`)"));
    }

    #[test]
    fn test_drop_primary_key_clause() {
        let catalog = Catalog::new().table(
            Table::new("plain")
                .column(Column::new("id", ColumnType::Int).not_null())
                .index(Index::primary(vec!["id".to_string()])),
        );
        let change = TableChange::alter("plain").index(IndexChange::drop(PRIMARY_INDEX));

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        let sql = dialect().render_plan(&plan);
        assert!(sql[0].contains("DROP PRIMARY KEY"));
    }

    #[test]
    fn test_altered_foreign_key_dropped_and_readded() {
        let catalog = catalog();
        let change = TableChange::alter("posts").foreign_key(
            ForeignKeyChange::alter("fk_posts_user").set_on_delete(RefAction::SetNull),
        );

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        let sql = dialect().render_plan(&plan);
        assert_eq!(sql.len(), 2);
        assert!(sql[0].contains("DROP FOREIGN KEY `fk_posts_user`"));
        assert!(sql[1].contains("ADD CONSTRAINT `fk_posts_user`"));
        assert!(sql[1].contains("ON DELETE SET NULL"));
    }
}
