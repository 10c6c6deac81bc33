//! MySQL introspection via `information_schema`.

use sqlx::mysql::MySqlPool;

use tabula_schema::schema::{
    Catalog, Column, DefaultValue, ForeignKey, Index, IndexKind, RefAction, Table,
};

use crate::error::{MigrateError, Result};

use super::parse_column_type;

/// Reads table structures from a live MySQL database.
pub struct MySqlInspector {
    pool: MySqlPool,
}

/// Derives the character set from a collation name
/// (`utf8mb4_general_ci` → `utf8mb4`).
fn charset_of(collation: &str) -> Option<String> {
    collation.split('_').next().map(str::to_string)
}

fn parse_default(raw: Option<&str>) -> DefaultValue {
    let Some(raw) = raw else {
        return DefaultValue::None;
    };
    if raw.eq_ignore_ascii_case("null") {
        DefaultValue::Null
    } else if let Ok(integer) = raw.parse::<i64>() {
        DefaultValue::Integer(integer)
    } else if let Ok(float) = raw.parse::<f64>() {
        DefaultValue::Float(float)
    } else if raw.to_uppercase().starts_with("CURRENT_TIMESTAMP") {
        DefaultValue::Expression(raw.to_string())
    } else {
        DefaultValue::String(raw.to_string())
    }
}

impl MySqlInspector {
    /// Creates a new inspector over the given pool.
    #[must_use]
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Lists base tables in the connected schema.
    pub async fn table_names(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Returns whether a table exists.
    pub async fn has_table(&self, name: &str) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Reads one table's full structure.
    pub async fn table(&self, name: &str) -> Result<Table> {
        let options: Option<(Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT engine, table_collation FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        let (engine, collation) =
            options.ok_or_else(|| MigrateError::TableNotFound(name.to_string()))?;

        let mut table = Table::new(name);
        table.engine = engine;
        table.charset = collation.as_deref().and_then(charset_of);
        table.collation = collation;
        table.columns = self.columns(name).await?;
        table.foreign_keys = self.foreign_keys(name).await?;
        table.indexes = self.indexes(name, &table.foreign_keys).await?;
        Ok(table)
    }

    /// Reads the whole schema into a catalog.
    pub async fn snapshot(&self) -> Result<Catalog> {
        let mut catalog = Catalog::new();
        for name in self.table_names().await? {
            catalog.tables.push(self.table(&name).await?);
        }
        Ok(catalog)
    }

    async fn columns(&self, name: &str) -> Result<Vec<Column>> {
        let rows: Vec<(String, String, String, Option<String>, String, Option<String>, String)> =
            sqlx::query_as(
                "SELECT column_name, column_type, is_nullable, column_default, \
                        extra, collation_name, column_comment \
                 FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ? \
                 ORDER BY ordinal_position",
            )
            .bind(name)
            .fetch_all(&self.pool)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for (column_name, declared, is_nullable, default, extra, collation, comment) in rows {
            let (column_type, unsigned) = parse_column_type(&declared).ok_or_else(|| {
                MigrateError::UnsupportedType {
                    table: name.to_string(),
                    column: column_name.clone(),
                    column_type: declared.clone(),
                }
            })?;
            let mut column = Column::new(column_name, column_type);
            column.unsigned = unsigned;
            column.nullable = is_nullable.eq_ignore_ascii_case("yes");
            column.default = parse_default(default.as_deref());
            column.auto_increment = extra.to_lowercase().contains("auto_increment");
            column.collation = collation;
            column.comment = if comment.is_empty() {
                None
            } else {
                Some(comment)
            };
            columns.push(column);
        }
        Ok(columns)
    }

    async fn indexes(&self, name: &str, foreign_keys: &[ForeignKey]) -> Result<Vec<Index>> {
        let rows: Vec<(String, i64, String, i64, String)> = sqlx::query_as(
            "SELECT index_name, non_unique, column_name, seq_in_index, index_type \
             FROM information_schema.statistics \
             WHERE table_schema = DATABASE() AND table_name = ? \
             ORDER BY index_name, seq_in_index",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        let mut indexes: Vec<Index> = Vec::new();
        for (index_name, non_unique, column, _, index_type) in rows {
            if let Some(existing) = indexes.iter_mut().find(|i| i.name == index_name) {
                existing.columns.push(column);
                continue;
            }
            let kind = if index_name == "PRIMARY" {
                IndexKind::Primary
            } else if index_type.eq_ignore_ascii_case("fulltext") {
                IndexKind::Fulltext
            } else if non_unique == 0 {
                IndexKind::Unique
            } else {
                IndexKind::Index
            };
            // The server auto-creates the primary index and, when no
            // usable index exists, one per foreign key named after it.
            let implicit = kind == IndexKind::Primary
                || foreign_keys.iter().any(|fk| fk.name == index_name);
            indexes.push(Index {
                name: index_name,
                kind,
                columns: vec![column],
                implicit,
            });
        }
        Ok(indexes)
    }

    async fn foreign_keys(&self, name: &str) -> Result<Vec<ForeignKey>> {
        let rows: Vec<(String, String, String, String, String, String)> = sqlx::query_as(
            "SELECT rc.constraint_name, rc.referenced_table_name, \
                    rc.update_rule, rc.delete_rule, \
                    kcu.column_name, kcu.referenced_column_name \
             FROM information_schema.referential_constraints rc \
             JOIN information_schema.key_column_usage kcu \
               ON kcu.constraint_schema = rc.constraint_schema \
              AND kcu.constraint_name = rc.constraint_name \
              AND kcu.table_name = rc.table_name \
             WHERE rc.constraint_schema = DATABASE() AND rc.table_name = ? \
             ORDER BY rc.constraint_name, kcu.ordinal_position",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        let mut foreign_keys: Vec<ForeignKey> = Vec::new();
        for (constraint, references_table, update_rule, delete_rule, column, referenced) in rows {
            if let Some(existing) = foreign_keys.iter_mut().find(|fk| fk.name == constraint) {
                existing.columns.push(column);
                existing.references_columns.push(referenced);
                continue;
            }
            let mut fk = ForeignKey::new(constraint, vec![column], references_table, vec![referenced]);
            fk.on_update = RefAction::parse(&update_rule).unwrap_or_default();
            fk.on_delete = RefAction::parse(&delete_rule).unwrap_or_default();
            foreign_keys.push(fk);
        }
        Ok(foreign_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_of() {
        assert_eq!(
            charset_of("utf8mb4_general_ci"),
            Some("utf8mb4".to_string())
        );
        assert_eq!(charset_of("latin1_swedish_ci"), Some("latin1".to_string()));
    }

    #[test]
    fn test_parse_default() {
        assert_eq!(parse_default(None), DefaultValue::None);
        assert_eq!(parse_default(Some("NULL")), DefaultValue::Null);
        assert_eq!(parse_default(Some("0")), DefaultValue::Integer(0));
        assert_eq!(parse_default(Some("1.5")), DefaultValue::Float(1.5));
        assert_eq!(
            parse_default(Some("CURRENT_TIMESTAMP")),
            DefaultValue::Expression("CURRENT_TIMESTAMP".to_string())
        );
        assert_eq!(
            parse_default(Some("pending")),
            DefaultValue::String("pending".to_string())
        );
    }
}
