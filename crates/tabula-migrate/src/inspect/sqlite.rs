//! SQLite introspection via the PRAGMA interface.

use sqlx::sqlite::SqlitePool;
use tracing::debug;

use tabula_schema::schema::{
    Catalog, Column, DefaultValue, ForeignKey, Index, IndexKind, RefAction, Table, PRIMARY_INDEX,
};

use crate::error::{MigrateError, Result};

use super::parse_column_type;

/// Reads table structures from a live SQLite database.
pub struct SqliteInspector {
    pool: SqlitePool,
}

/// PRAGMA arguments cannot be bound, so identifiers are quoted by hand.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn parse_default(raw: Option<&str>) -> DefaultValue {
    let Some(raw) = raw else {
        return DefaultValue::None;
    };
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        DefaultValue::Null
    } else if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        DefaultValue::String(trimmed[1..trimmed.len() - 1].replace("''", "'"))
    } else if let Ok(integer) = trimmed.parse::<i64>() {
        DefaultValue::Integer(integer)
    } else if let Ok(float) = trimmed.parse::<f64>() {
        DefaultValue::Float(float)
    } else {
        DefaultValue::Expression(trimmed.to_string())
    }
}

impl SqliteInspector {
    /// Creates a new inspector over the given pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Lists user tables, excluding SQLite internals.
    pub async fn table_names(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Returns whether a table exists.
    pub async fn has_table(&self, name: &str) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Reads one table's full structure.
    pub async fn table(&self, name: &str) -> Result<Table> {
        let create_sql: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        let create_sql = create_sql
            .ok_or_else(|| MigrateError::TableNotFound(name.to_string()))?
            .0
            .unwrap_or_default();
        let has_autoincrement = create_sql.to_uppercase().contains("AUTOINCREMENT");

        let mut table = Table::new(name);
        table.columns = self.columns(name, has_autoincrement).await?;
        table.indexes = self.indexes(name).await?;
        table.foreign_keys = self.foreign_keys(name).await?;
        Ok(table)
    }

    /// Reads the whole database into a catalog.
    pub async fn snapshot(&self) -> Result<Catalog> {
        let mut catalog = Catalog::new();
        for name in self.table_names().await? {
            catalog.tables.push(self.table(&name).await?);
        }
        Ok(catalog)
    }

    async fn columns(&self, name: &str, has_autoincrement: bool) -> Result<Vec<Column>> {
        // cid, name, type, notnull, dflt_value, pk
        let rows: Vec<(i64, String, String, i64, Option<String>, i64)> =
            sqlx::query_as(&format!("PRAGMA table_info({})", quote_ident(name)))
                .fetch_all(&self.pool)
                .await?;

        let single_pk = rows.iter().filter(|r| r.5 > 0).count() == 1;
        let mut columns = Vec::with_capacity(rows.len());
        for (_, column_name, declared, notnull, default, pk) in rows {
            let (column_type, unsigned) = parse_column_type(&declared).ok_or_else(|| {
                MigrateError::UnsupportedType {
                    table: name.to_string(),
                    column: column_name.clone(),
                    column_type: declared.clone(),
                }
            })?;
            let rowid_alias = single_pk
                && pk == 1
                && declared.eq_ignore_ascii_case("integer");
            let mut column = Column::new(column_name, column_type);
            column.unsigned = unsigned;
            column.nullable = notnull == 0 && !rowid_alias;
            column.default = parse_default(default.as_deref());
            column.auto_increment = rowid_alias && has_autoincrement;
            columns.push(column);
        }
        Ok(columns)
    }

    async fn indexes(&self, name: &str) -> Result<Vec<Index>> {
        // seq, name, unique, origin, partial
        let rows: Vec<(i64, String, i64, String, i64)> =
            sqlx::query_as(&format!("PRAGMA index_list({})", quote_ident(name)))
                .fetch_all(&self.pool)
                .await?;

        let mut indexes = Vec::new();
        for (_, index_name, unique, origin, _) in rows {
            // seqno, cid, name (NULL for expression members)
            let info: Vec<(i64, i64, Option<String>)> =
                sqlx::query_as(&format!("PRAGMA index_info({})", quote_ident(&index_name)))
                    .fetch_all(&self.pool)
                    .await?;
            let mut columns = Vec::with_capacity(info.len());
            let mut expression_based = false;
            for (_, _, column) in info {
                match column {
                    Some(column) => columns.push(column),
                    None => expression_based = true,
                }
            }
            if expression_based {
                debug!(index = %index_name, "Skipping expression-based index");
                continue;
            }

            let (kind, final_name, implicit) = match origin.as_str() {
                "pk" => (IndexKind::Primary, PRIMARY_INDEX.to_string(), true),
                "u" => (IndexKind::Unique, index_name, true),
                _ => (
                    if unique != 0 {
                        IndexKind::Unique
                    } else {
                        IndexKind::Index
                    },
                    index_name,
                    false,
                ),
            };
            indexes.push(Index {
                name: final_name,
                kind,
                columns,
                implicit,
            });
        }

        // A rowid-alias primary key has no index_list entry.
        if !indexes.iter().any(|i| i.kind == IndexKind::Primary) {
            let pk_columns = self.primary_key_columns(name).await?;
            if !pk_columns.is_empty() {
                indexes.push(Index::primary(pk_columns).implicit());
            }
        }

        Ok(indexes)
    }

    async fn primary_key_columns(&self, name: &str) -> Result<Vec<String>> {
        let rows: Vec<(i64, String, String, i64, Option<String>, i64)> =
            sqlx::query_as(&format!("PRAGMA table_info({})", quote_ident(name)))
                .fetch_all(&self.pool)
                .await?;
        let mut pk: Vec<(i64, String)> = rows
            .into_iter()
            .filter(|r| r.5 > 0)
            .map(|r| (r.5, r.1))
            .collect();
        pk.sort_by_key(|(order, _)| *order);
        Ok(pk.into_iter().map(|(_, column)| column).collect())
    }

    async fn foreign_keys(&self, name: &str) -> Result<Vec<ForeignKey>> {
        // id, seq, table, from, to, on_update, on_delete, match
        let rows: Vec<(i64, i64, String, String, Option<String>, String, String, String)> =
            sqlx::query_as(&format!("PRAGMA foreign_key_list({})", quote_ident(name)))
                .fetch_all(&self.pool)
                .await?;

        let mut foreign_keys: Vec<(i64, ForeignKey)> = Vec::new();
        for (id, _, references_table, from, to, on_update, on_delete, _) in rows {
            let at = match foreign_keys.iter().position(|(fk_id, _)| *fk_id == id) {
                Some(at) => at,
                None => {
                    // SQLite does not store constraint names; synthesize
                    // one that is stable for the current definition.
                    let mut fk = ForeignKey::new(
                        format!("{name}_fk_{id}"),
                        Vec::new(),
                        references_table.clone(),
                        Vec::new(),
                    );
                    fk.on_update = RefAction::parse(&on_update).unwrap_or_default();
                    fk.on_delete = RefAction::parse(&on_delete).unwrap_or_default();
                    foreign_keys.push((id, fk));
                    foreign_keys.len() - 1
                }
            };
            let entry = &mut foreign_keys[at].1;
            entry.columns.push(from);
            if let Some(to) = to {
                entry.references_columns.push(to);
            }
        }

        let mut result = Vec::with_capacity(foreign_keys.len());
        for (_, mut fk) in foreign_keys {
            // A missing target column list means "the referenced
            // table's primary key".
            if fk.references_columns.is_empty() && !fk.columns.is_empty() {
                fk.references_columns =
                    self.primary_key_columns(&fk.references_table).await?;
            }
            result.push(fk);
        }
        Ok(result)
    }
}
