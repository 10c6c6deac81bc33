//! Applied change-set bookkeeping.
//!
//! The `tabula_changes` table records which named change sets have been
//! applied, so re-running the CLI against the same database skips work
//! already done.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use crate::error::{MigrateError, Result};

/// SQL to create the journal table.
pub const CREATE_JOURNAL_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tabula_changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)
"#;

/// A record of an applied change set.
#[derive(Debug, Clone)]
pub struct AppliedChange {
    /// Unique ID in the journal table.
    pub id: i64,
    /// Change-set name.
    pub name: String,
    /// When the change set was applied.
    pub applied_at: DateTime<Utc>,
}

/// Manages the change journal in the database.
pub struct ChangeJournal {
    pool: SqlitePool,
}

impl ChangeJournal {
    /// Creates a new journal manager.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ensures the journal table exists.
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(CREATE_JOURNAL_TABLE_SQL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Records a change set as applied.
    pub async fn record_applied(&self, name: &str) -> Result<()> {
        sqlx::query("INSERT INTO tabula_changes (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Removes a change-set record.
    pub async fn record_reverted(&self, name: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM tabula_changes WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MigrateError::NotApplied(name.to_string()));
        }
        Ok(())
    }

    /// Checks whether a change set has been applied.
    pub async fn is_applied(&self, name: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM tabula_changes WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Lists all applied change sets, oldest first.
    pub async fn applied(&self) -> Result<Vec<AppliedChange>> {
        let rows: Vec<(i64, String, String)> =
            sqlx::query_as("SELECT id, name, applied_at FROM tabula_changes ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        let mut changes = Vec::with_capacity(rows.len());
        for (id, name, applied_at_raw) in rows {
            let applied_at = DateTime::parse_from_rfc3339(&applied_at_raw)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| {
                    // SQLite datetime format fallback
                    chrono::NaiveDateTime::parse_from_str(&applied_at_raw, "%Y-%m-%d %H:%M:%S")
                        .map(|dt| dt.and_utc())
                        .unwrap_or_else(|_| Utc::now())
                });
            changes.push(AppliedChange {
                id,
                name,
                applied_at,
            });
        }
        Ok(changes)
    }
}
