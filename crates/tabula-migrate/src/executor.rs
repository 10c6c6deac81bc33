//! Transactional plan execution.
//!
//! Executors render a resolved plan through their dialect and run every
//! statement inside one transaction. All validation already happened in
//! the resolver; what remains here is atomicity where the engine
//! provides it. SQLite rebuilds additionally suspend foreign-key
//! checking around the transaction, since a rebuild drops and recreates
//! tables that other tables reference.

use sqlx::mysql::MySqlPool;
use sqlx::sqlite::SqlitePool;
use sqlx::{Acquire, Sqlite, Transaction};
use tracing::{debug, info, warn};

use tabula_schema::dialect::{Dialect, MySqlDialect, SqliteDialect};
use tabula_schema::plan::TablePlan;

use crate::error::Result;

/// Executes plans against a SQLite database.
pub struct SqliteExecutor {
    pool: SqlitePool,
    dialect: SqliteDialect,
    dry_run: bool,
}

impl SqliteExecutor {
    /// Creates a new executor.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            dialect: SqliteDialect::new(),
            dry_run: false,
        }
    }

    /// Enables dry-run mode (SQL is returned but not executed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &SqliteDialect {
        &self.dialect
    }

    /// Renders the plan's statements without executing them.
    #[must_use]
    pub fn sql_for(&self, plan: &TablePlan) -> Vec<String> {
        self.dialect.render_plan(plan)
    }

    /// Applies a plan inside its own transaction.
    ///
    /// Foreign-key checking is suspended while a rebuild sequence runs
    /// and restored afterwards, even if the transaction fails.
    pub async fn apply(&self, plan: &TablePlan) -> Result<Vec<String>> {
        let statements = self.dialect.render_plan(plan);
        if statements.is_empty() {
            warn!(table = %plan.table.name, "Plan changes nothing, skipping");
            return Ok(statements);
        }

        info!(
            table = %plan.table.name,
            statements = statements.len(),
            "Applying schema change"
        );

        if self.dry_run {
            return Ok(statements);
        }

        let suspend_checks = self.dialect.requires_rebuild(plan);
        if suspend_checks {
            debug!("Suspending foreign key checks for table rebuild");
            sqlx::query("PRAGMA foreign_keys = OFF")
                .execute(&self.pool)
                .await?;
        }

        let outcome = self.execute_all(&statements).await;

        if suspend_checks {
            if let Err(error) = sqlx::query("PRAGMA foreign_keys = ON")
                .execute(&self.pool)
                .await
            {
                warn!(%error, "Failed to restore foreign key checks");
            }
        }

        outcome?;
        Ok(statements)
    }

    /// Applies a plan inside an existing transaction, nested via
    /// savepoint.
    pub async fn apply_in(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        plan: &TablePlan,
    ) -> Result<Vec<String>> {
        let statements = self.dialect.render_plan(plan);
        let mut savepoint = tx.begin().await?;
        for sql in &statements {
            debug!(sql = %sql, "Executing DDL");
            sqlx::query(sql).execute(&mut *savepoint).await?;
        }
        savepoint.commit().await?;
        Ok(statements)
    }

    async fn execute_all(&self, statements: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for sql in statements {
            debug!(sql = %sql, "Executing DDL");
            sqlx::query(sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Executes plans against a MySQL database.
///
/// MySQL commits DDL implicitly, so the transaction wrapper is
/// best-effort only; the up-front validation in the resolver is the
/// actual guard against half-applied changes.
pub struct MySqlExecutor {
    pool: MySqlPool,
    dialect: MySqlDialect,
    dry_run: bool,
}

impl MySqlExecutor {
    /// Creates a new executor.
    #[must_use]
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            dialect: MySqlDialect::new(),
            dry_run: false,
        }
    }

    /// Enables dry-run mode (SQL is returned but not executed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &MySqlDialect {
        &self.dialect
    }

    /// Renders the plan's statements without executing them.
    #[must_use]
    pub fn sql_for(&self, plan: &TablePlan) -> Vec<String> {
        self.dialect.render_plan(plan)
    }

    /// Applies a plan.
    pub async fn apply(&self, plan: &TablePlan) -> Result<Vec<String>> {
        let statements = self.dialect.render_plan(plan);
        if statements.is_empty() {
            warn!(table = %plan.table.name, "Plan changes nothing, skipping");
            return Ok(statements);
        }

        info!(
            table = %plan.table.name,
            statements = statements.len(),
            "Applying schema change"
        );

        if self.dry_run {
            return Ok(statements);
        }

        let mut tx = self.pool.begin().await?;
        for sql in &statements {
            debug!(sql = %sql, "Executing DDL");
            sqlx::query(sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(statements)
    }
}
