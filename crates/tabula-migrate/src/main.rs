//! tabula CLI
//!
//! Command-line front end for the schema-diff engine: inspect live
//! structures, plan change sets, and apply them transactionally.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tabula_migrate::error::MigrateError;
use tabula_migrate::executor::{MySqlExecutor, SqliteExecutor};
use tabula_migrate::inspect::{MySqlInspector, SqliteInspector};
use tabula_migrate::journal::ChangeJournal;
use tabula_schema::change::ChangeSet;
use tabula_schema::dialect::{Dialect, MySqlDialect, SqliteDialect};
use tabula_schema::merge::Resolver;
use tabula_schema::plan::TablePlan;
use tabula_schema::schema::{Catalog, Table};

/// Schema-diff and DDL engine for MySQL and SQLite.
#[derive(Parser)]
#[command(name = "tabula")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (`sqlite:...` or `mysql://...`).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the change journal.
    Init,

    /// Print table structures from the live database.
    Inspect {
        /// Table to inspect (all tables if not specified).
        table: Option<String>,

        /// Output a JSON snapshot instead of readable text.
        #[arg(long)]
        json: bool,
    },

    /// Resolve a change set and print the DDL without executing.
    Plan {
        /// Path to the change-set JSON file.
        changeset: PathBuf,

        /// Resolve against a snapshot file instead of the live
        /// database (offline planning).
        #[arg(long)]
        from_snapshot: Option<PathBuf>,
    },

    /// Validate a change set; exits non-zero on any violation.
    Check {
        /// Path to the change-set JSON file.
        changeset: PathBuf,
    },

    /// Resolve and execute a change set inside a transaction.
    Apply {
        /// Path to the change-set JSON file.
        changeset: PathBuf,

        /// Print the SQL without executing.
        #[arg(long)]
        dry_run: bool,

        /// Re-apply even when the journal says it already ran.
        #[arg(long)]
        force: bool,
    },
}

fn is_mysql(url: &str) -> bool {
    url.starts_with("mysql:") || url.starts_with("mariadb:")
}

fn load_change_set(path: &Path) -> anyhow::Result<ChangeSet> {
    if !path.exists() {
        return Err(MigrateError::ChangeSetNotFound(path.to_path_buf()).into());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn load_snapshot(path: &Path) -> anyhow::Result<Catalog> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Resolves every table change in order; each change sees the catalog
/// as the previous ones left it.
fn resolve_all(mut catalog: Catalog, set: &ChangeSet) -> anyhow::Result<Vec<TablePlan>> {
    let mut plans = Vec::with_capacity(set.changes.len());
    for change in &set.changes {
        let plan = Resolver::new(&catalog).resolve(change)?;
        catalog.apply_plan(&plan);
        plans.push(plan);
    }
    Ok(plans)
}

fn print_table(dialect: &dyn Dialect, table: &Table) {
    println!("{}", table.name);
    for column in &table.columns {
        println!("  {}", dialect.column_sql(column));
    }
    for index in &table.indexes {
        let marker = if index.implicit { " (implicit)" } else { "" };
        println!(
            "  {:?} {} ({}){}",
            index.kind,
            index.name,
            index.columns.join(", "),
            marker
        );
    }
    for fk in &table.foreign_keys {
        println!("  {}", dialect.foreign_key_clause(fk));
    }
    println!();
}

fn print_statements(statements: &[String]) {
    for sql in statements {
        println!("{sql};");
    }
}

async fn snapshot(database: &str) -> anyhow::Result<Catalog> {
    if is_mysql(database) {
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .connect(database)
            .await?;
        Ok(MySqlInspector::new(pool).snapshot().await?)
    } else {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database)
            .await?;
        Ok(SqliteInspector::new(pool).snapshot().await?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init => {
            if is_mysql(&cli.database) {
                warn!("The change journal is SQLite-only; nothing to initialize");
                return Ok(());
            }
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect(&cli.database)
                .await?;
            ChangeJournal::new(pool).ensure_table().await?;
            info!("Change journal initialized");
        }

        Commands::Inspect { table, json } => {
            let mut catalog = snapshot(&cli.database).await?;
            if let Some(name) = &table {
                catalog.tables.retain(|t| &t.name == name);
                if catalog.tables.is_empty() {
                    anyhow::bail!("Table '{name}' does not exist");
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
            } else {
                let dialect: Box<dyn Dialect> = if is_mysql(&cli.database) {
                    Box::new(MySqlDialect::new())
                } else {
                    Box::new(SqliteDialect::new())
                };
                for table in &catalog.tables {
                    print_table(dialect.as_ref(), table);
                }
            }
        }

        Commands::Plan {
            changeset,
            from_snapshot,
        } => {
            let set = load_change_set(&changeset)?;
            let catalog = match &from_snapshot {
                Some(path) => load_snapshot(path)?,
                None => snapshot(&cli.database).await?,
            };
            let plans = resolve_all(catalog, &set)?;

            if is_mysql(&cli.database) {
                let dialect = MySqlDialect::new();
                for plan in &plans {
                    print_statements(&dialect.render_plan(plan));
                }
            } else {
                let dialect = SqliteDialect::new();
                for plan in &plans {
                    print_statements(&dialect.render_plan(plan));
                }
            }
        }

        Commands::Check { changeset } => {
            let set = load_change_set(&changeset)?;
            let catalog = snapshot(&cli.database).await?;
            let plans = resolve_all(catalog, &set)?;

            let noops = plans.iter().filter(|p| p.is_noop()).count();
            info!(
                changes = plans.len(),
                noops, "Change set '{}' is valid", set.name
            );
        }

        Commands::Apply {
            changeset,
            dry_run,
            force,
        } => {
            let set = load_change_set(&changeset)?;

            if is_mysql(&cli.database) {
                let pool = MySqlPoolOptions::new()
                    .max_connections(2)
                    .connect(&cli.database)
                    .await?;
                warn!("The change journal is SQLite-only; applying without journaling");

                let catalog = MySqlInspector::new(pool.clone()).snapshot().await?;
                let plans = resolve_all(catalog, &set)?;
                let executor = MySqlExecutor::new(pool).dry_run(dry_run);
                for plan in &plans {
                    let statements = executor.apply(plan).await?;
                    if dry_run {
                        print_statements(&statements);
                    }
                }
            } else {
                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect(&cli.database)
                    .await?;
                let journal = ChangeJournal::new(pool.clone());
                journal.ensure_table().await?;

                if !force && !dry_run && journal.is_applied(&set.name).await? {
                    info!("Change set '{}' already applied, skipping", set.name);
                    return Ok(());
                }

                let catalog = SqliteInspector::new(pool.clone()).snapshot().await?;
                let plans = resolve_all(catalog, &set)?;
                let executor = SqliteExecutor::new(pool).dry_run(dry_run);
                for plan in &plans {
                    let statements = executor.apply(plan).await?;
                    if dry_run {
                        print_statements(&statements);
                    }
                }

                if !dry_run && !journal.is_applied(&set.name).await? {
                    journal.record_applied(&set.name).await?;
                }
                info!("Change set '{}' applied", set.name);
            }
        }
    }

    Ok(())
}
