//! Example: Blog Schema Evolution
//!
//! Demonstrates the engine end to end against an in-memory SQLite
//! database: create tables from a change set, inspect them back, rename
//! a referenced column and watch the dependent foreign key follow, and
//! rebuild a table without losing data.
//!
//! Run with: cargo run --example blog_schema -p tabula-migrate

use tabula_migrate::prelude::*;
use tabula_schema::prelude::*;

async fn apply_set(
    pool: &sqlx::sqlite::SqlitePool,
    set: &ChangeSet,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let executor = SqliteExecutor::new(pool.clone());
    let journal = ChangeJournal::new(pool.clone());

    if journal.is_applied(&set.name).await? {
        println!("    {} already applied, skipping\n", set.name);
        return Ok(());
    }

    let mut catalog = SqliteInspector::new(pool.clone()).snapshot().await?;
    println!("-- Change set: {}", set.name);
    for change in &set.changes {
        let plan = Resolver::new(&catalog).resolve(change)?;
        for sql in executor.apply(&plan).await? {
            println!("{sql};");
        }
        catalog.apply_plan(&plan);
    }
    journal.record_applied(&set.name).await?;
    println!();
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await?;

    ChangeJournal::new(pool.clone()).ensure_table().await?;

    // [1] Initial schema: users and posts.
    let initial = ChangeSet::new("0001_initial")
        .change(
            TableChange::create("users")
                .column(ColumnChange::add("id", ColumnType::Int).set_auto_increment(true))
                .column(
                    ColumnChange::add("username", ColumnType::Varchar(100)).set_nullable(false),
                )
                .column(
                    ColumnChange::add("created_at", ColumnType::Timestamp).set_default(
                        DefaultValue::Expression("CURRENT_TIMESTAMP".to_string()),
                    ),
                )
                .index(IndexChange::add_primary(vec!["id".to_string()]))
                .index(IndexChange::add(
                    "uniq_username",
                    IndexKind::Unique,
                    vec!["username".to_string()],
                )),
        )
        .change(
            TableChange::create("posts")
                .column(ColumnChange::add("id", ColumnType::Int).set_auto_increment(true))
                .column(ColumnChange::add("author_id", ColumnType::Int).set_nullable(false))
                .column(ColumnChange::add("title", ColumnType::Varchar(200)).set_nullable(false))
                .column(ColumnChange::add("body", ColumnType::Text))
                .index(IndexChange::add_primary(vec!["id".to_string()]))
                .index(IndexChange::add(
                    "idx_posts_author",
                    IndexKind::Index,
                    vec!["author_id".to_string()],
                ))
                .foreign_key(
                    ForeignKeyChange::add(
                        "fk_posts_author",
                        vec!["author_id".to_string()],
                        "users",
                        vec!["id".to_string()],
                    )
                    .set_on_delete(RefAction::Cascade),
                ),
        );
    apply_set(&pool, &initial).await?;

    sqlx::query("INSERT INTO users (username) VALUES ('alice'), ('bob')")
        .execute(&pool)
        .await?;
    sqlx::query("INSERT INTO posts (author_id, title) VALUES (1, 'hello world')")
        .execute(&pool)
        .await?;

    // [2] Rename the referenced column; the dependent foreign key in
    // posts is re-pointed automatically and both tables are rebuilt.
    let rename = ChangeSet::new("0002_rename_user_pk").change(
        TableChange::alter("users").column(
            ColumnChange::alter("id")
                .rename_to("user_id")
                .set_comment("surrogate key"),
        ),
    );

    // Show what MySQL would run for the same change first.
    let catalog = SqliteInspector::new(pool.clone()).snapshot().await?;
    let plan = Resolver::new(&catalog).resolve(&rename.changes[0])?;
    println!("-- Equivalent MySQL DDL:");
    for sql in MySqlDialect::new().render_plan(&plan) {
        println!("{sql};");
    }
    println!();

    apply_set(&pool, &rename).await?;

    // [3] Data survived the rebuild and the constraint still holds.
    let (posts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
        .fetch_one(&pool)
        .await?;
    println!("posts after rebuild: {posts}");

    sqlx::query("DELETE FROM users WHERE username = 'alice'")
        .execute(&pool)
        .await?;
    let (posts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
        .fetch_one(&pool)
        .await?;
    println!("posts after cascading delete: {posts}");

    // [4] Inspect the final structure.
    println!();
    let catalog = SqliteInspector::new(pool.clone()).snapshot().await?;
    let dialect = SqliteDialect::new();
    for table in &catalog.tables {
        println!("{}", table.name);
        for column in &table.columns {
            println!("  {}", dialect.column_sql(column));
        }
        for fk in &table.foreign_keys {
            println!("  {}", dialect.foreign_key_clause(fk));
        }
    }

    Ok(())
}
