//! Database module for SQLite persistence.
//!
//! SQLite holds the crew roster served by the API.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// How long a connection waits on a locked database or a busy pool.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(BUSY_TIMEOUT)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // preferred_bases is a JSON array of base codes.
    // last_active is RFC 3339 UTC with a Z suffix so text order is time order.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crew (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT,
            role TEXT NOT NULL DEFAULT 'freelancer',
            status TEXT NOT NULL DEFAULT 'pending',
            position TEXT NOT NULL,
            validation_status TEXT NOT NULL DEFAULT 'pending',
            preferred_bases TEXT NOT NULL DEFAULT '[]',
            currency TEXT,
            years_of_experience INTEGER,
            last_active TEXT,
            profile_complete INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_crew_position ON crew(position);
        CREATE INDEX IF NOT EXISTS idx_crew_position_status ON crew(position, status, validation_status);
        CREATE INDEX IF NOT EXISTS idx_crew_full_name ON crew(full_name);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
