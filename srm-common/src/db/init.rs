//! Database initialization
//!
//! Opens (creating on first run) the SQLite database in the root folder and
//! brings the schema up to date. Every step is idempotent so that startup can
//! be repeated against an existing database.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = open_pool(db_path, DEFAULT_BUSY_TIMEOUT_MS).await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    let timeout_ms = get_setting_i64(&pool, "db_busy_timeout_ms", DEFAULT_BUSY_TIMEOUT_MS as i64)
        .await?
        .max(0) as u64;

    // Connection options are fixed per pool, so a configured timeout needs a reopen
    let pool = if timeout_ms != DEFAULT_BUSY_TIMEOUT_MS {
        pool.close().await;
        open_pool(db_path, timeout_ms).await?
    } else {
        pool
    };

    info!("Database busy timeout set to {} ms", timeout_ms);

    Ok(pool)
}

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Pool whose every connection carries the same pragmas
///
/// WAL lets list/export readers proceed while an import is writing.
async fn open_pool(db_path: &Path, busy_timeout_ms: u64) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Limited to one connection: every SQLite `:memory:` connection is its own
/// database, so a larger pool would see different (empty) stores.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_students_table(pool).await?;
    create_counters_table(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_students_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students (
            guid TEXT PRIMARY KEY,
            display_id INTEGER NOT NULL UNIQUE CHECK (display_id > 0),
            nom TEXT NOT NULL,
            prenom TEXT NOT NULL DEFAULT '',
            filiere TEXT NOT NULL,
            age INTEGER,
            email TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per named sequence; a missing row means "next value is 1"
async fn create_counters_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS counters (
            name TEXT PRIMARY KEY,
            seq INTEGER NOT NULL CHECK (seq >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "db_busy_timeout_ms", "5000").await?;
    ensure_setting(pool, "max_upload_bytes", "10485760").await?; // 10 MB

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        // INSERT OR IGNORE: two processes may initialize the same file concurrently
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;

        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;

        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}

/// Read an integer setting, falling back to `default` when absent or unparsable
pub async fn get_setting_i64(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value
        .flatten()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default))
}
