//! Tests for database initialization
//!
//! Covers automatic creation on first run, idempotent re-open, default
//! settings and the shared secret lifecycle.

use srm_common::api::{initialize_shared_secret, load_shared_secret};
use srm_common::db::{get_setting_i64, init_database, init_memory_database};

#[tokio::test]
async fn test_database_created_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("srm.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists(), "Database file was not created");

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    for table in ["counters", "settings", "students"] {
        assert!(tables.iter().any(|t| t == table), "missing table {}", table);
    }

    pool.close().await;
}

#[tokio::test]
async fn test_reopen_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("srm.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO counters (name, seq) VALUES ('students', 4)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let seq: i64 = sqlx::query_scalar("SELECT seq FROM counters WHERE name = 'students'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(seq, 4);
    pool.close().await;
}

#[tokio::test]
async fn test_default_settings_and_overrides() {
    let pool = init_memory_database().await.unwrap();

    assert_eq!(
        get_setting_i64(&pool, "max_upload_bytes", 0).await.unwrap(),
        10 * 1024 * 1024
    );
    assert_eq!(get_setting_i64(&pool, "no_such_key", 42).await.unwrap(), 42);

    sqlx::query("UPDATE settings SET value = 'garbage' WHERE key = 'max_upload_bytes'")
        .execute(&pool)
        .await
        .unwrap();
    assert_eq!(
        get_setting_i64(&pool, "max_upload_bytes", 7).await.unwrap(),
        7
    );
}

#[tokio::test]
async fn test_display_id_must_be_unique() {
    let pool = init_memory_database().await.unwrap();

    let insert = "INSERT INTO students (guid, display_id, nom, filiere, email) \
                  VALUES (?, 1, 'A', 'CS', 'a@x.com')";
    sqlx::query(insert).bind("k1").execute(&pool).await.unwrap();
    assert!(sqlx::query(insert).bind("k2").execute(&pool).await.is_err());
}

#[tokio::test]
async fn test_shared_secret_generated_once() {
    let pool = init_memory_database().await.unwrap();

    let first = load_shared_secret(&pool).await.unwrap();
    assert_ne!(first, 0);
    assert_eq!(load_shared_secret(&pool).await.unwrap(), first);

    let rotated = initialize_shared_secret(&pool).await.unwrap();
    assert_eq!(load_shared_secret(&pool).await.unwrap(), rotated);
}

#[tokio::test]
async fn test_pragmas_apply_to_every_pooled_connection() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("srm.db")).await.unwrap();

    // Hold several connections at once so the pool must open fresh ones
    let mut held = Vec::new();
    for _ in 0..4 {
        held.push(pool.acquire().await.unwrap());
    }
    for conn in held.iter_mut() {
        let timeout: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
            .fetch_one(&mut **conn)
            .await
            .unwrap();
        assert_eq!(timeout, 5000);
        let fk: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&mut **conn)
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }
    drop(held);
    pool.close().await;
}

#[tokio::test]
async fn test_configured_busy_timeout_applies_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("srm.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE settings SET value = '1234' WHERE key = 'db_busy_timeout_ms'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let timeout: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(timeout, 1234);
    pool.close().await;
}
