//! Sequence allocator for display identifiers
//!
//! Each named sequence is one row in the `counters` table, so allocation
//! survives process restarts. A missing row means the next value is 1.
//!
//! All operations take any SQLite executor (pool, connection or open
//! transaction). Allocating inside the caller's transaction means a rolled-back
//! insert also returns its number, so `next()` never skips.

use sqlx::{Executor, Sqlite};

/// Sequence name used for student display identifiers
pub const STUDENT_SEQUENCE: &str = "students";

/// Persistent monotonically increasing counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceAllocator {
    name: String,
}

impl SequenceAllocator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Allocator for student display identifiers
    pub fn students() -> Self {
        Self::new(STUDENT_SEQUENCE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return one more than the last value handed out since the last reset
    ///
    /// Starts at 1. The increment is a single UPSERT statement, so concurrent
    /// callers never receive the same value.
    pub async fn next<'e, E>(&self, executor: E) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar(
            r#"
            INSERT INTO counters (name, seq) VALUES (?, 1)
            ON CONFLICT(name) DO UPDATE SET seq = seq + 1
            RETURNING seq
            "#,
        )
        .bind(&self.name)
        .fetch_one(executor)
        .await
    }

    /// Restart the sequence so the next call to [`next`](Self::next) returns 1
    ///
    /// Only this allocator's row is removed; other sequences are untouched.
    pub async fn reset<'e, E>(&self, executor: E) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("DELETE FROM counters WHERE name = ?")
            .bind(&self.name)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Last value handed out (0 if none since the last reset)
    pub async fn current<'e, E>(&self, executor: E) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let seq: Option<i64> = sqlx::query_scalar("SELECT seq FROM counters WHERE name = ?")
            .bind(&self.name)
            .fetch_optional(executor)
            .await?;
        Ok(seq.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srm_common::db::{init_database, init_memory_database};

    #[tokio::test]
    async fn test_next_starts_at_one_and_increments() {
        let pool = init_memory_database().await.unwrap();
        let seq = SequenceAllocator::students();

        assert_eq!(seq.current(&pool).await.unwrap(), 0);
        for expected in 1..=5 {
            assert_eq!(seq.next(&pool).await.unwrap(), expected);
        }
        assert_eq!(seq.current(&pool).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_reset_restarts_at_one() {
        let pool = init_memory_database().await.unwrap();
        let seq = SequenceAllocator::students();

        for _ in 0..3 {
            seq.next(&pool).await.unwrap();
        }
        seq.reset(&pool).await.unwrap();
        assert_eq!(seq.next(&pool).await.unwrap(), 1);

        // Resetting a fresh sequence is harmless
        let fresh = SequenceAllocator::new("fresh");
        fresh.reset(&pool).await.unwrap();
        assert_eq!(fresh.next(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reset_leaves_other_sequences_alone() {
        let pool = init_memory_database().await.unwrap();
        let students = SequenceAllocator::students();
        let other = SequenceAllocator::new("courses");

        students.next(&pool).await.unwrap();
        other.next(&pool).await.unwrap();
        other.next(&pool).await.unwrap();

        students.reset(&pool).await.unwrap();

        assert_eq!(students.next(&pool).await.unwrap(), 1);
        assert_eq!(other.next(&pool).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_rolled_back_allocation_is_returned() {
        let pool = init_memory_database().await.unwrap();
        let seq = SequenceAllocator::students();
        assert_eq!(seq.next(&pool).await.unwrap(), 1);

        let mut tx = pool.begin().await.unwrap();
        assert_eq!(seq.next(&mut *tx).await.unwrap(), 2);
        tx.rollback().await.unwrap();

        assert_eq!(seq.next(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_counter_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("srm.db");
        let seq = SequenceAllocator::students();

        let pool = init_database(&db_path).await.unwrap();
        seq.next(&pool).await.unwrap();
        seq.next(&pool).await.unwrap();
        pool.close().await;

        let pool = init_database(&db_path).await.unwrap();
        assert_eq!(seq.next(&pool).await.unwrap(), 3);
        pool.close().await;
    }
}
