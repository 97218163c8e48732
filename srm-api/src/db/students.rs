//! Record store for student records
//!
//! The store exclusively owns record lifetime. Display identifiers are only
//! ever assigned through the [`SequenceAllocator`]; nothing else writes
//! `display_id`.
//!
//! Every public operation runs in its own transaction, so no record is ever
//! left half-written. The `*_in` functions take an open connection and let the
//! import pipeline compose several operations into one transaction.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use super::sequence::SequenceAllocator;
use crate::models::{StudentFields, StudentPatch, StudentRecord, ValidationError};

/// Record store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Required field missing or blank
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No record with this storage key
    #[error("Student not found: {0}")]
    NotFound(Uuid),

    /// Stored row could not be mapped back to a record
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

const SELECT_COLUMNS: &str = "SELECT guid, display_id, nom, prenom, filiere, age, email FROM students";

/// Persistent keyed collection of student records
#[derive(Debug, Clone)]
pub struct StudentStore {
    pool: SqlitePool,
    sequence: SequenceAllocator,
}

impl StudentStore {
    pub fn new(pool: SqlitePool, sequence: SequenceAllocator) -> Self {
        Self { pool, sequence }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn sequence(&self) -> &SequenceAllocator {
        &self.sequence
    }

    /// Remove all records. Does not reset the sequence.
    pub async fn clear(&self) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        clear_in(&mut conn).await
    }

    /// Validate, allocate a display identifier and store a new record
    pub async fn insert(&self, fields: StudentFields) -> Result<StudentRecord, StoreError> {
        let mut tx = self.pool.begin().await?;
        let record = insert_in(&mut tx, &self.sequence, fields).await?;
        tx.commit().await?;
        Ok(record)
    }

    pub async fn get(&self, storage_key: Uuid) -> Result<Option<StudentRecord>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, storage_key).await
    }

    /// All records ordered by display identifier ascending
    pub async fn list_all(&self) -> Result<Vec<StudentRecord>, StoreError> {
        let rows = sqlx::query(&format!("{} ORDER BY display_id ASC", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM students")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Merge `patch` into an existing record
    ///
    /// Identifiers are untouched. The merged record must still pass
    /// validation; otherwise nothing is written.
    ///
    /// The first statement is a write so the transaction holds the write
    /// lock (waiting on `busy_timeout`) before it reads.
    pub async fn update(
        &self,
        storage_key: Uuid,
        patch: &StudentPatch,
    ) -> Result<StudentRecord, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_in(&mut tx, storage_key)
            .await?
            .ok_or(StoreError::NotFound(storage_key))?;

        let mut fields = current.fields();
        patch.apply_to(&mut fields);
        fields.validate()?;

        sqlx::query(
            r#"
            UPDATE students
            SET nom = ?, prenom = ?, filiere = ?, age = ?, email = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE guid = ?
            "#,
        )
        .bind(&fields.nom)
        .bind(&fields.prenom)
        .bind(&fields.filiere)
        .bind(fields.age)
        .bind(&fields.email)
        .bind(storage_key.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(StudentRecord {
            storage_key,
            display_id: current.display_id,
            nom: fields.nom,
            prenom: fields.prenom,
            filiere: fields.filiere,
            age: fields.age,
            email: fields.email,
        })
    }

    pub async fn delete(&self, storage_key: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM students WHERE guid = ?")
            .bind(storage_key.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(storage_key));
        }
        Ok(())
    }
}

/// Delete every record on `conn`; returns the number removed
pub async fn clear_in(conn: &mut SqliteConnection) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM students").execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Insert on `conn`, allocating the display identifier on the same connection
///
/// Validation happens before allocation so a rejected record never consumes
/// a number.
pub async fn insert_in(
    conn: &mut SqliteConnection,
    sequence: &SequenceAllocator,
    fields: StudentFields,
) -> Result<StudentRecord, StoreError> {
    fields.validate()?;

    let storage_key = Uuid::new_v4();
    let display_id = sequence.next(&mut *conn).await?;

    sqlx::query(
        r#"
        INSERT INTO students (guid, display_id, nom, prenom, filiere, age, email)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(storage_key.to_string())
    .bind(display_id)
    .bind(&fields.nom)
    .bind(&fields.prenom)
    .bind(&fields.filiere)
    .bind(fields.age)
    .bind(&fields.email)
    .execute(&mut *conn)
    .await?;

    Ok(StudentRecord {
        storage_key,
        display_id,
        nom: fields.nom,
        prenom: fields.prenom,
        filiere: fields.filiere,
        age: fields.age,
        email: fields.email,
    })
}

async fn get_in(
    conn: &mut SqliteConnection,
    storage_key: Uuid,
) -> Result<Option<StudentRecord>, StoreError> {
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT_COLUMNS))
        .bind(storage_key.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_record).transpose()
}

/// Touch the row to take the write lock, returning its current contents
async fn lock_in(
    conn: &mut SqliteConnection,
    storage_key: Uuid,
) -> Result<Option<StudentRecord>, StoreError> {
    let row = sqlx::query(
        r#"
        UPDATE students SET updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        RETURNING guid, display_id, nom, prenom, filiere, age, email
        "#,
    )
    .bind(storage_key.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_record).transpose()
}

fn row_to_record(row: &SqliteRow) -> Result<StudentRecord, StoreError> {
    let guid: String = row.try_get("guid")?;
    let storage_key = Uuid::parse_str(&guid)
        .map_err(|e| StoreError::Corrupt(format!("invalid guid '{}': {}", guid, e)))?;

    Ok(StudentRecord {
        storage_key,
        display_id: row.try_get("display_id")?,
        nom: row.try_get("nom")?,
        prenom: row.try_get("prenom")?,
        filiere: row.try_get("filiere")?,
        age: row.try_get("age")?,
        email: row.try_get("email")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use srm_common::db::init_memory_database;

    async fn test_store() -> StudentStore {
        let pool = init_memory_database().await.unwrap();
        StudentStore::new(pool, SequenceAllocator::students())
    }

    fn fields(nom: &str) -> StudentFields {
        StudentFields {
            nom: nom.to_string(),
            prenom: "Ana".to_string(),
            filiere: "CS".to_string(),
            age: Some(20),
            email: format!("{}@example.com", nom.to_lowercase()),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_display_ids() {
        let store = test_store().await;

        let a = store.insert(fields("Alpha")).await.unwrap();
        let b = store.insert(fields("Beta")).await.unwrap();

        assert_eq!(a.display_id, 1);
        assert_eq!(b.display_id, 2);
        assert_ne!(a.storage_key, b.storage_key);
        assert_eq!(store.get(a.storage_key).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn test_insert_rejects_blank_track_without_side_effects() {
        let store = test_store().await;
        let mut bad = fields("Alpha");
        bad.filiere = String::new();

        let err = store.insert(bad).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError { field: "filiere" })));
        assert_eq!(store.count().await.unwrap(), 0);

        // The rejected insert did not consume a number
        let ok = store.insert(fields("Beta")).await.unwrap();
        assert_eq!(ok.display_id, 1);
    }

    #[tokio::test]
    async fn test_list_all_orders_by_display_id() {
        let store = test_store().await;
        for nom in ["Zed", "Amy", "Max"] {
            store.insert(fields(nom)).await.unwrap();
        }

        let noms: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.display_id, r.nom))
            .collect();
        assert_eq!(
            noms,
            vec![
                (1, "Zed".to_string()),
                (2, "Amy".to_string()),
                (3, "Max".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_identifiers() {
        let store = test_store().await;
        let created = store.insert(fields("Alpha")).await.unwrap();

        let patch = StudentPatch {
            filiere: Some("Math".to_string()),
            age: Some(None),
            ..Default::default()
        };
        let updated = store.update(created.storage_key, &patch).await.unwrap();

        assert_eq!(updated.storage_key, created.storage_key);
        assert_eq!(updated.display_id, created.display_id);
        assert_eq!(updated.filiere, "Math");
        assert_eq!(updated.age, None);
        assert_eq!(updated.nom, "Alpha");
        assert_eq!(store.get(created.storage_key).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_update_rejects_blanking_required_field() {
        let store = test_store().await;
        let created = store.insert(fields("Alpha")).await.unwrap();

        let patch = StudentPatch {
            email: Some(" ".to_string()),
            ..Default::default()
        };
        let err = store.update(created.storage_key, &patch).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.get(created.storage_key).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_key_not_found() {
        let store = test_store().await;
        let missing = Uuid::new_v4();

        assert!(matches!(
            store.update(missing, &StudentPatch::default()).await,
            Err(StoreError::NotFound(k)) if k == missing
        ));
        assert!(matches!(
            store.delete(missing).await,
            Err(StoreError::NotFound(k)) if k == missing
        ));
    }

    #[tokio::test]
    async fn test_delete_does_not_renumber() {
        let store = test_store().await;
        let a = store.insert(fields("Alpha")).await.unwrap();
        store.insert(fields("Beta")).await.unwrap();

        store.delete(a.storage_key).await.unwrap();
        assert_eq!(store.get(a.storage_key).await.unwrap(), None);

        let c = store.insert(fields("Gamma")).await.unwrap();
        assert_eq!(c.display_id, 3);

        let ids: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|r| r.display_id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_and_updates_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let pool = srm_common::db::init_database(&dir.path().join("srm.db"))
            .await
            .unwrap();
        let store = StudentStore::new(pool, SequenceAllocator::students());
        let target = store.insert(fields("Target")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..100 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    store.insert(fields(&format!("N{}", i))).await.map(|_| ())
                } else {
                    let patch = StudentPatch {
                        age: Some(Some(i)),
                        ..Default::default()
                    };
                    store.update(target.storage_key, &patch).await.map(|_| ())
                }
            }));
        }

        let mut failures = Vec::new();
        for handle in handles {
            if let Err(e) = handle.await.unwrap() {
                failures.push(e.to_string());
            }
        }
        assert!(failures.is_empty(), "failed operations: {:?}", failures);

        assert_eq!(store.count().await.unwrap(), 51);
        let ids: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|r| r.display_id)
            .collect();
        assert_eq!(ids, (1..=51).collect::<Vec<_>>());
        store.pool().close().await;
    }

    #[tokio::test]
    async fn test_update_does_not_touch_row_when_validation_fails() {
        let store = test_store().await;
        let created = store.insert(fields("Alpha")).await.unwrap();
        let before: String = sqlx::query_scalar("SELECT updated_at FROM students WHERE guid = ?")
            .bind(created.storage_key.to_string())
            .fetch_one(store.pool())
            .await
            .unwrap();

        let patch = StudentPatch {
            nom: Some(String::new()),
            ..Default::default()
        };
        assert!(store.update(created.storage_key, &patch).await.is_err());

        let after: String = sqlx::query_scalar("SELECT updated_at FROM students WHERE guid = ?")
            .bind(created.storage_key.to_string())
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(before, after);
        assert_eq!(store.get(created.storage_key).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent_and_keeps_sequence() {
        let store = test_store().await;
        store.insert(fields("Alpha")).await.unwrap();
        store.insert(fields("Beta")).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.clear().await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 0);

        // Without an explicit reset the old sequence continues
        let next = store.insert(fields("Gamma")).await.unwrap();
        assert_eq!(next.display_id, 3);
    }
}
