//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Documents live in the `documents` table created by [`crate::migrate`].
//! `created_at` / `updated_at` are bookkeeping columns and never leave the
//! store.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use docstore_core::store::DocumentStore;
use docstore_core::{Document, Error, Result};

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert(&self, doc: &Document) -> Result<Option<Document>> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(Error::store)?;

        let previous = sqlx::query("SELECT text FROM documents WHERE id = ?")
            .bind(&doc.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::store)?
            .map(|row| Document::new(doc.id.clone(), row.get::<String, _>("text")));

        sqlx::query(
            r#"
            INSERT INTO documents (id, text, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.text)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::store)?;

        tx.commit().await.map_err(Error::store)?;
        Ok(previous)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT id, text FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::store)?;

        Ok(row.map(|r| Document::new(r.get::<String, _>("id"), r.get::<String, _>("text"))))
    }

    async fn replace(&self, id: &str, text: &str) -> Result<Option<Document>> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("UPDATE documents SET text = ?, updated_at = ? WHERE id = ?")
            .bind(text)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::store)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Document::new(id, text)))
    }

    async fn remove(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query("DELETE FROM documents WHERE id = ? RETURNING id, text")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::store)?;

        Ok(row.map(|r| Document::new(r.get::<String, _>("id"), r.get::<String, _>("text"))))
    }

    async fn scan(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query("SELECT id, text FROM documents ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::store)?;

        Ok(rows
            .iter()
            .map(|r| Document::new(r.get::<String, _>("id"), r.get::<String, _>("text")))
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::store)?;
        Ok(count as usize)
    }
}
