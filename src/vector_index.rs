//! SQLite-backed [`VectorIndex`].
//!
//! Each entry keeps its own copy of the document text next to the embedding
//! produced by the configured [`Embedder`]. Queries embed the query text and
//! rank every stored vector by cosine distance; there is no ANN structure.
//!
//! Rows remember the model and dimensionality that produced them. Queries
//! only consider rows from the current embedder; the rest are reported by
//! [`VectorIndex::stale`] so reconciliation can re-embed them.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use docstore_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob, Embedder};
use docstore_core::retrieval::VectorIndex;
use docstore_core::{Document, Error, Result, SearchHit};

pub struct SqliteVectorIndex {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorIndex {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::store("embedder returned no vectors"))?;
        if vector.len() != self.embedder.dims() {
            return Err(Error::StoreFailure(format!(
                "{} produced a {}-dim vector, expected {}",
                self.embedder.model_name(),
                vector.len(),
                self.embedder.dims()
            )));
        }
        Ok(vector)
    }

    async fn upsert(&self, id: &str, text: &str) -> Result<()> {
        let vector = self.embed_one(text).await?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO document_vectors (id, text, model, dims, embedding, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                model = excluded.model,
                dims = excluded.dims,
                embedding = excluded.embedding,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(text)
        .bind(self.embedder.model_name())
        .bind(vector.len() as i64)
        .bind(vec_to_blob(&vector))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::store)?;

        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    fn name(&self) -> &str {
        "sqlite-vectors"
    }

    async fn insert(&self, id: &str, text: &str) -> Result<()> {
        self.upsert(id, text).await
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<Document>> {
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query("SELECT id, text FROM document_vectors WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::store)?;
            if let Some(r) = row {
                docs.push(Document::new(
                    r.get::<String, _>("id"),
                    r.get::<String, _>("text"),
                ));
            }
        }
        Ok(docs)
    }

    async fn update(&self, id: &str, text: &str) -> Result<()> {
        self.upsert(id, text).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM document_vectors WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::store)?;
        Ok(())
    }

    async fn ids(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT id FROM document_vectors ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::store)
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query_vec = self.embed_one(text).await?;

        let rows = sqlx::query(
            "SELECT id, text, embedding FROM document_vectors WHERE model = ? AND dims = ?",
        )
        .bind(self.embedder.model_name())
        .bind(self.embedder.dims() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::store)?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|r| {
                let blob: Vec<u8> = r.get("embedding");
                SearchHit {
                    id: r.get("id"),
                    text: r.get("text"),
                    distance: cosine_distance(&query_vec, &blob_to_vec(&blob)),
                }
            })
            .collect();

        docstore_core::models::sort_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    async fn stale(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT id FROM document_vectors WHERE model != ? OR dims != ? ORDER BY id ASC",
        )
        .bind(self.embedder.model_name())
        .bind(self.embedder.dims() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::store)
    }
}
