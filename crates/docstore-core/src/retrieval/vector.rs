//! Delegated vector retrieval.
//!
//! Embedding and nearest-neighbour search are owned by an external
//! [`VectorIndex`]; [`VectorRetriever`] only enforces the consistency
//! contract (every indexed id is a live document) and the query rules.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{effective_limit, sort_hits, Document, SearchHit};
use crate::store::DocumentStore;

use super::{validate_query, ReconcileReport, RetrievalStrategy};

/// An embedding + nearest-neighbour index collaborator.
///
/// Implementations embed texts themselves; callers only deal in ids and
/// text. `query` returns hits with their cosine distance, nearest first.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    async fn insert(&self, id: &str, text: &str) -> Result<()>;

    /// Fetch indexed texts for `ids`. Unknown ids are skipped.
    async fn get(&self, ids: &[String]) -> Result<Vec<Document>>;

    async fn update(&self, id: &str, text: &str) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Every indexed id.
    async fn ids(&self) -> Result<Vec<String>>;

    async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>>;

    /// Ids whose vectors were not produced by the index's current embedder.
    async fn stale(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// [`RetrievalStrategy`] that forwards to a [`VectorIndex`].
#[derive(Clone)]
pub struct VectorRetriever {
    index: Arc<dyn VectorIndex>,
}

impl VectorRetriever {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl RetrievalStrategy for VectorRetriever {
    fn name(&self) -> &str {
        "vector"
    }

    async fn index(&self, doc: &Document, replaced: bool) -> Result<()> {
        if replaced {
            self.index.update(&doc.id, &doc.text).await
        } else {
            self.index.insert(&doc.id, &doc.text).await
        }
    }

    async fn reindex(&self, doc: &Document) -> Result<()> {
        self.index.update(&doc.id, &doc.text).await
    }

    async fn unindex(&self, id: &str) -> Result<()> {
        self.index.delete(id).await
    }

    async fn search(
        &self,
        _store: &dyn DocumentStore,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        validate_query(query, limit)?;
        let k = effective_limit(limit);
        let mut hits = self.index.query(query, k).await?;
        sort_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    async fn reconcile(&self, store: &dyn DocumentStore) -> Result<ReconcileReport> {
        let docs = store.scan().await?;
        let live: HashSet<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        let mut report = ReconcileReport::default();

        let ids: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();
        let indexed: HashMap<String, String> = self
            .index
            .get(&ids)
            .await?
            .into_iter()
            .map(|d| (d.id, d.text))
            .collect();
        let stale: HashSet<String> = self.index.stale().await?.into_iter().collect();

        for doc in &docs {
            match indexed.get(&doc.id) {
                None => {
                    self.index.insert(&doc.id, &doc.text).await?;
                    report.indexed += 1;
                }
                Some(text) if *text != doc.text || stale.contains(&doc.id) => {
                    self.index.update(&doc.id, &doc.text).await?;
                    report.refreshed += 1;
                }
                Some(_) => {}
            }
        }

        for id in self.index.ids().await? {
            if !live.contains(id.as_str()) {
                self.index.delete(&id).await?;
                report.removed += 1;
            }
        }

        Ok(report)
    }
}
