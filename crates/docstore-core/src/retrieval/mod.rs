//! Pluggable retrieval strategies.
//!
//! A [`RetrievalStrategy`] ranks documents for a query and owns whatever
//! searchable state it needs. The service calls the index hooks
//! ([`index`](RetrievalStrategy::index), [`reindex`](RetrievalStrategy::reindex),
//! [`unindex`](RetrievalStrategy::unindex)) *before* mutating the
//! [`DocumentStore`], so a failed hook leaves the store untouched and a
//! successful mutation is visible to the next search.
//!
//! | Strategy | Ranking | Searchable state |
//! |----------|---------|------------------|
//! | [`LexicalRetriever`] | `1 / (matches + 1)` substring count | none, scans the store |
//! | [`VectorRetriever`] | cosine distance from a [`VectorIndex`] | external index |

pub mod lexical;
pub mod vector;

pub use lexical::LexicalRetriever;
pub use vector::{VectorIndex, VectorRetriever};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{Document, SearchHit};
use crate::store::DocumentStore;

/// Outcome of a startup consistency pass between store and index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Documents present in the store but missing from the index.
    pub indexed: usize,
    /// Index entries without a live document.
    pub removed: usize,
    /// Entries re-embedded because their text or embedding model was stale.
    pub refreshed: usize,
}

/// Ranked search over stored documents.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Strategy name (`"lexical"` or `"vector"`).
    fn name(&self) -> &str;

    /// Make a newly stored document searchable. `replaced` is true when the
    /// id already existed and the call is an upsert.
    async fn index(&self, doc: &Document, replaced: bool) -> Result<()>;

    /// Refresh the searchable state of an updated document.
    async fn reindex(&self, doc: &Document) -> Result<()>;

    /// Drop a deleted document from the searchable state.
    async fn unindex(&self, id: &str) -> Result<()>;

    /// Return at most `min(limit, 100)` hits ordered by ascending distance.
    async fn search(
        &self,
        store: &dyn DocumentStore,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Bring the searchable state back in line with `store`.
    async fn reconcile(&self, _store: &dyn DocumentStore) -> Result<ReconcileReport> {
        Ok(ReconcileReport::default())
    }
}

/// Reject blank queries and zero limits.
pub fn validate_query(query: &str, limit: usize) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::InvalidQuery("Query cannot be empty".to_string()));
    }
    if limit == 0 {
        return Err(Error::InvalidQuery("limit must be at least 1".to_string()));
    }
    Ok(())
}
