//! Lexical fallback retrieval.
//!
//! Scores each stored document by how often the query occurs in its text
//! (case-insensitive, non-overlapping). A document with `n > 0` matches gets
//! distance `1 / (n + 1)`, so more matches sort first. This is a linear scan
//! over the whole store and needs no index, which keeps the API usable
//! without an embedding provider.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{effective_limit, sort_hits, Document, SearchHit};
use crate::store::DocumentStore;

use super::{validate_query, RetrievalStrategy};

/// Substring-count ranking over the document store.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalRetriever;

impl LexicalRetriever {
    pub fn new() -> Self {
        Self
    }
}

/// Count non-overlapping, case-insensitive occurrences of `query` in `text`.
pub fn count_occurrences(text: &str, query: &str) -> usize {
    if query.is_empty() {
        return 0;
    }
    text.to_lowercase().matches(&query.to_lowercase()).count()
}

/// Distance for a document with `matches` occurrences.
pub fn match_distance(matches: usize) -> f64 {
    1.0 / (matches as f64 + 1.0)
}

#[async_trait]
impl RetrievalStrategy for LexicalRetriever {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn index(&self, _doc: &Document, _replaced: bool) -> Result<()> {
        Ok(())
    }

    async fn reindex(&self, _doc: &Document) -> Result<()> {
        Ok(())
    }

    async fn unindex(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn search(
        &self,
        store: &dyn DocumentStore,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        validate_query(query, limit)?;

        let mut hits: Vec<SearchHit> = store
            .scan()
            .await?
            .into_iter()
            .filter_map(|doc| {
                let matches = count_occurrences(&doc.text, query);
                if matches == 0 {
                    return None;
                }
                Some(SearchHit {
                    id: doc.id,
                    text: doc.text,
                    distance: match_distance(matches),
                })
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(effective_limit(limit));
        Ok(hits)
    }
}
