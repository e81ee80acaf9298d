//! Storage abstraction for docstore.
//!
//! The [`DocumentStore`] trait is the exact-match half of the system: point
//! lookups and mutations keyed by document id, plus a full [`scan`](DocumentStore::scan)
//! used by the lexical retrieval strategy. Ranking lives in
//! [`crate::retrieval`]; the service keeps the two consistent.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Document;

/// Abstract document storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](DocumentStore::insert) | Store a document, returning any document it replaced |
/// | [`get`](DocumentStore::get) | Point lookup by id |
/// | [`replace`](DocumentStore::replace) | Replace the text of an existing document |
/// | [`remove`](DocumentStore::remove) | Delete by id, returning the removed document |
/// | [`scan`](DocumentStore::scan) | Every stored document, ordered by id |
/// | [`len`](DocumentStore::len) | Number of stored documents |
///
/// Absence is reported as `Ok(None)`; mapping it to [`Error::NotFound`](crate::Error::NotFound)
/// is the caller's decision.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name used in logs and health output.
    fn name(&self) -> &str;

    /// Insert or overwrite a document (last write wins).
    async fn insert(&self, doc: &Document) -> Result<Option<Document>>;

    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Replace the text of `id`. Returns `None` without side effects when absent.
    async fn replace(&self, id: &str, text: &str) -> Result<Option<Document>>;

    async fn remove(&self, id: &str) -> Result<Option<Document>>;

    async fn scan(&self) -> Result<Vec<Document>>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
