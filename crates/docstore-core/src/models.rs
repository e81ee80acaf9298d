//! Core data types: [`Document`] and [`SearchHit`].

use serde::{Deserialize, Serialize};

/// Hard upper bound on the number of hits a single search may return.
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Number of hits returned when the caller does not pass a limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// The unit of storage: an `(id, text)` pair.
///
/// The id is immutable once stored; updates replace `text` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Build a document, generating a UUID v4 id when `id` is absent or empty.
    pub fn with_optional_id(id: Option<String>, text: impl Into<String>) -> Self {
        let id = match id {
            Some(id) if !id.is_empty() => id,
            _ => generate_id(),
        };
        Self::new(id, text)
    }
}

/// Generate a collision-resistant document id (UUID v4).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A single ranked search result.
///
/// `distance` is backend-specific: cosine distance for vector retrieval,
/// `1 / (matches + 1)` for lexical retrieval. Lower is better for both, but
/// values are not comparable across backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub distance: f64,
}

/// Clamp a caller-supplied limit to [`MAX_SEARCH_LIMIT`].
pub fn effective_limit(limit: usize) -> usize {
    limit.min(MAX_SEARCH_LIMIT)
}

/// Sort hits by ascending distance, breaking ties by id.
pub fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}
