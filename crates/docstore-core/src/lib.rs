//! # docstore core
//!
//! Shared, WASM-safe logic for docstore: the document model, the error
//! taxonomy, the [`DocumentStore`](store::DocumentStore) abstraction, the
//! pluggable [`RetrievalStrategy`](retrieval::RetrievalStrategy) with its
//! lexical and vector implementations, and bearer-token access control.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies.

pub mod auth;
pub mod embedding;
pub mod error;
pub mod models;
pub mod retrieval;
pub mod store;

pub use error::{Error, Result};
pub use models::{Document, SearchHit, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
