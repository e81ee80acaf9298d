//! # docstore
//!
//! A bearer-token protected document store with pluggable retrieval.
//!
//! Documents are `(id, text)` pairs kept in a [`DocumentStore`] (in memory or
//! SQLite). Search goes through a [`RetrievalStrategy`]: either delegated
//! vector search over an embedding index or an in-process lexical fallback.
//! Everything is served over a small JSON HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────┐   ┌───────────────┐
//! │   HTTP   │──▶│ DocumentService  │──▶│ DocumentStore │
//! │  (axum)  │   │ locks + timeouts │   │ memory/SQLite │
//! └──────────┘   └────────┬─────────┘   └───────────────┘
//!                         ▼
//!                ┌──────────────────┐   ┌───────────────┐
//!                │ RetrievalStrategy│──▶│  VectorIndex  │
//!                │ lexical / vector │   │ SQLite + emb. │
//!                └──────────────────┘   └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export API_KEY=change-me
//! docstore init
//! docstore serve
//! curl -H "Authorization: Bearer $API_KEY" "localhost:10000/search?query=ml"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite document store |
//! | [`embedding`] | Embedding providers |
//! | [`vector_index`] | SQLite vector index |
//! | [`service`] | Document service orchestration |
//! | [`server`] | HTTP server |
//!
//! [`DocumentStore`]: docstore_core::store::DocumentStore
//! [`RetrievalStrategy`]: docstore_core::retrieval::RetrievalStrategy

pub mod config;
pub mod db;
pub mod embedding;
pub mod migrate;
pub mod server;
pub mod service;
pub mod sqlite_store;
pub mod vector_index;
