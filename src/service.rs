//! Document service: the orchestration layer behind every operation.
//!
//! [`DocumentService`] owns one [`DocumentStore`] and one
//! [`RetrievalStrategy`], chosen once at construction time. Each mutation
//! validates its input, takes the per-id lock, runs the retrieval index hook
//! and only then mutates the store; a failed or timed-out hook leaves the
//! store untouched. When the store write itself fails the hook is undone, so
//! the index never holds an entry the store does not.
//!
//! A backend that fails to initialize does not abort startup. The service
//! is built in the unavailable state instead: [`DocumentService::is_ready`]
//! reports `false` and every operation returns
//! [`Error::ServiceUnavailable`].

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::{Mutex, MutexGuard};

use docstore_core::retrieval::{
    LexicalRetriever, ReconcileReport, RetrievalStrategy, VectorRetriever,
};
use docstore_core::store::memory::InMemoryStore;
use docstore_core::store::DocumentStore;
use docstore_core::{Document, Error, Result, SearchHit};

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::migrate::migrate_pool;
use crate::sqlite_store::SqliteStore;
use crate::vector_index::SqliteVectorIndex;

const LOCK_SHARDS: usize = 64;

/// Sharded async lock keyed by document id.
///
/// Two mutations on the same id always contend for the same shard; distinct
/// ids may share a shard, which only costs throughput.
pub struct KeyedLocks {
    shards: Vec<Mutex<()>>,
}

impl KeyedLocks {
    pub fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    fn shard(&self, id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    pub async fn lock(&self, id: &str) -> MutexGuard<'_, ()> {
        self.shards[self.shard(id)].lock().await
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new(LOCK_SHARDS)
    }
}

/// Per-service limits taken from `[retrieval]`.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub default_limit: usize,
    pub max_limit: usize,
    /// Deadline for each call into the retrieval strategy.
    pub call_timeout: Duration,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_limit: config.retrieval.default_limit,
            max_limit: config.retrieval.max_limit,
            call_timeout: Duration::from_secs(config.retrieval.timeout_secs),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            default_limit: docstore_core::DEFAULT_SEARCH_LIMIT,
            max_limit: docstore_core::MAX_SEARCH_LIMIT,
            call_timeout: Duration::from_secs(10),
        }
    }
}

enum Backend {
    Ready {
        store: Arc<dyn DocumentStore>,
        retriever: Arc<dyn RetrievalStrategy>,
        pool: Option<SqlitePool>,
    },
    Unavailable {
        reason: String,
    },
}

pub struct DocumentService {
    backend: Backend,
    locks: KeyedLocks,
    settings: ServiceSettings,
}

impl DocumentService {
    /// Build a ready service from explicit parts.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        retriever: Arc<dyn RetrievalStrategy>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            backend: Backend::Ready {
                store,
                retriever,
                pool: None,
            },
            locks: KeyedLocks::default(),
            settings,
        }
    }

    /// Build a service whose every operation fails with `ServiceUnavailable`.
    pub fn unavailable(reason: impl Into<String>, settings: ServiceSettings) -> Self {
        Self {
            backend: Backend::Unavailable {
                reason: reason.into(),
            },
            locks: KeyedLocks::default(),
            settings,
        }
    }

    /// Build the backend named by `config`.
    ///
    /// Never fails: initialization errors are logged and produce an
    /// unavailable service.
    pub async fn from_config(config: &Config) -> Self {
        let settings = ServiceSettings::from_config(config);
        match build_backend(config).await {
            Ok(backend) => {
                let service = Self {
                    backend,
                    locks: KeyedLocks::default(),
                    settings,
                };
                match service.reconcile().await {
                    Ok(report) if report != ReconcileReport::default() => {
                        tracing::info!(
                            indexed = report.indexed,
                            removed = report.removed,
                            refreshed = report.refreshed,
                            "reconciled vector index with document store"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "startup reconciliation failed"),
                }
                tracing::info!(backend = %service.backend_name(), "document service ready");
                service
            }
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "backend initialization failed");
                Self::unavailable(format!("{:#}", e), settings)
            }
        }
    }

    /// `"<store>+<strategy>"`, or `"unavailable"`.
    pub fn backend_name(&self) -> String {
        match &self.backend {
            Backend::Ready {
                store, retriever, ..
            } => format!("{}+{}", store.name(), retriever.name()),
            Backend::Unavailable { .. } => "unavailable".to_string(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.backend, Backend::Ready { .. })
    }

    fn parts(&self) -> Result<(&dyn DocumentStore, &dyn RetrievalStrategy)> {
        match &self.backend {
            Backend::Ready {
                store, retriever, ..
            } => Ok((store.as_ref(), retriever.as_ref())),
            Backend::Unavailable { reason } => Err(Error::ServiceUnavailable(format!(
                "Backend not initialized: {}",
                reason
            ))),
        }
    }

    async fn bounded<T>(&self, op: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.settings.call_timeout, fut)
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "{} timed out after {}s",
                    op,
                    self.settings.call_timeout.as_secs()
                ))
            })?
    }

    /// Store a document, generating an id when none is given. An existing id
    /// is overwritten.
    pub async fn add(&self, id: Option<String>, text: String) -> Result<Document> {
        require_text(&text)?;
        let (store, retriever) = self.parts()?;
        let doc = Document::with_optional_id(id, text);

        let _guard = self.locks.lock(&doc.id).await;
        let previous = store.get(&doc.id).await.map_err(|e| failed("add", e))?;

        self.bounded("index", retriever.index(&doc, previous.is_some()))
            .await
            .map_err(|e| failed("add", e))?;
        if let Err(e) = store.insert(&doc).await {
            let undo = match &previous {
                Some(prev) => Undo::Restore(prev),
                None => Undo::Remove(&doc.id),
            };
            self.undo_hook(retriever, undo).await;
            return Err(failed("add", e));
        }

        tracing::debug!(id = %doc.id, replaced = previous.is_some(), "document added");
        Ok(doc)
    }

    pub async fn get(&self, id: &str) -> Result<Document> {
        let (store, _) = self.parts()?;
        store
            .get(id)
            .await
            .map_err(|e| failed("get", e))?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub async fn update(&self, id: &str, text: String) -> Result<Document> {
        require_text(&text)?;
        let (store, retriever) = self.parts()?;

        let _guard = self.locks.lock(id).await;
        let previous = store
            .get(id)
            .await
            .map_err(|e| failed("update", e))?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let doc = Document::new(id, text);
        self.bounded("reindex", retriever.reindex(&doc))
            .await
            .map_err(|e| failed("update", e))?;
        match store.replace(id, &doc.text).await {
            Ok(Some(updated)) => Ok(updated),
            Ok(None) => {
                self.undo_hook(retriever, Undo::Remove(id)).await;
                Err(Error::NotFound(id.to_string()))
            }
            Err(e) => {
                self.undo_hook(retriever, Undo::Restore(&previous)).await;
                Err(failed("update", e))
            }
        }
    }

    /// Remove a document, returning the removed id.
    pub async fn delete(&self, id: &str) -> Result<String> {
        let (store, retriever) = self.parts()?;

        let _guard = self.locks.lock(id).await;
        let previous = store
            .get(id)
            .await
            .map_err(|e| failed("delete", e))?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        self.bounded("unindex", retriever.unindex(id))
            .await
            .map_err(|e| failed("delete", e))?;
        match store.remove(id).await {
            Ok(Some(removed)) => Ok(removed.id),
            Ok(None) => Err(Error::NotFound(id.to_string())),
            Err(e) => {
                self.undo_hook(retriever, Undo::Reinsert(&previous)).await;
                Err(failed("delete", e))
            }
        }
    }

    /// Roll the retrieval index back after a failed store write. A failed
    /// rollback is logged; the next reconcile repairs it.
    async fn undo_hook(&self, retriever: &dyn RetrievalStrategy, undo: Undo<'_>) {
        let (id, result) = match undo {
            Undo::Remove(id) => (id, self.bounded("unindex", retriever.unindex(id)).await),
            Undo::Restore(prev) => (
                prev.id.as_str(),
                self.bounded("reindex", retriever.reindex(prev)).await,
            ),
            Undo::Reinsert(prev) => (
                prev.id.as_str(),
                self.bounded("index", retriever.index(prev, false)).await,
            ),
        };
        if let Err(e) = result {
            tracing::warn!(id = %id, error = %e, "index rollback failed; run reconcile");
        }
    }

    /// Ranked search. `limit` defaults to the configured default and is
    /// clamped to the configured maximum.
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let limit = limit
            .unwrap_or(self.settings.default_limit)
            .min(self.settings.max_limit);
        docstore_core::retrieval::validate_query(query, limit)?;
        let (store, retriever) = self.parts()?;

        self.bounded("search", retriever.search(store, query, limit))
            .await
            .map_err(|e| failed("search", e))
    }

    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let (store, retriever) = self.parts()?;
        retriever.reconcile(store).await
    }

    /// Release backend resources (closes the SQLite pool, if any).
    pub async fn shutdown(&self) {
        if let Backend::Ready {
            pool: Some(pool), ..
        } = &self.backend
        {
            pool.close().await;
            tracing::info!("database pool closed");
        }
    }
}

/// Inverse of an index hook that ran before a failed store write.
enum Undo<'a> {
    /// The id was new: drop it from the index.
    Remove(&'a str),
    /// The id existed: put the previous text back.
    Restore(&'a Document),
    /// The document was being deleted: index it again.
    Reinsert(&'a Document),
}

fn require_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::InvalidDocument("Text cannot be empty".to_string()));
    }
    Ok(())
}

/// Prefix store failures with the operation name; other errors pass through.
fn failed(op: &str, err: Error) -> Error {
    match err {
        Error::StoreFailure(msg) => {
            tracing::error!(operation = op, error = %msg, "store failure");
            Error::StoreFailure(format!("{} failed: {}", op, msg))
        }
        other => other,
    }
}

async fn build_backend(config: &Config) -> anyhow::Result<Backend> {
    match config.store.backend.as_str() {
        "memory" => Ok(Backend::Ready {
            store: Arc::new(InMemoryStore::new()),
            retriever: Arc::new(LexicalRetriever),
            pool: None,
        }),
        _ => {
            let pool = db::connect(config).await?;
            migrate_pool(&pool).await?;
            let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(pool.clone()));

            let retriever: Arc<dyn RetrievalStrategy> = match config.retrieval.strategy.as_str() {
                "vector" => {
                    let embedder = create_embedder(&config.embedding)?;
                    let index = SqliteVectorIndex::new(pool.clone(), embedder);
                    Arc::new(VectorRetriever::new(Arc::new(index)))
                }
                _ => Arc::new(LexicalRetriever),
            };

            Ok(Backend::Ready {
                store,
                retriever,
                pool: Some(pool),
            })
        }
    }
}
