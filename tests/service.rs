//! Service-level tests for both backends.
//!
//! The lexical tests run against the in-memory store; the vector tests run
//! against a temporary SQLite database with a deterministic bag-of-words
//! embedder standing in for a real provider.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docstore::config::Config;
use docstore::service::{DocumentService, ServiceSettings};
use docstore::sqlite_store::SqliteStore;
use docstore::vector_index::SqliteVectorIndex;
use docstore::{db, migrate};
use docstore_core::embedding::Embedder;
use docstore_core::retrieval::{LexicalRetriever, ReconcileReport, VectorIndex, VectorRetriever};
use docstore_core::store::memory::InMemoryStore;
use docstore_core::store::DocumentStore;
use docstore_core::{Document, Error, Result};
use tempfile::TempDir;

// ─── Test Embedder ──────────────────────────────────────────────────

const VOCAB: [&str; 6] = ["ml", "rust", "cat", "dog", "rocks", "fun"];

/// Counts vocabulary words; a small constant keeps every vector non-zero.
struct BagOfWords;

#[async_trait]
impl Embedder for BagOfWords {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }

    fn dims(&self) -> usize {
        VOCAB.len()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                VOCAB
                    .iter()
                    .map(|w| lower.split_whitespace().filter(|x| x == w).count() as f32 + 0.001)
                    .collect()
            })
            .collect())
    }
}

/// Never answers within a test's deadline.
struct SlowEmbedder;

#[async_trait]
impl Embedder for SlowEmbedder {
    fn model_name(&self) -> &str {
        "slow"
    }

    fn dims(&self) -> usize {
        1
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(texts.iter().map(|_| vec![1.0]).collect())
    }
}

// ─── Test Store ─────────────────────────────────────────────────────

/// In-memory store whose writes can be switched to fail.
#[derive(Default)]
struct BrokenDisk {
    inner: InMemoryStore,
    full: AtomicBool,
}

impl BrokenDisk {
    fn fill(&self) {
        self.full.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.full.load(Ordering::SeqCst) {
            Err(Error::store("disk full"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for BrokenDisk {
    fn name(&self) -> &str {
        "broken-disk"
    }

    async fn insert(&self, doc: &Document) -> Result<Option<Document>> {
        self.check()?;
        self.inner.insert(doc).await
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        self.inner.get(id).await
    }

    async fn replace(&self, id: &str, text: &str) -> Result<Option<Document>> {
        self.check()?;
        self.inner.replace(id, text).await
    }

    async fn remove(&self, id: &str) -> Result<Option<Document>> {
        self.check()?;
        self.inner.remove(id).await
    }

    async fn scan(&self) -> Result<Vec<Document>> {
        self.inner.scan().await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

fn lexical_service() -> DocumentService {
    DocumentService::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(LexicalRetriever),
        ServiceSettings::default(),
    )
}

struct VectorFixture {
    service: DocumentService,
    store: Arc<SqliteStore>,
    index: Arc<SqliteVectorIndex>,
    _tmp: TempDir,
}

async fn vector_fixture(embedder: Arc<dyn Embedder>, settings: ServiceSettings) -> VectorFixture {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.db.path = tmp.path().join("docstore.sqlite");

    let pool = db::connect(&config).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();

    let store = Arc::new(SqliteStore::new(pool.clone()));
    let index = Arc::new(SqliteVectorIndex::new(pool, embedder));
    let service = DocumentService::new(
        store.clone(),
        Arc::new(VectorRetriever::new(index.clone())),
        settings,
    );

    VectorFixture {
        service,
        store,
        index,
        _tmp: tmp,
    }
}

async fn seed(service: &DocumentService) {
    for (id, text) in [("a", "ml is fun"), ("b", "ml ml rocks"), ("c", "no match")] {
        service.add(Some(id.into()), text.into()).await.unwrap();
    }
}

// ─── Lexical ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_add_get_update_delete_lifecycle() {
    let svc = lexical_service();

    let doc = svc.add(Some("x".into()), "first".into()).await.unwrap();
    assert_eq!(doc.id, "x");
    assert_eq!(svc.get("x").await.unwrap().text, "first");

    let updated = svc.update("x", "second".into()).await.unwrap();
    assert_eq!(updated.text, "second");
    assert_eq!(svc.get("x").await.unwrap().text, "second");

    assert_eq!(svc.delete("x").await.unwrap(), "x");
    assert!(matches!(svc.get("x").await, Err(Error::NotFound(_))));
    assert!(matches!(svc.delete("x").await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_add_without_id_generates_fresh_ids() {
    let svc = lexical_service();
    let a = svc.add(None, "one".into()).await.unwrap();
    let b = svc.add(Some(String::new()), "two".into()).await.unwrap();
    assert!(!a.id.is_empty());
    assert_ne!(a.id, b.id);
    assert_eq!(svc.get(&b.id).await.unwrap().text, "two");
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let svc = lexical_service();
    assert!(matches!(
        svc.update("ghost", "text".into()).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_blank_text_rejected() {
    let svc = lexical_service();
    assert!(matches!(
        svc.add(None, "   ".into()).await,
        Err(Error::InvalidDocument(_))
    ));
    svc.add(Some("k".into()), "keep".into()).await.unwrap();
    assert!(matches!(
        svc.update("k", "".into()).await,
        Err(Error::InvalidDocument(_))
    ));
    assert_eq!(svc.get("k").await.unwrap().text, "keep");
}

#[tokio::test]
async fn test_lexical_search_ranks_by_match_count() {
    let svc = lexical_service();
    seed(&svc).await;

    let hits = svc.search("ml", Some(5)).await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert!((hits[0].distance - 1.0 / 3.0).abs() < 1e-9);
    assert!((hits[1].distance - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_deleted_document_not_searchable() {
    let svc = lexical_service();
    seed(&svc).await;
    svc.delete("b").await.unwrap();

    let hits = svc.search("ml", None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "a");
}

#[tokio::test]
async fn test_search_result_count_capped() {
    let svc = lexical_service();
    for i in 0..120 {
        svc.add(Some(format!("doc-{:03}", i)), "needle".into())
            .await
            .unwrap();
    }
    assert_eq!(svc.search("needle", Some(1000)).await.unwrap().len(), 100);
    assert_eq!(svc.search("needle", None).await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_duplicate_add_upserts() {
    let svc = lexical_service();
    svc.add(Some("d".into()), "old text".into()).await.unwrap();
    svc.add(Some("d".into()), "new text".into()).await.unwrap();

    assert_eq!(svc.get("d").await.unwrap().text, "new text");
    assert!(svc.search("old", None).await.unwrap().is_empty());
    assert_eq!(svc.search("new", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_updates_same_id_all_apply() {
    let svc = Arc::new(lexical_service());
    svc.add(Some("shared".into()), "v0".into()).await.unwrap();

    let mut handles = Vec::new();
    for i in 1..=20 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            svc.update("shared", format!("v{}", i)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let text = svc.get("shared").await.unwrap().text;
    assert!(text.starts_with('v'));
    assert_eq!(svc.search("v", Some(100)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unavailable_service_rejects_operations() {
    let svc = DocumentService::unavailable("database unreachable", ServiceSettings::default());
    assert!(!svc.is_ready());
    assert_eq!(svc.backend_name(), "unavailable");
    assert!(matches!(
        svc.add(None, "text".into()).await,
        Err(Error::ServiceUnavailable(_))
    ));
    assert!(matches!(
        svc.search("q", None).await,
        Err(Error::ServiceUnavailable(_))
    ));
    assert!(matches!(
        svc.delete("a").await,
        Err(Error::ServiceUnavailable(_))
    ));
}

#[tokio::test]
async fn test_vector_config_without_provider_is_unavailable() {
    let tmp = TempDir::new().unwrap();
    let config = docstore::config::parse_config(&format!(
        r#"
[db]
path = "{}"

[store]
backend = "sqlite"

[retrieval]
strategy = "vector"
"#,
        tmp.path().join("d.sqlite").display()
    ))
    .unwrap();

    let svc = DocumentService::from_config(&config).await;
    assert!(!svc.is_ready());
    assert!(matches!(svc.get("a").await, Err(Error::ServiceUnavailable(_))));
}

#[tokio::test]
async fn test_sqlite_lexical_from_config() {
    let tmp = TempDir::new().unwrap();
    let config = docstore::config::parse_config(&format!(
        "[db]\npath = \"{}\"\n\n[store]\nbackend = \"sqlite\"\n",
        tmp.path().join("d.sqlite").display()
    ))
    .unwrap();

    let svc = DocumentService::from_config(&config).await;
    assert_eq!(svc.backend_name(), "sqlite+lexical");
    seed(&svc).await;
    let ids: Vec<String> = svc
        .search("ml", Some(5))
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.id)
        .collect();
    assert_eq!(ids, vec!["b", "a"]);
    svc.shutdown().await;
}

// ─── Vector ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_vector_search_orders_by_distance() {
    let fx = vector_fixture(Arc::new(BagOfWords), ServiceSettings::default()).await;
    seed(&fx.service).await;

    let hits = fx.service.search("ml rocks", Some(3)).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, "b");
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn test_vector_blank_query_rejected() {
    let fx = vector_fixture(Arc::new(BagOfWords), ServiceSettings::default()).await;
    assert!(matches!(
        fx.service.search("", Some(5)).await,
        Err(Error::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn test_vector_mutations_keep_index_in_step() {
    let fx = vector_fixture(Arc::new(BagOfWords), ServiceSettings::default()).await;
    seed(&fx.service).await;

    fx.service.add(Some("a".into()), "rust rust".into()).await.unwrap();
    assert_eq!(fx.index.ids().await.unwrap().len(), 3);
    assert_eq!(fx.store.len().await.unwrap(), 3);

    fx.service.update("c", "cat dog".into()).await.unwrap();
    let indexed = fx.index.get(&["c".to_string()]).await.unwrap();
    assert_eq!(indexed[0].text, "cat dog");

    fx.service.delete("b").await.unwrap();
    let hits = fx.service.search("ml", Some(10)).await.unwrap();
    assert!(hits.iter().all(|h| h.id != "b"));
}

#[tokio::test]
async fn test_index_timeout_leaves_store_untouched() {
    let settings = ServiceSettings {
        call_timeout: Duration::from_millis(50),
        ..ServiceSettings::default()
    };
    let fx = vector_fixture(Arc::new(SlowEmbedder), settings).await;

    let err = fx
        .service
        .add(Some("slow".into()), "text".into())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
    assert!(fx.store.get("slow").await.unwrap().is_none());
}

#[tokio::test]
async fn test_reconcile_repairs_index() {
    let fx = vector_fixture(Arc::new(BagOfWords), ServiceSettings::default()).await;
    seed(&fx.service).await;

    // Drift: a document written behind the service's back and an orphan entry.
    fx.store
        .insert(&docstore_core::Document::new("d", "dog"))
        .await
        .unwrap();
    fx.index.insert("orphan", "cat").await.unwrap();

    let report = fx.service.reconcile().await.unwrap();
    assert_eq!(
        report,
        ReconcileReport {
            indexed: 1,
            removed: 1,
            refreshed: 0
        }
    );
    let mut ids = fx.index.ids().await.unwrap();
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
}

// ─── Store failures ─────────────────────────────────────────────────

struct BrokenDiskFixture {
    service: DocumentService,
    store: Arc<BrokenDisk>,
    index: Arc<SqliteVectorIndex>,
    _tmp: TempDir,
}

async fn broken_disk_fixture() -> BrokenDiskFixture {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect_path(&tmp.path().join("v.sqlite")).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();

    let store = Arc::new(BrokenDisk::default());
    let index = Arc::new(SqliteVectorIndex::new(pool, Arc::new(BagOfWords)));
    let service = DocumentService::new(
        store.clone(),
        Arc::new(VectorRetriever::new(index.clone())),
        ServiceSettings::default(),
    );
    BrokenDiskFixture {
        service,
        store,
        index,
        _tmp: tmp,
    }
}

#[tokio::test]
async fn test_failed_add_leaves_no_index_entry() {
    let fx = broken_disk_fixture().await;
    fx.store.fill();

    let err = fx
        .service
        .add(Some("ghost".into()), "ml rocks".into())
        .await
        .unwrap_err();
    assert_eq!(err, Error::StoreFailure("add failed: disk full".into()));
    assert_eq!(err.code(), "store_failure");

    assert!(matches!(fx.service.get("ghost").await, Err(Error::NotFound(_))));
    assert!(fx.index.ids().await.unwrap().is_empty());
    assert!(fx.service.search("ml", Some(5)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_upsert_restores_previous_text() {
    let fx = broken_disk_fixture().await;
    fx.service.add(Some("a".into()), "ml is fun".into()).await.unwrap();
    fx.store.fill();

    assert!(fx.service.add(Some("a".into()), "cat dog".into()).await.is_err());
    let indexed = fx.index.get(&["a".to_string()]).await.unwrap();
    assert_eq!(indexed, vec![Document::new("a", "ml is fun")]);
}

#[tokio::test]
async fn test_failed_update_restores_previous_text() {
    let fx = broken_disk_fixture().await;
    fx.service.add(Some("a".into()), "ml is fun".into()).await.unwrap();
    fx.store.fill();

    let err = fx.service.update("a", "cat dog".into()).await.unwrap_err();
    assert_eq!(err, Error::StoreFailure("update failed: disk full".into()));
    assert_eq!(fx.service.get("a").await.unwrap().text, "ml is fun");
    let indexed = fx.index.get(&["a".to_string()]).await.unwrap();
    assert_eq!(indexed, vec![Document::new("a", "ml is fun")]);
}

#[tokio::test]
async fn test_failed_delete_keeps_document_searchable() {
    let fx = broken_disk_fixture().await;
    fx.service.add(Some("a".into()), "ml is fun".into()).await.unwrap();
    fx.store.fill();

    let err = fx.service.delete("a").await.unwrap_err();
    assert_eq!(err, Error::StoreFailure("delete failed: disk full".into()));
    assert!(fx.service.get("a").await.is_ok());
    let hits = fx.service.search("ml", Some(5)).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "a");
}

#[tokio::test]
async fn test_reconcile_reembeds_text_drift() {
    let fx = vector_fixture(Arc::new(BagOfWords), ServiceSettings::default()).await;
    seed(&fx.service).await;

    // Store changed behind the index's back.
    fx.store.replace("c", "rust rust").await.unwrap();

    let report = fx.service.reconcile().await.unwrap();
    assert_eq!(report.refreshed, 1);
    let hits = fx.service.search("rust", Some(1)).await.unwrap();
    assert_eq!(hits[0].id, "c");
    assert_eq!(hits[0].text, "rust rust");
}

/// Same vocabulary as [`BagOfWords`] under a different model name, with one
/// extra dimension.
struct BagOfWordsV2;

#[async_trait]
impl Embedder for BagOfWordsV2 {
    fn model_name(&self) -> &str {
        "bag-of-words-v2"
    }

    fn dims(&self) -> usize {
        VOCAB.len() + 1
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = BagOfWords.embed(texts).await?;
        for v in &mut vectors {
            v.push(0.001);
        }
        Ok(vectors)
    }
}

#[tokio::test]
async fn test_reconcile_reembeds_after_model_change() {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect_path(&tmp.path().join("m.sqlite")).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool.clone()));

    let old = DocumentService::new(
        store.clone(),
        Arc::new(VectorRetriever::new(Arc::new(SqliteVectorIndex::new(
            pool.clone(),
            Arc::new(BagOfWords),
        )))),
        ServiceSettings::default(),
    );
    seed(&old).await;

    let new = DocumentService::new(
        store,
        Arc::new(VectorRetriever::new(Arc::new(SqliteVectorIndex::new(
            pool,
            Arc::new(BagOfWordsV2),
        )))),
        ServiceSettings::default(),
    );
    assert!(new.search("ml", Some(5)).await.unwrap().is_empty());

    let report = new.reconcile().await.unwrap();
    assert_eq!(report.refreshed, 3);
    let hits = new.search("ml rocks", Some(5)).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, "b");
    assert!(hits[0].distance < 0.5);
}
