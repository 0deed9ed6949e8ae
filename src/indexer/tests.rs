use super::*;
use crate::embeddings::HashingEmbedder;
use async_trait::async_trait;
use std::fs;
use tempfile::TempDir;

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model(&self) -> &str {
        "failing"
    }

    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(QaError::Embedding("connection refused".to_string()))
    }
}

fn small_chunk_config() -> Arc<Config> {
    let mut config = Config::default();
    config.chunking.chunk_size = 80;
    config.chunking.chunk_overlap = 10;
    Arc::new(config)
}

fn hashing_indexer() -> Indexer {
    Indexer::new(small_chunk_config(), Arc::new(HashingEmbedder::new(64)))
}

fn write_manual(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("manual.txt");
    let text = (1..=10)
        .map(|i| format!("Section {i} describes maintenance step number {i} in detail."))
        .collect::<Vec<_>>()
        .join("\n\n");
    fs::write(&path, text).expect("should write manual");
    path
}

#[tokio::test]
async fn indexes_file_into_new_store() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let source = write_manual(temp_dir.path());
    let persist = temp_dir.path().join("store");

    let stats = hashing_indexer()
        .build_index(&source, &persist)
        .await
        .expect("indexing succeeds");

    assert_eq!(stats.documents, 1);
    assert!(stats.chunks >= 10);

    let store = VectorStore::open(&persist).await.expect("store exists");
    assert_eq!(store.count().await.expect("count"), stats.chunks);
    assert_eq!(store.model(), "hashing-64");
    assert_eq!(store.dimension(), 64);
}

#[tokio::test]
async fn indexing_twice_appends_duplicates() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let source = write_manual(temp_dir.path());
    let persist = temp_dir.path().join("store");
    let indexer = hashing_indexer();

    let first = indexer.build_index(&source, &persist).await.expect("first run");
    let second = indexer.build_index(&source, &persist).await.expect("second run");

    assert_eq!(first, second);
    let store = VectorStore::open(&persist).await.expect("store exists");
    assert_eq!(store.count().await.expect("count"), first.chunks * 2);
}

#[tokio::test]
async fn missing_source_is_no_documents_and_creates_nothing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let persist = temp_dir.path().join("store");

    let result = hashing_indexer()
        .build_index(&temp_dir.path().join("absent.pdf"), &persist)
        .await;

    assert!(matches!(result, Err(QaError::NoDocuments { .. })));
    assert!(!persist.exists());
}

#[tokio::test]
async fn embedding_failure_leaves_store_unchanged() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let source = write_manual(temp_dir.path());
    let persist = temp_dir.path().join("store");

    let stats = hashing_indexer()
        .build_index(&source, &persist)
        .await
        .expect("initial index");

    let failing = Indexer::new(small_chunk_config(), Arc::new(FailingEmbedder));
    let result = failing.build_index(&source, &persist).await;

    assert!(matches!(result, Err(QaError::Embedding(_))));
    let store = VectorStore::open(&persist).await.expect("store exists");
    assert_eq!(store.count().await.expect("count"), stats.chunks);
}

#[tokio::test]
async fn different_embedder_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let source = write_manual(temp_dir.path());
    let persist = temp_dir.path().join("store");

    hashing_indexer()
        .build_index(&source, &persist)
        .await
        .expect("initial index");

    let wider = Indexer::new(small_chunk_config(), Arc::new(HashingEmbedder::new(128)));
    let result = wider.build_index(&source, &persist).await;

    assert!(matches!(result, Err(QaError::EmbeddingMismatch(_))));
}
