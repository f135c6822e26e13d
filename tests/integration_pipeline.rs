//! End-to-end pipeline tests: parse → chunk → embed → store → search,
//! against a temporary SQLite database and a deterministic embedder.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use coursedocs::CourseDocsError;
use coursedocs::chunker::ChunkerConfig;
use coursedocs::database::Database;
use coursedocs::embeddings::EmbeddingProvider;
use coursedocs::ingest::{CourseMetadata, IngestOrchestrator};
use coursedocs::parser::AssetKind;
use coursedocs::retrieval::{RetrievalEngine, SearchFilters};

/// Embeds text as occurrence counts of fixed keywords, so similarity is
/// predictable without a live model server.
struct KeywordEmbedder;

const AXES: [&str; 4] = ["ownership", "lifetimes", "traits", "macros"];

impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-model"
    }

    fn dimension(&self) -> usize {
        AXES.len()
    }

    fn embed_many(&self, texts: &[String]) -> coursedocs::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lowered = text.to_lowercase();
                AXES.iter()
                    .map(|axis| lowered.matches(axis).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Succeeds until the nth embedding call, then fails every call.
struct FailingEmbedder {
    calls: AtomicUsize,
    fail_on: usize,
}

impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing-model"
    }

    fn dimension(&self) -> usize {
        AXES.len()
    }

    fn embed_many(&self, texts: &[String]) -> coursedocs::Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.fail_on {
            return Err(CourseDocsError::Embedding(
                "provider failed mid-ingestion".to_string(),
            ));
        }
        KeywordEmbedder.embed_many(texts)
    }
}

const COURSE_DOC: &str = "\
# Practical Rust
## Memory
### Ownership
ownership rules: every value has one owner.
https://example.com/ownership.png
### Lifetimes
lifetimes tie borrows to scopes.
## Abstractions
### Traits
traits describe shared behavior; ownership shows up here too.
### Macros
macros generate code at compile time.
https://example.com/macros.mp3
";

async fn test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let database = Database::new(temp_dir.path().join("pipeline.db"))
        .await
        .expect("can create database");
    (database, temp_dir)
}

fn metadata(title: &str, technology: &str) -> CourseMetadata {
    CourseMetadata {
        title: title.to_string(),
        slug: None,
        technology: Some(technology.to_string()),
        tags: vec!["integration".to_string()],
        uploaded_by: Some("tester".to_string()),
    }
}

#[tokio::test]
async fn ingest_then_search_groups_by_hierarchy() {
    let (database, _dir) = test_db().await;
    let embedder = Arc::new(KeywordEmbedder);

    let orchestrator = IngestOrchestrator::new(
        database.clone(),
        embedder.clone(),
        ChunkerConfig::default(),
    );
    let summary = orchestrator
        .ingest(&metadata("Practical Rust", "rust"), COURSE_DOC)
        .await
        .expect("ingest succeeds");

    assert_eq!(summary.nano_count, 2);
    assert_eq!(summary.unit_count, 4);
    assert_eq!(summary.chunk_count, 4);
    assert_eq!(summary.asset_count, 2);

    let engine = RetrievalEngine::new(database, embedder);
    let response = engine
        .search("ownership", &SearchFilters::default(), Some(3))
        .await
        .expect("search succeeds");

    assert_eq!(response.total_chunks, 3);
    // Pure ownership unit first, then the traits unit that mentions it.
    let first = &response.results[0];
    assert_eq!(first.nano_slug, "memory");
    assert_eq!(first.nano_title, "Memory");
    assert_eq!(first.units[0].unit_slug, "ownership");

    let similarities: Vec<f32> = response
        .results
        .iter()
        .flat_map(|nano| nano.units.iter())
        .flat_map(|unit| unit.chunks.iter())
        .map(|chunk| chunk.similarity)
        .collect();
    assert!(similarities[0] >= similarities[1]);

    // The surfaced ownership unit carries its image asset.
    let assets = &first.units[0].assets;
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].url, "https://example.com/ownership.png");
    assert_eq!(assets[0].kind, AssetKind::Image);
}

#[tokio::test]
async fn chunk_indexes_are_contiguous() {
    let (database, _dir) = test_db().await;

    // Small bound forces several chunks per unit.
    let chunking = ChunkerConfig {
        max_chunk_size: 30,
        overlap: 5,
        chunk_threshold: 30,
    };
    let orchestrator =
        IngestOrchestrator::new(database.clone(), Arc::new(KeywordEmbedder), chunking);
    let summary = orchestrator
        .ingest(&metadata("Practical Rust", "rust"), COURSE_DOC)
        .await
        .expect("ingest succeeds");
    assert!(summary.chunk_count > 4);

    let chunks = database
        .search_candidates(None, Some(summary.course_id))
        .await
        .expect("query succeeds");
    let indexes: Vec<i64> = chunks.iter().map(|c| c.chunk_index).collect();
    let expected: Vec<i64> = (0..summary.chunk_count as i64).collect();
    assert_eq!(indexes, expected);
}

#[tokio::test]
async fn failed_ingestion_leaves_no_trace() {
    let (database, _dir) = test_db().await;

    let embedder = Arc::new(FailingEmbedder {
        calls: AtomicUsize::new(0),
        fail_on: 4,
    });
    let orchestrator =
        IngestOrchestrator::new(database.clone(), embedder, ChunkerConfig::default());

    let err = orchestrator
        .ingest(&metadata("Practical Rust", "rust"), COURSE_DOC)
        .await
        .expect_err("late failure must abort the ingestion");
    assert!(matches!(err, CourseDocsError::Embedding(_)));

    assert!(database.list_courses().await.expect("list ok").is_empty());
    let chunks = database
        .search_candidates(None, None)
        .await
        .expect("query succeeds");
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn delete_cascades_and_search_returns_empty() {
    let (database, _dir) = test_db().await;
    let embedder = Arc::new(KeywordEmbedder);

    let orchestrator = IngestOrchestrator::new(
        database.clone(),
        embedder.clone(),
        ChunkerConfig::default(),
    );
    let summary = orchestrator
        .ingest(&metadata("Practical Rust", "rust"), COURSE_DOC)
        .await
        .expect("ingest succeeds");

    assert!(
        database
            .delete_course(summary.course_id)
            .await
            .expect("delete succeeds")
    );

    let engine = RetrievalEngine::new(database.clone(), embedder);
    let response = engine
        .search("ownership", &SearchFilters::default(), None)
        .await
        .expect("empty search still succeeds");
    assert_eq!(response.total_chunks, 0);
    assert!(response.results.is_empty());

    assert_eq!(
        database
            .count_chunks(summary.course_id)
            .await
            .expect("count ok"),
        0
    );
}

#[tokio::test]
async fn duplicate_course_slug_conflicts() {
    let (database, _dir) = test_db().await;

    let orchestrator = IngestOrchestrator::new(
        database.clone(),
        Arc::new(KeywordEmbedder),
        ChunkerConfig::default(),
    );
    orchestrator
        .ingest(&metadata("Practical Rust", "rust"), COURSE_DOC)
        .await
        .expect("first ingest succeeds");
    let err = orchestrator
        .ingest(&metadata("Practical Rust", "rust"), COURSE_DOC)
        .await
        .expect_err("same slug must conflict");

    assert!(matches!(err, CourseDocsError::Conflict(_)));
    assert_eq!(database.list_courses().await.expect("list ok").len(), 1);
}

#[tokio::test]
async fn technology_filter_spans_courses() {
    let (database, _dir) = test_db().await;
    let embedder = Arc::new(KeywordEmbedder);

    let orchestrator = IngestOrchestrator::new(
        database.clone(),
        embedder.clone(),
        ChunkerConfig::default(),
    );
    orchestrator
        .ingest(&metadata("Practical Rust", "rust"), COURSE_DOC)
        .await
        .expect("first ingest succeeds");
    let go_summary = orchestrator
        .ingest(&metadata("Go Parallel", "go"), COURSE_DOC)
        .await
        .expect("second ingest succeeds");

    let engine = RetrievalEngine::new(database, embedder);
    let filters = SearchFilters {
        technology: Some("go".to_string()),
        course_id: None,
    };
    let response = engine
        .search("traits", &filters, Some(10))
        .await
        .expect("search succeeds");

    assert!(response.total_chunks > 0);
    for nano in &response.results {
        assert_eq!(nano.course_id, go_summary.course_id);
    }
}
