use super::*;
use tempfile::TempDir;

use crate::database::Database;
use crate::database::models::{ChunkMeta, NewCourse};
use crate::parser::AssetKind;

async fn test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let database = Database::new(temp_dir.path().join("test.db"))
        .await
        .expect("can create database");
    (database, temp_dir)
}

async fn insert_course(database: &Database, slug: &str, technology: Option<&str>) -> i64 {
    let course = NewCourse {
        title: slug.to_string(),
        slug: slug.to_string(),
        technology: technology.map(str::to_string),
        tags: Vec::new(),
        content_md: String::new(),
        uploaded_by: None,
    };
    CourseQueries::create(database.pool(), &course)
        .await
        .expect("can create course")
        .id
}

fn chunk_with_embedding(course_id: i64, index: i64, embedding: Vec<f32>) -> NewChunk {
    NewChunk {
        course_id,
        chunk_index: index,
        content: format!("content {index}"),
        content_markdown: format!("content {index}"),
        embedding,
        nano_slug: "nano".to_string(),
        unit_slug: "unit".to_string(),
        meta: ChunkMeta::default(),
    }
}

#[tokio::test]
async fn missing_slug_returns_none() {
    let (database, _dir) = test_db().await;
    let found = CourseQueries::get_by_slug(database.pool(), "nope")
        .await
        .expect("query ok");
    assert!(found.is_none());
}

#[tokio::test]
async fn search_candidates_returns_all_embedded_chunks() {
    let (database, _dir) = test_db().await;
    let course_id = insert_course(&database, "a", Some("rust")).await;

    ChunkQueries::create(database.pool(), &chunk_with_embedding(course_id, 0, vec![1.0]))
        .await
        .expect("insert ok");
    ChunkQueries::create(database.pool(), &chunk_with_embedding(course_id, 1, vec![2.0]))
        .await
        .expect("insert ok");

    let candidates = ChunkQueries::search_candidates(database.pool(), None, None)
        .await
        .expect("query ok");
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].chunk_index, 0);
    assert_eq!(candidates[1].chunk_index, 1);
    assert_eq!(candidates[0].embedding_vector(), Some(vec![1.0]));
}

#[tokio::test]
async fn search_candidates_filters_by_technology() {
    let (database, _dir) = test_db().await;
    let rust_id = insert_course(&database, "rust-course", Some("rust")).await;
    let go_id = insert_course(&database, "go-course", Some("go")).await;

    ChunkQueries::create(database.pool(), &chunk_with_embedding(rust_id, 0, vec![1.0]))
        .await
        .expect("insert ok");
    ChunkQueries::create(database.pool(), &chunk_with_embedding(go_id, 0, vec![1.0]))
        .await
        .expect("insert ok");

    let candidates = ChunkQueries::search_candidates(database.pool(), Some("rust"), None)
        .await
        .expect("query ok");
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].course_id, rust_id);
}

#[tokio::test]
async fn search_candidates_filters_by_course() {
    let (database, _dir) = test_db().await;
    let first = insert_course(&database, "first", None).await;
    let second = insert_course(&database, "second", None).await;

    ChunkQueries::create(database.pool(), &chunk_with_embedding(first, 0, vec![1.0]))
        .await
        .expect("insert ok");
    ChunkQueries::create(database.pool(), &chunk_with_embedding(second, 0, vec![1.0]))
        .await
        .expect("insert ok");

    let candidates = ChunkQueries::search_candidates(database.pool(), None, Some(second))
        .await
        .expect("query ok");
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].course_id, second);
}

#[tokio::test]
async fn duplicate_chunk_index_is_a_conflict() {
    let (database, _dir) = test_db().await;
    let course_id = insert_course(&database, "c", None).await;

    ChunkQueries::create(database.pool(), &chunk_with_embedding(course_id, 0, vec![1.0]))
        .await
        .expect("insert ok");
    let err = ChunkQueries::create(database.pool(), &chunk_with_embedding(course_id, 0, vec![2.0]))
        .await
        .expect_err("duplicate index must fail");

    assert!(matches!(err, crate::CourseDocsError::Conflict(_)));
}

#[tokio::test]
async fn uncommitted_transaction_leaves_no_rows() {
    let (database, _dir) = test_db().await;
    let course_id = insert_course(&database, "tx", None).await;

    {
        let mut tx = database.begin().await.expect("can begin tx");
        ChunkQueries::create(&mut *tx, &chunk_with_embedding(course_id, 0, vec![1.0]))
            .await
            .expect("insert inside tx ok");
        // Dropped without commit.
    }

    assert_eq!(
        ChunkQueries::count_for_course(database.pool(), course_id)
            .await
            .expect("count ok"),
        0
    );
}

#[tokio::test]
async fn assets_scoped_by_nano_and_unit() {
    let (database, _dir) = test_db().await;
    let course_id = insert_course(&database, "c", None).await;

    for (nano, unit, url) in [
        ("intro", "welcome", "https://example.com/a.png"),
        ("intro", "welcome", "https://example.com/b.mp3"),
        ("intro", "other", "https://example.com/c.png"),
        ("advanced", "welcome", "https://example.com/d.png"),
    ] {
        AssetQueries::create(
            database.pool(),
            &NewAsset {
                course_id,
                nano_slug: nano.to_string(),
                unit_slug: unit.to_string(),
                url: url.to_string(),
                kind: AssetKind::from_str_or_other("image"),
                alt: None,
            },
        )
        .await
        .expect("insert ok");
    }

    let assets = AssetQueries::list_for_scope(database.pool(), course_id, "intro", "welcome")
        .await
        .expect("query ok");
    assert_eq!(assets.len(), 2);
    assert_eq!(assets[0].url, "https://example.com/a.png");
    assert_eq!(assets[1].url, "https://example.com/b.mp3");
}
