
pub mod models;
pub mod queries;
pub mod vector;

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use tracing::{debug, info};

use crate::Result;
use crate::database::models::{AssetRow, ChunkRow, Course};
use crate::database::queries::{AssetQueries, ChunkQueries, CourseQueries};

pub type DbPool = Pool<Sqlite>;

/// Single SQLite store holding course metadata, chunk rows with their
/// embedding BLOBs, and asset references.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Idempotent schema bootstrap. Every statement is IF NOT EXISTS, so
    /// running against an existing database is a no-op.
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS courses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                technology TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                content_md TEXT NOT NULL,
                uploaded_by TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                content_markdown TEXT NOT NULL,
                embedding BLOB,
                nano_slug TEXT NOT NULL,
                unit_slug TEXT NOT NULL,
                meta TEXT NOT NULL DEFAULT '{}',
                UNIQUE (course_id, chunk_index)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS assets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
                nano_slug TEXT NOT NULL,
                unit_slug TEXT NOT NULL,
                url TEXT NOT NULL,
                kind TEXT NOT NULL,
                alt TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_course_id ON chunks (course_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_assets_scope
             ON assets (course_id, nano_slug, unit_slug)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_courses_technology ON courses (technology)")
            .execute(&self.pool)
            .await?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    // Course operations
    pub async fn get_course_by_id(&self, id: i64) -> Result<Option<Course>> {
        CourseQueries::get_by_id(&self.pool, id).await
    }

    pub async fn get_course_by_slug(&self, slug: &str) -> Result<Option<Course>> {
        CourseQueries::get_by_slug(&self.pool, slug).await
    }

    pub async fn list_courses(&self) -> Result<Vec<Course>> {
        CourseQueries::list_all(&self.pool).await
    }

    pub async fn delete_course(&self, id: i64) -> Result<bool> {
        CourseQueries::delete(&self.pool, id).await
    }

    // Chunk operations
    pub async fn count_chunks(&self, course_id: i64) -> Result<i64> {
        ChunkQueries::count_for_course(&self.pool, course_id).await
    }

    pub async fn search_candidates(
        &self,
        technology: Option<&str>,
        course_id: Option<i64>,
    ) -> Result<Vec<ChunkRow>> {
        ChunkQueries::search_candidates(&self.pool, technology, course_id).await
    }

    // Asset operations
    pub async fn assets_for_scope(
        &self,
        course_id: i64,
        nano_slug: &str,
        unit_slug: &str,
    ) -> Result<Vec<AssetRow>> {
        AssetQueries::list_for_scope(&self.pool, course_id, nano_slug, unit_slug).await
    }
}
