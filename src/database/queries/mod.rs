#[cfg(test)]
mod tests;

use sqlx::{QueryBuilder, Sqlite};

use crate::Result;
use crate::database::models::{AssetRow, ChunkRow, Course, NewAsset, NewChunk, NewCourse};
use crate::database::vector::vec_to_blob;

/// Query functions are generic over the executor so the same code runs
/// against the pool and inside a transaction.
pub struct CourseQueries;

pub struct ChunkQueries;

pub struct AssetQueries;

impl CourseQueries {
    pub async fn create<'a, E>(executor: E, course: &NewCourse) -> Result<Course>
    where
        E: sqlx::Executor<'a, Database = Sqlite>,
    {
        let created = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (title, slug, technology, tags, content_md, uploaded_by)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, title, slug, technology, tags, content_md, uploaded_by, created_at
            "#,
        )
        .bind(&course.title)
        .bind(&course.slug)
        .bind(&course.technology)
        .bind(course.tags_json())
        .bind(&course.content_md)
        .bind(&course.uploaded_by)
        .fetch_one(executor)
        .await?;

        Ok(created)
    }

    pub async fn get_by_id<'a, E>(executor: E, id: i64) -> Result<Option<Course>>
    where
        E: sqlx::Executor<'a, Database = Sqlite>,
    {
        let course = sqlx::query_as::<_, Course>(
            "SELECT id, title, slug, technology, tags, content_md, uploaded_by, created_at
             FROM courses WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(course)
    }

    pub async fn get_by_slug<'a, E>(executor: E, slug: &str) -> Result<Option<Course>>
    where
        E: sqlx::Executor<'a, Database = Sqlite>,
    {
        let course = sqlx::query_as::<_, Course>(
            "SELECT id, title, slug, technology, tags, content_md, uploaded_by, created_at
             FROM courses WHERE slug = ?",
        )
        .bind(slug)
        .fetch_optional(executor)
        .await?;

        Ok(course)
    }

    pub async fn list_all<'a, E>(executor: E) -> Result<Vec<Course>>
    where
        E: sqlx::Executor<'a, Database = Sqlite>,
    {
        let courses = sqlx::query_as::<_, Course>(
            "SELECT id, title, slug, technology, tags, content_md, uploaded_by, created_at
             FROM courses ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(executor)
        .await?;

        Ok(courses)
    }

    /// Delete a course; chunk and asset rows follow via ON DELETE CASCADE.
    pub async fn delete<'a, E>(executor: E, id: i64) -> Result<bool>
    where
        E: sqlx::Executor<'a, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM courses WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl ChunkQueries {
    pub async fn create<'a, E>(executor: E, chunk: &NewChunk) -> Result<i64>
    where
        E: sqlx::Executor<'a, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO chunks
                (course_id, chunk_index, content, content_markdown, embedding,
                 nano_slug, unit_slug, meta)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(chunk.course_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.content)
        .bind(&chunk.content_markdown)
        .bind(vec_to_blob(&chunk.embedding))
        .bind(&chunk.nano_slug)
        .bind(&chunk.unit_slug)
        .bind(chunk.meta.to_json())
        .execute(executor)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn count_for_course<'a, E>(executor: E, course_id: i64) -> Result<i64>
    where
        E: sqlx::Executor<'a, Database = Sqlite>,
    {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE course_id = ?")
            .bind(course_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }

    /// All embedded chunks matching the optional filters, in a stable
    /// (course_id, chunk_index) order. Similarity scoring happens in
    /// process; this only narrows the candidate set.
    pub async fn search_candidates<'a, E>(
        executor: E,
        technology: Option<&str>,
        course_id: Option<i64>,
    ) -> Result<Vec<ChunkRow>>
    where
        E: sqlx::Executor<'a, Database = Sqlite>,
    {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT c.id, c.course_id, c.chunk_index, c.content, c.content_markdown, \
             c.embedding, c.nano_slug, c.unit_slug, c.meta FROM chunks c",
        );

        if technology.is_some() {
            builder.push(" JOIN courses ON courses.id = c.course_id");
        }
        builder.push(" WHERE c.embedding IS NOT NULL");
        if let Some(technology) = technology {
            builder.push(" AND courses.technology = ");
            builder.push_bind(technology);
        }
        if let Some(course_id) = course_id {
            builder.push(" AND c.course_id = ");
            builder.push_bind(course_id);
        }
        builder.push(" ORDER BY c.course_id, c.chunk_index");

        let chunks = builder
            .build_query_as::<ChunkRow>()
            .fetch_all(executor)
            .await?;

        Ok(chunks)
    }
}

impl AssetQueries {
    pub async fn create<'a, E>(executor: E, asset: &NewAsset) -> Result<i64>
    where
        E: sqlx::Executor<'a, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO assets (course_id, nano_slug, unit_slug, url, kind, alt)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(asset.course_id)
        .bind(&asset.nano_slug)
        .bind(&asset.unit_slug)
        .bind(&asset.url)
        .bind(asset.kind.as_str())
        .bind(&asset.alt)
        .execute(executor)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn list_for_scope<'a, E>(
        executor: E,
        course_id: i64,
        nano_slug: &str,
        unit_slug: &str,
    ) -> Result<Vec<AssetRow>>
    where
        E: sqlx::Executor<'a, Database = Sqlite>,
    {
        let assets = sqlx::query_as::<_, AssetRow>(
            "SELECT id, course_id, nano_slug, unit_slug, url, kind, alt
             FROM assets WHERE course_id = ? AND nano_slug = ? AND unit_slug = ?
             ORDER BY id",
        )
        .bind(course_id)
        .bind(nano_slug)
        .bind(unit_slug)
        .fetch_all(executor)
        .await?;

        Ok(assets)
    }
}
