
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::warn;

use crate::database::vector::blob_to_vec;
use crate::parser::AssetKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub technology: Option<String>,
    /// JSON array of tag strings, stored as TEXT.
    pub tags: String,
    pub content_md: String,
    pub uploaded_by: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Course {
    /// Decode the stored tags column. A corrupt value degrades to an
    /// empty list rather than failing the read.
    #[inline]
    pub fn tag_list(&self) -> Vec<String> {
        match serde_json::from_str(&self.tags) {
            Ok(tags) => tags,
            Err(err) => {
                warn!(course_id = self.id, "corrupt tags column: {}", err);
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCourse {
    pub title: String,
    pub slug: String,
    pub technology: Option<String>,
    pub tags: Vec<String>,
    pub content_md: String,
    pub uploaded_by: Option<String>,
}

impl NewCourse {
    #[inline]
    pub fn tags_json(&self) -> String {
        serde_json::to_string(&self.tags).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Per-chunk metadata carried alongside the embedding, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChunkMeta {
    pub nano_title: String,
    pub unit_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontmatter: Option<serde_json::Value>,
}

impl ChunkMeta {
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ChunkRow {
    pub id: i64,
    pub course_id: i64,
    pub chunk_index: i64,
    pub content: String,
    pub content_markdown: String,
    pub embedding: Option<Vec<u8>>,
    pub nano_slug: String,
    pub unit_slug: String,
    /// JSON-encoded [`ChunkMeta`].
    pub meta: String,
}

impl ChunkRow {
    #[inline]
    pub fn embedding_vector(&self) -> Option<Vec<f32>> {
        self.embedding.as_deref().map(blob_to_vec)
    }

    #[inline]
    pub fn meta(&self) -> ChunkMeta {
        match serde_json::from_str(&self.meta) {
            Ok(meta) => meta,
            Err(err) => {
                warn!(chunk_id = self.id, "corrupt meta column: {}", err);
                ChunkMeta::default()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub course_id: i64,
    pub chunk_index: i64,
    pub content: String,
    pub content_markdown: String,
    pub embedding: Vec<f32>,
    pub nano_slug: String,
    pub unit_slug: String,
    pub meta: ChunkMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AssetRow {
    pub id: i64,
    pub course_id: i64,
    pub nano_slug: String,
    pub unit_slug: String,
    pub url: String,
    pub kind: String,
    pub alt: Option<String>,
}

impl AssetRow {
    #[inline]
    pub fn asset_kind(&self) -> AssetKind {
        AssetKind::from_str_or_other(&self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsset {
    pub course_id: i64,
    pub nano_slug: String,
    pub unit_slug: String,
    pub url: String,
    pub kind: AssetKind,
    pub alt: Option<String>,
}
