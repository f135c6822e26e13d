
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::database::Database;
use crate::database::vector::cosine_similarity;
use crate::embeddings::EmbeddingProvider;
use crate::parser::AssetKind;
use crate::{CourseDocsError, Result};

pub const DEFAULT_SEARCH_LIMIT: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub technology: Option<String>,
    pub course_id: Option<i64>,
}

/// One ranked chunk, carried inside its unit group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkHit {
    pub course_id: i64,
    pub chunk_index: i64,
    pub content: String,
    pub content_markdown: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchAsset {
    pub url: String,
    pub kind: AssetKind,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitGroup {
    pub unit_slug: String,
    pub unit_title: String,
    pub chunks: Vec<ChunkHit>,
    pub assets: Vec<SearchAsset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NanoGroup {
    pub course_id: i64,
    pub nano_slug: String,
    pub nano_title: String,
    pub units: Vec<UnitGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_chunks: usize,
    pub results: Vec<NanoGroup>,
}

/// Read-only similarity search over stored chunks, regrouped into the
/// course's nano/unit hierarchy for presentation.
pub struct RetrievalEngine {
    database: Database,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl RetrievalEngine {
    #[inline]
    pub fn new(database: Database, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { database, embedder }
    }

    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: Option<usize>,
    ) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(CourseDocsError::Validation(
                "query must not be empty".to_string(),
            ));
        }
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);

        let query_vector = self.embedder.embed_one(query)?;
        let candidates = self
            .database
            .search_candidates(filters.technology.as_deref(), filters.course_id)
            .await?;
        debug!(candidates = candidates.len(), "scoring search candidates");

        // Exact scoring in process; candidate rows carry their embeddings.
        let mut ranked: Vec<(f32, crate::database::models::ChunkRow)> = candidates
            .into_iter()
            .filter_map(|row| {
                let vector = row.embedding_vector()?;
                Some((cosine_similarity(&query_vector, &vector), row))
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.1.course_id.cmp(&b.1.course_id))
                .then_with(|| a.1.chunk_index.cmp(&b.1.chunk_index))
        });
        ranked.truncate(limit);

        let total_chunks = ranked.len();
        let results = self.group_hits(ranked).await?;

        info!(
            query_len = query.len(),
            total_chunks,
            nanos = results.len(),
            "search complete"
        );

        Ok(SearchResponse {
            query: query.to_string(),
            total_chunks,
            results,
        })
    }

    /// Regroup ranked hits by nano then unit, preserving first-appearance
    /// order of groups and rank order of chunks within each unit, then
    /// attach every asset scoped to a surfaced unit.
    async fn group_hits(
        &self,
        ranked: Vec<(f32, crate::database::models::ChunkRow)>,
    ) -> Result<Vec<NanoGroup>> {
        let mut groups: Vec<NanoGroup> = Vec::new();

        for (similarity, row) in ranked {
            let meta = row.meta();
            let hit = ChunkHit {
                course_id: row.course_id,
                chunk_index: row.chunk_index,
                content: row.content,
                content_markdown: row.content_markdown,
                similarity,
            };

            let nano = match groups
                .iter_mut()
                .find(|g| g.course_id == row.course_id && g.nano_slug == row.nano_slug)
            {
                Some(nano) => nano,
                None => {
                    groups.push(NanoGroup {
                        course_id: row.course_id,
                        nano_slug: row.nano_slug.clone(),
                        nano_title: meta.nano_title.clone(),
                        units: Vec::new(),
                    });
                    groups.last_mut().expect("just pushed")
                }
            };

            match nano.units.iter_mut().find(|u| u.unit_slug == row.unit_slug) {
                Some(unit) => unit.chunks.push(hit),
                None => nano.units.push(UnitGroup {
                    unit_slug: row.unit_slug.clone(),
                    unit_title: meta.unit_title,
                    chunks: vec![hit],
                    assets: Vec::new(),
                }),
            }
        }

        for nano in &mut groups {
            for unit in &mut nano.units {
                let assets = self
                    .database
                    .assets_for_scope(nano.course_id, &nano.nano_slug, &unit.unit_slug)
                    .await?;
                unit.assets = assets
                    .into_iter()
                    .map(|asset| {
                        let kind = asset.asset_kind();
                        SearchAsset {
                            url: asset.url,
                            kind,
                            alt: asset.alt,
                        }
                    })
                    .collect();
            }
        }

        Ok(groups)
    }
}
