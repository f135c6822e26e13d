
use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunker::{ChunkerConfig, split_unit};
use crate::database::Database;
use crate::database::models::{ChunkMeta, NewAsset, NewChunk, NewCourse};
use crate::database::queries::{AssetQueries, ChunkQueries, CourseQueries};
use crate::embeddings::EmbeddingProvider;
use crate::parser::{self, Nano, slugify};
use crate::{CourseDocsError, Result};

/// Caller-supplied course fields accompanying the markdown document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseMetadata {
    pub title: String,
    /// Explicit course slug; derived from the title when absent.
    pub slug: Option<String>,
    pub technology: Option<String>,
    pub tags: Vec<String>,
    pub uploaded_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub course_id: i64,
    pub course_slug: String,
    pub chunk_count: usize,
    pub nano_count: usize,
    pub unit_count: usize,
    pub asset_count: usize,
}

/// Runs the parse → chunk → embed → store pipeline as one transaction.
/// Nothing an ingestion writes is visible until the commit, and any
/// failure along the way leaves the store untouched.
pub struct IngestOrchestrator {
    database: Database,
    embedder: Arc<dyn EmbeddingProvider>,
    chunking: ChunkerConfig,
}

impl IngestOrchestrator {
    #[inline]
    pub fn new(
        database: Database,
        embedder: Arc<dyn EmbeddingProvider>,
        chunking: ChunkerConfig,
    ) -> Self {
        Self {
            database,
            embedder,
            chunking,
        }
    }

    pub async fn ingest(
        &self,
        metadata: &CourseMetadata,
        markdown: &str,
    ) -> Result<IngestSummary> {
        validate_input(metadata, markdown)?;

        let course_slug = resolve_course_slug(metadata)?;
        let parsed = parser::parse(markdown);
        let nanos = disambiguate_slugs(parsed.nanos);

        info!(
            slug = %course_slug,
            nanos = nanos.len(),
            "ingesting course"
        );

        let new_course = NewCourse {
            title: metadata.title.trim().to_string(),
            slug: course_slug,
            technology: metadata.technology.clone(),
            tags: metadata.tags.clone(),
            content_md: markdown.to_string(),
            uploaded_by: metadata.uploaded_by.clone(),
        };

        let mut tx = self.database.begin().await?;
        let course = CourseQueries::create(&mut *tx, &new_course).await?;

        let mut chunk_index: i64 = 0;
        let mut unit_count = 0usize;
        let mut asset_count = 0usize;

        for nano in &nanos {
            for unit in &nano.units {
                unit_count += 1;

                let texts = split_unit(&unit.content_plain, &self.chunking);
                let vectors = self.embedder.embed_many(&texts)?;
                debug!(
                    nano = %nano.slug,
                    unit = %unit.slug,
                    chunks = texts.len(),
                    "embedded unit"
                );

                for (text, vector) in texts.into_iter().zip(vectors) {
                    let chunk = NewChunk {
                        course_id: course.id,
                        chunk_index,
                        content: text,
                        content_markdown: unit.content.clone(),
                        embedding: vector,
                        nano_slug: nano.slug.clone(),
                        unit_slug: unit.slug.clone(),
                        meta: ChunkMeta {
                            nano_title: nano.title.clone(),
                            unit_title: unit.title.clone(),
                            frontmatter: parsed.frontmatter.clone(),
                        },
                    };
                    ChunkQueries::create(&mut *tx, &chunk).await?;
                    chunk_index += 1;
                }

                for asset in &unit.assets {
                    let new_asset = NewAsset {
                        course_id: course.id,
                        nano_slug: nano.slug.clone(),
                        unit_slug: unit.slug.clone(),
                        url: asset.url.clone(),
                        kind: asset.kind,
                        alt: asset.alt.clone(),
                    };
                    AssetQueries::create(&mut *tx, &new_asset).await?;
                    asset_count += 1;
                }
            }
        }

        tx.commit().await?;

        let summary = IngestSummary {
            course_id: course.id,
            course_slug: course.slug,
            chunk_count: chunk_index as usize,
            nano_count: nanos.len(),
            unit_count,
            asset_count,
        };

        info!(
            course_id = summary.course_id,
            chunks = summary.chunk_count,
            assets = summary.asset_count,
            "course ingested"
        );

        Ok(summary)
    }
}

fn validate_input(metadata: &CourseMetadata, markdown: &str) -> Result<()> {
    if metadata.title.trim().is_empty() {
        return Err(CourseDocsError::Validation(
            "title must not be empty".to_string(),
        ));
    }
    if markdown.trim().is_empty() {
        return Err(CourseDocsError::Validation(
            "document must not be empty".to_string(),
        ));
    }
    if let Some(technology) = &metadata.technology {
        if technology.trim().is_empty() {
            return Err(CourseDocsError::Validation(
                "technology must not be blank when provided".to_string(),
            ));
        }
    }
    Ok(())
}

fn resolve_course_slug(metadata: &CourseMetadata) -> Result<String> {
    let source = metadata.slug.as_deref().unwrap_or(&metadata.title);
    let slug = slugify(source);
    if slug.is_empty() {
        return Err(CourseDocsError::Validation(format!(
            "cannot derive a slug from {source:?}"
        )));
    }
    Ok(slug)
}

/// Make sibling slugs unique: duplicate nano slugs (and unit slugs within
/// a nano) get `-2`, `-3` … suffixes in source order. Headings that
/// slugify to nothing fall back to `untitled` first.
fn disambiguate_slugs(mut nanos: Vec<Nano>) -> Vec<Nano> {
    let mut nano_slugs = HashSet::new();
    for nano in &mut nanos {
        nano.slug = claim_slug(&mut nano_slugs, &nano.slug);

        let mut unit_slugs = HashSet::new();
        for unit in &mut nano.units {
            unit.slug = claim_slug(&mut unit_slugs, &unit.slug);
        }
    }
    nanos
}

fn claim_slug(used: &mut HashSet<String>, candidate: &str) -> String {
    let base = if candidate.is_empty() {
        "untitled"
    } else {
        candidate
    };

    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let mut suffix = 2usize;
    loop {
        let attempt = format!("{base}-{suffix}");
        if used.insert(attempt.clone()) {
            return attempt;
        }
        suffix += 1;
    }
}
