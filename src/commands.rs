use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, get_config_dir};
use crate::database::Database;
use crate::database::models::Course;
use crate::embeddings::OllamaClient;
use crate::ingest::{CourseMetadata, IngestOrchestrator};
use crate::parser;
use crate::retrieval::{RetrievalEngine, SearchFilters};

async fn open_database(config: &Config) -> Result<Database> {
    std::fs::create_dir_all(&config.base_dir).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.base_dir.display()
        )
    })?;
    Database::new(config.database_path())
        .await
        .context("Failed to initialize database")
}

fn load_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    Config::load(&config_dir)
}

/// Resolve a course reference that may be a numeric id or a slug.
async fn resolve_course(database: &Database, reference: &str) -> Result<Option<Course>> {
    if let Ok(id) = reference.parse::<i64>() {
        return Ok(database.get_course_by_id(id).await?);
    }
    Ok(database.get_course_by_slug(reference).await?)
}

/// Ingest a markdown course document into the store.
#[inline]
pub async fn ingest_course(
    file: PathBuf,
    title: Option<String>,
    technology: Option<String>,
    slug: Option<String>,
    tags: Vec<String>,
    uploaded_by: Option<String>,
) -> Result<()> {
    let markdown = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read course file: {}", file.display()))?;

    // Fall back to the document's own `#` heading when no title is given.
    let title = match title {
        Some(title) => title,
        None => parser::parse(&markdown).title.with_context(|| {
            format!(
                "No --title given and {} has no top-level heading",
                file.display()
            )
        })?,
    };

    let config = load_config()?;
    let database = open_database(&config).await?;

    let client = OllamaClient::new(&config.embedding)?;
    client
        .health_check()
        .context("Embedding server health check failed")?;

    let orchestrator = IngestOrchestrator::new(database, Arc::new(client), config.chunking);
    let metadata = CourseMetadata {
        title,
        slug,
        technology,
        tags,
        uploaded_by,
    };

    info!(file = %file.display(), "ingesting course document");
    let summary = orchestrator.ingest(&metadata, &markdown).await?;

    println!(
        "Ingested course '{}' (ID: {})",
        summary.course_slug, summary.course_id
    );
    println!("  Nanos:  {}", summary.nano_count);
    println!("  Units:  {}", summary.unit_count);
    println!("  Chunks: {}", summary.chunk_count);
    println!("  Assets: {}", summary.asset_count);

    Ok(())
}

/// Search stored courses and print the grouped result tree.
#[inline]
pub async fn search_courses(
    query: String,
    technology: Option<String>,
    course: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let config = load_config()?;
    let database = open_database(&config).await?;

    let course_id = match course {
        Some(reference) => match resolve_course(&database, &reference).await? {
            Some(course) => Some(course.id),
            None => {
                println!("No course found matching '{reference}'.");
                return Ok(());
            }
        },
        None => None,
    };

    let client = OllamaClient::new(&config.embedding)?;
    let engine = RetrievalEngine::new(database, Arc::new(client));
    let filters = SearchFilters {
        technology,
        course_id,
    };

    let response = engine.search(&query, &filters, limit).await?;

    if response.results.is_empty() {
        println!("No matching content for '{}'.", response.query);
        return Ok(());
    }

    println!(
        "Results for '{}' ({} chunks):",
        response.query, response.total_chunks
    );
    for nano in &response.results {
        println!();
        println!("## {} [{}]", nano.nano_title, nano.nano_slug);
        for unit in &nano.units {
            println!("  ### {} [{}]", unit.unit_title, unit.unit_slug);
            for chunk in &unit.chunks {
                println!(
                    "    [{:.3}] (chunk {}) {}",
                    chunk.similarity,
                    chunk.chunk_index,
                    preview(&chunk.content)
                );
            }
            for asset in &unit.assets {
                println!("    {} asset: {}", asset.kind.as_str(), asset.url);
            }
        }
    }

    Ok(())
}

/// List stored courses with their chunk counts.
#[inline]
pub async fn list_courses() -> Result<()> {
    let config = load_config()?;
    let database = open_database(&config).await?;

    let courses = database.list_courses().await?;
    if courses.is_empty() {
        println!("No courses have been ingested yet.");
        println!("Use 'coursedocs ingest <file>' to add one.");
        return Ok(());
    }

    println!("Courses ({} total):", courses.len());
    for course in &courses {
        let chunk_count = database.count_chunks(course.id).await?;
        println!();
        println!("{} (ID: {})", course.title, course.id);
        println!("  Slug: {}", course.slug);
        if let Some(technology) = &course.technology {
            println!("  Technology: {technology}");
        }
        let tags = course.tag_list();
        if !tags.is_empty() {
            println!("  Tags: {}", tags.join(", "));
        }
        println!("  Chunks: {chunk_count}");
        println!("  Created: {}", course.created_at);
    }

    Ok(())
}

/// Delete a course by id or slug; chunks and assets cascade.
#[inline]
pub async fn delete_course(reference: String) -> Result<()> {
    let config = load_config()?;
    let database = open_database(&config).await?;

    let Some(course) = resolve_course(&database, &reference).await? else {
        println!("No course found matching '{reference}'.");
        return Ok(());
    };

    database.delete_course(course.id).await?;
    println!("Deleted course '{}' (ID: {}).", course.slug, course.id);

    Ok(())
}

/// Print the active configuration.
#[inline]
pub fn show_config() -> Result<()> {
    let config = load_config()?;

    println!("Configuration directory: {}", config.base_dir.display());
    println!("Database path: {}", config.database_path().display());
    println!();
    println!("[embedding]");
    println!(
        "  endpoint = {}://{}:{}",
        config.embedding.protocol, config.embedding.host, config.embedding.port
    );
    println!("  model = {}", config.embedding.model);
    println!("  dimension = {}", config.embedding.dimension);
    println!("  batch_size = {}", config.embedding.batch_size);
    println!("  timeout_seconds = {}", config.embedding.timeout_seconds);
    println!();
    println!("[chunking]");
    println!("  max_chunk_size = {}", config.chunking.max_chunk_size);
    println!("  overlap = {}", config.chunking.overlap);
    println!("  chunk_threshold = {}", config.chunking.chunk_threshold);

    Ok(())
}

/// Write a default config file if none exists yet, and report its path.
#[inline]
pub fn init_config() -> Result<()> {
    let config_dir = get_config_dir()?;
    let config_path = config_dir.join("config.toml");

    if config_path.exists() {
        println!("Configuration already exists: {}", config_path.display());
        return Ok(());
    }

    let config = Config::load(&config_dir)?;
    config.save()?;
    println!("Wrote default configuration: {}", config_path.display());

    Ok(())
}

fn preview(text: &str) -> String {
    const MAX_PREVIEW: usize = 80;
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= MAX_PREVIEW {
        return line.to_string();
    }
    let cut: String = line.chars().take(MAX_PREVIEW).collect();
    format!("{cut}…")
}
