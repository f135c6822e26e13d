use std::path::PathBuf;

use clap::{Parser, Subcommand};
use coursedocs::Result;
use coursedocs::commands::{
    delete_course, ingest_course, init_config, list_courses, search_courses, show_config,
};

#[derive(Parser)]
#[command(name = "coursedocs")]
#[command(about = "Course document ingestion and retrieval-augmented search")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a markdown course document
    Ingest {
        /// Path to the markdown file
        file: PathBuf,
        /// Course title; defaults to the document's top-level heading
        #[arg(long)]
        title: Option<String>,
        /// Technology tag used for search filtering, e.g. "rust"
        #[arg(long)]
        technology: Option<String>,
        /// Explicit course slug; derived from the title when omitted
        #[arg(long)]
        slug: Option<String>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Uploader identity recorded with the course
        #[arg(long)]
        uploaded_by: Option<String>,
    },
    /// Search ingested courses
    Search {
        /// Free-text query
        query: String,
        /// Restrict results to one technology
        #[arg(long)]
        technology: Option<String>,
        /// Restrict results to one course (id or slug)
        #[arg(long)]
        course: Option<String>,
        /// Maximum number of chunks to return
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List ingested courses
    List,
    /// Delete a course and its chunks and assets
    Delete {
        /// Course ID or slug to delete
        course: String,
    },
    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            file,
            title,
            technology,
            slug,
            tags,
            uploaded_by,
        } => {
            ingest_course(file, title, technology, slug, tags, uploaded_by).await?;
        }
        Commands::Search {
            query,
            technology,
            course,
            limit,
        } => {
            search_courses(query, technology, course, limit).await?;
        }
        Commands::List => {
            list_courses().await?;
        }
        Commands::Delete { course } => {
            delete_course(course).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                init_config()?;
            }
        }
    }

    Ok(())
}
