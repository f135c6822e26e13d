use thiserror::Error;

pub type Result<T> = std::result::Result<T, CourseDocsError>;

#[derive(Error, Debug)]
pub enum CourseDocsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Embedding provider error: {0}")]
    Embedding(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl CourseDocsError {
    /// Whether a caller-side retry could plausibly succeed. Validation,
    /// conflict, and malformed-input errors never become retryable.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CourseDocsError::Network(_) | CourseDocsError::Timeout(_)
        )
    }
}

impl From<sqlx::Error> for CourseDocsError {
    #[inline]
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return CourseDocsError::Conflict(db_err.to_string());
            }
        }
        CourseDocsError::Storage(err.to_string())
    }
}

pub mod chunker;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod ingest;
pub mod parser;
pub mod retrieval;
