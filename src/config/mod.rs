#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::chunker::ChunkerConfig;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkerConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub dimension: u32,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid max chunk size: {0} (must be between 200 and 8192)")]
    InvalidMaxChunkSize(usize),
    #[error("Invalid overlap: {0} (must be smaller than max chunk size {1})")]
    InvalidOverlap(usize, usize),
    #[error("Invalid chunk threshold: {0} (must be at least the max chunk size {1})")]
    InvalidChunkThreshold(usize, usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Resolve the default configuration/data directory for the application.
#[inline]
pub fn get_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine user config directory")?;
    Ok(base.join("coursedocs"))
}

impl Config {
    /// Load config from `<config_dir>/config.toml`, falling back to defaults
    /// when the file does not exist.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                embedding: EmbeddingConfig::default(),
                chunking: ChunkerConfig::default(),
                base_dir: config_dir.as_ref().to_path_buf(),
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.base_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;

        let chunking = &self.chunking;
        if !(200..=8192).contains(&chunking.max_chunk_size) {
            return Err(ConfigError::InvalidMaxChunkSize(chunking.max_chunk_size));
        }
        if chunking.overlap >= chunking.max_chunk_size {
            return Err(ConfigError::InvalidOverlap(
                chunking.overlap,
                chunking.max_chunk_size,
            ));
        }
        if chunking.chunk_threshold < chunking.max_chunk_size {
            return Err(ConfigError::InvalidChunkThreshold(
                chunking.chunk_threshold,
                chunking.max_chunk_size,
            ));
        }

        Ok(())
    }

    /// Path of the SQLite database file.
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join("courses.db")
    }
}

impl EmbeddingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(64..=4096).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        if self.timeout_seconds == 0 || self.timeout_seconds > 600 {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        Ok(())
    }

    #[inline]
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}
