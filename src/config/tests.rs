use super::*;
use tempfile::TempDir;

#[test]
fn defaults_when_no_config_file() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let config = Config::load(temp_dir.path()).expect("can load defaults");

    assert_eq!(config.embedding, EmbeddingConfig::default());
    assert_eq!(config.chunking, ChunkerConfig::default());
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn save_and_reload_round_trip() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let mut config = Config::load(temp_dir.path()).expect("can load defaults");
    config.embedding.model = "mxbai-embed-large".to_string();
    config.embedding.dimension = 1024;
    config.chunking.max_chunk_size = 1200;
    config.chunking.chunk_threshold = 1200;

    config.save().expect("can save config");

    let reloaded = Config::load(temp_dir.path()).expect("can reload config");
    assert_eq!(reloaded.embedding.model, "mxbai-embed-large");
    assert_eq!(reloaded.embedding.dimension, 1024);
    assert_eq!(reloaded.chunking.max_chunk_size, 1200);
}

#[test]
fn rejects_invalid_protocol() {
    let mut config = Config {
        embedding: EmbeddingConfig::default(),
        chunking: ChunkerConfig::default(),
        base_dir: PathBuf::new(),
    };
    config.embedding.protocol = "ftp".to_string();

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));
}

#[test]
fn rejects_zero_batch_size() {
    let mut config = EmbeddingConfig::default();
    config.batch_size = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBatchSize(0))
    ));
}

#[test]
fn rejects_overlap_larger_than_chunk() {
    let mut config = Config {
        embedding: EmbeddingConfig::default(),
        chunking: ChunkerConfig::default(),
        base_dir: PathBuf::new(),
    };
    config.chunking.overlap = config.chunking.max_chunk_size;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidOverlap(_, _))
    ));
}

#[test]
fn rejects_threshold_below_max_chunk_size() {
    let mut config = Config {
        embedding: EmbeddingConfig::default(),
        chunking: ChunkerConfig::default(),
        base_dir: PathBuf::new(),
    };
    config.chunking.chunk_threshold = config.chunking.max_chunk_size - 1;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidChunkThreshold(_, _))
    ));
}

#[test]
fn endpoint_url_formats_host_and_port() {
    let config = EmbeddingConfig::default();
    let url = config.endpoint_url().expect("valid URL");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}
