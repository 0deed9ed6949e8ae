use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.persist_dir, PathBuf::from("vector_store"));
    assert_eq!(config.ollama.base_url.as_str(), "http://localhost:11434/");
    assert_eq!(config.ollama.embedding_model, "all-minilm");
    assert_eq!(config.ollama.generation_model, "gemma2:2b");
    assert_eq!(config.embedding.provider, EmbeddingProvider::Ollama);
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.retrieval.default_top_k, 3);
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::default();

    let mut invalid_config = config.clone();
    invalid_config.ollama.embedding_model = "  ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.batch_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.generation_timeout_secs = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.server.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.dimension = 8;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.default_top_k = 50;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.chunking.chunk_overlap = 1000;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidChunkOverlap(1000, 1000))
    ));

    let mut invalid_config = config;
    invalid_config.chunking.chunk_size = 0;
    assert!(invalid_config.validate().is_err());
}

#[test]
fn base_url_setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_base_url("https://ollama.internal:8443").is_ok());
    assert_eq!(config.base_url.scheme(), "https");
    assert_eq!(config.base_url.port(), Some(8443));

    assert!(matches!(
        config.set_base_url("ftp://ollama.internal"),
        Err(ConfigError::InvalidProtocol(_))
    ));
    assert!(matches!(
        config.set_base_url("not a url"),
        Err(ConfigError::InvalidUrl(_))
    ));
    // Failed updates leave the previous value in place
    assert_eq!(config.base_url.host_str(), Some("ollama.internal"));
}

#[test]
fn ollama_model_and_batch_validation() {
    let valid = OllamaConfig {
        embedding_model: "nomic-embed-text".to_string(),
        generation_model: "llama3.2".to_string(),
        batch_size: 1000,
        ..OllamaConfig::default()
    };
    assert!(valid.validate().is_ok());

    let blank_embedding = OllamaConfig {
        embedding_model: String::new(),
        ..valid.clone()
    };
    assert!(matches!(
        blank_embedding.validate(),
        Err(ConfigError::InvalidModel(_))
    ));

    let blank_generation = OllamaConfig {
        generation_model: " ".to_string(),
        ..valid.clone()
    };
    assert!(matches!(
        blank_generation.validate(),
        Err(ConfigError::InvalidModel(_))
    ));

    let oversized = OllamaConfig {
        batch_size: 1001,
        ..valid
    };
    assert!(matches!(
        oversized.validate(),
        Err(ConfigError::InvalidBatchSize(1001))
    ));
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = config.to_toml_string().expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let partial_toml = r#"
        persist_dir = "/var/lib/pdf-qa"

        [ollama]
        generation_model = "llama3.2"

        [embedding]
        provider = "hashing"
    "#;

    let config: Config = toml::from_str(partial_toml).expect("should parse partial toml");
    assert_eq!(config.persist_dir, PathBuf::from("/var/lib/pdf-qa"));
    assert_eq!(config.ollama.generation_model, "llama3.2");
    assert_eq!(config.ollama.embedding_model, "all-minilm");
    assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);
    assert_eq!(config.server.port, 8000);
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config =
        Config::load(temp_dir.path().join("config.toml")).expect("missing file should load");
    assert_eq!(config, Config::default());
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "[chunking]\nchunk_size = 100\nchunk_overlap = 200\n")
        .expect("should write config");

    assert!(Config::load(&path).is_err());
}

#[test]
fn load_rejects_malformed_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "[ollama\nbase_url = 3").expect("should write config");

    assert!(Config::load(&path).is_err());
}

#[test]
fn env_overrides_applied() {
    let mut config = Config::default();
    let lookup = lookup_from(&[
        (PERSIST_DIR_ENV, "/data/store"),
        (UPLOAD_DIR_ENV, "/data/uploads"),
        (OLLAMA_BASE_URL_ENV, "http://gpu-box:11434"),
    ]);

    config
        .apply_overrides_from(lookup)
        .expect("overrides should apply");

    assert_eq!(config.persist_dir, PathBuf::from("/data/store"));
    assert_eq!(config.upload_dir, PathBuf::from("/data/uploads"));
    assert_eq!(config.ollama.base_url.host_str(), Some("gpu-box"));
}

#[test]
fn blank_env_overrides_ignored() {
    let mut config = Config::default();
    config
        .apply_overrides_from(lookup_from(&[(PERSIST_DIR_ENV, "   ")]))
        .expect("overrides should apply");
    assert_eq!(config.persist_dir, PathBuf::from("vector_store"));
}

#[test]
fn invalid_env_base_url_rejected() {
    let mut config = Config::default();
    let result = config.apply_overrides_from(lookup_from(&[(OLLAMA_BASE_URL_ENV, "localhost")]));
    assert!(result.is_err());
}

#[test]
fn resolve_path_precedence() {
    let explicit = PathBuf::from("/etc/pdf-qa.toml");
    let env_lookup = lookup_from(&[(CONFIG_PATH_ENV, "/opt/pdf-qa.toml")]);

    assert_eq!(
        Config::resolve_path(Some(explicit.as_path()), &env_lookup),
        explicit
    );
    assert_eq!(
        Config::resolve_path(None, &env_lookup),
        PathBuf::from("/opt/pdf-qa.toml")
    );
    assert_eq!(
        Config::resolve_path(None, lookup_from(&[])),
        PathBuf::from(DEFAULT_CONFIG_FILE)
    );
}

#[test]
fn clamp_top_k() {
    let retrieval = RetrievalConfig::default();
    assert_eq!(retrieval.clamp_top_k(None), 3);
    assert_eq!(retrieval.clamp_top_k(Some(0)), 3);
    assert_eq!(retrieval.clamp_top_k(Some(1)), 1);
    assert_eq!(retrieval.clamp_top_k(Some(7)), 7);
    assert_eq!(retrieval.clamp_top_k(Some(500)), 20);
}
