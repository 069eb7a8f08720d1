use std::path::{Path, PathBuf};

use serde::Deserialize;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_COLLECTION: &str = "documents";
const DEFAULT_RECORDS_PATH: &str = "records.json";
const DEFAULT_STORE_PATH: &str = "vector_store.json";
const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which vector store backs retrieval, plus its connection parameters.
///
/// `type = "hosted"` requires `endpoint`; `type = "local"` uses `path`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VectorStoreConfig {
    #[serde(rename = "type")]
    pub store_type: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Heuristic relevance guard on hosted free-text queries. Soft policy,
    /// not a correctness requirement; disable to keep every remote result.
    #[serde(default = "default_true")]
    pub attribute_filter: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// "remote" or "store-managed".
    #[serde(rename = "type", default = "default_embedding_type")]
    pub provider_type: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider_type: default_embedding_type(),
            endpoint: None,
            api_key: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LlmConfig {
    /// "ollama" or "openai".
    #[serde(rename = "type")]
    pub provider_type: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RecordsConfig {
    #[serde(default = "default_records_path")]
    pub path: PathBuf,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            path: default_records_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

fn default_records_path() -> PathBuf {
    PathBuf::from(DEFAULT_RECORDS_PATH)
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_embedding_type() -> String {
    "store-managed".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config file '{}': {e}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| format!("invalid config: {e}"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
