//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`APP_SEARCH__K=3` sets `search.k`). Provides helpers to expand `~` and
//! `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    /// Build from an explicit figment, bypassing files and environment.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub collection: CollectionSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub metadata: MetadataSettings,
    pub ingest: IngestSettings,
    pub search: SearchSettings,
    pub store: StoreSettings,
    pub extract: ExtractSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        let positive = [
            ("collection.batch_size", self.collection.batch_size),
            ("ingest.concurrency", self.ingest.concurrency),
            ("search.k", self.search.k),
            ("search.concurrency", self.search.concurrency),
            ("llm.max_output_tokens", self.llm.max_output_tokens),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be greater than zero")));
            }
        }
        if self.collection.name.trim().is_empty() {
            return Err(Error::InvalidConfig("collection.name must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub documents_dir: String,
    pub cache_dir: String,
    pub lancedb_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            documents_dir: "./data/documents".into(),
            cache_dir: "./.recalldb/cache".into(),
            lancedb_dir: "./.recalldb/lancedb".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    pub name: String,
    pub batch_size: usize,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self { name: "documents".into(), batch_size: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// `openai` or `fake`.
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub dimensions: Option<usize>,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "text-embedding-3-small".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            dimensions: None,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// `openai` or `ollama`.
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub max_output_tokens: usize,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            model: "gemma2:27b".into(),
            base_url: "http://localhost:11434".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            max_output_tokens: 64,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    /// What the entity-name prompt asks for ("weapon", "product", ...).
    pub entity_kind: String,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self { entity_kind: "weapon".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub concurrency: usize,
    pub progress: bool,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { concurrency: 4, progress: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub k: usize,
    pub concurrency: usize,
    /// Per external call, in seconds.
    pub timeout_secs: u64,
    /// Re-ask once with a stricter prompt when the judgment is not a number.
    pub retry_unparseable: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { k: 5, concurrency: 4, timeout_secs: 120, retry_unparseable: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// `lancedb`, `qdrant` or `memory`.
    pub backend: String,
    pub qdrant_url: String,
    pub qdrant_api_key_env: String,
    /// Per store read or write, in seconds.
    pub timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: "lancedb".into(),
            qdrant_url: "http://localhost:6333".into(),
            qdrant_api_key_env: "QDRANT_API_KEY".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSettings {
    /// Command line for image OCR; `{path}` is replaced by the file path.
    pub image_command: Option<String>,
    /// Command line for audio transcription; `{path}` is replaced by the file path.
    pub audio_command: Option<String>,
    /// Per file; OCR and transcription can be slow.
    pub timeout_secs: u64,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self { image_command: None, audio_command: None, timeout_secs: 300 }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
