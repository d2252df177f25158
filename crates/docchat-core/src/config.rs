//! Layered configuration and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + the
//! conventional service variables (`QDRANT_URL`, `GOOGLE_API_KEY`, ...) +
//! `APP_*` overrides with `__` as the nesting separator. A `.env` file in the
//! working directory is loaded into the process environment first.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::path::PathBuf;

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

/// Conventional variable name -> settings key.
const CONVENTIONAL_ENV: &[(&str, &str)] = &[
    ("QDRANT_URL", "vector.url"),
    ("QDRANT_API_KEY", "vector.api_key"),
    ("GOOGLE_API_KEY", "llm.api_key"),
    ("LANGCHAIN_API_KEY", "trace.api_key"),
    ("LANGCHAIN_PROJECT", "trace.project"),
    ("LANGCHAIN_TRACING_V2", "trace.enabled"),
    ("LANGCHAIN_ENDPOINT", "trace.endpoint"),
    ("APP_MODEL_DIR", "embedding.model_dir"),
    ("APP_USE_FAKE_EMBEDDINGS", "embedding.use_fake"),
];

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(conventional_env()).merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    /// Wrap an already assembled figment. Defaults are not added.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// Extract and validate the full typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings =
            self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

fn conventional_env() -> Env {
    Env::raw().filter_map(|key| {
        CONVENTIONAL_ENV
            .iter()
            .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
            .map(|(_, path)| (*path).into())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Qdrant,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    pub backend: VectorBackend,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub collection: String,
    pub upsert_batch_size: usize,
    pub timeout_secs: Option<u64>,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Qdrant,
            url: None,
            api_key: None,
            collection: "multimodal_rag".into(),
            upsert_batch_size: 256,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemma-3-1b-it".into(),
            temperature: 0.2,
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub use_fake: bool,
    pub max_len: usize,
    /// Chunks sent to the embedder per call.
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, use_fake: false, max_len: 256, batch_size: 32 }
    }
}

impl EmbeddingSettings {
    /// Model directory with `~` and `$VAR` expanded, falling back to
    /// `models/all-MiniLM-L6-v2` under the working directory.
    pub fn resolved_model_dir(&self) -> PathBuf {
        match &self.model_dir {
            Some(dir) => expand_path(dir),
            None => PathBuf::from("models/all-MiniLM-L6-v2"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSettings {
    pub api_key: Option<String>,
    pub project: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            project: None,
            enabled: false,
            endpoint: "https://api.smith.langchain.com".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// Inclusive lower bound on the best hit for a grounded answer.
    pub min_score: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 5, min_score: 0.30 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub vector: VectorSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub trace: TraceSettings,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalSettings,
}

impl Settings {
    /// Fails with every missing required key at once, then with the first
    /// invalid value.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if is_blank(&self.trace.api_key) {
            missing.push("LANGCHAIN_API_KEY (trace.api_key)".to_string());
        }
        if is_blank(&self.trace.project) {
            missing.push("LANGCHAIN_PROJECT (trace.project)".to_string());
        }
        if is_blank(&self.llm.api_key) {
            missing.push("GOOGLE_API_KEY (llm.api_key)".to_string());
        }
        if self.vector.backend == VectorBackend::Qdrant && is_blank(&self.vector.url) {
            missing.push("QDRANT_URL (vector.url)".to_string());
        }
        if !missing.is_empty() {
            return Err(Error::MissingSettings(missing));
        }

        self.chunking.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_score) {
            return Err(Error::InvalidConfig(format!(
                "retrieval.min_score must be a cosine similarity in [-1, 1], got {}",
                self.retrieval.min_score
            )));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::InvalidConfig(format!(
                "llm.temperature out of range: {}",
                self.llm.temperature
            )));
        }
        if self.vector.collection.trim().is_empty() {
            return Err(Error::InvalidConfig("vector.collection must not be empty".into()));
        }
        if self.vector.upsert_batch_size == 0 {
            return Err(Error::InvalidConfig("vector.upsert_batch_size must be at least 1".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Accepts `true`/`false`, `1`/`0` and the usual string spellings.
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Str(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Int(i) => Ok(i != 0),
        Raw::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "" | "0" | "false" | "no" | "off" => Ok(false),
            other => Err(serde::de::Error::custom(format!("not a boolean: {other}"))),
        },
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
