//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`,
//! `config.<env>.toml` and `APP_*` env vars (`__` separates nesting, so
//! `APP_SEARCH__TOP_K=5` sets `search.top_k`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, ErrorKind};

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
            other => tracing::warn!(env = other, "unknown RUST_ENV, using base config only"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of the whole configuration, validated.
    pub fn settings(&self) -> crate::Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        if matches!(env, "prod" | "production") && !settings.cache.enabled {
            tracing::warn!("response cache disabled in production");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Vector,
    #[default]
    Hybrid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub search: SearchSettings,
    pub cache: CacheSettings,
    pub embedding: EmbeddingSettings,
    pub resilience: ResilienceSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub data_dir: String,
    pub index_dir: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self { data_dir: "./data/raw".to_string(), index_dir: "./data/indexes".to_string() }
    }
}

impl PathSettings {
    pub fn vector_dir(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.index_dir).join("vector") }
    pub fn keyword_dir(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.index_dir).join("keyword") }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub mode: SearchMode,
    pub top_k: usize,
    pub candidate_count: usize,
    pub rrf_k: f32,
    /// Largest squared-L2 distance still considered relevant.
    pub max_distance: f32,
    /// Keyword-only results must score strictly above this.
    pub min_keyword_score: f32,
    /// BM25 score mapped to full confidence.
    pub keyword_full_confidence: f32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            mode: SearchMode::Hybrid,
            top_k: 3,
            candidate_count: 10,
            rrf_k: 60.0,
            max_distance: 1.0,
            min_keyword_score: 0.0,
            keyword_full_confidence: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub embedding_ttl_secs: u64,
    pub search_ttl_secs: u64,
    pub default_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { enabled: true, embedding_ttl_secs: 86_400, search_ttl_secs: 3_600, default_ttl_secs: 3_600 }
    }
}

impl CacheSettings {
    pub fn embedding_ttl(&self) -> Duration { Duration::from_secs(self.embedding_ttl_secs) }
    pub fn search_ttl(&self) -> Duration { Duration::from_secs(self.search_ttl_secs) }
    pub fn default_ttl(&self) -> Duration { Duration::from_secs(self.default_ttl_secs) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub dimension: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self { Self { dimension: 384 } }
}

/// Failure-handling knobs for one external dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencySettings {
    pub failure_threshold: u32,
    pub reset_timeout_secs: u64,
    pub max_attempts: u32,
    pub min_wait_ms: u64,
    pub max_wait_ms: u64,
    pub timeout_ms: u64,
    pub retry_on: Vec<ErrorKind>,
}

impl Default for DependencySettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_secs: 60,
            max_attempts: 3,
            min_wait_ms: 1_000,
            max_wait_ms: 10_000,
            timeout_ms: 30_000,
            retry_on: vec![ErrorKind::TransientIo, ErrorKind::TimeoutExceeded],
        }
    }
}

impl DependencySettings {
    pub fn reset_timeout(&self) -> Duration { Duration::from_secs(self.reset_timeout_secs) }
    pub fn min_wait(&self) -> Duration { Duration::from_millis(self.min_wait_ms) }
    pub fn max_wait(&self) -> Duration { Duration::from_millis(self.max_wait_ms) }
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    pub generator: DependencySettings,
    pub cache: DependencySettings,
    pub store: DependencySettings,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            generator: DependencySettings { max_wait_ms: 5_000, ..DependencySettings::default() },
            cache: DependencySettings {
                reset_timeout_secs: 30,
                max_attempts: 1,
                timeout_ms: 2_000,
                ..DependencySettings::default()
            },
            store: DependencySettings { reset_timeout_secs: 30, timeout_ms: 10_000, ..DependencySettings::default() },
        }
    }
}

impl Settings {
    pub fn validate(&self) -> crate::Result<()> {
        let s = &self.search;
        if s.top_k == 0 {
            return Err(Error::InvalidConfig("search.top_k must be at least 1".into()));
        }
        if s.candidate_count < s.top_k {
            return Err(Error::InvalidConfig(format!(
                "search.candidate_count ({}) must be >= search.top_k ({})",
                s.candidate_count, s.top_k
            )));
        }
        if s.rrf_k <= 0.0 || s.max_distance <= 0.0 || s.keyword_full_confidence <= 0.0 {
            return Err(Error::InvalidConfig("search.rrf_k, max_distance and keyword_full_confidence must be positive".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be positive".into()));
        }
        for (name, dep) in [
            ("generator", &self.resilience.generator),
            ("cache", &self.resilience.cache),
            ("store", &self.resilience.store),
        ] {
            if dep.failure_threshold == 0 || dep.max_attempts == 0 {
                return Err(Error::InvalidConfig(format!(
                    "resilience.{name}: failure_threshold and max_attempts must be at least 1"
                )));
            }
            if dep.min_wait_ms > dep.max_wait_ms {
                return Err(Error::InvalidConfig(format!("resilience.{name}: min_wait_ms exceeds max_wait_ms")));
            }
        }
        Ok(())
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

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
