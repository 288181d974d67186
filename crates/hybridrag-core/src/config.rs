//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge defaults + `config.toml` + `config.<env>.toml` + `APP_*`
//! env vars (`__` separates nesting, e.g. `APP_QUERY__K_MERGE=10`). Provides
//! helpers to expand `~` and `${VAR}` and to resolve relative paths against a
//! known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::corpus::InvalidChunkPolicy;
use crate::error::{Error, Result};
use crate::params::{Bm25Params, QueryParams};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.engine()?;
        Ok(config)
    }

    /// Wraps an already assembled figment, e.g. one built from `Toml::string` in tests.
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

    /// Extracts and validates the engine section set. Missing keys fall back to defaults.
    pub fn engine(&self) -> Result<EngineConfig> {
        let config: EngineConfig = Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(self.figment.clone())
            .extract()
            .map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Every tunable of the engine, grouped the way `config.toml` lays them out:
///
/// ```toml
/// [bm25]
/// k1 = 1.5
///
/// [query]
/// k_merge = 20
///
/// [query.fusion]
/// strategy = "reciprocal_rank"
///
/// [timeouts]
/// rerank_ms = 2000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bm25: Bm25Params,
    pub query: QueryParams,
    pub context: ContextConfig,
    pub timeouts: TimeoutConfig,
    pub build: BuildConfig,
    pub runtime: RuntimeConfig,
    pub storage: StorageConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.bm25.validate()?;
        self.query.validate()?;
        self.context.validate()?;
        self.timeouts.validate()?;
        self.runtime.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Upper bound, in characters, on the context handed to the answer extractor.
    pub char_budget: usize,
    pub separator: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { char_budget: 3500, separator: String::new() }
    }
}

impl ContextConfig {
    fn validate(&self) -> Result<()> {
        if self.char_budget == 0 {
            return Err(Error::config("context.char_budget must be greater than 0"));
        }
        Ok(())
    }
}

/// Deadlines around the external model calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub embed_ms: u64,
    pub rerank_ms: u64,
    pub extract_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { embed_ms: 10_000, rerank_ms: 5_000, extract_ms: 10_000 }
    }
}

impl TimeoutConfig {
    fn validate(&self) -> Result<()> {
        if self.embed_ms == 0 || self.rerank_ms == 0 || self.extract_ms == 0 {
            return Err(Error::config("timeouts must be greater than 0 ms"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub invalid_chunk_policy: InvalidChunkPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads of the runtime that hosts external model calls.
    pub worker_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { worker_threads: 2 }
    }
}

impl RuntimeConfig {
    fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(Error::config("runtime.worker_threads must be greater than 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot file; `~` and `${VAR}` are expanded, relative paths resolve against a caller-given base.
    pub snapshot_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { snapshot_path: "store/search_index.json".to_string() }
    }
}

impl StorageConfig {
    pub fn resolve(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.snapshot_path)
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
