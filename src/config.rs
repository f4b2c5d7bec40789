//! Configuration module for memdex.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `MEMDEX_` and use double
//! underscores to separate nested levels:
//! - `MEMDEX_VECTOR__DIMENSION=384` sets `vector.dimension`
//! - `MEMDEX_SEARCH__DEMOTION=permanent` sets `search.demotion`
//! - `MEMDEX_FUZZY__BATCH_SIZE=500` sets `fuzzy.batch_size`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".memdex";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "MEMDEX_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Native vector index settings
    #[serde(default)]
    pub vector: VectorConfig,

    /// Similarity search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Knowledge ranking weights
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Cached-embedding fuzzy matching
    #[serde(default)]
    pub fuzzy: FuzzyConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Colored output
    #[serde(default = "default_true")]
    pub ansi: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VectorConfig {
    /// Embedding dimensionality, constant per deployment
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Name of the native vector index
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Document field holding the embedding
    #[serde(default = "default_embedding_field")]
    pub embedding_field: String,

    /// Native candidate pool is `limit * candidate_multiplier`
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    /// HNSW graph degree
    #[serde(default = "default_hnsw_m")]
    pub hnsw_m: usize,

    /// HNSW build-time candidate list size
    #[serde(default = "default_hnsw_ef_construction")]
    pub hnsw_ef_construction: usize,

    /// Collections that get a vector index
    #[serde(default = "default_collections")]
    pub collections: Vec<String>,
}

/// What a native search failure does to the shared capability state.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DemotionPolicy {
    /// Fall back for the failing request only
    #[default]
    PerRequest,
    /// Disable native search for the rest of the process lifetime
    Permanent,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// Maximum documents loaded by a brute-force scan
    #[serde(default = "default_fallback_candidate_cap")]
    pub fallback_candidate_cap: usize,

    /// Threshold used when the caller gives none
    #[serde(default = "default_match_threshold")]
    pub default_match_threshold: f32,

    /// Result count used when the caller gives none
    #[serde(default = "default_match_count")]
    pub default_match_count: usize,

    /// Similarity at or above which a new memory counts as a duplicate
    #[serde(default = "default_uniqueness_threshold")]
    pub uniqueness_threshold: f32,

    #[serde(default)]
    pub demotion: DemotionPolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct KnowledgeConfig {
    /// Multiplier when the search text occurs in the item text
    #[serde(default = "default_keyword_boost")]
    pub keyword_boost: f32,

    #[serde(default = "default_chunk_boost")]
    pub chunk_boost: f32,

    #[serde(default = "default_main_boost")]
    pub main_boost: f32,

    /// Lower similarity gate for keyword-boosted items
    #[serde(default = "default_keyword_min_similarity")]
    pub keyword_min_similarity: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FuzzyConfig {
    /// Documents fetched per page while scanning cached embeddings
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Candidate count above which top-K switches to quickselect
    #[serde(default = "default_quickselect_threshold")]
    pub quickselect_threshold: usize,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_dimension() -> usize {
    1536
}
fn default_index_name() -> String {
    "vector_index".to_string()
}
fn default_embedding_field() -> String {
    "embedding".to_string()
}
fn default_candidate_multiplier() -> usize {
    2
}
fn default_hnsw_m() -> usize {
    16
}
fn default_hnsw_ef_construction() -> usize {
    64
}
fn default_collections() -> Vec<String> {
    vec!["memories".to_string(), "knowledge".to_string()]
}
fn default_fallback_candidate_cap() -> usize {
    1000
}
fn default_match_threshold() -> f32 {
    0.1
}
fn default_match_count() -> usize {
    10
}
fn default_uniqueness_threshold() -> f32 {
    0.95
}
fn default_keyword_boost() -> f32 {
    3.0
}
fn default_chunk_boost() -> f32 {
    1.5
}
fn default_main_boost() -> f32 {
    1.2
}
fn default_keyword_min_similarity() -> f32 {
    0.3
}
fn default_batch_size() -> usize {
    1000
}
fn default_quickselect_threshold() -> usize {
    1000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            logging: LoggingConfig::default(),
            vector: VectorConfig::default(),
            search: SearchConfig::default(),
            knowledge: KnowledgeConfig::default(),
            fuzzy: FuzzyConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ansi: true,
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            index_name: default_index_name(),
            embedding_field: default_embedding_field(),
            candidate_multiplier: default_candidate_multiplier(),
            hnsw_m: default_hnsw_m(),
            hnsw_ef_construction: default_hnsw_ef_construction(),
            collections: default_collections(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fallback_candidate_cap: default_fallback_candidate_cap(),
            default_match_threshold: default_match_threshold(),
            default_match_count: default_match_count(),
            uniqueness_threshold: default_uniqueness_threshold(),
            demotion: DemotionPolicy::default(),
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            keyword_boost: default_keyword_boost(),
            chunk_boost: default_chunk_boost(),
            main_boost: default_main_boost(),
            keyword_min_similarity: default_keyword_min_similarity(),
        }
    }
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            quickselect_threshold: default_quickselect_threshold(),
        }
    }
}

fn env_provider() -> Env {
    // Double underscore separates nesting levels, single underscore stays
    Env::prefixed(ENV_PREFIX).map(|key| key.as_str().to_lowercase().replace("__", ".").into())
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(env_provider())
            .extract()
            .map_err(Box::new)
    }

    /// Find `.memdex/settings.toml` searching from the current directory up
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join(CONFIG_FILE));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Check values that would make searches meaningless
    pub fn validate(&self) -> Result<(), String> {
        if self.vector.dimension == 0 {
            return Err("vector.dimension must be greater than zero".to_string());
        }
        if self.vector.candidate_multiplier == 0 {
            return Err("vector.candidate_multiplier must be at least 1".to_string());
        }
        if self.fuzzy.batch_size == 0 {
            return Err("fuzzy.batch_size must be greater than zero".to_string());
        }
        if self.search.fallback_candidate_cap == 0 {
            return Err("search.fallback_candidate_cap must be greater than zero".to_string());
        }
        if !(-1.0..=1.0).contains(&self.search.uniqueness_threshold) {
            return Err(format!(
                "search.uniqueness_threshold must be within [-1, 1], got {}",
                self.search.uniqueness_threshold
            ));
        }
        Ok(())
    }
}
