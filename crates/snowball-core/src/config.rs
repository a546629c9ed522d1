//! Snowball Configuration Management
//!
//! Handles configuration from environment variables and TOML files with
//! defaults matching the classic Snowball tuning.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Bootstrapping parameters
    pub snowball: SnowballConfig,

    /// Sentence store connection
    pub store: StoreConfig,

    /// Document indexing workers
    pub indexer: IndexerConfig,

    /// Seed input and log output paths
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        // Output paths
        if let Some(path) = env_value::<PathBuf>("SNOWBALL_SEEDS_FILE")? {
            self.output.seeds_file = path;
        }
        if let Some(path) = env_value::<PathBuf>("SNOWBALL_TUPLES_FILE")? {
            self.output.tuples_file = path;
        }
        if let Some(path) = env_value::<PathBuf>("SNOWBALL_PATTERNS_FILE")? {
            self.output.patterns_file = path;
        }

        // Bootstrapping
        if let Some(n) = env_value("SNOWBALL_ITERATIONS")? {
            self.snowball.iterations = n;
        }
        if let Some(n) = env_value("SNOWBALL_SENTENCE_CAP")? {
            self.snowball.sentence_cap = n;
        }
        if let Some(x) = env_value("SNOWBALL_MIN_TUPLE_CONFIDENCE")? {
            self.snowball.min_tuple_confidence = x;
        }
        if let Some(x) = env_value("SNOWBALL_MIN_PATTERN_SIMILARITY")? {
            self.snowball.min_pattern_similarity = x;
        }

        // Store
        if let Some(backend) = env_value("SNOWBALL_STORE")? {
            self.store.backend = backend;
        }
        if let Ok(paths) = std::env::var("SNOWBALL_JSONL_PATHS") {
            self.store.jsonl_paths = paths
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
        }
        if let Ok(url) = std::env::var("ELASTICSEARCH_URL") {
            self.store.elasticsearch_url = url;
        }
        if let Ok(index) = std::env::var("ELASTICSEARCH_INDEX") {
            self.store.elasticsearch_index = index;
        }

        // Indexer
        if let Some(n) = env_value("SNOWBALL_WORKERS")? {
            self.indexer.workers = n;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(self)
    }

    /// Reject values the bootstrapping loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.snowball;

        if s.iterations == 0 {
            return Err(invalid("snowball.iterations", s.iterations));
        }
        if s.max_window == 0 {
            return Err(invalid("snowball.max_window", s.max_window));
        }
        if s.min_pattern_support == 0 {
            return Err(invalid("snowball.min_pattern_support", s.min_pattern_support));
        }
        for (key, weight) in [
            ("snowball.left_weight", s.left_weight),
            ("snowball.middle_weight", s.middle_weight),
            ("snowball.right_weight", s.right_weight),
        ] {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(invalid(key, weight));
            }
        }
        for (key, factor) in [
            ("snowball.pattern_update_factor", s.pattern_update_factor),
            ("snowball.tuple_update_factor", s.tuple_update_factor),
        ] {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(invalid(key, factor));
            }
        }
        if !s.min_pattern_similarity.is_finite() || s.min_pattern_similarity <= 0.0 {
            return Err(invalid(
                "snowball.min_pattern_similarity",
                s.min_pattern_similarity,
            ));
        }
        if !(0.0..=1.0).contains(&s.min_tuple_confidence) {
            return Err(invalid(
                "snowball.min_tuple_confidence",
                s.min_tuple_confidence,
            ));
        }
        if self.store.page_size == 0 {
            return Err(invalid("store.page_size", self.store.page_size));
        }
        if self.indexer.workers == 0 {
            return Err(invalid("indexer.workers", self.indexer.workers));
        }

        Ok(())
    }
}

fn env_value<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

fn invalid(key: &str, value: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Bootstrapping parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowballConfig {
    /// Total number of tag-filtered sentences scanned across all iterations
    pub sentence_cap: usize,

    /// Maximum number of tokens in the left/right contexts
    pub max_window: usize,

    /// Weight of the left context
    pub left_weight: f64,

    /// Weight of the middle context
    pub middle_weight: f64,

    /// Weight of the right context
    pub right_weight: f64,

    /// Maximum number of iterations
    pub iterations: usize,

    /// Minimum number of members for a cluster to become a pattern
    pub min_pattern_support: usize,

    /// Minimum confidence for a candidate to become a seed
    pub min_tuple_confidence: f64,

    /// Minimum degree of match between patterns
    pub min_pattern_similarity: f64,

    /// EWMA factor for pattern confidence
    pub pattern_update_factor: f64,

    /// EWMA factor for tuple confidence
    pub tuple_update_factor: f64,
}

impl Default for SnowballConfig {
    fn default() -> Self {
        Self {
            sentence_cap: 10_000,
            max_window: 2,
            left_weight: 0.1,
            middle_weight: 0.8,
            right_weight: 0.1,
            iterations: 10,
            min_pattern_support: 2,
            min_tuple_confidence: 0.8,
            min_pattern_similarity: 0.6,
            pattern_update_factor: 0.5,
            tuple_update_factor: 0.5,
        }
    }
}

/// Supported sentence store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Jsonl,
    Elasticsearch,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonl" => Ok(Self::Jsonl),
            "elasticsearch" | "es" => Ok(Self::Elasticsearch),
            _ => Err(ConfigError::InvalidValue {
                key: "SNOWBALL_STORE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Sentence store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to read sentences from
    pub backend: StoreBackend,

    /// JSONL shard files (or directories of shards)
    pub jsonl_paths: Vec<PathBuf>,

    /// Elasticsearch base URL
    pub elasticsearch_url: String,

    /// Elasticsearch index holding sentence documents
    pub elasticsearch_index: String,

    /// Page size for paginated queries
    pub page_size: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Jsonl,
            jsonl_paths: vec![PathBuf::from("sentences")],
            elasticsearch_url: "http://localhost:9200".to_string(),
            elasticsearch_index: "snowball_sentences".to_string(),
            page_size: 100,
            timeout_secs: 30,
        }
    }
}

/// Document indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Number of indexing workers
    pub workers: usize,

    /// Directory receiving the sentence shards
    pub output_dir: PathBuf,

    /// Gazetteer used by the dictionary tagger
    pub gazetteer: Option<PathBuf>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            output_dir: PathBuf::from("sentences"),
            gazetteer: None,
        }
    }
}

impl IndexerConfig {
    /// `path` when given, otherwise the configured gazetteer
    pub fn gazetteer_or(&self, path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        path.or_else(|| self.gazetteer.clone())
            .ok_or_else(|| ConfigError::MissingRequired("indexer.gazetteer".to_string()))
    }
}

/// Seed input and log output paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Seed file (relation, tag pair, then one pair per line)
    pub seeds_file: PathBuf,

    /// Append-only tuple log
    pub tuples_file: PathBuf,

    /// Append-only pattern log
    pub patterns_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            seeds_file: PathBuf::from("seeds"),
            tuples_file: PathBuf::from("tuples.jsonl"),
            patterns_file: PathBuf::from("patterns.jsonl"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
