//! Configuration management for the csvpipe ingestion service.
//!
//! This module handles loading configuration from TOML files and
//! environment variables, with sensible defaults for all settings.

use crate::core::error::{PipeError, Result};
use crate::core::logging::{LogFormat, LogLevel};
use crate::core::xdg::XdgDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

/// Watched directory configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    /// Directory that receives CSV drops
    #[serde(default = "default_watch_path")]
    pub path: PathBuf,

    /// Also watch and scan subdirectories
    #[serde(default)]
    pub recursive: bool,

    /// File patterns that trigger ingestion (glob syntax)
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,

    /// File patterns never ingested (glob syntax)
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Quiet period after the last write before a file created in
    /// place is ingested (0 ingests on creation)
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkersConfig {
    /// Number of concurrent pipeline workers
    #[serde(default = "default_worker_count")]
    pub count: usize,

    /// Maximum queued paths before producers wait
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Upper bound for a single stage on a single file
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    /// Process queued paths before exiting on shutdown
    #[serde(default = "default_true")]
    pub drain_on_shutdown: bool,
}

/// Dedup index configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Snapshot of processed paths
    #[serde(default = "default_index_file")]
    pub snapshot_file: PathBuf,

    /// Bloom filter sizing: expected number of processed files
    #[serde(default = "default_expected_items")]
    pub expected_items: usize,

    /// Bloom filter sizing: target false-positive rate
    #[serde(default = "default_false_positive_rate")]
    pub false_positive_rate: f64,
}

/// Cleaning rules applied by the default transformer
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransformConfig {
    /// Trim leading/trailing whitespace in every field
    #[serde(default = "default_true")]
    pub trim_whitespace: bool,

    /// Drop rows whose fields are all empty
    #[serde(default = "default_true")]
    pub drop_empty_rows: bool,

    /// Columns that must be present and non-empty
    #[serde(default)]
    pub required_columns: Vec<String>,

    /// Drop later rows repeating these key columns
    #[serde(default)]
    pub dedup_keys: Vec<String>,

    /// Column checked against `allowed_values`
    #[serde(default)]
    pub filter_column: Option<String>,

    /// Rows are kept only if `filter_column` holds one of these
    #[serde(default)]
    pub allowed_values: Vec<String>,
}

/// Loader configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadConfig {
    /// Directory receiving one JSON-lines file per ingested CSV
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    /// Also write a daily-rolling log file under the XDG state dir
    #[serde(default)]
    pub file: bool,
}

/// Pipeline event log configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Append every pipeline event as a JSON line
    #[serde(default)]
    pub file: bool,
}

// Default value functions
fn default_watch_path() -> PathBuf {
    PathBuf::from("./data")
}

fn default_patterns() -> Vec<String> {
    vec!["*.csv".to_string()]
}

fn default_worker_count() -> usize {
    10
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_stage_timeout() -> u64 {
    300
}

fn default_settle_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_index_file() -> PathBuf {
    PathBuf::from("./file_index.json")
}

fn default_expected_items() -> usize {
    100_000
}

fn default_false_positive_rate() -> f64 {
    0.001
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./loaded")
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            path: default_watch_path(),
            recursive: false,
            patterns: default_patterns(),
            exclude_patterns: Vec::new(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            stage_timeout_secs: default_stage_timeout(),
            drain_on_shutdown: true,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            snapshot_file: default_index_file(),
            expected_items: default_expected_items(),
            false_positive_rate: default_false_positive_rate(),
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            trim_whitespace: true,
            drop_empty_rows: true,
            required_columns: Vec::new(),
            dedup_keys: Vec::new(),
            filter_column: None,
            allowed_values: Vec::new(),
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            file: false,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| PipeError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load config with priority: env vars > TOML > defaults
    pub fn load() -> Result<Self> {
        let xdg = XdgDirs::new();
        Self::load_with_xdg(&xdg)
    }

    /// Load config with explicit XDG directories
    ///
    /// Priority order:
    /// 1. CSVPIPE_CONFIG env var
    /// 2. XDG config file (~/.config/csvpipe/config.toml)
    /// 3. Legacy ./csvpipe.toml
    /// 4. Defaults
    pub fn load_with_xdg(xdg: &XdgDirs) -> Result<Self> {
        let mut config = if let Ok(config_path) = env::var("CSVPIPE_CONFIG") {
            Self::from_file(config_path)?
        } else {
            let xdg_config = xdg.config_file();
            if xdg_config.exists() {
                Self::from_file(xdg_config)?
            } else if Path::new("csvpipe.toml").exists() {
                Self::from_file("csvpipe.toml")?
            } else {
                Self::default()
            }
        };

        // Relative defaults move under the XDG data dir unless explicitly set
        if config.index.snapshot_file == default_index_file() {
            config.index.snapshot_file = xdg.index_file();
        }
        if config.load.output_dir == default_output_dir() {
            config.load.output_dir = xdg.loaded_dir();
        }

        config.merge_env();
        config.validate()?;

        Ok(config)
    }

    /// Merge configuration with environment variables
    pub fn merge_env(&mut self) {
        if let Ok(path) = env::var("CSVPIPE_WATCH_PATH") {
            self.watch.path = PathBuf::from(path);
        }
        if let Ok(recursive) = env::var("CSVPIPE_RECURSIVE") {
            if let Ok(r) = recursive.parse() {
                self.watch.recursive = r;
            }
        }
        if let Ok(settle) = env::var("CSVPIPE_SETTLE_MS") {
            if let Ok(ms) = settle.parse() {
                self.watch.settle_ms = ms;
            }
        }

        if let Ok(count) = env::var("CSVPIPE_WORKERS") {
            if let Ok(n) = count.parse() {
                self.workers.count = n;
            }
        }
        if let Ok(capacity) = env::var("CSVPIPE_QUEUE_CAPACITY") {
            if let Ok(c) = capacity.parse() {
                self.workers.queue_capacity = c;
            }
        }
        if let Ok(timeout) = env::var("CSVPIPE_STAGE_TIMEOUT_SEC") {
            if let Ok(t) = timeout.parse() {
                self.workers.stage_timeout_secs = t;
            }
        }

        if let Ok(file) = env::var("CSVPIPE_INDEX_FILE") {
            self.index.snapshot_file = PathBuf::from(file);
        }
        if let Ok(dir) = env::var("CSVPIPE_OUTPUT_DIR") {
            self.load.output_dir = PathBuf::from(dir);
        }

        if let Ok(level) = env::var("CSVPIPE_LOG_LEVEL") {
            if let Ok(l) = level.parse() {
                self.logging.level = l;
            }
        }
        if let Ok(format) = env::var("CSVPIPE_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.watch.patterns.is_empty() {
            return Err(PipeError::ConfigError(
                "At least one watch pattern is required".to_string(),
            ));
        }
        for pattern in self.watch.patterns.iter().chain(&self.watch.exclude_patterns) {
            glob::Pattern::new(pattern).map_err(|e| {
                PipeError::ConfigError(format!("Invalid pattern '{pattern}': {e}"))
            })?;
        }

        if self.workers.count == 0 {
            return Err(PipeError::ConfigError(
                "Worker count must be non-zero".to_string(),
            ));
        }

        if self.workers.queue_capacity == 0 {
            return Err(PipeError::ConfigError(
                "Queue capacity must be non-zero".to_string(),
            ));
        }

        if self.workers.stage_timeout_secs == 0 {
            return Err(PipeError::ConfigError(
                "Stage timeout must be non-zero".to_string(),
            ));
        }

        if self.index.expected_items == 0 {
            return Err(PipeError::ConfigError(
                "Expected index items must be non-zero".to_string(),
            ));
        }

        let fpr = self.index.false_positive_rate;
        if !(fpr > 0.0 && fpr < 1.0) {
            return Err(PipeError::ConfigError(format!(
                "False positive rate must be between 0 and 1 (got {fpr})"
            )));
        }

        if !self.transform.allowed_values.is_empty() && self.transform.filter_column.is_none() {
            return Err(PipeError::ConfigError(
                "allowed_values requires filter_column".to_string(),
            ));
        }

        Ok(())
    }

    /// Log configuration
    pub fn log_config(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Watch path: {:?}", self.watch.path);
        tracing::info!("  Recursive: {}", self.watch.recursive);
        tracing::info!("  Patterns: {:?}", self.watch.patterns);
        tracing::info!("  Settle: {}ms", self.watch.settle_ms);
        tracing::info!("  Workers: {}", self.workers.count);
        tracing::info!("  Queue capacity: {}", self.workers.queue_capacity);
        tracing::info!("  Stage timeout: {}s", self.workers.stage_timeout_secs);
        tracing::info!("  Drain on shutdown: {}", self.workers.drain_on_shutdown);
        tracing::info!("  Index file: {:?}", self.index.snapshot_file);
        tracing::info!(
            "  Bloom sizing: {} items @ {} fpr",
            self.index.expected_items,
            self.index.false_positive_rate
        );
        tracing::info!("  Output dir: {:?}", self.load.output_dir);
    }
}
