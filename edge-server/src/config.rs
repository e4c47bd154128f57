//! Configuration loading for xmcl-edge.
//!
//! Configuration is loaded from a TOML file (default: `edge.toml`). Every
//! field has a default, so an empty file (or no file) is a valid config.

use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration for xmcl-edge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Group relay configuration.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Translation backend and worker configuration.
    #[serde(default)]
    pub translation: TranslationConfig,
    /// Stale lock cleanup configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener (default: 0.0.0.0:8080).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Group relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Per-group broadcast buffer; slower receivers skip ahead (default: 256).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Frames larger than this are dropped (default: 1MB).
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// How prompts are sent to the translation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Chat completion with a system prompt and a worked example.
    #[default]
    Chat,
    /// Dedicated machine-translation model with `translation_options`.
    Machine,
}

/// Translation backend and worker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    /// OpenAI-compatible chat completions URL.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Model name sent with every request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the bearer token (default: OPENAI_API_KEY).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Prompt style.
    #[serde(default)]
    pub mode: BackendMode,
    /// Character window for Markdown chunks (default: 10000).
    #[serde(default = "default_markdown_window")]
    pub markdown_window: usize,
    /// Character window for HTML chunks (default: 15000).
    #[serde(default = "default_html_window")]
    pub html_window: usize,
    /// Timeout for a single backend call in seconds (default: 120).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Jobs waiting for the worker; when full, requests stay pending (default: 64).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Run the background worker (default: true).
    #[serde(default = "default_worker_enabled")]
    pub worker_enabled: bool,
    /// Jobs translated at the same time (default: 4).
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

/// Stale lock cleanup configuration.
///
/// Lock rows outlive a process that dies mid-job; the sweep releases any lock
/// not refreshed for `lock_ttl_secs` so the next request restarts the job.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Interval between sweeps in seconds (default: 60).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Seconds without a refresh after which a lock counts as abandoned
    /// (default: 900). Running jobs refresh every 30 seconds.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    /// Enable the sweep (default: true).
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_channel_capacity() -> usize {
    256
}

fn default_max_frame_bytes() -> usize {
    1024 * 1024 // 1MB
}

fn default_database_path() -> PathBuf {
    PathBuf::from("translations.db")
}

fn default_backend_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_markdown_window() -> usize {
    10_000
}

fn default_html_window() -> usize {
    15_000
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_queue_capacity() -> usize {
    64
}

fn default_worker_enabled() -> bool {
    true
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_lock_ttl_secs() -> u64 {
    900 // 15 minutes
}

fn default_cleanup_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            mode: BackendMode::default(),
            markdown_window: default_markdown_window(),
            html_window: default_html_window(),
            request_timeout_secs: default_request_timeout_secs(),
            queue_capacity: default_queue_capacity(),
            worker_enabled: default_worker_enabled(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            lock_ttl_secs: default_lock_ttl_secs(),
            enabled: default_cleanup_enabled(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

impl ConfigError {
    /// Whether the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ConfigError::ReadError { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
