//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. the `--config` command-line flag
//! 2. `$ATTACHSCOPE_CONFIG` (environment variable)
//! 3. `~/.config/attachscope/config.toml` (Linux/macOS)
//!    `%APPDATA%\attachscope\config.toml` (Windows)
//! 4. Built-in defaults

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ScopeError};

/// Per-processor configuration, keyed by processor name.
pub type ProcessorsConfig = BTreeMap<String, ProcessorConfig>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Search-index cluster connection and retry settings.
    pub elasticsearch: ElasticsearchConfig,
    /// Attachment processors (`[processors.tika]`, `[processors.virustotal]`, ...).
    pub processors: ProcessorsConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override directory for the log file.
    pub log_dir: Option<PathBuf>,
}

/// Search-index cluster settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticsearchConfig {
    /// Cluster host, with or without scheme and port.
    pub host: String,
    /// Attempts made by maintenance operations before giving up.
    pub max_retry: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Upper bound on the total time a retry loop may take.
    pub retry_deadline_secs: Option<u64>,
}

/// Configuration of a single processor.
///
/// `enabled` is the only key every processor shares. All other keys are
/// kept as-is; each processor reads the ones it knows into its own typed
/// options and ignores the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Run this processor at all.
    #[serde(default)]
    pub enabled: bool,
    /// Processor-specific options.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            host: "elasticsearch".to_string(),
            max_retry: 10,
            timeout_secs: 30,
            retry_deadline_secs: None,
        }
    }
}

impl ElasticsearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_deadline(&self) -> Option<Duration> {
        self.retry_deadline_secs.map(Duration::from_secs)
    }
}

impl ProcessorConfig {
    /// An enabled config with the given options.
    pub fn enabled_with(options: Value) -> Self {
        let options = match options {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            enabled: true,
            options,
        }
    }

    /// Deserialize the typed options of a processor.
    pub fn typed_options<T: DeserializeOwned>(&self, processor: &str) -> Result<T> {
        serde_json::from_value(Value::Object(self.options.clone()))
            .map_err(|e| ScopeError::Config(format!("[processors.{processor}]: {e}")))
    }

    /// The full configuration as one JSON object, `enabled` included.
    pub fn to_value(&self) -> Value {
        let mut map = self.options.clone();
        map.insert("enabled".to_string(), Value::Bool(self.enabled));
        Value::Object(map)
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration.
///
/// An explicitly given file must exist and parse. A file found through the
/// standard search falls back to defaults on error, with a warning.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return read_config_file(path);
    }

    if let Some(path) = config_file_path() {
        if path.exists() {
            match read_config_file(&path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to load config, using defaults"
                    );
                }
            }
        }
    }
    Ok(Config::default())
}

/// Read and parse a single TOML config file.
pub fn read_config_file(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| ScopeError::io(path, e))?;
    let cfg = toml::from_str::<Config>(&contents)
        .map_err(|e| ScopeError::Config(format!("{}: {e}", path.display())))?;
    tracing::info!(path = %path.display(), "Loaded config");
    Ok(cfg)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("ATTACHSCOPE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("attachscope").join("config.toml"))
}

/// Return the directory the log file is written to.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("attachscope")
}
