//! Configuration module for sigstream-rs
//!
//! This module handles engine and recorder configuration:
//! - [`EngineConfig`] - buffer sizing, parser, resampler and timing knobs
//! - [`RecorderConfig`] - CSV recording options
//! - [`LoggingConfig`] - log filter and optional rolling log file
//!
//! # Files
//!
//! Configuration is stored as TOML (`.toml`) or JSON (any other extension).
//! Every field has a default, so a config file only needs the keys it changes:
//!
//! ```toml
//! buffer_capacity = 20000
//!
//! [parser]
//! mode = "FramedBinary"
//! channel_count = 4
//! numeric_format = "Int16"
//! frame_start_bytes = [0xAA, 0x55]
//! ```
//!
//! # Default Location
//!
//! [`default_config_path`] resolves to the platform config directory:
//! - **Linux**: `~/.config/sigstream-rs/engine.toml`
//! - **macOS**: `~/Library/Application Support/sigstream-rs/engine.toml`
//! - **Windows**: `%APPDATA%\sigstream-rs\engine.toml`

use crate::conditioning::ResamplerConfig;
use crate::error::{Result, StreamError};
use crate::parser::ParserConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "sigstream-rs";

/// Engine config filename
pub const ENGINE_CONFIG_FILE: &str = "engine.toml";

/// Default samples kept per channel
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Default bytes requested from the transport per read
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Default sleep after a failed read, in milliseconds
pub const DEFAULT_ERROR_BACKOFF_MS: u64 = 20;

/// Default consecutive read failures before the engine faults
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Default wait for the ingestion thread to acknowledge a stop, in milliseconds
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 1000;

/// Default bound on carried-over undecoded bytes
pub const DEFAULT_MAX_RESIDUE_BYTES: usize = 64 * 1024;

/// Default per-subscriber event queue length
pub const DEFAULT_EVENT_QUEUE_SIZE: usize = 256;

// ==================== Config Directory ====================

/// Get the application config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default engine config file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(ENGINE_CONFIG_FILE))
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Read a TOML or JSON file into `T`, picking the format by extension
fn load_file<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| StreamError::Config(format!("Failed to read {} {:?}: {}", what, path, e)))?;

    if is_toml(path) {
        toml::from_str(&content)
            .map_err(|e| StreamError::Config(format!("Failed to parse {} {:?}: {}", what, path, e)))
    } else {
        serde_json::from_str(&content)
            .map_err(|e| StreamError::Config(format!("Failed to parse {} {:?}: {}", what, path, e)))
    }
}

/// Write `value` as TOML or JSON, picking the format by extension
fn save_file<T: Serialize>(value: &T, path: &Path, what: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StreamError::Config(format!("Failed to create {} directory: {}", what, e))
            })?;
        }
    }

    let content = if is_toml(path) {
        toml::to_string_pretty(value)
            .map_err(|e| StreamError::Serialization(format!("Failed to serialize {}: {}", what, e)))?
    } else {
        serde_json::to_string_pretty(value)
            .map_err(|e| StreamError::Serialization(format!("Failed to serialize {}: {}", what, e)))?
    };

    std::fs::write(path, content)
        .map_err(|e| StreamError::Config(format!("Failed to write {} {:?}: {}", what, path, e)))
}

// ==================== Engine Config ====================

/// Streaming engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Samples kept per channel
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Frame rate to report when the transport does not know its own
    #[serde(default)]
    pub sample_rate_hz: Option<f64>,

    /// Bytes requested from the transport per read
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    /// Sleep after a failed read
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    /// Consecutive read failures before the engine faults
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// Wait for the ingestion thread to acknowledge a stop
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Bound on carried-over undecoded bytes
    #[serde(default = "default_max_residue_bytes")]
    pub max_residue_bytes: usize,

    /// Per-subscriber event queue length
    #[serde(default = "default_event_queue_size")]
    pub event_queue_size: usize,

    /// Wire format
    #[serde(default)]
    pub parser: ParserConfig,

    /// Optional resampling stage
    #[serde(default)]
    pub resampler: Option<ResamplerConfig>,

    /// Optional CSV recording
    #[serde(default)]
    pub recorder: Option<RecorderConfig>,

    /// Logging setup used by the binary
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_read_chunk_size() -> usize {
    DEFAULT_READ_CHUNK_SIZE
}

fn default_error_backoff_ms() -> u64 {
    DEFAULT_ERROR_BACKOFF_MS
}

fn default_max_consecutive_errors() -> u32 {
    DEFAULT_MAX_CONSECUTIVE_ERRORS
}

fn default_stop_timeout_ms() -> u64 {
    DEFAULT_STOP_TIMEOUT_MS
}

fn default_max_residue_bytes() -> usize {
    DEFAULT_MAX_RESIDUE_BYTES
}

fn default_event_queue_size() -> usize {
    DEFAULT_EVENT_QUEUE_SIZE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            sample_rate_hz: None,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            error_backoff_ms: DEFAULT_ERROR_BACKOFF_MS,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            max_residue_bytes: DEFAULT_MAX_RESIDUE_BYTES,
            event_queue_size: DEFAULT_EVENT_QUEUE_SIZE,
            parser: ParserConfig::default(),
            resampler: None,
            recorder: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Default config with the given wire format
    pub fn with_parser(parser: ParserConfig) -> Self {
        Self {
            parser,
            ..Default::default()
        }
    }

    /// Load from disk (TOML for `.toml`, JSON otherwise) and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_file(path.as_ref(), "engine config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default engine config: {}", e);
                Self::default()
            }
        }
    }

    /// Save to disk (TOML for `.toml`, JSON otherwise)
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_file(self, path.as_ref(), "engine config")
    }

    /// Check everything that would otherwise fail later at connect time
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(StreamError::InvalidCapacity);
        }
        if self.read_chunk_size == 0 {
            return Err(StreamError::Config(
                "read_chunk_size must be at least 1".to_string(),
            ));
        }
        if self.max_consecutive_errors == 0 {
            return Err(StreamError::Config(
                "max_consecutive_errors must be at least 1".to_string(),
            ));
        }
        if self.event_queue_size == 0 {
            return Err(StreamError::Config(
                "event_queue_size must be at least 1".to_string(),
            ));
        }
        if let Some(rate) = self.sample_rate_hz {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(StreamError::Config(format!(
                    "sample_rate_hz must be positive, got {}",
                    rate
                )));
            }
        }
        if let Some(ResamplerConfig::Decimate { factor: 0 }) = self.resampler {
            return Err(StreamError::Config(
                "decimation factor must be at least 1".to_string(),
            ));
        }
        self.parser.validate()?;
        if self.max_residue_bytes < self.parser.min_frame_len() {
            return Err(StreamError::Config(format!(
                "max_residue_bytes ({}) is smaller than one {} frame ({} bytes)",
                self.max_residue_bytes,
                self.parser.mode,
                self.parser.min_frame_len()
            )));
        }
        Ok(())
    }

    /// Sleep after a failed read
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Wait for the ingestion thread to acknowledge a stop
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

// ==================== Recorder Config ====================

/// CSV recording options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Output file
    pub path: PathBuf,

    /// Whether to record channels whose settings are disabled
    #[serde(default)]
    pub include_disabled: bool,

    /// Flush the writer every this many rows (0 = only on finish)
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
}

fn default_flush_every() -> usize {
    1000
}

impl RecorderConfig {
    /// Record enabled channels to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            include_disabled: false,
            flush_every: default_flush_every(),
        }
    }
}

// ==================== Logging Config ====================

/// Log filter and optional rolling file output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Directory for daily rolling log files (None = console only)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_filter() -> String {
    "info,sigstream_rs=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            log_dir: None,
        }
    }
}
