use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::filename::FilenameCodec;
use crate::recorder::CaptureBackend;

/// Configuration for a recording supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Stream address handed to the capture tool (e.g. an RTSP URL)
    pub source: String,
    /// Directory holding every segment
    pub record_dir: PathBuf,
    /// Length of a full segment in seconds (default: 1800)
    #[serde(default = "default_segment_secs")]
    pub segment_secs: u64,
    /// Filename prefix identifying our segments (default: "record-")
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// strftime pattern for both timestamps in a filename
    #[serde(default = "default_datetime_format")]
    pub datetime_format: String,
    /// Align segment boundaries to multiples of `segment_secs` (default: true)
    #[serde(default = "default_alignment")]
    pub alignment: bool,
    /// Delete segments whose end is older than this many seconds.
    /// Pruning is disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_older_than: Option<u64>,
    /// Retries after a segment ends early (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause before each retry in seconds (default: 10)
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    /// Container the capture tool muxes into; also the file extension (default: "mp4")
    #[serde(default = "default_container")]
    pub container: String,
    /// External capture tool (default: vlc)
    #[serde(default)]
    pub backend: CaptureBackend,
    /// Override the capture tool executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_binary: Option<PathBuf>,
    /// Time the capture process may overrun its planned duration before it is
    /// stopped (default: 15)
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
    /// What to do once retries are exhausted
    #[serde(default)]
    pub on_exhaustion: ExhaustionPolicy,
}

/// Reaction to a segment that still fails after every retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum ExhaustionPolicy {
    /// Stop the supervisor with an error and leave restarting to the host
    #[default]
    Terminate,
    /// Keep running, waiting longer after each consecutive exhausted cycle
    Backoff { max_backoff_secs: u64 },
}

fn default_segment_secs() -> u64 {
    1800
}

fn default_prefix() -> String {
    "record-".to_string()
}

fn default_datetime_format() -> String {
    "%Y-%m-%dT%H:%M".to_string()
}

fn default_alignment() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_interval_secs() -> u64 {
    10
}

fn default_container() -> String {
    "mp4".to_string()
}

fn default_stop_grace_secs() -> u64 {
    15
}

impl RecordingConfig {
    /// Create a new config with defaults
    pub fn new(source: String, record_dir: PathBuf) -> Self {
        Self {
            source,
            record_dir,
            segment_secs: default_segment_secs(),
            prefix: default_prefix(),
            datetime_format: default_datetime_format(),
            alignment: default_alignment(),
            remove_older_than: None,
            max_retries: default_max_retries(),
            retry_interval_secs: default_retry_interval_secs(),
            container: default_container(),
            backend: CaptureBackend::default(),
            capture_binary: None,
            stop_grace_secs: default_stop_grace_secs(),
            on_exhaustion: ExhaustionPolicy::default(),
        }
    }

    /// Enable pruning of segments older than `secs` (builder pattern)
    pub fn with_retention(mut self, secs: u64) -> Self {
        self.remove_older_than = Some(secs);
        self
    }

    pub fn with_segment_secs(mut self, secs: u64) -> Self {
        self.segment_secs = secs;
        self
    }

    pub fn with_backend(mut self, backend: CaptureBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.on_exhaustion = policy;
        self
    }

    /// Check if pruning is enabled
    pub fn retention_enabled(&self) -> bool {
        self.remove_older_than.is_some()
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Filename codec for this configuration
    pub fn codec(&self) -> Result<FilenameCodec, ConfigError> {
        FilenameCodec::new(&self.prefix, &self.datetime_format, &self.container)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Reject configurations the supervisor cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.trim().is_empty() {
            return Err(ConfigError::Invalid("source must not be empty".into()));
        }
        if self.segment_secs == 0 {
            return Err(ConfigError::Invalid("segment_secs must be at least 1".into()));
        }
        if self.prefix.contains(std::path::is_separator) {
            return Err(ConfigError::Invalid(format!(
                "prefix {:?} must not contain a path separator",
                self.prefix
            )));
        }
        if self.container.is_empty()
            || self.container.contains(std::path::is_separator)
            || self.container.contains('.')
        {
            return Err(ConfigError::Invalid(format!(
                "container {:?} must be a bare extension such as \"mp4\"",
                self.container
            )));
        }
        self.codec()?;
        Ok(())
    }

    /// Source address with any embedded credentials masked, for logs
    pub fn source_for_display(&self) -> String {
        if let Some((scheme, rest)) = self.source.split_once("://") {
            let authority_end = rest.find('/').unwrap_or(rest.len());
            if let Some(at) = rest[..authority_end].rfind('@') {
                return format!("{}://***@{}", scheme, &rest[at + 1..]);
            }
        }
        self.source.clone()
    }

    /// Recording directory as an absolute path
    pub fn resolved_record_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(std::path::absolute(&self.record_dir)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
