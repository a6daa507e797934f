//! Runtime configuration.
//!
//! Built in code with the `with_*` methods or loaded from an `aro.toml`:
//!
//! ```toml
//! source_dir = "app"
//! shutdown_grace_ms = 2000
//! handle_signals = true
//! externals = ["tenant"]
//! log_filter = "aro_engine=debug,info"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use aro_language::AnalyzerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Conventional name of the configuration file.
pub const CONFIG_FILE: &str = "aro.toml";

/// Failure to load a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for loading and running an application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Directory searched recursively for `.aro` files.
    pub source_dir: PathBuf,

    /// How long in-flight event handlers get after shutdown.
    #[serde(rename = "shutdown_grace_ms", with = "millis")]
    pub shutdown_grace: Duration,

    /// Whether Ctrl-C signals shutdown.
    pub handle_signals: bool,

    /// Names the analyzer treats as provided by the environment, in
    /// addition to its defaults.
    pub externals: Vec<String>,

    /// `tracing` filter directives used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            shutdown_grace: Duration::from_secs(5),
            handle_signals: true,
            externals: Vec::new(),
            log_filter: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from TOML text. Missing keys take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads a configuration file. A relative `source_dir` is resolved
    /// against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if config.source_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.source_dir = parent.join(&config.source_dir);
            }
        }
        Ok(config)
    }

    /// Builder method to set the source directory.
    #[must_use]
    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = dir.into();
        self
    }

    /// Builder method to set the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Builder method to enable/disable Ctrl-C handling.
    #[must_use]
    pub fn with_handle_signals(mut self, handle: bool) -> Self {
        self.handle_signals = handle;
        self
    }

    /// Builder method to add an externally provided name.
    #[must_use]
    pub fn with_external(mut self, name: impl Into<String>) -> Self {
        self.externals.push(name.into());
        self
    }

    /// Builder method to set the log filter.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// The analyzer configuration these settings imply.
    #[must_use]
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        self.externals
            .iter()
            .fold(AnalyzerConfig::new(), |config, name| config.with_external(name.clone()))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
