//! Runtime configuration
//!
//! Every knob is an explicit value passed at construction; the library never
//! reads process-wide toggles. A config can also be loaded from a TOML file:
//!
//! ```toml
//! verbose = true
//! keep_extracted_files = false
//! extraction_base = "/var/tmp"
//! build_prefix = "/install"
//! ensure_installer = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Configuration for a runtime instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Log captured child output and every discovered executable
    pub verbose: bool,

    /// Leave the extraction directory on disk when the instance is dropped
    pub keep_extracted_files: bool,

    /// Directory under which fresh extraction directories are created
    pub extraction_base: PathBuf,

    /// Absolute path the runtime was installed to at build time; rewritten to
    /// the extracted runtime home during bootstrap. Archives that declare
    /// their own prefix win.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_prefix: Option<PathBuf>,

    /// Probe for the bundled package installer and bootstrap it if missing
    pub ensure_installer: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: false,
            keep_extracted_files: false,
            extraction_base: PathBuf::from("."),
            build_prefix: None,
            ensure_installer: true,
        }
    }
}

impl Config {
    /// Parse a config from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a config from a string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(prefix) = &self.build_prefix {
            if !prefix.is_absolute() {
                return Err(ConfigError::ValidationError(format!(
                    "build_prefix must be absolute: {}",
                    prefix.display()
                )));
            }
        }
        if self.extraction_base.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "extraction_base must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn keep_extracted_files(mut self, keep: bool) -> Self {
        self.keep_extracted_files = keep;
        self
    }

    pub fn extraction_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.extraction_base = base.into();
        self
    }

    pub fn build_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.build_prefix = Some(prefix.into());
        self
    }

    pub fn ensure_installer(mut self, ensure: bool) -> Self {
        self.ensure_installer = ensure;
        self
    }
}
