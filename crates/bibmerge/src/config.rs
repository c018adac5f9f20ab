//! Configuration for a merge run
//!
//! Every path the pipeline touches comes from a [`MergeConfig`] value handed to
//! [`crate::run`]. The binary reads it from `bibmerge.toml` when present:
//!
//! ```toml
//! bib_folder = "./bibfiles/"
//! pattern = "*.bib"
//! output = "./merged.bib"
//! year_order = "lexicographic"   # or "numeric"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::merge::YearOrder;
use crate::scanner::FilePattern;

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "bibmerge.toml";

/// Settings for one merge run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    /// Directory scanned for input files
    pub bib_folder: PathBuf,
    /// File-name glob selecting the input files
    pub pattern: String,
    /// Merged output file, overwritten on every run
    pub output: PathBuf,
    /// Comparison used to decide which `year` is newer
    pub year_order: YearOrder,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            bib_folder: PathBuf::from("./bibfiles/"),
            pattern: "*.bib".to_string(),
            output: PathBuf::from("./merged.bib"),
            year_order: YearOrder::Lexicographic,
        }
    }
}

impl MergeConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with a different input directory
    pub fn with_bib_folder(bib_folder: impl Into<PathBuf>) -> Self {
        Self {
            bib_folder: bib_folder.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Read and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Compiled form of [`MergeConfig::pattern`]
    pub fn file_pattern(&self) -> Result<FilePattern, ConfigError> {
        FilePattern::new(&self.pattern)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bib_folder.as_os_str().is_empty() {
            return Err(ConfigError::MissingValue("bib_folder".to_string()));
        }
        if self.output.as_os_str().is_empty() {
            return Err(ConfigError::MissingValue("output".to_string()));
        }
        self.file_pattern()?;
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    Parse(String),

    #[error("TOML serialize error: {0}")]
    Serialize(String),

    #[error("Missing required value: {0}")]
    MissingValue(String),

    #[error("Invalid file pattern: {0}")]
    InvalidPattern(String),
}
