//! Loader configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via GRIDFSM_CONFIG)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Characters with a meaning in the cell grammar or in quoting.
const RESERVED_DELIMITERS: &[char] = &['/', '[', ']', '"'];

/// Loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directories searched, in order, for the grid a manifest points at.
    pub resource_dirs: Vec<PathBuf>,
    /// Field delimiter of grid files.
    pub delimiter: char,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            resource_dirs: vec![PathBuf::from(".")],
            delimiter: ',',
        }
    }
}

impl LoaderConfig {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("GRIDFSM_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: LoaderConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dirs) = lookup("GRIDFSM_RESOURCE_DIRS") {
            let dirs: Vec<PathBuf> = dirs
                .split(':')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .collect();
            if !dirs.is_empty() {
                self.resource_dirs = dirs;
            }
        }

        if let Some(delimiter) = lookup("GRIDFSM_DELIMITER") {
            if let Some(parsed) = parse_delimiter(&delimiter) {
                self.delimiter = parsed;
            }
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resource_dirs.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one resource directory is required".to_string(),
            ));
        }
        if !self.delimiter.is_ascii() {
            return Err(ConfigError::ValidationError(format!(
                "delimiter '{}' is not an ASCII character",
                self.delimiter
            )));
        }
        if RESERVED_DELIMITERS.contains(&self.delimiter) {
            return Err(ConfigError::ValidationError(format!(
                "delimiter '{}' is reserved by the transition cell syntax",
                self.delimiter
            )));
        }
        Ok(())
    }

    /// Returns the delimiter as the single byte the grid reader expects.
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        if !self.delimiter.is_ascii() {
            return Err(ConfigError::ValidationError(format!(
                "delimiter '{}' is not an ASCII character",
                self.delimiter
            )));
        }
        Ok(self.delimiter as u8)
    }

    /// Finds the file a manifest's `definition` locator refers to.
    ///
    /// Absolute locators are used as-is. Relative ones are tried against
    /// each resource directory in order; the first existing file wins.
    pub fn resolve_resource(&self, locator: &str) -> Option<PathBuf> {
        let path = Path::new(locator);
        if path.is_absolute() {
            return path.is_file().then(|| path.to_path_buf());
        }
        self.resource_dirs
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file())
    }
}

fn parse_delimiter(value: &str) -> Option<char> {
    match value {
        "\\t" | "tab" => Some('\t'),
        _ => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl ConfigError {
    /// Returns an error code suitable for reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::IoError(..) => "RESOURCE",
            ConfigError::ParseError(..) => "FORMAT",
            ConfigError::ValidationError(_) => "CONFIG",
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
