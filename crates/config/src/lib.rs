//! Configuration management for mimir
//!
//! This crate provides the tunable limits of the decoding engine, loaded from
//! `$HOME/.mimir/config.toml`, an explicit path, or a TOML string.

/// Error types for the configuration module
pub mod error;

use crate::error::Error;
use serde::{Deserialize, Serialize};
#[allow(deprecated)]
use std::env::home_dir;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, trace};

/// The largest dynamic length (in bytes or elements) materialized by default.
pub const DEFAULT_MAX_DYNAMIC_LENGTH: u64 = u32::MAX as u64;

/// The largest number of storage words a single range read may span by default.
pub const DEFAULT_MAX_STORAGE_RANGE_WORDS: u64 = 1 << 53;

/// The [`Configuration`] struct holds the limits and modes the decoder honours. Every key is
/// optional in the file; missing keys fall back to their defaults.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Configuration {
    /// Lengths of strings, byte strings and arrays above this value are reported as overlong
    /// instead of being read.
    pub max_dynamic_length: u64,

    /// Storage range reads spanning more words than this are reported as overlarge pointers.
    pub max_storage_range_words: u64,

    /// When set, non-zero padding around elementary values is ignored rather than reported.
    pub permissive_padding: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            max_dynamic_length: DEFAULT_MAX_DYNAMIC_LENGTH,
            max_storage_range_words: DEFAULT_MAX_STORAGE_RANGE_WORDS,
            permissive_padding: false,
        }
    }
}

#[allow(deprecated)]
fn default_path() -> Result<PathBuf, Error> {
    let mut home = home_dir().ok_or_else(|| {
        Error::Generic(
            "failed to get home directory. does your os support `std::env::home_dir()`?"
                .to_string(),
        )
    })?;
    home.push(".mimir");
    home.push("config.toml");
    Ok(home)
}

impl Configuration {
    /// Returns the configuration stored at `$HOME/.mimir/config.toml`, or the defaults if no such
    /// file exists. Unlike [`Configuration::save`], this never touches the filesystem beyond
    /// reading.
    pub fn load() -> Result<Self, Error> {
        let path = default_path()?;
        if !path.exists() {
            debug!("no configuration file at {}, using defaults", path.display());
            return Ok(Configuration::default());
        }

        Self::load_from(&path)
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        trace!("loading configuration from {}", path.display());

        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parses a configuration from a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self, Error> {
        toml::from_str(contents)
            .map_err(|e| Error::ParseError(format!("failed to parse config file: {e}")))
    }

    /// Serializes the configuration as a TOML document.
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string(self)
            .map_err(|e| Error::ParseError(format!("failed to serialize config: {e}")))
    }

    /// Saves the configuration to `$HOME/.mimir/config.toml`.
    pub fn save(&self) -> Result<(), Error> {
        self.save_to(default_path()?)
    }

    /// Saves the configuration to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml()?)?;
        debug!("saved configuration to {}", path.display());
        Ok(())
    }

    /// Update a single key/value pair in the configuration. The value is parsed according to
    /// the key's type; the configuration is not persisted.
    pub fn update(&mut self, key: &str, value: &str) -> Result<(), Error> {
        match key {
            "max_dynamic_length" => {
                self.max_dynamic_length = value.parse::<u64>().map_err(|_| {
                    Error::ParseError(format!("invalid value for {key}: \'{value}\'"))
                })?;
            }
            "max_storage_range_words" => {
                self.max_storage_range_words = value.parse::<u64>().map_err(|_| {
                    Error::ParseError(format!("invalid value for {key}: \'{value}\'"))
                })?;
            }
            "permissive_padding" => {
                self.permissive_padding = value.parse::<bool>().map_err(|_| {
                    Error::ParseError(format!("invalid value for {key}: \'{value}\'"))
                })?;
            }
            _ => {
                return Err(Error::Generic(format!(
                    "invalid key: \'{key}\' is not a valid configuration key."
                )))
            }
        }

        Ok(())
    }
}
