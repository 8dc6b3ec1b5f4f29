//! Configuration: theme, cache location, terminal override, known mentions
//!
//! Loaded from `config.toml` in the user config directory. A missing file is
//! not an error; every field has a default.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::markdown::StaticMentions;

const APP_DIR: &str = "tagdown";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Foreground/background pair, as widget colour names
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleConfig {
    pub foreground: String,
    pub background: String,
}

impl StyleConfig {
    pub fn new(foreground: impl Into<String>, background: impl Into<String>) -> Self {
        Self {
            foreground: foreground.into(),
            background: background.into(),
        }
    }
}

/// Styles for the themed inline elements. Mentions are always bold on top of
/// `mention_style`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Theme {
    pub url_style: StyleConfig,
    pub mention_style: StyleConfig,
    pub emoji_style: StyleConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Overrides the platform cache directory
    pub cache_dir: Option<PathBuf>,
    /// Overrides `$TERM` for graphics detection
    pub term: Option<String>,
    pub theme: Theme,
    pub mentions: StaticMentions,
}

impl Config {
    /// `<config dir>/tagdown/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`, falling back to defaults when the file doesn't exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Root of the on-disk cache; images live under `<root>/images`
    pub fn cache_root(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join(APP_DIR)))
            .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR))
    }
}
