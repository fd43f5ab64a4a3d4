//! Configuration file parser for ~/.config/miniflux-janitor/config.toml.
//!
//! The config file is optional when read from its default location: a missing
//! file yields `Config::default()`. A path named explicitly on the command line
//! must exist. Unknown keys are accepted by serde and reported as warnings.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A config path given on the command line does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds to wait before the single retry of a transient refresh failure.
    pub retry_delay_secs: u64,

    /// Log what would change without writing anything.
    pub dry_run: bool,

    /// Inline server settings.
    pub miniflux: MinifluxSection,

    /// External secrets tool settings.
    pub secrets: SecretsSection,

    /// Per-feed block/keep filter rules for `sync-filters`.
    pub filters: Vec<FilterRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry_delay_secs: 2,
            dry_run: false,
            miniflux: MinifluxSection::default(),
            secrets: SecretsSection::default(),
            filters: Vec::new(),
        }
    }
}

/// `[miniflux]` table. The token is masked in Debug output.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct MinifluxSection {
    pub url: Option<String>,
    pub token: Option<String>,
}

impl std::fmt::Debug for MinifluxSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinifluxSection")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Where credentials come from when they are not inline or in the environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretProvider {
    /// Environment variables only.
    #[default]
    Env,
    /// Bitwarden Secrets Manager CLI (`bws secret get <id>`).
    Bws,
}

/// `[secrets]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecretsSection {
    pub provider: SecretProvider,
    /// Binary invoked for `provider = "bws"`.
    pub command: String,
    /// Opaque identifier of the secret holding the server URL.
    pub url_id: Option<String>,
    /// Opaque identifier of the secret holding the API token.
    pub token_id: Option<String>,
}

impl Default for SecretsSection {
    fn default() -> Self {
        Self {
            provider: SecretProvider::Env,
            command: "bws".to_string(),
            url_id: None,
            token_id: None,
        }
    }
}

/// One `[[filters]]` entry: the rule patterns a feed should carry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilterRule {
    pub feed_id: i64,
    #[serde(default)]
    pub block: Vec<String>,
    #[serde(default)]
    pub keep: Vec<String>,
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 5] =
        ["retry_delay_secs", "dry_run", "miniflux", "secrets", "filters"];

    /// Default location: `$HOME/.config/miniflux-janitor/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        Self::default_path_in(std::env::var_os("HOME"))
    }

    fn default_path_in(home: Option<std::ffi::OsString>) -> Option<PathBuf> {
        let home = home.filter(|h| !h.is_empty())?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("miniflux-janitor")
                .join("config.toml"),
        )
    }

    /// Load the config named on the command line, or the default one.
    ///
    /// An explicit path that does not exist is an error. A missing default
    /// file, or no `HOME` to find it under, gives defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve_or(explicit, Self::default_path())
    }

    fn resolve_or(
        explicit: Option<&Path>,
        default: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        match (explicit, default) {
            (Some(path), _) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Self::load(path)
            }
            (None, Some(path)) => Self::load(&path),
            (None, None) => {
                tracing::debug!("HOME not set, using default configuration");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            filters = config.filters.len(),
            "Loaded configuration"
        );
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================
