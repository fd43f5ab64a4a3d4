//! Credential resolution for the Miniflux API.
//!
//! Sources, first match wins:
//!
//! 1. `MINIFLUX_URL` + `MINIFLUX_TOKEN` environment variables
//! 2. `[miniflux] url` + `token` in the config file
//! 3. `[secrets] provider = "bws"`: one `bws secret get <id>` call per value
//!
//! The token is held as a [`SecretString`] and never appears in Debug output.
use crate::config::{Config, SecretProvider, SecretsSection};
use crate::util::{parse_http_url, UrlValidationError};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

pub const URL_ENV: &str = "MINIFLUX_URL";
pub const TOKEN_ENV: &str = "MINIFLUX_TOKEN";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("No Miniflux credentials configured: set MINIFLUX_URL/MINIFLUX_TOKEN, [miniflux] url/token, or [secrets] provider = \"bws\" with url_id and token_id")]
    NotConfigured,
    #[error("Secrets tool '{0}' not found on PATH")]
    MissingTool(String),
    #[error("Secrets tool failed for {id}: {stderr}")]
    CommandFailed { id: String, stderr: String },
    #[error("Failed to run secrets tool: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unreadable secrets tool output for {id}: {source}")]
    BadOutput {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Empty secret for ID: {0}")]
    Empty(String),
    #[error("Invalid Miniflux URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
}

/// Server location and API token for one run.
#[derive(Clone)]
pub struct Credentials {
    /// Normalised server root, no trailing slash and no `/v1` suffix.
    pub base_url: String,
    pub token: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Builds credentials from a raw server URL, normalising and validating it.
    pub fn new(raw_url: &str, token: SecretString) -> Result<Self, SecretError> {
        let (base_url, stripped) = normalise_base_url(raw_url);
        if stripped {
            tracing::info!("Normalised Miniflux URL (stripped /v1)");
        }
        parse_http_url(&base_url)?;
        Ok(Self { base_url, token })
    }

    /// Resolve credentials using the process environment.
    pub async fn resolve(config: &Config) -> Result<Self, SecretError> {
        Self::resolve_with(config, |key| std::env::var(key).ok()).await
    }

    /// Resolve credentials with an injectable environment lookup.
    pub async fn resolve_with<F>(config: &Config, env: F) -> Result<Self, SecretError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        if let (Some(url), Some(token)) = (non_empty(env(URL_ENV)), non_empty(env(TOKEN_ENV))) {
            tracing::debug!("Using Miniflux credentials from environment");
            return Self::new(&url, SecretString::from(token.trim().to_string()));
        }

        if let (Some(url), Some(token)) = (
            non_empty(config.miniflux.url.clone()),
            non_empty(config.miniflux.token.clone()),
        ) {
            tracing::debug!("Using Miniflux credentials from config file");
            return Self::new(&url, SecretString::from(token.trim().to_string()));
        }

        match config.secrets.provider {
            SecretProvider::Bws => Self::from_bws(&config.secrets).await,
            SecretProvider::Env => Err(SecretError::NotConfigured),
        }
    }

    async fn from_bws(secrets: &SecretsSection) -> Result<Self, SecretError> {
        let (Some(url_id), Some(token_id)) = (&secrets.url_id, &secrets.token_id) else {
            return Err(SecretError::NotConfigured);
        };

        tracing::info!("Loading Miniflux credentials from Bitwarden");
        let url = fetch_bws_secret(&secrets.command, url_id).await?;
        let token = fetch_bws_secret(&secrets.command, token_id).await?;
        Self::new(&url, SecretString::from(token))
    }
}

/// Trims trailing slashes and a trailing `/v1` from a server URL.
///
/// Returns the normalised URL and whether `/v1` was stripped.
pub fn normalise_base_url(raw: &str) -> (String, bool) {
    let trimmed = raw.trim().trim_end_matches('/');
    match trimmed.strip_suffix("/v1") {
        Some(root) => (root.trim_end_matches('/').to_string(), true),
        None => (trimmed.to_string(), false),
    }
}

#[derive(Deserialize)]
struct BwsSecret {
    #[serde(default)]
    value: String,
}

/// Extracts the trimmed `value` field from `bws secret get` JSON output.
pub fn parse_secret_output(id: &str, stdout: &[u8]) -> Result<String, SecretError> {
    let secret: BwsSecret = serde_json::from_slice(stdout).map_err(|source| {
        SecretError::BadOutput {
            id: id.to_string(),
            source,
        }
    })?;
    let value = secret.value.trim();
    if value.is_empty() {
        return Err(SecretError::Empty(id.to_string()));
    }
    Ok(value.to_string())
}

async fn fetch_bws_secret(command: &str, id: &str) -> Result<String, SecretError> {
    let output = match tokio::process::Command::new(command)
        .args(["secret", "get", id])
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SecretError::MissingTool(command.to_string()));
        }
        Err(e) => return Err(SecretError::Io(e)),
    };

    if !output.status.success() {
        return Err(SecretError::CommandFailed {
            id: id.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_secret_output(id, &output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MinifluxSection;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_normalise_strips_v1_and_slashes() {
        assert_eq!(
            normalise_base_url("https://rss.example.com/v1/"),
            ("https://rss.example.com".to_string(), true)
        );
        assert_eq!(
            normalise_base_url("https://rss.example.com//"),
            ("https://rss.example.com".to_string(), false)
        );
    }

    #[test]
    fn test_normalise_keeps_subpath() {
        assert_eq!(
            normalise_base_url("https://example.com/miniflux/v1"),
            ("https://example.com/miniflux".to_string(), true)
        );
        assert_eq!(
            normalise_base_url("https://example.com/v1beta"),
            ("https://example.com/v1beta".to_string(), false)
        );
    }

    #[tokio::test]
    async fn test_env_takes_precedence_over_config() {
        let mut config = Config::default();
        config.miniflux = MinifluxSection {
            url: Some("https://config.example.com".into()),
            token: Some("config-token".into()),
        };
        let env = env_of(&[(URL_ENV, "https://env.example.com/v1"), (TOKEN_ENV, "env-token")]);

        let creds = Credentials::resolve_with(&config, env).await.unwrap();
        assert_eq!(creds.base_url, "https://env.example.com");
        assert_eq!(creds.token.expose_secret(), "env-token");
    }

    #[tokio::test]
    async fn test_partial_env_falls_back_to_config() {
        let mut config = Config::default();
        config.miniflux.url = Some("https://config.example.com".into());
        config.miniflux.token = Some("config-token".into());
        let env = env_of(&[(URL_ENV, "https://env.example.com")]);

        let creds = Credentials::resolve_with(&config, env).await.unwrap();
        assert_eq!(creds.base_url, "https://config.example.com");
    }

    #[tokio::test]
    async fn test_nothing_configured() {
        let err = Credentials::resolve_with(&Config::default(), env_of(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, SecretError::NotConfigured));
    }

    #[tokio::test]
    async fn test_bws_without_ids_is_not_configured() {
        let mut config = Config::default();
        config.secrets.provider = SecretProvider::Bws;
        let err = Credentials::resolve_with(&config, env_of(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, SecretError::NotConfigured));
    }

    #[tokio::test]
    async fn test_bws_missing_binary() {
        let mut config = Config::default();
        config.secrets.provider = SecretProvider::Bws;
        config.secrets.command = "miniflux-janitor-no-such-binary".into();
        config.secrets.url_id = Some("u".into());
        config.secrets.token_id = Some("t".into());

        let err = Credentials::resolve_with(&config, env_of(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, SecretError::MissingTool(_)));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let env = env_of(&[(URL_ENV, "ftp://example.com"), (TOKEN_ENV, "t")]);
        let err = Credentials::resolve_with(&Config::default(), env)
            .await
            .unwrap_err();
        assert!(matches!(err, SecretError::InvalidUrl(_)));
    }

    #[test]
    fn test_parse_secret_output() {
        let out = br#"{"id":"abc","key":"MINIFLUX_TOKEN","value":"  tok-123\n"}"#;
        assert_eq!(parse_secret_output("abc", out).unwrap(), "tok-123");
    }

    #[test]
    fn test_parse_secret_output_empty_value() {
        let out = br#"{"id":"abc","value":""}"#;
        assert!(matches!(
            parse_secret_output("abc", out),
            Err(SecretError::Empty(id)) if id == "abc"
        ));
    }

    #[test]
    fn test_parse_secret_output_not_json() {
        assert!(matches!(
            parse_secret_output("abc", b"Error: unauthorized"),
            Err(SecretError::BadOutput { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds =
            Credentials::new("https://rss.example.com", SecretString::from("hunter2".to_string())).unwrap();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
