use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a URL handed to the tool.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Parses a URL and requires an `http`/`https` scheme with a host.
///
/// Private and loopback hosts are allowed: Miniflux is commonly self-hosted
/// on a LAN address.
///
/// # Examples
///
/// ```
/// use miniflux_janitor::util::parse_http_url;
///
/// let url = parse_http_url("https://reader.example.com").unwrap();
/// assert_eq!(url.host_str(), Some("reader.example.com"));
///
/// assert!(parse_http_url("file:///etc/passwd").is_err());
/// ```
pub fn parse_http_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}
