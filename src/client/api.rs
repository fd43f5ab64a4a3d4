use super::types::{
    CreateFeedRequest, CreatedFeed, EntryPage, EntryQuery, EntryStatus, Feed, FeedModification,
    UpdateEntriesRequest, User,
};
use crate::secrets::Credentials;
use futures::StreamExt;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_ERROR_BODY_CHARS: usize = 200;
const AUTH_HEADER: &str = "X-Auth-Token";

/// Errors from a Miniflux API call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// Non-2xx response; `body` holds the start of the server's message
    #[error("HTTP error: status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    /// Response body was not the expected JSON
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Thin client for the Miniflux REST API.
///
/// Cloning is cheap: the underlying `reqwest::Client` shares its pool.
#[derive(Clone)]
pub struct MinifluxClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl std::fmt::Debug for MinifluxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinifluxClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MinifluxClient {
    pub fn new(credentials: Credentials) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("miniflux-janitor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http(http, credentials))
    }

    /// Use a preconfigured HTTP client.
    pub fn with_http(http: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            http,
            base_url: credentials.base_url,
            token: credentials.token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: impl reqwest::IntoUrl) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header(AUTH_HEADER, self.token.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        tokio::time::timeout(REQUEST_TIMEOUT, request.send())
            .await
            .map_err(|_| ApiError::Timeout)?
            .map_err(ApiError::Network)
    }

    /// `GET /v1/me`. Used to confirm the URL and token before doing any work.
    pub async fn me(&self) -> Result<User, ApiError> {
        let response = self
            .send(self.request(Method::GET, self.endpoint("/me")))
            .await?;
        json_body(response).await
    }

    /// `GET /v1/feeds`, in server order.
    pub async fn feeds(&self) -> Result<Vec<Feed>, ApiError> {
        let response = self
            .send(self.request(Method::GET, self.endpoint("/feeds")))
            .await?;
        json_body(response).await
    }

    /// `PUT /v1/feeds/{id}/refresh`.
    ///
    /// Returns the raw status so callers can classify it; only transport
    /// failures are errors here.
    pub async fn refresh_feed(&self, feed_id: i64) -> Result<StatusCode, ApiError> {
        let url = self.endpoint(&format!("/feeds/{feed_id}/refresh"));
        let response = self.send(self.request(Method::PUT, url)).await?;
        Ok(response.status())
    }

    /// `POST /v1/feeds`. Returns the new feed's id.
    pub async fn create_feed(
        &self,
        feed_url: &str,
        category_id: Option<i64>,
    ) -> Result<i64, ApiError> {
        let body = CreateFeedRequest {
            feed_url,
            category_id,
        };
        let response = self
            .send(
                self.request(Method::POST, self.endpoint("/feeds"))
                    .json(&body),
            )
            .await?;
        let created: CreatedFeed = json_body(response).await?;
        Ok(created.feed_id)
    }

    /// `PUT /v1/feeds/{id}` with only the fields set in `changes`.
    pub async fn update_feed(
        &self,
        feed_id: i64,
        changes: &FeedModification,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("/feeds/{feed_id}"));
        let response = self
            .send(self.request(Method::PUT, url).json(changes))
            .await?;
        empty_body(response).await
    }

    /// `GET /v1/feeds/{id}/entries` with the given filters.
    pub async fn feed_entries(
        &self,
        feed_id: i64,
        query: &EntryQuery,
    ) -> Result<EntryPage, ApiError> {
        let mut url = url::Url::parse(&self.endpoint(&format!("/feeds/{feed_id}/entries")))?;
        url.query_pairs_mut().extend_pairs(query.pairs());

        let response = self.send(self.request(Method::GET, url)).await?;
        json_body(response).await
    }

    /// `PUT /v1/entries`: set `status` on every id in one call.
    pub async fn update_entries(
        &self,
        entry_ids: &[i64],
        status: EntryStatus,
    ) -> Result<(), ApiError> {
        let body = UpdateEntriesRequest { entry_ids, status };
        let response = self
            .send(
                self.request(Method::PUT, self.endpoint("/entries"))
                    .json(&body),
            )
            .await?;
        empty_body(response).await
    }
}

async fn json_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let response = check_status(response).await?;
    let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn empty_body(response: reqwest::Response) -> Result<(), ApiError> {
    check_status(response).await.map(|_| ())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match read_limited_bytes(response, MAX_RESPONSE_SIZE).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes)
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>()
            .trim()
            .to_string(),
        Err(_) => String::new(),
    };
    Err(ApiError::HttpStatus {
        status: status.as_u16(),
        body,
    })
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ApiError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ApiError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
