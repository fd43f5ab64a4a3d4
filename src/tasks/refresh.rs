use crate::client::{ApiError, Feed, MinifluxClient};
use crate::util::strip_control_chars;
use reqwest::StatusCode;
use std::time::Duration;

/// Transient failures get exactly one more attempt.
const MAX_RETRIES: u32 = 1;

/// Fixed wait before the retry. No jitter, no growth.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// How a refresh request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    /// 204 No Content
    Success,
    /// 401 or 403; the token is wrong, retrying will not help
    Unauthorized,
    /// 404; the feed id no longer exists
    NotFound,
    /// 429, any 5xx, or no response at all
    Transient,
    /// Any other status
    Unknown,
}

impl RefreshStatus {
    /// Maps an HTTP status to its outcome class.
    pub fn classify(code: StatusCode) -> Self {
        match code.as_u16() {
            204 => RefreshStatus::Success,
            401 | 403 => RefreshStatus::Unauthorized,
            404 => RefreshStatus::NotFound,
            429 | 500..=599 => RefreshStatus::Transient,
            _ => RefreshStatus::Unknown,
        }
    }

    pub fn is_retryable(self) -> bool {
        self == RefreshStatus::Transient
    }
}

impl std::fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RefreshStatus::Success => "success",
            RefreshStatus::Unauthorized => "unauthorized",
            RefreshStatus::NotFound => "not found",
            RefreshStatus::Transient => "transient failure",
            RefreshStatus::Unknown => "unexpected response",
        })
    }
}

/// Result of refreshing one feed, kept only for the run's summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub feed_id: i64,
    pub title: String,
    pub status: RefreshStatus,
    /// Status of the last attempt; `None` when no response arrived.
    pub http_code: Option<u16>,
    /// 1, or 2 when a transient failure was retried.
    pub attempts: u32,
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RefreshStatus::Success
    }
}

/// Ordered outcomes of one `refresh-failing` run.
#[derive(Debug, Clone, Default)]
pub struct RefreshSummary {
    pub outcomes: Vec<RefreshOutcome>,
    /// Failing feeds left untouched by a dry run, as (id, title).
    pub would_refresh: Vec<(i64, String)>,
}

impl RefreshSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RefreshOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Feeds the server reports as failing, in API response order.
pub fn select_failing(feeds: &[Feed]) -> Vec<&Feed> {
    feeds.iter().filter(|f| f.is_failing()).collect()
}

/// Lists all feeds and refreshes the failing ones, one at a time.
///
/// Only the feed listing can fail the whole run. Per-feed problems are
/// recorded in the returned summary. A dry run sends no refresh requests and
/// lists the candidates in `would_refresh` instead.
pub async fn refresh_failing(
    client: &MinifluxClient,
    retry_delay: Duration,
    dry_run: bool,
) -> Result<RefreshSummary, ApiError> {
    let feeds = client.feeds().await?;
    let candidates = select_failing(&feeds);

    tracing::info!(
        total = feeds.len(),
        failing = candidates.len(),
        "Checked feeds for parsing errors"
    );

    if candidates.is_empty() {
        tracing::info!("No failing feeds");
        return Ok(RefreshSummary::default());
    }

    if dry_run {
        let would_refresh = candidates
            .iter()
            .map(|feed| {
                let title = strip_control_chars(&feed.title).into_owned();
                tracing::info!(feed_id = feed.id, title = %title, "DRY-RUN - would refresh feed");
                (feed.id, title)
            })
            .collect();
        return Ok(RefreshSummary {
            outcomes: Vec::new(),
            would_refresh,
        });
    }

    Ok(refresh_feeds(client, &candidates, retry_delay).await)
}

/// Refreshes the given feeds sequentially with the single-retry policy.
pub async fn refresh_feeds(
    client: &MinifluxClient,
    feeds: &[&Feed],
    retry_delay: Duration,
) -> RefreshSummary {
    let mut summary = RefreshSummary::default();

    for feed in feeds {
        let title = strip_control_chars(&feed.title).into_owned();
        let outcome = refresh_one(client, feed.id, title, retry_delay).await;

        if outcome.is_success() {
            tracing::info!(
                feed_id = outcome.feed_id,
                title = %outcome.title,
                attempts = outcome.attempts,
                "Refreshed feed"
            );
        } else {
            tracing::warn!(
                feed_id = outcome.feed_id,
                title = %outcome.title,
                status = %outcome.status,
                http_code = ?outcome.http_code,
                attempts = outcome.attempts,
                "Feed refresh failed"
            );
        }
        summary.outcomes.push(outcome);
    }

    summary
}

async fn refresh_one(
    client: &MinifluxClient,
    feed_id: i64,
    title: String,
    retry_delay: Duration,
) -> RefreshOutcome {
    let mut retry_count = 0;

    loop {
        let (status, http_code) = match client.refresh_feed(feed_id).await {
            Ok(code) => (RefreshStatus::classify(code), Some(code.as_u16())),
            Err(e) => {
                tracing::debug!(feed_id = feed_id, error = %e, "Refresh request got no response");
                (RefreshStatus::Transient, None)
            }
        };

        if status.is_retryable() && retry_count < MAX_RETRIES {
            tracing::warn!(
                feed_id = feed_id,
                http_code = ?http_code,
                delay_secs = retry_delay.as_secs_f64(),
                "Transient refresh failure, retrying after delay"
            );
            tokio::time::sleep(retry_delay).await;
            retry_count += 1;
            continue;
        }

        return RefreshOutcome {
            feed_id,
            title,
            status,
            http_code,
            attempts: retry_count + 1,
        };
    }
}
