use crate::client::{ApiError, MinifluxClient};
use crate::util::{parse_http_url, UrlValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Created(i64),
    /// A feed with the same URL already exists; nothing was sent.
    AlreadySubscribed(i64),
    DryRun,
}

/// Subscribes to `feed_url` unless a feed with that exact URL already exists.
pub async fn add_feed(
    client: &MinifluxClient,
    feed_url: &str,
    category_id: Option<i64>,
    dry_run: bool,
) -> Result<SubscribeOutcome, SubscribeError> {
    let url = parse_http_url(feed_url)?;
    let url = url.as_str();

    let feeds = client.feeds().await?;
    if let Some(existing) = feeds
        .iter()
        .find(|f| same_url(&f.feed_url, url) || same_url(&f.feed_url, feed_url))
    {
        tracing::info!(feed_id = existing.id, url = %url, "Feed already subscribed");
        return Ok(SubscribeOutcome::AlreadySubscribed(existing.id));
    }

    if dry_run {
        tracing::info!(url = %url, category_id = ?category_id, "DRY-RUN - would subscribe");
        return Ok(SubscribeOutcome::DryRun);
    }

    let feed_id = client.create_feed(url, category_id).await?;
    tracing::info!(feed_id = feed_id, url = %url, "Subscribed to feed");
    Ok(SubscribeOutcome::Created(feed_id))
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim().trim_end_matches('/') == b.trim().trim_end_matches('/')
}
