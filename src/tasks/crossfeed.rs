use super::dedupe::{apply_marks, fetch_entries, DedupeReport};
use crate::client::{
    ApiError, Direction, Entry, EntryOrder, EntryQuery, EntryStatus, MinifluxClient,
};
use crate::util::normalise_title;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrossFeedError {
    #[error("Keep feed {0} is not one of the listed feeds")]
    KeepNotListed(i64),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Marks as read the copies of a story that appear in more than one feed,
/// keeping the copy in `keep_feed`. `keep_feed` must be one of `feed_ids`.
pub async fn dedupe_cross_feed(
    client: &MinifluxClient,
    feed_ids: &[i64],
    keep_feed: i64,
    dry_run: bool,
) -> Result<DedupeReport, CrossFeedError> {
    if !feed_ids.contains(&keep_feed) {
        return Err(CrossFeedError::KeepNotListed(keep_feed));
    }
    tracing::info!(feeds = ?feed_ids, keep = keep_feed, "Fetching unread entries");

    let query = EntryQuery::new(EntryStatus::Unread, EntryOrder::PublishedAt, Direction::Desc);
    let mut entries = Vec::new();
    for &feed_id in feed_ids {
        entries.extend(fetch_entries(client, feed_id, &query).await?);
    }

    let marked = find_cross_feed_duplicates(&entries, keep_feed);
    Ok(apply_marks(client, entries.len(), marked, EntryStatus::Read, dry_run).await?)
}

/// Groups entries by normalised title across feeds.
///
/// Groups that only contain entries from one feed are left alone. In the
/// others, the entries of `keep_feed` survive (or, if that feed is absent
/// from the group, those of the feed seen first) and every other entry is
/// returned. Output follows first appearance of each title, then input order.
pub fn find_cross_feed_duplicates(entries: &[Entry], keep_feed: i64) -> Vec<Entry> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Entry>> = HashMap::new();

    for entry in entries {
        let key = normalise_title(&entry.title);
        if key.is_empty() {
            continue;
        }
        let group = groups.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(entry);
    }

    let mut marked = Vec::new();
    for key in &order {
        let Some(group) = groups.get(key) else {
            continue;
        };
        let feeds_present: HashSet<i64> = group.iter().map(|e| e.feed_id).collect();
        if feeds_present.len() <= 1 {
            continue;
        }

        let keep = if feeds_present.contains(&keep_feed) {
            keep_feed
        } else {
            group[0].feed_id
        };

        marked.extend(group.iter().filter(|e| e.feed_id != keep).map(|e| (*e).clone()));
    }
    marked
}
