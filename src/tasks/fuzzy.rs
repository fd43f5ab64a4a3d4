use super::dedupe::{apply_marks, fetch_entries, DedupeReport};
use crate::client::{
    ApiError, Direction, Entry, EntryOrder, EntryQuery, EntryStatus, MinifluxClient,
};
use crate::util::{clean_title, strip_control_chars, token_sort_ratio};

/// Similarity (0-100) at or above which two titles are the same story.
pub const DEFAULT_SENSITIVITY: f64 = 88.0;

/// Near-duplicate detection across feeds using word-order-insensitive
/// similarity of stop-word-stripped titles.
pub async fn dedupe_fuzzy(
    client: &MinifluxClient,
    feed_ids: &[i64],
    sensitivity: f64,
    action: EntryStatus,
    dry_run: bool,
) -> Result<DedupeReport, ApiError> {
    let query = EntryQuery::new(EntryStatus::Unread, EntryOrder::Id, Direction::Asc);
    let mut entries = Vec::new();
    for &feed_id in feed_ids {
        entries.extend(fetch_entries(client, feed_id, &query).await?);
    }

    let marked = find_fuzzy_duplicates(&entries, sensitivity);
    apply_marks(client, entries.len(), marked, action, dry_run).await
}

/// Walks entries in order, comparing each cleaned title against the titles
/// kept so far. A score of at least `sensitivity` marks the entry as a
/// duplicate; otherwise its title joins the kept set.
pub fn find_fuzzy_duplicates(entries: &[Entry], sensitivity: f64) -> Vec<Entry> {
    // (cleaned title, feed id) of every entry kept so far
    let mut kept: Vec<(String, i64)> = Vec::new();
    let mut duplicates = Vec::new();

    for entry in entries {
        let cleaned = clean_title(&entry.title);

        let matched = kept
            .iter()
            .find(|(title, _)| token_sort_ratio(&cleaned, title) >= sensitivity);

        match matched {
            Some((_, feed_id)) => {
                tracing::info!(
                    entry_id = entry.id,
                    matched_feed = feed_id,
                    "Duplicate found: '{}'",
                    strip_control_chars(&entry.title)
                );
                duplicates.push(entry.clone());
            }
            None => kept.push((cleaned, entry.feed_id)),
        }
    }

    duplicates
}
