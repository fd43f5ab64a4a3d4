use super::dedupe::{apply_marks, fetch_entries, DedupeReport};
use crate::client::{
    ApiError, Direction, Entry, EntryOrder, EntryQuery, EntryStatus, MinifluxClient,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

pub const DEFAULT_WINDOW_HOURS: u32 = 24;

/// Marks unread entries as read when an entry with the same title was
/// already read within the window, in any of the listed feeds.
pub async fn mark_recently_seen(
    client: &MinifluxClient,
    feed_ids: &[i64],
    window_hours: u32,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<DedupeReport, ApiError> {
    tracing::info!(window_hours = window_hours, "Checking for already-seen articles");

    let read_query = EntryQuery::new(EntryStatus::Read, EntryOrder::PublishedAt, Direction::Desc);
    let mut read = Vec::new();
    for &feed_id in feed_ids {
        read.extend(fetch_entries(client, feed_id, &read_query).await?);
    }

    let window = Duration::hours(i64::from(window_hours));
    let seen = recently_read_titles(&read, now, window);
    if seen.is_empty() {
        tracing::info!("No recently-read titles found");
        return Ok(DedupeReport::nothing(read.len(), EntryStatus::Read));
    }

    let unread_query =
        EntryQuery::new(EntryStatus::Unread, EntryOrder::PublishedAt, Direction::Desc);
    let mut unread = Vec::new();
    for &feed_id in feed_ids {
        unread.extend(fetch_entries(client, feed_id, &unread_query).await?);
    }

    let marked = already_seen(&unread, &seen);
    apply_marks(
        client,
        read.len() + unread.len(),
        marked,
        EntryStatus::Read,
        dry_run,
    )
    .await
}

/// Trimmed titles of entries published no longer than `window` before `now`.
pub fn recently_read_titles(
    read: &[Entry],
    now: DateTime<Utc>,
    window: Duration,
) -> HashSet<String> {
    read.iter()
        .filter(|e| now - e.published_at <= window)
        .map(|e| e.title.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Unread entries whose trimmed title is in `seen`. Comparison is exact.
pub fn already_seen(unread: &[Entry], seen: &HashSet<String>) -> Vec<Entry> {
    unread
        .iter()
        .filter(|e| {
            let title = e.title.trim();
            !title.is_empty() && seen.contains(title)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::dedupe::tests::entry;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        // entry() publishes at 2024-03-01 12:MM
        let mut older = entry(2, 1, "Older", 0);
        older.published_at -= Duration::minutes(1);
        let read = vec![entry(1, 1, "  Exactly a day old ", 0), older];

        let titles = recently_read_titles(&read, now(), Duration::hours(24));
        assert!(titles.contains("Exactly a day old"));
        assert!(!titles.contains("Older"));
    }

    #[test]
    fn test_blank_read_titles_ignored() {
        let read = vec![entry(1, 1, "   ", 30)];
        assert!(recently_read_titles(&read, now(), Duration::hours(24)).is_empty());
    }

    #[test]
    fn test_matches_are_exact_after_trim() {
        let seen: HashSet<String> = ["Match report".to_string()].into_iter().collect();
        let unread = vec![
            entry(10, 1, " Match report ", 1),
            entry(11, 2, "match report", 2),
            entry(12, 2, "Match report", 3),
            entry(13, 2, "", 4),
        ];
        let ids: Vec<i64> = already_seen(&unread, &seen).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![10, 12]);
    }
}
