use crate::client::{
    ApiError, Direction, Entry, EntryOrder, EntryQuery, EntryStatus, MinifluxClient,
};
use crate::util::{normalise_title, strip_control_chars, ENTRY_TIME_FORMAT};
use std::collections::HashMap;

/// What a dedupe run found and whether it wrote anything.
#[derive(Debug, Clone)]
pub struct DedupeReport {
    /// Entries examined across all fetched feeds.
    pub scanned: usize,
    /// Entries selected for the status change, in decision order.
    pub marked: Vec<Entry>,
    /// Status applied (or that would have been applied).
    pub action: EntryStatus,
    /// False for dry runs and for runs that found nothing.
    pub applied: bool,
}

impl DedupeReport {
    pub(crate) fn nothing(scanned: usize, action: EntryStatus) -> Self {
        Self {
            scanned,
            marked: Vec::new(),
            action,
            applied: false,
        }
    }
}

/// Unread entries of one feed ordered oldest first: keep the first entry of
/// every normalised-title group and mark the rest.
pub async fn dedupe_feed(
    client: &MinifluxClient,
    feed_id: i64,
    action: EntryStatus,
    dry_run: bool,
) -> Result<DedupeReport, ApiError> {
    let query = EntryQuery::new(EntryStatus::Unread, EntryOrder::PublishedAt, Direction::Asc);
    let entries = fetch_entries(client, feed_id, &query).await?;

    if entries.is_empty() {
        tracing::info!(feed_id = feed_id, "No unread entries found");
        return Ok(DedupeReport::nothing(0, action));
    }

    let marked = find_title_duplicates(&entries);
    apply_marks(client, entries.len(), marked, action, dry_run).await
}

/// Groups entries by normalised title and returns every entry except the
/// oldest of each group.
///
/// Entries whose title normalises to nothing are never grouped. Ties on
/// `published_at` keep the lower id. The result is ordered by
/// `published_at`, then id.
pub fn find_title_duplicates(entries: &[Entry]) -> Vec<Entry> {
    let mut groups: HashMap<String, Vec<&Entry>> = HashMap::new();
    for entry in entries {
        let key = normalise_title(&entry.title);
        if key.is_empty() {
            continue;
        }
        groups.entry(key).or_default().push(entry);
    }

    let mut duplicates: Vec<Entry> = groups
        .into_values()
        .filter(|group| group.len() > 1)
        .flat_map(|mut group| {
            group.sort_by_key(|e| (e.published_at, e.id));
            group.into_iter().skip(1).cloned().collect::<Vec<_>>()
        })
        .collect();

    duplicates.sort_by_key(|e| (e.published_at, e.id));
    duplicates
}

/// Entries requested per page.
pub(crate) const PAGE_SIZE: u32 = 100;

/// Fetches every entry of a feed matching `query`, page by page, until the
/// server's `total` is reached or a page comes back empty.
pub(crate) async fn fetch_entries(
    client: &MinifluxClient,
    feed_id: i64,
    query: &EntryQuery,
) -> Result<Vec<Entry>, ApiError> {
    let mut page_query = *query;
    page_query.limit = Some(query.limit.unwrap_or(PAGE_SIZE));

    let mut entries: Vec<Entry> = Vec::new();
    let total = loop {
        page_query.offset = Some(u32::try_from(entries.len()).unwrap_or(u32::MAX));
        let page = client.feed_entries(feed_id, &page_query).await?;

        let fetched = page.entries.len();
        entries.extend(page.entries);
        if fetched == 0 || i64::try_from(entries.len()).unwrap_or(i64::MAX) >= page.total {
            break page.total;
        }
        tracing::debug!(
            feed_id = feed_id,
            fetched = entries.len(),
            total = page.total,
            "Fetching next page"
        );
    };

    tracing::info!(
        feed_id = feed_id,
        status = %query.status,
        count = entries.len(),
        total = total,
        "Fetched entries"
    );
    Ok(entries)
}

/// Applies `action` to `marked` in one bulk call, or only logs on dry runs.
pub(crate) async fn apply_marks(
    client: &MinifluxClient,
    scanned: usize,
    marked: Vec<Entry>,
    action: EntryStatus,
    dry_run: bool,
) -> Result<DedupeReport, ApiError> {
    if marked.is_empty() {
        tracing::info!(scanned = scanned, "No duplicate entries found");
        return Ok(DedupeReport::nothing(scanned, action));
    }

    tracing::info!(
        count = marked.len(),
        action = %action,
        "Duplicate entries will be marked"
    );

    if dry_run {
        for entry in &marked {
            tracing::info!("DRY-RUN - would mark as {}: {}", action, describe(entry));
        }
        return Ok(DedupeReport {
            scanned,
            marked,
            action,
            applied: false,
        });
    }

    let ids: Vec<i64> = marked.iter().map(|e| e.id).collect();
    client.update_entries(&ids, action).await?;

    for entry in &marked {
        tracing::info!(feed_id = entry.feed_id, entry_id = entry.id, "{}", describe(entry));
    }

    Ok(DedupeReport {
        scanned,
        marked,
        action,
        applied: true,
    })
}

/// `2024-03-01 18:45 - Title` with control characters stripped.
pub fn describe(entry: &Entry) -> String {
    let title = if entry.title.trim().is_empty() {
        "Untitled"
    } else {
        entry.title.as_str()
    };
    format!(
        "{} - {}",
        entry.published_at.format(ENTRY_TIME_FORMAT),
        strip_control_chars(title)
    )
}
