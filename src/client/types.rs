use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Feeds
// ============================================================================

/// A subscribed feed as returned by `GET /v1/feeds`.
///
/// Only the fields the commands read are modelled; the rest of the payload is
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Feed {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub feed_url: String,
    /// Consecutive fetch/parse failures recorded by the server.
    #[serde(default)]
    pub parsing_error_count: i64,
    #[serde(default)]
    pub parsing_error_message: String,
    /// Regex; matching entries are dropped on fetch.
    #[serde(default)]
    pub blocklist_rules: String,
    /// Regex; only matching entries are kept on fetch.
    #[serde(default)]
    pub keeplist_rules: String,
}

impl Feed {
    /// True when the server reports the last fetch(es) as failing.
    pub fn is_failing(&self) -> bool {
        self.parsing_error_count > 0 || !self.parsing_error_message.trim().is_empty()
    }
}

/// Body of `POST /v1/feeds`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateFeedRequest<'a> {
    pub feed_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreatedFeed {
    pub feed_id: i64,
}

/// Body of `PUT /v1/feeds/{id}`; unset fields are left untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedModification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocklist_rules: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keeplist_rules: Option<String>,
}

impl FeedModification {
    pub fn is_empty(&self) -> bool {
        self.blocklist_rules.is_none() && self.keeplist_rules.is_none()
    }
}

// ============================================================================
// Entries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Unread,
    Read,
    Removed,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Unread => "unread",
            EntryStatus::Read => "read",
            EntryStatus::Removed => "removed",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub feed_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub status: EntryStatus,
    pub published_at: DateTime<Utc>,
}

/// Response of the entry listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryPage {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrder {
    Id,
    PublishedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Filters for `GET /v1/feeds/{id}/entries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryQuery {
    pub status: EntryStatus,
    pub order: EntryOrder,
    pub direction: Direction,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl EntryQuery {
    pub fn new(status: EntryStatus, order: EntryOrder, direction: Direction) -> Self {
        Self {
            status,
            order,
            direction,
            limit: None,
            offset: None,
        }
    }

    pub(crate) fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("status", self.status.as_str().to_string()),
            (
                "order",
                match self.order {
                    EntryOrder::Id => "id",
                    EntryOrder::PublishedAt => "published_at",
                }
                .to_string(),
            ),
            (
                "direction",
                match self.direction {
                    Direction::Asc => "asc",
                    Direction::Desc => "desc",
                }
                .to_string(),
            ),
        ];
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

/// Body of `PUT /v1/entries`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateEntriesRequest<'a> {
    pub entry_ids: &'a [i64],
    pub status: EntryStatus,
}

/// `GET /v1/me`, used as the connection check.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_feed_defaults_for_missing_fields() {
        let feed: Feed = serde_json::from_str(r#"{"id": 9, "title": "BBC Sport"}"#).unwrap();
        assert_eq!(feed.parsing_error_count, 0);
        assert_eq!(feed.parsing_error_message, "");
        assert!(!feed.is_failing());
    }

    #[test]
    fn test_feed_failing_by_count_or_message() {
        let by_count: Feed =
            serde_json::from_str(r#"{"id": 1, "parsing_error_count": 3}"#).unwrap();
        let by_message: Feed =
            serde_json::from_str(r#"{"id": 2, "parsing_error_message": "timeout"}"#).unwrap();
        let blank_message: Feed =
            serde_json::from_str(r#"{"id": 3, "parsing_error_message": "  "}"#).unwrap();
        assert!(by_count.is_failing());
        assert!(by_message.is_failing());
        assert!(!blank_message.is_failing());
    }

    #[test]
    fn test_entry_parses_offset_timestamp() {
        let entry: Entry = serde_json::from_str(
            r#"{"id": 5, "feed_id": 621, "title": "Goal!", "url": "https://bbc.co.uk/1",
                "status": "unread", "published_at": "2024-03-01T18:45:00+01:00"}"#,
        )
        .unwrap();
        assert_eq!(entry.published_at.to_rfc3339(), "2024-03-01T17:45:00+00:00");
        assert_eq!(entry.status, EntryStatus::Unread);
    }

    #[test]
    fn test_query_pairs() {
        let mut q = EntryQuery::new(EntryStatus::Unread, EntryOrder::PublishedAt, Direction::Asc);
        q.limit = Some(50);
        q.offset = Some(100);
        assert_eq!(
            q.pairs(),
            vec![
                ("status", "unread".to_string()),
                ("order", "published_at".to_string()),
                ("direction", "asc".to_string()),
                ("limit", "50".to_string()),
                ("offset", "100".to_string()),
            ]
        );
    }

    #[test]
    fn test_modification_skips_unset_fields() {
        let m = FeedModification {
            blocklist_rules: Some("(?i)podcast".into()),
            keeplist_rules: None,
        };
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            serde_json::json!({"blocklist_rules": "(?i)podcast"})
        );
    }
}
