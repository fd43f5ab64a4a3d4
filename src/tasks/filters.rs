use crate::client::{ApiError, Feed, FeedModification, MinifluxClient};
use crate::config::FilterRule;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid filter pattern for feed {feed_id}: {pattern}: {source}")]
    InvalidPattern {
        feed_id: i64,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Feed {0} has more than one [[filters]] entry")]
    DuplicateFeed(i64),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result of a `sync-filters` run, by feed id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSyncReport {
    pub updated: Vec<i64>,
    /// Feeds a dry run left out of date.
    pub would_update: Vec<i64>,
    pub unchanged: Vec<i64>,
    /// Configured feeds the server does not know.
    pub missing: Vec<i64>,
    /// Feeds whose update call failed, with the error message.
    pub failed: Vec<(i64, String)>,
}

/// Rule strings a feed should carry: each list joined into one alternation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRules {
    pub feed_id: i64,
    pub blocklist: String,
    pub keeplist: String,
}

impl DesiredRules {
    /// Fields that differ from what the server currently holds.
    pub fn changes_for(&self, feed: &Feed) -> FeedModification {
        FeedModification {
            blocklist_rules: (feed.blocklist_rules != self.blocklist).then(|| self.blocklist.clone()),
            keeplist_rules: (feed.keeplist_rules != self.keeplist).then(|| self.keeplist.clone()),
        }
    }
}

/// Checks every pattern and builds the joined rule strings.
///
/// Fails on the first pattern that does not compile, or when a feed is
/// configured twice.
pub fn compile_rules(rules: &[FilterRule]) -> Result<Vec<DesiredRules>, FilterError> {
    let mut seen = HashSet::new();
    let mut desired = Vec::with_capacity(rules.len());

    for rule in rules {
        if !seen.insert(rule.feed_id) {
            return Err(FilterError::DuplicateFeed(rule.feed_id));
        }
        desired.push(DesiredRules {
            feed_id: rule.feed_id,
            blocklist: join_patterns(rule.feed_id, &rule.block)?,
            keeplist: join_patterns(rule.feed_id, &rule.keep)?,
        });
    }
    Ok(desired)
}

fn join_patterns(feed_id: i64, patterns: &[String]) -> Result<String, FilterError> {
    let invalid = |pattern: &str, source| FilterError::InvalidPattern {
        feed_id,
        pattern: pattern.to_string(),
        source,
    };

    for pattern in patterns {
        Regex::new(pattern).map_err(|e| invalid(pattern, e))?;
    }
    let joined = patterns.join("|");
    if !joined.is_empty() {
        Regex::new(&joined).map_err(|e| invalid(&joined, e))?;
    }
    Ok(joined)
}

/// Brings each configured feed's block/keep rules in line with the config.
///
/// Patterns are validated before any request. Only feeds whose current rule
/// strings differ are updated; a failed update is recorded and the run goes on.
pub async fn sync_filters(
    client: &MinifluxClient,
    rules: &[FilterRule],
    dry_run: bool,
) -> Result<FilterSyncReport, FilterError> {
    let desired = compile_rules(rules)?;
    let mut report = FilterSyncReport::default();

    if desired.is_empty() {
        tracing::info!("No [[filters]] entries configured");
        return Ok(report);
    }

    let feeds = client.feeds().await?;
    let by_id: HashMap<i64, &Feed> = feeds.iter().map(|f| (f.id, f)).collect();

    for want in &desired {
        let Some(feed) = by_id.get(&want.feed_id) else {
            tracing::warn!(feed_id = want.feed_id, "Configured feed not found on server");
            report.missing.push(want.feed_id);
            continue;
        };

        let changes = want.changes_for(feed);
        if changes.is_empty() {
            tracing::debug!(feed_id = feed.id, "Filter rules already in sync");
            report.unchanged.push(feed.id);
            continue;
        }

        if dry_run {
            tracing::info!(feed_id = feed.id, changes = ?changes, "DRY-RUN - would update filter rules");
            report.would_update.push(feed.id);
            continue;
        }

        match client.update_feed(feed.id, &changes).await {
            Ok(()) => {
                tracing::info!(
                    feed_id = feed.id,
                    blocklist = ?changes.blocklist_rules,
                    keeplist = ?changes.keeplist_rules,
                    "Updated filter rules"
                );
                report.updated.push(feed.id);
            }
            Err(e) => {
                tracing::warn!(feed_id = feed.id, error = %e, "Failed to update filter rules");
                report.failed.push((feed.id, e.to_string()));
            }
        }
    }

    Ok(report)
}
