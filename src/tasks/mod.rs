//! One module per command.
//!
//! - [`refresh`] - refresh feeds the server reports as failing, with a single
//!   retry on transient errors
//! - [`dedupe`] - exact-title duplicates within one feed, plus the shared
//!   fetch/apply helpers
//! - [`crossfeed`] - exact-title duplicates across feeds with a preferred feed
//! - [`recent`] - unread entries whose title was read recently
//! - [`fuzzy`] - near-duplicate titles across feeds
//! - [`subscribe`] - add a feed
//! - [`filters`] - sync per-feed block/keep rules from the config
//!
//! Every task runs sequentially and returns a report for the binary to print.

pub mod crossfeed;
pub mod dedupe;
pub mod filters;
pub mod fuzzy;
pub mod recent;
pub mod refresh;
pub mod subscribe;

pub use crossfeed::{dedupe_cross_feed, CrossFeedError};
pub use dedupe::{dedupe_feed, DedupeReport};
pub use filters::{sync_filters, FilterError, FilterSyncReport};
pub use fuzzy::dedupe_fuzzy;
pub use recent::mark_recently_seen;
pub use refresh::{refresh_failing, RefreshOutcome, RefreshStatus, RefreshSummary};
pub use subscribe::{add_feed, SubscribeError, SubscribeOutcome};
