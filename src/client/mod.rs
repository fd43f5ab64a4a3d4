//! Miniflux REST API client.
//!
//! - [`api`] - [`MinifluxClient`] with the handful of endpoints the commands use
//! - [`types`] - request and response payloads
//!
//! Every call carries the `X-Auth-Token` header, is bounded by a 30-second
//! timeout, and reads at most 10MB of response body.

mod api;
mod types;

pub use api::{ApiError, MinifluxClient};
pub use types::{
    CreateFeedRequest, Direction, Entry, EntryOrder, EntryPage, EntryQuery, EntryStatus, Feed,
    FeedModification, User,
};
