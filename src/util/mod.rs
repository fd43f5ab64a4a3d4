//! Utility functions shared by the commands.
//!
//! - **Title handling**: normalisation for exact grouping, stop-word cleaning
//!   and word-order-insensitive similarity for fuzzy grouping
//! - **URL validation**: http/https checks for the server URL and new feeds
//! - **Log hygiene**: stripping terminal control sequences from feed text
//!
//! # Examples
//!
//! ```
//! use miniflux_janitor::util::{clean_title, token_sort_ratio};
//!
//! let a = clean_title("Lions reach the final");
//! let b = clean_title("The final: Lions reach it");
//! assert_eq!(token_sort_ratio(&a, &b), 100.0);
//! ```

mod text;
mod url_validator;

pub use text::{clean_title, normalise_title, strip_control_chars, token_sort_ratio};
pub use url_validator::{parse_http_url, UrlValidationError};

/// Timestamp layout used when logging an entry: `2024-03-01 18:45`.
pub const ENTRY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
