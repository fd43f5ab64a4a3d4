//! Housekeeping commands for a Miniflux feed reader.
//!
//! The binary wires these modules together; they are exposed as a library so
//! the integration tests can drive them against a mock server.

pub mod client;
pub mod config;
pub mod secrets;
pub mod tasks;
pub mod util;
