//! API-compatible (e.g. JSON de/serialisable) types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as strings rather than MongoDB's nested format.
//! - Datetimes are serialised as RFC 3339 strings.

pub mod admin;
pub mod assistant;
pub mod auth;
pub mod election;
pub mod id;
pub mod progress;
pub mod vote;
