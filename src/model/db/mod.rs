//! DB-compatible (e.g. de/serialisable) types, and the operations over them.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

pub mod election;
pub mod user;
pub mod vote;
