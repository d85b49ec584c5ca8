//! Persistence layer: durable PostgreSQL event log.
//!
//! Only committed [`crate::domain::TimelineEvent`]s are stored. Session
//! and participant state is never written; it is rebuilt on startup by
//! replaying each game's events in sequence order.

pub mod models;
pub mod postgres;

pub use postgres::PostgresPersistence;
