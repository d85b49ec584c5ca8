//! Data Transfer Objects for REST request/response serialization.
//!
//! Domain types that are already wire-shaped (snapshots, events, command
//! outcomes) are returned as-is; the types here cover request bodies,
//! query strings and list envelopes.

pub mod command_dto;
pub mod common_dto;
pub mod game_dto;

pub use command_dto::*;
pub use common_dto::*;
pub use game_dto::*;
