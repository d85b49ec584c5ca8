//! WebSocket layer: one live stream per game.
//!
//! A client connects to `/ws/games/{id}?last_known_sequence=N`, receives
//! whatever it needs to catch up (snapshot, backfill, or nothing), and
//! then every committed event plus periodic clock frames.

pub mod connection;
pub mod handler;
pub mod messages;
