//! # tourney-gateway
//!
//! Live poker tournament clock and game-state engine with REST and
//! WebSocket fan-out.
//!
//! Every change to a game is an immutable, sequence-numbered event in that
//! game's append-only log. Session and roster state is a projection of the
//! log; the tournament clock is derived from timestamps and never ticks.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── GameService + heartbeat (service/)
//!     ├── BroadcastHub (domain/)
//!     │
//!     ├── GameRegistry → GameEntry { projection, log, idempotency } (domain/)
//!     │
//!     └── PostgreSQL event store (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
