//! Type-safe identifiers for games and participants.
//!
//! Both wrap a UUID v4 so that a game id can never be passed where a
//! participant id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a live game session.
///
/// Generated once when the session is created and immutable thereafter.
/// Used as the key in [`super::GameRegistry`], the channel key in
/// [`super::BroadcastHub`], and the WebSocket subscription target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = uuid::Uuid)]
pub struct GameId(uuid::Uuid);

impl GameId {
    /// Creates a new random `GameId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `GameId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for GameId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl From<GameId> for uuid::Uuid {
    fn from(id: GameId) -> Self {
        id.0
    }
}

/// Unique identifier for one participant row within a game.
///
/// A person registering for two games gets two different participant ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = uuid::Uuid)]
pub struct ParticipantId(uuid::Uuid);

impl ParticipantId {
    /// Creates a new random `ParticipantId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `ParticipantId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for ParticipantId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}
