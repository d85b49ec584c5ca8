//! Blind schedule: the ordered list of tournament levels.
//!
//! A [`BlindSchedule`] is validated once when a game is created and is
//! immutable afterwards. The engine never authors schedules; it only
//! consumes them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayError;

/// One stage of the tournament clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BlindLevel {
    /// Zero-based position of this level within the schedule.
    pub level_index: u32,
    /// Small blind amount.
    pub small_blind: u64,
    /// Big blind amount.
    pub big_blind: u64,
    /// Ante amount (0 when the level has no ante).
    #[serde(default)]
    pub ante: u64,
    /// Level length in seconds.
    pub duration_seconds: u32,
}

impl BlindLevel {
    /// Level length in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        i64::from(self.duration_seconds) * 1000
    }
}

/// Validated, non-empty, contiguously indexed list of [`BlindLevel`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "Vec<BlindLevel>", into = "Vec<BlindLevel>")]
#[schema(value_type = Vec<BlindLevel>)]
pub struct BlindSchedule(Vec<BlindLevel>);

impl BlindSchedule {
    /// Builds a schedule from raw levels.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidSchedule`] if the list is empty, if
    /// `level_index` values are not `0, 1, 2, …` in order, if any level has
    /// a zero duration, or if a big blind is smaller than its small blind.
    pub fn new(levels: Vec<BlindLevel>) -> Result<Self, GatewayError> {
        if levels.is_empty() {
            return Err(GatewayError::InvalidSchedule(
                "schedule must contain at least one level".to_string(),
            ));
        }
        for (position, level) in levels.iter().enumerate() {
            if usize::try_from(level.level_index).ok() != Some(position) {
                return Err(GatewayError::InvalidSchedule(format!(
                    "level at position {position} has level_index {}",
                    level.level_index
                )));
            }
            if level.duration_seconds == 0 {
                return Err(GatewayError::InvalidSchedule(format!(
                    "level {} has zero duration",
                    level.level_index
                )));
            }
            if level.big_blind < level.small_blind {
                return Err(GatewayError::InvalidSchedule(format!(
                    "level {} big blind is below small blind",
                    level.level_index
                )));
            }
        }
        Ok(Self(levels))
    }

    /// Returns the level at `index`, if any.
    #[must_use]
    pub fn level(&self, index: u32) -> Option<&BlindLevel> {
        usize::try_from(index).ok().and_then(|i| self.0.get(i))
    }

    /// Number of levels. Always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the final level.
    #[must_use]
    pub fn last_index(&self) -> u32 {
        u32::try_from(self.0.len().saturating_sub(1)).unwrap_or(u32::MAX)
    }

    /// Returns `true` if `index` addresses an existing level.
    #[must_use]
    pub fn contains_index(&self, index: u32) -> bool {
        self.level(index).is_some()
    }

    /// Read-only view of all levels.
    #[must_use]
    pub fn levels(&self) -> &[BlindLevel] {
        &self.0
    }
}

impl TryFrom<Vec<BlindLevel>> for BlindSchedule {
    type Error = GatewayError;

    fn try_from(levels: Vec<BlindLevel>) -> Result<Self, Self::Error> {
        Self::new(levels)
    }
}

impl From<BlindSchedule> for Vec<BlindLevel> {
    fn from(schedule: BlindSchedule) -> Self {
        schedule.0
    }
}
