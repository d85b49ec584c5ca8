//! Tournament clock derivation.
//!
//! There is no ticking timer anywhere in the engine. The clock is a pure
//! function of session timestamps and "now": [`derive_clock`]. Level
//! expiry is detected with [`level_expiry`] and turned into an explicit
//! `BLIND_LEVEL_UP` event by the service layer.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{BlindLevel, EventPayload, GameSession, SessionStatus};

/// Derived clock state sent to clients.
///
/// Clients render the countdown locally from `time_remaining_ms` and
/// `server_time`; nothing here ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ClockState {
    /// Session status at derivation time.
    pub status: SessionStatus,
    /// Index of the level in play.
    pub current_level_index: u32,
    /// Level in play.
    pub current_level: Option<BlindLevel>,
    /// Level that follows, if any.
    pub next_level: Option<BlindLevel>,
    /// Whole seconds left in the level, rounded up. Never negative.
    pub time_remaining_seconds: i64,
    /// Milliseconds left in the level. Never negative.
    pub time_remaining_ms: i64,
    /// `true` only while the session is `RUNNING`.
    pub is_running: bool,
    /// Instant the derivation was made for.
    pub server_time: DateTime<Utc>,
}

/// Milliseconds of active (unpaused) play in the current level at `now`.
///
/// Returns 0 before the game starts.
#[must_use]
pub fn elapsed_active_ms(session: &GameSession, now: DateTime<Utc>) -> i64 {
    let Some(level_started_at) = session.level_started_at else {
        return 0;
    };
    let reference = match session.status {
        SessionStatus::Paused => session.paused_at.unwrap_or(now),
        SessionStatus::Completed => session.completed_at.unwrap_or(now),
        SessionStatus::Pending | SessionStatus::Running => now,
    };
    let elapsed = (reference - level_started_at).num_milliseconds() - session.accumulated_pause_ms;
    elapsed.max(0)
}

/// Computes the clock for `session` at `now`.
#[must_use]
pub fn derive_clock(session: &GameSession, now: DateTime<Utc>) -> ClockState {
    let current_level = session.current_level().copied();
    let next_level = session
        .current_level_index
        .checked_add(1)
        .and_then(|next| session.blind_schedule.level(next))
        .copied();

    let duration_ms = current_level.map_or(0, |l| l.duration_ms());
    let time_remaining_ms = (duration_ms - elapsed_active_ms(session, now)).max(0);

    ClockState {
        status: session.status,
        current_level_index: session.current_level_index,
        current_level,
        next_level,
        time_remaining_seconds: (time_remaining_ms + 999) / 1000,
        time_remaining_ms,
        is_running: session.status == SessionStatus::Running,
        server_time: now,
    }
}

/// Instant at which the current level runs out, if the clock is running.
///
/// Paused, pending, and completed sessions have no expiry.
#[must_use]
pub fn level_expiry(session: &GameSession) -> Option<DateTime<Utc>> {
    if session.status != SessionStatus::Running {
        return None;
    }
    let started = session.level_started_at?;
    let level = session.current_level()?;
    Some(started + Duration::milliseconds(session.accumulated_pause_ms + level.duration_ms()))
}

/// Implicit level advances that have come due by `now`.
///
/// Each advance starts its level at the previous level's expiry instant,
/// not at `now`, so a clock that nobody observed for several levels
/// catches up to exactly where it would have been. The final level never
/// advances; its clock holds at zero.
#[must_use]
pub fn due_level_ups(session: &GameSession, now: DateTime<Utc>) -> Vec<EventPayload> {
    let mut payloads = Vec::new();
    if session.status != SessionStatus::Running {
        return payloads;
    }
    let Some(mut started) = session.level_started_at else {
        return payloads;
    };
    let mut pause_ms = session.accumulated_pause_ms;
    let mut index = session.current_level_index;

    while let Some(level) = session.blind_schedule.level(index) {
        let next = index.saturating_add(1);
        if !session.blind_schedule.contains_index(next) {
            break;
        }
        let expiry = started + Duration::milliseconds(pause_ms + level.duration_ms());
        if expiry > now {
            break;
        }
        payloads.push(EventPayload::BlindLevelUp {
            from_level: index,
            to_level: next,
            level_started_at: expiry,
            automatic: true,
        });
        started = expiry;
        pause_ms = 0;
        index = next;
    }
    payloads
}

/// Source of "now" for the engine.
pub trait TimeSource: fmt::Debug + Send + Sync {
    /// Current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven time for deterministic tests and simulations.
#[derive(Debug, Clone)]
pub struct ManualTime {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualTime {
    /// Starts the clock at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves time forward by `seconds`.
    pub fn advance_secs(&self, seconds: i64) {
        self.advance(Duration::seconds(seconds));
    }

    /// Moves time forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += delta;
        }
    }

    /// Jumps to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = instant;
        }
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map_or_else(|_| Utc::now(), |now| *now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blind_schedule::tests::two_level_schedule;
    use crate::domain::{GameId, GameRules};

    fn running_session(started: DateTime<Utc>) -> GameSession {
        let mut s = GameSession::new(
            GameId::new(),
            "evt".to_string(),
            two_level_schedule(),
            GameRules::default(),
            started,
        );
        s.status = SessionStatus::Running;
        s.level_started_at = Some(started);
        s.started_at = Some(started);
        s
    }

    #[test]
    fn pending_session_reports_full_level() {
        let now = Utc::now();
        let s = GameSession::new(
            GameId::new(),
            "evt".to_string(),
            two_level_schedule(),
            GameRules::default(),
            now,
        );
        let clock = derive_clock(&s, now);
        assert_eq!(clock.time_remaining_seconds, 600);
        assert!(!clock.is_running);
        assert_eq!(clock.next_level.map(|l| l.small_blind), Some(20));
    }

    #[test]
    fn running_clock_counts_down() {
        let t0 = Utc::now();
        let s = running_session(t0);
        let clock = derive_clock(&s, t0 + Duration::seconds(100));
        assert_eq!(clock.time_remaining_seconds, 500);
        assert!(clock.is_running);
    }

    #[test]
    fn remaining_never_negative() {
        let t0 = Utc::now();
        let s = running_session(t0);
        let clock = derive_clock(&s, t0 + Duration::seconds(10_000));
        assert_eq!(clock.time_remaining_ms, 0);
        assert_eq!(clock.time_remaining_seconds, 0);
    }

    #[test]
    fn partial_seconds_round_up() {
        let t0 = Utc::now();
        let s = running_session(t0);
        let clock = derive_clock(&s, t0 + Duration::milliseconds(1_500));
        assert_eq!(clock.time_remaining_ms, 598_500);
        assert_eq!(clock.time_remaining_seconds, 599);
    }

    #[test]
    fn paused_clock_freezes_at_pause_instant() {
        let t0 = Utc::now();
        let mut s = running_session(t0);
        s.status = SessionStatus::Paused;
        s.paused_at = Some(t0 + Duration::seconds(60));

        let early = derive_clock(&s, t0 + Duration::seconds(61));
        let late = derive_clock(&s, t0 + Duration::seconds(6_000));
        assert_eq!(early.time_remaining_seconds, 540);
        assert_eq!(late.time_remaining_seconds, 540);
        assert!(!late.is_running);
    }

    #[test]
    fn accumulated_pause_is_subtracted() {
        let t0 = Utc::now();
        let mut s = running_session(t0);
        s.accumulated_pause_ms = 30_000;
        let clock = derive_clock(&s, t0 + Duration::seconds(90));
        assert_eq!(clock.time_remaining_seconds, 540);
    }

    #[test]
    fn expiry_accounts_for_pauses() {
        let t0 = Utc::now();
        let mut s = running_session(t0);
        s.accumulated_pause_ms = 5_000;
        assert_eq!(level_expiry(&s), Some(t0 + Duration::seconds(605)));

        s.status = SessionStatus::Paused;
        s.paused_at = Some(t0);
        assert_eq!(level_expiry(&s), None);
    }

    #[test]
    fn due_level_ups_chain_from_expiry() {
        let t0 = Utc::now();
        let mut s = running_session(t0);
        s.accumulated_pause_ms = 10_000;

        assert!(due_level_ups(&s, t0 + Duration::seconds(609)).is_empty());

        let due = due_level_ups(&s, t0 + Duration::seconds(700));
        assert_eq!(
            due,
            vec![EventPayload::BlindLevelUp {
                from_level: 0,
                to_level: 1,
                level_started_at: t0 + Duration::seconds(610),
                automatic: true,
            }]
        );
    }

    #[test]
    fn final_level_never_auto_advances() {
        let t0 = Utc::now();
        let mut s = running_session(t0);
        s.current_level_index = 1;
        assert!(due_level_ups(&s, t0 + Duration::seconds(100_000)).is_empty());
        assert_eq!(derive_clock(&s, t0 + Duration::seconds(100_000)).time_remaining_ms, 0);
    }

    #[test]
    fn paused_session_has_nothing_due() {
        let t0 = Utc::now();
        let mut s = running_session(t0);
        s.status = SessionStatus::Paused;
        s.paused_at = Some(t0);
        assert!(due_level_ups(&s, t0 + Duration::seconds(5_000)).is_empty());
    }

    #[test]
    fn manual_time_advances() {
        let t0 = Utc::now();
        let time = ManualTime::new(t0);
        time.advance_secs(42);
        assert_eq!(time.now(), t0 + Duration::seconds(42));
    }
}
