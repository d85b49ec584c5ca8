//! Session and participant projection folded from the event log.
//!
//! [`GameProjection`] is the only place session and participant fields
//! change. It can always be rebuilt from scratch with
//! [`GameProjection::replay`]; the in-memory copy held by the registry is
//! a cache of that fold at the current head sequence.

use chrono::Duration;
use serde::Serialize;

use super::{
    EventPayload, GameSession, Participant, ParticipantId, ParticipantStatus, SessionStatus,
    TimelineEvent,
};
use crate::error::GatewayError;

/// Session plus roster as of `head_sequence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameProjection {
    /// Clock and counters.
    pub session: GameSession,
    /// Roster in registration order.
    pub participants: Vec<Participant>,
    /// Sequence number of the last applied event.
    pub head_sequence: u64,
}

impl GameProjection {
    /// Starts a projection from a game's first event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] unless `event` is a
    /// `GAME_CREATED` event with sequence number 1.
    pub fn from_created(event: &TimelineEvent) -> Result<Self, GatewayError> {
        let EventPayload::GameCreated {
            event_id,
            blind_schedule,
            rules,
        } = &event.payload
        else {
            return Err(GatewayError::Internal(format!(
                "game {} log starts with {}",
                event.game_id,
                event.event_type_str()
            )));
        };
        if event.sequence_number != 1 {
            return Err(GatewayError::Internal(format!(
                "game {} created at sequence {}",
                event.game_id, event.sequence_number
            )));
        }
        Ok(Self {
            session: GameSession::new(
                event.game_id,
                event_id.clone(),
                blind_schedule.clone(),
                rules.clone(),
                event.created_at,
            ),
            participants: Vec::new(),
            head_sequence: 1,
        })
    }

    /// Rebuilds a projection by folding a complete, ordered log.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the log is empty, does not
    /// begin with `GAME_CREATED`, has gaps, or contains an event that does
    /// not apply to the state it follows.
    pub fn replay<'a, I>(events: I) -> Result<Self, GatewayError>
    where
        I: IntoIterator<Item = &'a TimelineEvent>,
    {
        let mut iter = events.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| GatewayError::Internal("cannot replay an empty log".to_string()))?;
        let mut projection = Self::from_created(first)?;
        for event in iter {
            projection.apply(event)?;
        }
        Ok(projection)
    }

    /// Folds one committed event into the projection.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the event belongs to another
    /// game, is not exactly `head_sequence + 1`, or references a missing
    /// participant.
    pub fn apply(&mut self, event: &TimelineEvent) -> Result<(), GatewayError> {
        if event.game_id != self.session.id {
            return Err(GatewayError::Internal(format!(
                "event for game {} applied to game {}",
                event.game_id, self.session.id
            )));
        }
        let expected = self.head_sequence.saturating_add(1);
        if event.sequence_number != expected {
            return Err(GatewayError::Internal(format!(
                "game {} expected sequence {expected}, got {}",
                self.session.id, event.sequence_number
            )));
        }

        match &event.payload {
            EventPayload::GameCreated { .. } => {
                return Err(GatewayError::Internal(format!(
                    "duplicate GAME_CREATED for game {}",
                    self.session.id
                )));
            }
            EventPayload::PlayerRegistered {
                participant_id,
                person_id,
                display_name,
                initial_status,
            } => {
                self.participants.push(Participant::new(
                    *participant_id,
                    self.session.id,
                    person_id.clone(),
                    display_name.clone(),
                    *initial_status,
                ));
                self.session.prize_pool = self
                    .session
                    .prize_pool
                    .saturating_add(self.session.rules.buy_in_amount);
            }
            EventPayload::GameStarted { started_at } => {
                for participant in &mut self.participants {
                    if participant.status == ParticipantStatus::Registered {
                        participant.status = ParticipantStatus::Playing;
                    }
                }
                self.session.status = SessionStatus::Running;
                self.session.started_at = Some(*started_at);
                self.session.level_started_at = Some(*started_at);
                self.session.accumulated_pause_ms = 0;
                self.session.paused_at = None;
            }
            EventPayload::TimerPaused { paused_at } => {
                self.session.status = SessionStatus::Paused;
                self.session.paused_at = Some(*paused_at);
            }
            EventPayload::TimerResumed { paused_ms, .. } => {
                self.session.status = SessionStatus::Running;
                self.session.paused_at = None;
                self.session.accumulated_pause_ms =
                    self.session.accumulated_pause_ms.saturating_add(*paused_ms);
            }
            EventPayload::BlindLevelUp {
                to_level,
                level_started_at,
                ..
            } => {
                if !self.session.blind_schedule.contains_index(*to_level) {
                    return Err(GatewayError::Internal(format!(
                        "game {} has no level {to_level}",
                        self.session.id
                    )));
                }
                self.session.current_level_index = *to_level;
                self.session.level_started_at = Some(*level_started_at);
                self.session.accumulated_pause_ms = 0;
                if self.session.status == SessionStatus::Paused {
                    // The new level starts its clock frozen at full duration.
                    self.session.paused_at = Some(*level_started_at);
                }
            }
            EventPayload::PlayerRebuy {
                participant_id,
                amount,
            } => {
                let participant = self.participant_mut(*participant_id)?;
                participant.rebuy_count = participant.rebuy_count.saturating_add(1);
                self.session.prize_pool = self.session.prize_pool.saturating_add(*amount);
            }
            EventPayload::PlayerEliminated {
                participant_id,
                finish_position,
                eliminated_by,
            } => {
                let sequence = event.sequence_number;
                let participant = self.participant_mut(*participant_id)?;
                participant.status = ParticipantStatus::Eliminated;
                participant.finish_position = Some(*finish_position);
                participant.eliminated_by_participant_id = *eliminated_by;
                participant.eliminated_at_sequence = Some(sequence);
                if eliminated_by.is_some() {
                    participant.bounties_lost = participant.bounties_lost.saturating_add(1);
                }
                if let Some(hunter) = eliminated_by {
                    let hunter = self.participant_mut(*hunter)?;
                    hunter.bounties_won = hunter.bounties_won.saturating_add(1);
                }
            }
            EventPayload::GameEnded {
                winner_participant_id,
                ended_at,
            } => {
                let winner = self.participant_mut(*winner_participant_id)?;
                winner.status = ParticipantStatus::Winner;
                winner.finish_position = Some(1);
                if let Some(paused_at) = self.session.paused_at.take() {
                    let paused: Duration = *ended_at - paused_at;
                    self.session.accumulated_pause_ms = self
                        .session
                        .accumulated_pause_ms
                        .saturating_add(paused.num_milliseconds().max(0));
                }
                self.session.status = SessionStatus::Completed;
                self.session.completed_at = Some(*ended_at);
                self.session.winner_participant_id = Some(*winner_participant_id);
            }
        }

        self.head_sequence = event.sequence_number;
        Ok(())
    }

    /// Looks up a participant by id.
    #[must_use]
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Looks up a participant by external person id.
    #[must_use]
    pub fn participant_by_person(&self, person_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.person_id == person_id)
    }

    /// Number of participants with the given status.
    #[must_use]
    pub fn count_with_status(&self, status: ParticipantStatus) -> usize {
        self.participants
            .iter()
            .filter(|p| p.status == status)
            .count()
    }

    /// Returns `true` once any participant has been eliminated.
    #[must_use]
    pub fn has_eliminations(&self) -> bool {
        self.count_with_status(ParticipantStatus::Eliminated) > 0
    }

    fn participant_mut(&mut self, id: ParticipantId) -> Result<&mut Participant, GatewayError> {
        let game_id = self.session.id;
        self.participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| {
                GatewayError::Internal(format!("participant {id} missing from game {game_id}"))
            })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::domain::blind_schedule::tests::two_level_schedule;
    use crate::domain::{GameId, GameRules};

    pub(crate) struct LogBuilder {
        pub(crate) game_id: GameId,
        pub(crate) events: Vec<TimelineEvent>,
    }

    impl LogBuilder {
        pub(crate) fn new(rules: GameRules, at: DateTime<Utc>) -> Self {
            let game_id = GameId::new();
            let created = TimelineEvent::new(
                game_id,
                1,
                EventPayload::GameCreated {
                    event_id: "evt-42".to_string(),
                    blind_schedule: two_level_schedule(),
                    rules,
                },
                "admin".to_string(),
                at,
            );
            Self {
                game_id,
                events: vec![created],
            }
        }

        pub(crate) fn push(&mut self, payload: EventPayload, at: DateTime<Utc>) -> &mut Self {
            let seq = self.events.len() as u64 + 1;
            self.events.push(TimelineEvent::new(
                self.game_id,
                seq,
                payload,
                "admin".to_string(),
                at,
            ));
            self
        }

        pub(crate) fn register(&mut self, name: &str, at: DateTime<Utc>) -> ParticipantId {
            let id = ParticipantId::new();
            self.push(
                EventPayload::PlayerRegistered {
                    participant_id: id,
                    person_id: format!("person-{name}"),
                    display_name: name.to_string(),
                    initial_status: ParticipantStatus::Registered,
                },
                at,
            );
            id
        }
    }

    fn replayed(builder: &LogBuilder) -> GameProjection {
        let Ok(projection) = GameProjection::replay(&builder.events) else {
            panic!("replay failed");
        };
        projection
    }

    #[test]
    fn replay_requires_game_created_first() {
        let t0 = Utc::now();
        let mut log = LogBuilder::new(GameRules::default(), t0);
        log.register("ann", t0);
        let tail: Vec<TimelineEvent> = log.events.iter().skip(1).cloned().collect();
        assert!(GameProjection::replay(&tail).is_err());
        assert!(GameProjection::replay(&Vec::<TimelineEvent>::new()).is_err());
    }

    #[test]
    fn replay_rejects_gaps() {
        let t0 = Utc::now();
        let mut log = LogBuilder::new(GameRules::default(), t0);
        log.register("ann", t0);
        log.register("bob", t0);
        log.events.remove(1);
        assert!(GameProjection::replay(&log.events).is_err());
    }

    #[test]
    fn start_promotes_registered_players() {
        let t0 = Utc::now();
        let mut log = LogBuilder::new(
            GameRules {
                buy_in_amount: 50,
                ..GameRules::default()
            },
            t0,
        );
        let a = log.register("ann", t0);
        let b = log.register("bob", t0);
        log.push(EventPayload::GameStarted { started_at: t0 }, t0);

        let p = replayed(&log);
        assert_eq!(p.session.status, SessionStatus::Running);
        assert_eq!(p.session.prize_pool, 100);
        assert_eq!(p.head_sequence, 4);
        for id in [a, b] {
            assert_eq!(p.participant(id).map(|x| x.status), Some(ParticipantStatus::Playing));
        }
    }

    #[test]
    fn elimination_with_bounty_updates_both_sides() {
        let t0 = Utc::now();
        let mut log = LogBuilder::new(GameRules::default(), t0);
        let a = log.register("ann", t0);
        let b = log.register("bob", t0);
        let c = log.register("cat", t0);
        log.push(EventPayload::GameStarted { started_at: t0 }, t0);
        log.push(
            EventPayload::PlayerEliminated {
                participant_id: c,
                finish_position: 3,
                eliminated_by: Some(a),
            },
            t0,
        );

        let p = replayed(&log);
        let Some(victim) = p.participant(c) else {
            panic!("victim missing");
        };
        assert_eq!(victim.status, ParticipantStatus::Eliminated);
        assert_eq!(victim.finish_position, Some(3));
        assert_eq!(victim.bounties_lost, 1);
        assert_eq!(victim.eliminated_at_sequence, Some(6));
        assert_eq!(p.participant(a).map(|x| x.bounties_won), Some(1));
        assert_eq!(p.participant(b).map(|x| x.bounties_won), Some(0));
    }

    #[test]
    fn level_up_while_paused_restarts_frozen() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(100);
        let mut log = LogBuilder::new(GameRules::default(), t0);
        log.register("ann", t0);
        log.register("bob", t0);
        log.push(EventPayload::GameStarted { started_at: t0 }, t0);
        log.push(EventPayload::TimerPaused { paused_at: t1 }, t1);
        log.push(
            EventPayload::BlindLevelUp {
                from_level: 0,
                to_level: 1,
                level_started_at: t1,
                automatic: false,
            },
            t1,
        );

        let p = replayed(&log);
        assert_eq!(p.session.current_level_index, 1);
        assert_eq!(p.session.paused_at, Some(t1));
        assert_eq!(p.session.accumulated_pause_ms, 0);
        assert!(p.session.invariants_hold());
    }

    #[test]
    fn game_ended_marks_winner_and_completes() {
        let t0 = Utc::now();
        let mut log = LogBuilder::new(GameRules::default(), t0);
        let a = log.register("ann", t0);
        let b = log.register("bob", t0);
        log.push(EventPayload::GameStarted { started_at: t0 }, t0);
        log.push(
            EventPayload::PlayerEliminated {
                participant_id: b,
                finish_position: 2,
                eliminated_by: None,
            },
            t0,
        );
        log.push(
            EventPayload::GameEnded {
                winner_participant_id: a,
                ended_at: t0,
            },
            t0,
        );

        let p = replayed(&log);
        assert_eq!(p.session.status, SessionStatus::Completed);
        assert_eq!(p.session.winner_participant_id, Some(a));
        let Some(winner) = p.participant(a) else {
            panic!("winner missing");
        };
        assert_eq!(winner.status, ParticipantStatus::Winner);
        assert_eq!(winner.finish_position, Some(1));
    }

    #[test]
    fn incremental_apply_matches_replay() {
        let t0 = Utc::now();
        let mut log = LogBuilder::new(GameRules::default(), t0);
        log.register("ann", t0);
        log.register("bob", t0);
        log.push(EventPayload::GameStarted { started_at: t0 }, t0);

        let Some(first) = log.events.first() else {
            panic!("empty log");
        };
        let Ok(mut incremental) = GameProjection::from_created(first) else {
            panic!("from_created failed");
        };
        for event in log.events.iter().skip(1) {
            assert!(incremental.apply(event).is_ok());
        }
        assert_eq!(incremental, replayed(&log));
    }
}
