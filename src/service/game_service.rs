//! Game service: runs commands against a game's log and fans out the
//! committed events.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::domain::clock::{derive_clock, due_level_ups};
use crate::domain::command::decide;
use crate::domain::reconcile::plan_resync;
use crate::domain::{
    BlindLevel, BlindSchedule, BroadcastHub, ClockState, CommandOutcome, EventLog, EventPayload,
    GameCommand, GameEntry, GameId, GameProjection, GameRegistry, GameRules, GameSnapshot,
    GameSummary, GameUpdate, IdempotencyCache, ResyncPlan, SYSTEM_ACTOR, TimeSource,
    TimelineEvent,
};
use crate::error::GatewayError;
use crate::persistence::PostgresPersistence;

/// Sizing of the per-game in-memory state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Events retained in memory per game for backfill.
    pub event_retention: usize,
    /// Largest gap served by replay instead of a snapshot.
    pub max_backfill_gap: u64,
    /// Completed commands remembered per game for idempotent retries.
    pub idempotency_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            event_retention: 1000,
            max_backfill_gap: 500,
            idempotency_capacity: 1024,
        }
    }
}

/// Input for [`GameService::create_game`].
#[derive(Debug, Clone)]
pub struct NewGame {
    /// Owning tournament/event reference.
    pub event_id: String,
    /// Raw levels, validated into a [`BlindSchedule`].
    pub levels: Vec<BlindLevel>,
    /// Buy-in, rebuy and registration rules.
    pub rules: GameRules,
}

/// Retained events after a given sequence.
#[derive(Debug, Clone)]
pub struct Backfill {
    /// Events in sequence order.
    pub events: Vec<TimelineEvent>,
    /// Head sequence at read time.
    pub head_sequence: u64,
}

/// Everything a new subscriber needs before it starts reading live
/// updates from `receiver`.
///
/// The receiver was subscribed while the game lock was held, so the first
/// event it yields is exactly `head_sequence + 1`.
#[derive(Debug)]
pub struct Attachment {
    /// How the subscriber is brought up to date.
    pub plan: ResyncPlan,
    /// Full state, for [`ResyncPlan::Snapshot`].
    pub snapshot: Option<GameSnapshot>,
    /// Missed events, for [`ResyncPlan::Replay`].
    pub backfill: Vec<TimelineEvent>,
    /// Clock at attach time.
    pub clock: ClockState,
    /// Head sequence at attach time.
    pub head_sequence: u64,
    /// Live updates from here on.
    pub receiver: broadcast::Receiver<GameUpdate>,
}

/// Orchestration layer for all game operations.
///
/// Every mutation follows the same path under the game's lock: replay any
/// idempotent outcome, append implicit level advances that have come due,
/// validate the command, then commit. Committing means applying to a copy
/// of the projection, persisting, swapping the copy in, appending to the
/// in-memory log and publishing. A rejection at any step leaves the game
/// unchanged.
#[derive(Debug, Clone)]
pub struct GameService {
    registry: Arc<GameRegistry>,
    hub: Arc<BroadcastHub>,
    persistence: Option<PostgresPersistence>,
    time: Arc<dyn TimeSource>,
    settings: EngineSettings,
}

impl GameService {
    /// Creates an in-memory `GameService`.
    #[must_use]
    pub fn new(
        registry: Arc<GameRegistry>,
        hub: Arc<BroadcastHub>,
        time: Arc<dyn TimeSource>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            registry,
            hub,
            persistence: None,
            time,
            settings,
        }
    }

    /// Makes every commit durable in `persistence` before it is applied.
    #[must_use]
    pub fn with_persistence(mut self, persistence: PostgresPersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Returns a reference to the inner [`BroadcastHub`].
    #[must_use]
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Returns a reference to the inner [`GameRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<GameRegistry> {
        &self.registry
    }

    /// Current instant according to the service's time source.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    /// Creates a game and commits its `GAME_CREATED` event at sequence 1.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidSchedule`] for a malformed schedule
    /// or rules, [`GatewayError::InvalidRequest`] for an empty event id,
    /// and a persistence error if the event cannot be stored.
    pub async fn create_game(
        &self,
        new_game: NewGame,
        actor_id: &str,
    ) -> Result<TimelineEvent, GatewayError> {
        if new_game.event_id.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "event_id must not be empty".to_string(),
            ));
        }
        require_actor(actor_id)?;
        let blind_schedule = BlindSchedule::new(new_game.levels)?;
        validate_rules(&new_game.rules, &blind_schedule)?;

        let game_id = GameId::new();
        let event_id = new_game.event_id;
        let created = TimelineEvent::new(
            game_id,
            1,
            EventPayload::GameCreated {
                event_id: event_id.clone(),
                blind_schedule,
                rules: new_game.rules,
            },
            actor_id.to_string(),
            self.time.now(),
        );
        let projection = GameProjection::from_created(&created)?;
        let mut log = EventLog::new(self.settings.event_retention);
        log.append(created.clone())?;

        if let Some(persistence) = &self.persistence {
            persistence
                .append_commit(std::slice::from_ref(&created), None)
                .await?;
        }
        self.registry
            .insert(GameEntry::new(
                projection,
                log,
                IdempotencyCache::new(self.settings.idempotency_capacity),
            ))
            .await?;

        tracing::info!(%game_id, %event_id, "game created");
        Ok(created)
    }

    /// Runs `command` against `game_id` exactly once per `request_id`.
    ///
    /// A retry with the same `request_id` and the same command returns the
    /// original outcome without touching the game. The outcome's events
    /// include any implicit level advances committed ahead of the command.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::GameNotFound`] for an unknown game,
    /// [`GatewayError::IdempotencyKeyReused`] when `request_id` belongs to
    /// a different command, and the rule rejection from validation.
    pub async fn execute(
        &self,
        game_id: GameId,
        request_id: &str,
        actor_id: &str,
        command: GameCommand,
    ) -> Result<CommandOutcome, GatewayError> {
        if request_id.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "request_id must not be empty".to_string(),
            ));
        }
        require_actor(actor_id)?;

        let entry_lock = self.registry.get(game_id).await?;
        let mut entry = entry_lock.lock().await;

        if let Some(outcome) = entry.idempotency.lookup(request_id, &command)? {
            tracing::debug!(%game_id, request_id, "returning stored outcome");
            return Ok(outcome);
        }

        let now = self.time.now();
        let mut events = self.catch_up(game_id, &mut entry, now).await?;
        let payloads = decide(&entry.projection, &command, now).inspect_err(|err| {
            tracing::info!(%game_id, command = command.name(), error = %err, "command rejected");
        })?;
        let (projection, committed) =
            stage(&entry.projection, game_id, payloads, actor_id, now)?;
        events.extend(committed.iter().cloned());
        let outcome = CommandOutcome {
            game_id,
            request_id: request_id.to_string(),
            events,
            head_sequence: projection.head_sequence,
        };
        self.commit(
            game_id,
            &mut entry,
            projection,
            &committed,
            Some((&command, &outcome)),
        )
        .await?;
        self.publish_clock(game_id, &entry.projection, now);

        entry
            .idempotency
            .record(request_id, command, outcome.clone());
        Ok(outcome)
    }

    /// Full state of a game with the clock derived for now.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::GameNotFound`] for an unknown game.
    pub async fn snapshot(&self, game_id: GameId) -> Result<GameSnapshot, GatewayError> {
        let entry_lock = self.registry.get(game_id).await?;
        let mut entry = entry_lock.lock().await;
        let now = self.time.now();
        self.catch_up(game_id, &mut entry, now).await?;
        Ok(GameSnapshot::capture(&entry.projection, now))
    }

    /// Events with `sequence_number > after`.
    ///
    /// With persistence enabled, a request reaching past the in-memory
    /// window is served from the database.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RetentionExceeded`] when the events are no
    /// longer retained and cannot be loaded, and
    /// [`GatewayError::GameNotFound`] for an unknown game.
    pub async fn events_after(&self, game_id: GameId, after: u64) -> Result<Backfill, GatewayError> {
        let entry_lock = self.registry.get(game_id).await?;
        let mut entry = entry_lock.lock().await;
        let now = self.time.now();
        self.catch_up(game_id, &mut entry, now).await?;
        let head_sequence = entry.log.head_sequence();

        let err = match entry.log.events_after(after) {
            Ok(events) => {
                return Ok(Backfill {
                    events,
                    head_sequence,
                });
            }
            Err(err) => err,
        };
        if let (GatewayError::RetentionExceeded { .. }, Some(persistence)) =
            (&err, &self.persistence)
        {
            let events = persistence
                .load_game_events_after(*game_id.as_uuid(), after)
                .await?;
            return Ok(Backfill {
                events,
                head_sequence,
            });
        }
        Err(err)
    }

    /// Subscribes to a game and works out how to bring a client that last
    /// saw `last_known_sequence` up to date.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::GameNotFound`] for an unknown game.
    pub async fn attach(
        &self,
        game_id: GameId,
        last_known_sequence: u64,
    ) -> Result<Attachment, GatewayError> {
        let entry_lock = self.registry.get(game_id).await?;
        let mut entry = entry_lock.lock().await;
        let now = self.time.now();
        self.catch_up(game_id, &mut entry, now).await?;

        let plan = plan_resync(
            last_known_sequence,
            &entry.log,
            self.settings.max_backfill_gap,
        );
        let (snapshot, backfill) = match plan {
            ResyncPlan::Live => (None, Vec::new()),
            ResyncPlan::Replay => (None, entry.log.events_after(last_known_sequence)?),
            ResyncPlan::Snapshot => (
                Some(GameSnapshot::capture(&entry.projection, now)),
                Vec::new(),
            ),
        };
        let receiver = self.hub.subscribe(game_id);
        let head_sequence = entry.projection.head_sequence;

        tracing::debug!(
            %game_id,
            last_known_sequence,
            head_sequence,
            ?plan,
            "subscriber attached"
        );
        Ok(Attachment {
            plan,
            snapshot,
            backfill,
            clock: derive_clock(&entry.projection.session, now),
            head_sequence,
            receiver,
        })
    }

    /// Commits any due level advance and publishes a clock frame.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::GameNotFound`] for an unknown game, or a
    /// persistence error if a level advance cannot be stored.
    pub async fn heartbeat(&self, game_id: GameId) -> Result<(), GatewayError> {
        let entry_lock = self.registry.get(game_id).await?;
        let mut entry = entry_lock.lock().await;
        let now = self.time.now();
        self.catch_up(game_id, &mut entry, now).await?;
        self.publish_clock(game_id, &entry.projection, now);
        Ok(())
    }

    /// Summaries of all games, optionally for one event.
    pub async fn list_games(&self, event_id: Option<&str>) -> Vec<GameSummary> {
        self.registry.list(event_id).await
    }

    /// Rebuilds every stored game from its events, and its idempotency
    /// cache from the stored command outcomes.
    ///
    /// Returns the number of games restored; 0 without persistence.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if loading fails, or
    /// [`GatewayError::Internal`] if a stored log does not replay.
    pub async fn restore(&self) -> Result<usize, GatewayError> {
        let Some(persistence) = &self.persistence else {
            return Ok(0);
        };
        let events = persistence.load_all_events().await?;
        let mut recorded: HashMap<GameId, Vec<(GameCommand, CommandOutcome)>> = HashMap::new();
        for (command, outcome) in persistence.load_all_outcomes().await? {
            recorded
                .entry(outcome.game_id)
                .or_default()
                .push((command, outcome));
        }

        let mut by_game: Vec<(GameId, Vec<TimelineEvent>)> = Vec::new();
        for event in events {
            let same_game = by_game
                .last()
                .is_some_and(|(game_id, _)| *game_id == event.game_id);
            if same_game {
                if let Some((_, batch)) = by_game.last_mut() {
                    batch.push(event);
                }
            } else {
                by_game.push((event.game_id, vec![event]));
            }
        }

        let restored = by_game.len();
        for (game_id, events) in by_game {
            let outcomes = recorded.remove(&game_id).unwrap_or_default();
            let remembered = outcomes.len();
            let entry = self.rebuild_entry(events, outcomes)?;
            let head_sequence = entry.projection.head_sequence;
            self.registry.insert(entry).await?;
            tracing::info!(%game_id, head_sequence, remembered, "game restored");
        }
        Ok(restored)
    }

    /// Rebuilds a game from its full event log and the outcomes of the
    /// commands that produced it, oldest first.
    fn rebuild_entry(
        &self,
        events: Vec<TimelineEvent>,
        outcomes: Vec<(GameCommand, CommandOutcome)>,
    ) -> Result<GameEntry, GatewayError> {
        let projection = GameProjection::replay(&events)?;
        let mut log = EventLog::new(self.settings.event_retention);
        for event in events {
            log.append(event)?;
        }

        let mut idempotency = IdempotencyCache::new(self.settings.idempotency_capacity);
        for (command, outcome) in outcomes {
            if outcome.game_id != projection.session.id
                || outcome.head_sequence > projection.head_sequence
            {
                return Err(GatewayError::Internal(format!(
                    "outcome {} is ahead of game {} log",
                    outcome.request_id, projection.session.id
                )));
            }
            let request_id = outcome.request_id.clone();
            idempotency.record(&request_id, command, outcome);
        }
        Ok(GameEntry::new(projection, log, idempotency))
    }

    async fn catch_up(
        &self,
        game_id: GameId,
        entry: &mut GameEntry,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimelineEvent>, GatewayError> {
        let due = due_level_ups(&entry.projection.session, now);
        if due.is_empty() {
            return Ok(Vec::new());
        }
        let (projection, events) = stage(&entry.projection, game_id, due, SYSTEM_ACTOR, now)?;
        self.commit(game_id, entry, projection, &events, None).await?;
        Ok(events)
    }

    /// Makes staged events durable (with the command that produced them,
    /// if any), swaps in the staged projection and publishes the events.
    async fn commit(
        &self,
        game_id: GameId,
        entry: &mut GameEntry,
        projection: GameProjection,
        events: &[TimelineEvent],
        recorded: Option<(&GameCommand, &CommandOutcome)>,
    ) -> Result<(), GatewayError> {
        if let Some(persistence) = &self.persistence {
            persistence.append_commit(events, recorded).await?;
        }

        entry.projection = projection;
        for event in events {
            entry.log.append(event.clone())?;
            tracing::info!(
                %game_id,
                sequence = event.sequence_number,
                event_type = event.event_type_str(),
                actor = %event.actor_id,
                "event committed"
            );
            self.hub
                .publish(game_id, GameUpdate::Event(Arc::new(event.clone())));
        }
        Ok(())
    }

    fn publish_clock(&self, game_id: GameId, projection: &GameProjection, now: DateTime<Utc>) {
        let clock = derive_clock(&projection.session, now);
        self.hub
            .publish(game_id, GameUpdate::Clock(Arc::new(clock)));
    }
}

/// Numbers `payloads` after the head of `projection` and folds them into
/// a copy of it. The original projection is left untouched.
fn stage(
    projection: &GameProjection,
    game_id: GameId,
    payloads: Vec<EventPayload>,
    actor_id: &str,
    now: DateTime<Utc>,
) -> Result<(GameProjection, Vec<TimelineEvent>), GatewayError> {
    let mut staged = projection.clone();
    let mut events = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let event = TimelineEvent::new(
            game_id,
            staged.head_sequence.saturating_add(1),
            payload,
            actor_id.to_string(),
            now,
        );
        staged.apply(&event)?;
        events.push(event);
    }
    debug_assert!(staged.session.invariants_hold());
    Ok((staged, events))
}

fn require_actor(actor_id: &str) -> Result<(), GatewayError> {
    if actor_id.trim().is_empty() {
        return Err(GatewayError::InvalidRequest(
            "actor_id must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_rules(rules: &GameRules, schedule: &BlindSchedule) -> Result<(), GatewayError> {
    if rules.buy_in_amount < 0 || rules.rebuy_amount < 0 {
        return Err(GatewayError::InvalidSchedule(
            "buy-in and rebuy amounts must not be negative".to_string(),
        ));
    }
    for (name, level) in [
        ("rebuy_cutoff_level", rules.rebuy_cutoff_level),
        ("late_registration_level", rules.late_registration_level),
    ] {
        if let Some(level) = level
            && !schedule.contains_index(level)
        {
            return Err(GatewayError::InvalidSchedule(format!(
                "{name} {level} is outside the schedule"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::blind_schedule::tests::level;
    use crate::domain::{ManualTime, ParticipantId, ParticipantStatus, SessionStatus};

    fn levels(count: u32, seconds: u32) -> Vec<BlindLevel> {
        (0..count)
            .map(|i| {
                let sb = u64::from(i + 1) * 10;
                level(i, sb, sb * 2, seconds)
            })
            .collect()
    }

    fn make_service(time: &ManualTime) -> GameService {
        make_service_with(time, EngineSettings::default())
    }

    fn make_service_with(time: &ManualTime, settings: EngineSettings) -> GameService {
        GameService::new(
            Arc::new(GameRegistry::new()),
            Arc::new(BroadcastHub::new(256)),
            Arc::new(time.clone()),
            settings,
        )
    }

    async fn create(service: &GameService, levels: Vec<BlindLevel>, rules: GameRules) -> GameId {
        let Ok(created) = service
            .create_game(
                NewGame {
                    event_id: "evt-1".to_string(),
                    levels,
                    rules,
                },
                "director",
            )
            .await
        else {
            panic!("create failed");
        };
        created.game_id
    }

    async fn run(
        service: &GameService,
        game_id: GameId,
        request_id: &str,
        command: GameCommand,
    ) -> CommandOutcome {
        match service.execute(game_id, request_id, "floor", command).await {
            Ok(outcome) => outcome,
            Err(err) => panic!("{request_id} failed: {err}"),
        }
    }

    async fn register(service: &GameService, game_id: GameId, name: &str) -> ParticipantId {
        let outcome = run(
            service,
            game_id,
            &format!("reg-{name}"),
            GameCommand::RegisterPlayer {
                person_id: format!("person-{name}"),
                display_name: name.to_string(),
            },
        )
        .await;
        let Some(EventPayload::PlayerRegistered { participant_id, .. }) =
            outcome.events.last().map(|e| &e.payload)
        else {
            panic!("registration produced no PLAYER_REGISTERED");
        };
        *participant_id
    }

    async fn snapshot(service: &GameService, game_id: GameId) -> GameSnapshot {
        let Ok(snapshot) = service.snapshot(game_id).await else {
            panic!("snapshot failed");
        };
        snapshot
    }

    #[tokio::test]
    async fn pause_resume_preserves_remaining_time() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);
        let game_id = create(&service, levels(2, 600), GameRules::default()).await;
        register(&service, game_id, "ann").await;
        register(&service, game_id, "bob").await;

        let t0 = time.now();
        run(&service, game_id, "start", GameCommand::Start).await;
        time.advance_secs(300);
        run(&service, game_id, "pause", GameCommand::Pause).await;
        time.advance_secs(1000);
        assert_eq!(snapshot(&service, game_id).await.clock.time_remaining_seconds, 300);
        run(&service, game_id, "resume", GameCommand::Resume).await;

        let resumed = snapshot(&service, game_id).await;
        assert_eq!(resumed.clock.time_remaining_seconds, 300);
        assert_eq!(resumed.session.accumulated_pause_ms, 1_000_000);
        assert!(resumed.clock.is_running);

        time.advance_secs(300);
        let advanced = snapshot(&service, game_id).await;
        assert_eq!(advanced.session.current_level_index, 1);
        assert_eq!(advanced.clock.time_remaining_seconds, 600);
        assert_eq!(advanced.session.accumulated_pause_ms, 0);

        let Ok(backfill) = service.events_after(game_id, advanced.head_sequence - 1).await else {
            panic!("backfill failed");
        };
        let Some(level_up) = backfill.events.first() else {
            panic!("missing level up");
        };
        assert_eq!(level_up.actor_id, SYSTEM_ACTOR);
        assert_eq!(
            level_up.payload,
            EventPayload::BlindLevelUp {
                from_level: 0,
                to_level: 1,
                level_started_at: t0 + Duration::seconds(1600),
                automatic: true,
            }
        );
    }

    #[tokio::test]
    async fn catch_up_chains_across_expired_levels() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);
        let game_id = create(&service, levels(3, 60), GameRules::default()).await;
        register(&service, game_id, "ann").await;
        register(&service, game_id, "bob").await;
        run(&service, game_id, "start", GameCommand::Start).await;

        time.advance_secs(150);
        let s = snapshot(&service, game_id).await;
        assert_eq!(s.session.current_level_index, 2);
        assert_eq!(s.clock.time_remaining_seconds, 30);
        assert_eq!(s.head_sequence, 6);
        assert!(s.clock.next_level.is_none());
    }

    #[tokio::test]
    async fn final_level_holds_at_zero() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);
        let game_id = create(&service, levels(1, 60), GameRules::default()).await;
        register(&service, game_id, "ann").await;
        register(&service, game_id, "bob").await;
        run(&service, game_id, "start", GameCommand::Start).await;

        time.advance_secs(1_000);
        let s = snapshot(&service, game_id).await;
        assert_eq!(s.clock.time_remaining_ms, 0);
        assert_eq!(s.session.status, SessionStatus::Running);
        assert_eq!(s.head_sequence, 4);

        let result = service
            .execute(game_id, "adv", "floor", GameCommand::AdvanceLevel)
            .await;
        assert!(matches!(result, Err(GatewayError::FinalLevelReached(0))));
    }

    #[tokio::test]
    async fn idempotent_retry_returns_same_outcome() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);
        let game_id = create(&service, levels(2, 600), GameRules::default()).await;
        let command = GameCommand::RegisterPlayer {
            person_id: "p-1".to_string(),
            display_name: "Ann".to_string(),
        };

        let first = tokio_test::assert_ok!(
            service
                .execute(game_id, "r1", "floor", command.clone())
                .await
        );
        let second =
            tokio_test::assert_ok!(service.execute(game_id, "r1", "floor", command).await);
        assert_eq!(first, second);
        assert_eq!(snapshot(&service, game_id).await.head_sequence, 2);

        let reused = service
            .execute(game_id, "r1", "floor", GameCommand::Start)
            .await;
        assert!(matches!(reused, Err(GatewayError::IdempotencyKeyReused(_))));
    }

    #[tokio::test]
    async fn rejected_command_can_be_retried_under_same_key() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);
        let game_id = create(&service, levels(2, 600), GameRules::default()).await;
        register(&service, game_id, "ann").await;

        let early = service
            .execute(game_id, "start-1", "floor", GameCommand::Start)
            .await;
        assert!(matches!(
            early,
            Err(GatewayError::NotEnoughPlayers { registered: 1 })
        ));
        assert_eq!(snapshot(&service, game_id).await.head_sequence, 2);

        register(&service, game_id, "bob").await;
        let outcome = run(&service, game_id, "start-1", GameCommand::Start).await;
        assert_eq!(outcome.head_sequence, 4);
    }

    #[tokio::test]
    async fn rebuy_cutoff_applies_after_automatic_advance() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);
        let rules = GameRules {
            rebuy_cutoff_level: Some(0),
            max_rebuys: 3,
            rebuy_amount: 100,
            buy_in_amount: 200,
            ..GameRules::default()
        };
        let game_id = create(&service, levels(2, 60), rules).await;
        let ann = register(&service, game_id, "ann").await;
        register(&service, game_id, "bob").await;
        run(&service, game_id, "start", GameCommand::Start).await;

        run(&service, game_id, "rebuy-1", GameCommand::Rebuy { participant_id: ann }).await;
        time.advance_secs(61);
        let late = service
            .execute(
                game_id,
                "rebuy-2",
                "floor",
                GameCommand::Rebuy { participant_id: ann },
            )
            .await;
        assert!(matches!(
            late,
            Err(GatewayError::RebuyCutoffPassed {
                cutoff_level: 0,
                current_level: 1
            })
        ));

        let Ok(after_rejection) = service.events_after(game_id, 5).await else {
            panic!("backfill failed");
        };
        assert_eq!(after_rejection.head_sequence, 6);
        assert_eq!(after_rejection.events.len(), 1);
        assert!(matches!(
            after_rejection.events.first().map(|e| &e.payload),
            Some(EventPayload::BlindLevelUp {
                to_level: 1,
                automatic: true,
                ..
            })
        ));

        let retried = service
            .execute(
                game_id,
                "rebuy-2",
                "floor",
                GameCommand::Rebuy { participant_id: ann },
            )
            .await;
        assert!(matches!(retried, Err(GatewayError::RebuyCutoffPassed { .. })));

        let s = snapshot(&service, game_id).await;
        assert_eq!(s.head_sequence, 6);
        assert_eq!(s.session.prize_pool, 500);
        assert_eq!(s.session.current_level_index, 1);
        assert_eq!(
            s.participants.iter().find(|p| p.id == ann).map(|p| p.rebuy_count),
            Some(1)
        );
    }

    #[tokio::test]
    async fn eliminations_run_the_game_to_completion() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);
        let game_id = create(&service, levels(2, 600), GameRules::default()).await;
        let ann = register(&service, game_id, "ann").await;
        let bob = register(&service, game_id, "bob").await;
        let cat = register(&service, game_id, "cat").await;
        run(&service, game_id, "start", GameCommand::Start).await;
        time.advance_secs(10);
        run(&service, game_id, "pause", GameCommand::Pause).await;

        run(
            &service,
            game_id,
            "elim-cat",
            GameCommand::Eliminate {
                participant_id: cat,
                eliminated_by: Some(ann),
            },
        )
        .await;
        time.advance_secs(20);
        let last = run(
            &service,
            game_id,
            "elim-bob",
            GameCommand::Eliminate {
                participant_id: bob,
                eliminated_by: Some(ann),
            },
        )
        .await;
        assert_eq!(last.events.len(), 2);

        let s = snapshot(&service, game_id).await;
        assert_eq!(s.session.status, SessionStatus::Completed);
        assert_eq!(s.session.winner_participant_id, Some(ann));
        assert!(s.session.paused_at.is_none());
        assert_eq!(s.session.accumulated_pause_ms, 20_000);
        let positions: Vec<_> = [ann, bob, cat]
            .iter()
            .filter_map(|id| s.participants.iter().find(|p| p.id == *id))
            .map(|p| (p.status, p.finish_position, p.bounties_won))
            .collect();
        assert_eq!(
            positions,
            vec![
                (ParticipantStatus::Winner, Some(1), 2),
                (ParticipantStatus::Eliminated, Some(2), 0),
                (ParticipantStatus::Eliminated, Some(3), 0),
            ]
        );

        let after = service
            .execute(game_id, "resume", "floor", GameCommand::Resume)
            .await;
        assert!(matches!(after, Err(GatewayError::GameCompleted(_))));
    }

    #[tokio::test]
    async fn four_players_finish_in_elimination_order() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);
        let schedule = vec![level(0, 10, 20, 600), level(1, 20, 40, 600)];
        let game_id = create(&service, schedule, GameRules::default()).await;
        let p1 = register(&service, game_id, "p1").await;
        let p2 = register(&service, game_id, "p2").await;
        let p3 = register(&service, game_id, "p3").await;
        let p4 = register(&service, game_id, "p4").await;

        run(&service, game_id, "start", GameCommand::Start).await;
        let started = snapshot(&service, game_id).await;
        assert_eq!(started.session.current_level_index, 0);
        assert!(
            started
                .participants
                .iter()
                .all(|p| p.status == ParticipantStatus::Playing)
        );

        let mut last = None;
        for (secs, out) in [(100, p4), (200, p3), (300, p2)] {
            time.advance_secs(100);
            let outcome = run(
                &service,
                game_id,
                &format!("elim-at-{secs}"),
                GameCommand::Eliminate {
                    participant_id: out,
                    eliminated_by: None,
                },
            )
            .await;
            last = Some(outcome);
        }

        let Some(last) = last else {
            panic!("no eliminations ran");
        };
        let types: Vec<_> = last.events.iter().map(|e| e.event_type_str()).collect();
        assert_eq!(types, vec!["PLAYER_ELIMINATED", "GAME_ENDED"]);

        let s = snapshot(&service, game_id).await;
        assert_eq!(s.session.status, SessionStatus::Completed);
        assert_eq!(s.session.current_level_index, 0);
        assert_eq!(s.session.winner_participant_id, Some(p1));
        let finish: Vec<_> = [p1, p2, p3, p4]
            .iter()
            .filter_map(|id| s.participants.iter().find(|p| p.id == *id))
            .map(|p| (p.status, p.finish_position))
            .collect();
        assert_eq!(
            finish,
            vec![
                (ParticipantStatus::Winner, Some(1)),
                (ParticipantStatus::Eliminated, Some(2)),
                (ParticipantStatus::Eliminated, Some(3)),
                (ParticipantStatus::Eliminated, Some(4)),
            ]
        );
    }

    #[tokio::test]
    async fn restored_game_keeps_command_outcomes() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);
        let rules = GameRules {
            max_rebuys: 3,
            rebuy_amount: 100,
            ..GameRules::default()
        };
        let game_id = create(&service, levels(2, 600), rules).await;

        let mut recorded = Vec::new();
        for name in ["ann", "bob"] {
            let command = GameCommand::RegisterPlayer {
                person_id: format!("person-{name}"),
                display_name: name.to_string(),
            };
            let outcome = run(&service, game_id, &format!("reg-{name}"), command.clone()).await;
            recorded.push((command, outcome));
        }
        let start = run(&service, game_id, "start", GameCommand::Start).await;
        recorded.push((GameCommand::Start, start));
        let Some(ann) = snapshot(&service, game_id)
            .await
            .participants
            .first()
            .map(|p| p.id)
        else {
            panic!("roster empty");
        };
        let rebuy = GameCommand::Rebuy { participant_id: ann };
        let first = run(&service, game_id, "rebuy-1", rebuy.clone()).await;
        assert_eq!(first.head_sequence, 5);
        recorded.push((rebuy.clone(), first.clone()));

        let Ok(stored) = service.events_after(game_id, 0).await else {
            panic!("backfill failed");
        };

        let restarted = make_service(&time);
        let Ok(entry) = restarted.rebuild_entry(stored.events, recorded) else {
            panic!("rebuild failed");
        };
        assert!(restarted.registry().insert(entry).await.is_ok());

        let retry = tokio_test::assert_ok!(
            restarted
                .execute(game_id, "rebuy-1", "floor", rebuy.clone())
                .await
        );
        assert_eq!(retry, first);

        let s = snapshot(&restarted, game_id).await;
        assert_eq!(s.head_sequence, 5);
        assert_eq!(s.session.prize_pool, 100);
        assert_eq!(
            s.participants.iter().find(|p| p.id == ann).map(|p| p.rebuy_count),
            Some(1)
        );

        let reused = restarted
            .execute(game_id, "rebuy-1", "floor", GameCommand::Pause)
            .await;
        assert!(matches!(reused, Err(GatewayError::IdempotencyKeyReused(_))));

        let second = run(&restarted, game_id, "rebuy-2", rebuy).await;
        assert_eq!(second.head_sequence, 6);
    }

    #[tokio::test]
    async fn rebuild_rejects_outcome_ahead_of_log() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);
        let game_id = create(&service, levels(2, 600), GameRules::default()).await;
        let Ok(stored) = service.events_after(game_id, 0).await else {
            panic!("backfill failed");
        };
        let orphan = CommandOutcome {
            game_id,
            request_id: "lost".to_string(),
            events: Vec::new(),
            head_sequence: 9,
        };
        let result = service.rebuild_entry(stored.events, vec![(GameCommand::Pause, orphan)]);
        assert!(matches!(result, Err(GatewayError::Internal(_))));
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_sequence_order() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);
        let game_id = create(&service, levels(2, 600), GameRules::default()).await;

        let Ok(mut attachment) = service.attach(game_id, 1).await else {
            panic!("attach failed");
        };
        assert_eq!(attachment.plan, ResyncPlan::Live);

        register(&service, game_id, "ann").await;
        register(&service, game_id, "bob").await;
        run(&service, game_id, "start", GameCommand::Start).await;

        let mut sequences = Vec::new();
        let mut clock_frames = 0;
        while let Ok(update) = attachment.receiver.try_recv() {
            match update {
                GameUpdate::Event(event) => sequences.push(event.sequence_number),
                GameUpdate::Clock(_) => clock_frames += 1,
            }
        }
        assert_eq!(sequences, vec![2, 3, 4]);
        assert_eq!(clock_frames, 3);
    }

    #[tokio::test]
    async fn attach_plans_follow_client_position() {
        let time = ManualTime::new(Utc::now());
        let settings = EngineSettings {
            event_retention: 4,
            max_backfill_gap: 3,
            ..EngineSettings::default()
        };
        let service = make_service_with(&time, settings);
        let game_id = create(&service, levels(2, 600), GameRules::default()).await;
        for name in ["ann", "bob", "cat", "dan", "eve"] {
            register(&service, game_id, name).await;
        }

        let Ok(fresh) = service.attach(game_id, 0).await else {
            panic!("attach failed");
        };
        assert_eq!(fresh.plan, ResyncPlan::Snapshot);
        assert_eq!(fresh.snapshot.map(|s| s.participants.len()), Some(5));

        let Ok(behind) = service.attach(game_id, 4).await else {
            panic!("attach failed");
        };
        assert_eq!(behind.plan, ResyncPlan::Replay);
        let replayed: Vec<u64> = behind.backfill.iter().map(|e| e.sequence_number).collect();
        assert_eq!(replayed, vec![5, 6]);

        let Ok(far_behind) = service.attach(game_id, 2).await else {
            panic!("attach failed");
        };
        assert_eq!(far_behind.plan, ResyncPlan::Snapshot);
    }

    #[tokio::test]
    async fn backfill_outside_window_is_stream_gap() {
        let time = ManualTime::new(Utc::now());
        let settings = EngineSettings {
            event_retention: 3,
            ..EngineSettings::default()
        };
        let service = make_service_with(&time, settings);
        let game_id = create(&service, levels(2, 600), GameRules::default()).await;
        for name in ["ann", "bob", "cat"] {
            register(&service, game_id, name).await;
        }

        let Ok(ok) = service.events_after(game_id, 1).await else {
            panic!("backfill failed");
        };
        assert_eq!(ok.events.len(), 3);
        assert_eq!(ok.head_sequence, 4);

        let gone = service.events_after(game_id, 0).await;
        assert!(matches!(
            gone,
            Err(GatewayError::RetentionExceeded {
                requested: 0,
                oldest_retained: 2
            })
        ));
    }

    #[tokio::test]
    async fn heartbeat_publishes_clock_and_due_level_ups() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);
        let game_id = create(&service, levels(2, 60), GameRules::default()).await;
        register(&service, game_id, "ann").await;
        register(&service, game_id, "bob").await;
        run(&service, game_id, "start", GameCommand::Start).await;

        let Ok(mut attachment) = service.attach(game_id, 4).await else {
            panic!("attach failed");
        };
        time.advance_secs(60);
        assert!(service.heartbeat(game_id).await.is_ok());

        let Ok(GameUpdate::Event(event)) = attachment.receiver.try_recv() else {
            panic!("expected level up");
        };
        assert_eq!(event.sequence_number, 5);
        let Ok(GameUpdate::Clock(clock)) = attachment.receiver.try_recv() else {
            panic!("expected clock frame");
        };
        assert_eq!(clock.current_level_index, 1);
        assert_eq!(clock.time_remaining_seconds, 60);
    }

    #[tokio::test]
    async fn create_game_validates_input() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);

        let empty = service
            .create_game(
                NewGame {
                    event_id: "evt".to_string(),
                    levels: Vec::new(),
                    rules: GameRules::default(),
                },
                "director",
            )
            .await;
        assert!(matches!(empty, Err(GatewayError::InvalidSchedule(_))));

        let cutoff = service
            .create_game(
                NewGame {
                    event_id: "evt".to_string(),
                    levels: levels(2, 60),
                    rules: GameRules {
                        rebuy_cutoff_level: Some(5),
                        ..GameRules::default()
                    },
                },
                "director",
            )
            .await;
        assert!(matches!(cutoff, Err(GatewayError::InvalidSchedule(_))));
        assert!(service.registry().is_empty().await);
    }

    #[tokio::test]
    async fn unknown_game_is_not_found() {
        let time = ManualTime::new(Utc::now());
        let service = make_service(&time);
        let result = service
            .execute(GameId::new(), "r1", "floor", GameCommand::Start)
            .await;
        assert!(matches!(result, Err(GatewayError::GameNotFound(_))));
        assert!(service.snapshot(GameId::new()).await.is_err());
    }
}
