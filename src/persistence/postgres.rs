//! PostgreSQL implementation of the persistence layer.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{StoredEvent, StoredOutcome};
use crate::domain::{CommandOutcome, GameCommand, TimelineEvent};
use crate::error::GatewayError;

type EventRow = (Uuid, Uuid, i64, String, serde_json::Value, String, DateTime<Utc>);
type OutcomeRow = (Uuid, String, serde_json::Value, serde_json::Value, i64);

/// PostgreSQL-backed event store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), GatewayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))
    }

    /// Appends a batch of events, and the accepted command that produced
    /// them if any, in one transaction.
    ///
    /// Either everything is stored or nothing is. A `(game_id,
    /// sequence_number)` collision aborts the batch. A recorded outcome
    /// replaces an older one under the same request id.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn append_commit(
        &self,
        events: &[TimelineEvent],
        recorded: Option<(&GameCommand, &CommandOutcome)>,
    ) -> Result<(), GatewayError> {
        if events.is_empty() && recorded.is_none() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for event in events {
            let row = StoredEvent::from_event(event)?;
            sqlx::query(
                "INSERT INTO timeline_events \
                 (id, game_id, sequence_number, event_type, payload, actor_id, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(row.id)
            .bind(row.game_id)
            .bind(row.sequence_number)
            .bind(&row.event_type)
            .bind(&row.payload)
            .bind(&row.actor_id)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await?;
        }
        if let Some((command, outcome)) = recorded {
            let row = StoredOutcome::from_outcome(command, outcome)?;
            sqlx::query(
                "INSERT INTO command_outcomes \
                 (game_id, request_id, command, outcome, head_sequence) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (game_id, request_id) DO UPDATE SET \
                 command = EXCLUDED.command, outcome = EXCLUDED.outcome, \
                 head_sequence = EXCLUDED.head_sequence",
            )
            .bind(row.game_id)
            .bind(&row.request_id)
            .bind(&row.command)
            .bind(&row.outcome)
            .bind(row.head_sequence)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Loads every recorded command outcome, ordered by game and by the
    /// head sequence it left behind.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure or
    /// if a row cannot be decoded.
    pub async fn load_all_outcomes(
        &self,
    ) -> Result<Vec<(GameCommand, CommandOutcome)>, GatewayError> {
        let rows = sqlx::query_as::<_, OutcomeRow>(
            "SELECT game_id, request_id, command, outcome, head_sequence \
             FROM command_outcomes ORDER BY game_id, head_sequence ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(game_id, request_id, command, outcome, head_sequence)| {
                StoredOutcome {
                    game_id,
                    request_id,
                    command,
                    outcome,
                    head_sequence,
                }
                .into_parts()
            })
            .collect()
    }

    /// Loads every stored event ordered by game and sequence number.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure or
    /// if a row cannot be decoded.
    pub async fn load_all_events(&self) -> Result<Vec<TimelineEvent>, GatewayError> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT id, game_id, sequence_number, event_type, payload, actor_id, created_at \
             FROM timeline_events ORDER BY game_id, sequence_number ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(id, game_id, sequence_number, event_type, payload, actor_id, created_at)| {
                    TimelineEvent::try_from(StoredEvent {
                        id,
                        game_id,
                        sequence_number,
                        event_type,
                        payload,
                        actor_id,
                        created_at,
                    })
                },
            )
            .collect()
    }

    /// Loads one game's events after `after`, in sequence order.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure or
    /// if a row cannot be decoded.
    pub async fn load_game_events_after(
        &self,
        game_id: Uuid,
        after: u64,
    ) -> Result<Vec<TimelineEvent>, GatewayError> {
        let after = i64::try_from(after).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT id, game_id, sequence_number, event_type, payload, actor_id, created_at \
             FROM timeline_events WHERE game_id = $1 AND sequence_number > $2 \
             ORDER BY sequence_number ASC",
        )
        .bind(game_id)
        .bind(after)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(id, game_id, sequence_number, event_type, payload, actor_id, created_at)| {
                    TimelineEvent::try_from(StoredEvent {
                        id,
                        game_id,
                        sequence_number,
                        event_type,
                        payload,
                        actor_id,
                        created_at,
                    })
                },
            )
            .collect()
    }
}
