//! Domain layer: game model, event log, clock, and fan-out.
//!
//! Everything under this module is transport-agnostic. Session and
//! participant state only ever change by folding committed
//! [`TimelineEvent`]s into a [`GameProjection`].

pub mod blind_schedule;
pub mod broadcast_hub;
pub mod clock;
pub mod command;
pub mod event_log;
pub mod game_entry;
pub mod game_registry;
pub mod idempotency;
pub mod ids;
pub mod participant;
pub mod projection;
pub mod reconcile;
pub mod session;
pub mod timeline_event;

pub use blind_schedule::{BlindLevel, BlindSchedule};
pub use broadcast_hub::{BroadcastHub, GameUpdate};
pub use clock::{ClockState, ManualTime, SystemTime, TimeSource};
pub use command::GameCommand;
pub use event_log::EventLog;
pub use game_entry::{CommandOutcome, GameEntry, GameSnapshot, GameSummary};
pub use game_registry::GameRegistry;
pub use idempotency::IdempotencyCache;
pub use ids::{GameId, ParticipantId};
pub use participant::{Participant, ParticipantStatus};
pub use projection::GameProjection;
pub use reconcile::{ResyncPlan, SequenceCursor};
pub use session::{GameRules, GameSession, SessionStatus};
pub use timeline_event::{EventPayload, SYSTEM_ACTOR, TimelineEvent};
