// src/events/types.rs
//
// All domain events in the system.
// Each event represents an immutable fact that has already occurred.
//
// CRITICAL RULES:
// - Events are facts, not commands
// - Events are immutable
// - Events carry only the data needed to react
// - No business logic in event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    EpisodeUserData, FileUserData, ImportSource, SaveReason, SeriesVoteType,
};

/// Trait that all domain events must implement
pub trait DomainEvent: std::fmt::Debug + Clone {
    /// Unique identifier for this event instance
    fn event_id(&self) -> Uuid;

    /// When this event occurred
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Human-readable event type name
    fn event_type(&self) -> &'static str;
}

macro_rules! domain_event {
    ($name:ident) => {
        impl DomainEvent for $name {
            fn event_id(&self) -> Uuid {
                self.event_id
            }
            fn occurred_at(&self) -> DateTime<Utc> {
                self.occurred_at
            }
            fn event_type(&self) -> &'static str {
                stringify!($name)
            }
        }
    };
}

// ============================================================================
// WATCHED STATE EVENTS
// ============================================================================

/// Emitted once per fan-out user after a file record is written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUserDataChanged {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub reason: SaveReason,
    pub user_id: Uuid,
    pub file_id: Uuid,
    pub record: FileUserData,
}

impl FileUserDataChanged {
    pub fn new(reason: SaveReason, record: FileUserData) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            reason,
            user_id: record.user_id,
            file_id: record.file_id,
            record,
        }
    }
}

domain_event!(FileUserDataChanged);

/// Emitted when an episode's aggregate watched state flips for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeUserDataChanged {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub episode_id: Uuid,
    pub record: EpisodeUserData,
}

impl EpisodeUserDataChanged {
    pub fn new(record: EpisodeUserData) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            user_id: record.user_id,
            episode_id: record.episode_id,
            record,
        }
    }
}

domain_event!(EpisodeUserDataChanged);

/// Raised by remote import jobs. Routed into the engine with an import
/// reason so the change is not echoed back to its source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchStateImported {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub source: ImportSource,
    pub user_id: Uuid,
    pub file_id: Uuid,
    pub watched: bool,
    pub watched_at: Option<DateTime<Utc>>,
}

impl WatchStateImported {
    pub fn new(
        source: ImportSource,
        user_id: Uuid,
        file_id: Uuid,
        watched: bool,
        watched_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            source,
            user_id,
            file_id,
            watched,
            watched_at,
        }
    }
}

domain_event!(WatchStateImported);

// ============================================================================
// VOTE EVENTS
// ============================================================================

/// `value` is the decimal rating; 0 when a vote was deleted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesVoted {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub series_id: Uuid,
    pub remote_anime_id: i64,
    pub user_id: Uuid,
    pub value: f64,
    pub vote_type: SeriesVoteType,
}

impl SeriesVoted {
    pub fn new(
        series_id: Uuid,
        remote_anime_id: i64,
        user_id: Uuid,
        value: f64,
        vote_type: SeriesVoteType,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            series_id,
            remote_anime_id,
            user_id,
            value,
            vote_type,
        }
    }
}

domain_event!(SeriesVoted);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeVoted {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub episode_id: Uuid,
    pub remote_episode_id: i64,
    pub user_id: Uuid,
    pub value: f64,
}

impl EpisodeVoted {
    pub fn new(episode_id: Uuid, remote_episode_id: i64, user_id: Uuid, value: f64) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            episode_id,
            remote_episode_id,
            user_id,
            value,
        }
    }
}

domain_event!(EpisodeVoted);

// ============================================================================
// STATISTICS EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatisticsScope {
    Series(Uuid),
    Group(Uuid),
}

/// Emitted when a stored aggregate row actually changed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsUpdated {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub scope: StatisticsScope,
}

impl StatisticsUpdated {
    pub fn new(user_id: Uuid, scope: StatisticsScope) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            user_id,
            scope,
        }
    }
}

domain_event!(StatisticsUpdated);
