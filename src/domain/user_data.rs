// src/domain/user_data.rs
//
// Per-user watched state for files and episodes.
//
// INVARIANTS:
// - A record is "watched" iff `watched_at` is set
// - `watched_count` never goes below zero
// - `resume_position` stays inside [0, file duration]

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DomainError, DomainResult, File};

/// Origin of an import that produced a watched change
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportSource {
    /// Remote "my list" service shared by remote-account users
    AniDb,
    /// Remote episode-history tracker
    Trakt,
    Other(String),
}

/// Why a watched change was saved.
///
/// Imports are never echoed back to the service they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveReason {
    #[default]
    None,
    UserInteraction,
    PlaybackStart,
    PlaybackPause,
    PlaybackResume,
    PlaybackProgress,
    PlaybackEnd,
    Import(ImportSource),
}

impl SaveReason {
    pub fn is_import_from(&self, source: &ImportSource) -> bool {
        matches!(self, SaveReason::Import(s) if s == source)
    }

    pub fn is_import(&self) -> bool {
        matches!(self, SaveReason::Import(_))
    }
}

/// Per-user state of a physical file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUserData {
    pub user_id: Uuid,
    pub file_id: Uuid,
    pub watched_at: Option<DateTime<Utc>>,
    pub watched_count: u32,
    #[serde(with = "crate::domain::time_ms")]
    pub resume_position: TimeDelta,
    pub last_played_at: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
}

impl FileUserData {
    pub fn new(user_id: Uuid, file_id: Uuid) -> Self {
        Self {
            user_id,
            file_id,
            watched_at: None,
            watched_count: 0,
            resume_position: TimeDelta::zero(),
            last_played_at: None,
            last_updated_at: Utc::now(),
        }
    }

    pub fn is_watched(&self) -> bool {
        self.watched_at.is_some()
    }

    /// Set `watched_at`; the count only moves when the timestamp changes.
    /// Returns true if anything changed.
    pub fn mark_watched(&mut self, at: DateTime<Utc>) -> bool {
        if self.watched_at == Some(at) {
            return false;
        }
        self.watched_at = Some(at);
        self.watched_count = self.watched_count.saturating_add(1);
        true
    }

    /// Clear `watched_at`, keeping the historical count.
    pub fn mark_unwatched(&mut self) -> bool {
        self.watched_at.take().is_some()
    }

    /// Replace the count with an explicit value, clamping negatives to zero.
    pub fn set_watched_count(&mut self, count: i32) {
        self.watched_count = count.max(0) as u32;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated_at = now;
    }
}

/// Per-user state of a logical episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeUserData {
    pub user_id: Uuid,
    pub episode_id: Uuid,
    pub series_id: Option<Uuid>,
    pub watched_at: Option<DateTime<Utc>>,
    pub watched_count: u32,
    pub last_updated_at: DateTime<Utc>,
}

impl EpisodeUserData {
    pub fn new(user_id: Uuid, episode_id: Uuid, series_id: Option<Uuid>) -> Self {
        Self {
            user_id,
            episode_id,
            series_id,
            watched_at: None,
            watched_count: 0,
            last_updated_at: Utc::now(),
        }
    }

    pub fn is_watched(&self) -> bool {
        self.watched_at.is_some()
    }

    /// Apply a watched state. Returns true if the stored state changed.
    pub fn apply(&mut self, watched: bool, at: DateTime<Utc>) -> bool {
        if watched {
            if self.watched_at == Some(at) {
                return false;
            }
            self.watched_at = Some(at);
            self.watched_count = self.watched_count.saturating_add(1);
            true
        } else {
            self.watched_at.take().is_some()
        }
    }
}

/// Validates a file record against the file it belongs to
pub fn validate_file_user_data(record: &FileUserData, file: &File) -> DomainResult<()> {
    if record.file_id != file.id {
        return Err(DomainError::InvariantViolation(format!(
            "Record for file {} validated against file {}",
            record.file_id, file.id
        )));
    }

    if record.resume_position < TimeDelta::zero() {
        return Err(DomainError::InvariantViolation(
            "Resume position cannot be negative".to_string(),
        ));
    }

    if let Some(duration) = file.duration {
        if record.resume_position > duration {
            return Err(DomainError::ResumeExceedsDuration {
                position_ms: record.resume_position.num_milliseconds(),
                duration_ms: duration.num_milliseconds(),
            });
        }
    }

    Ok(())
}
