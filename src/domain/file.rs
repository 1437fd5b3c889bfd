// src/domain/file.rs
//
// Physical media file. Owned by the library, never mutated by the
// watched-state engine.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    /// Internal immutable identifier
    pub id: Uuid,

    /// Content hash used by the remote "my list" service (optional)
    pub hash: Option<String>,

    /// Media duration, when known
    #[serde(with = "crate::domain::time_ms::option")]
    pub duration: Option<TimeDelta>,

    pub created_at: DateTime<Utc>,
}

impl File {
    pub fn new(duration: Option<TimeDelta>) -> Self {
        Self {
            id: Uuid::new_v4(),
            hash: None,
            duration,
            created_at: Utc::now(),
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Clamp a resume position to `[0, duration]`.
    /// Without a known duration only the lower bound applies.
    pub fn clamp_resume_position(&self, position: TimeDelta) -> TimeDelta {
        if position < TimeDelta::zero() {
            return TimeDelta::zero();
        }
        match self.duration {
            Some(duration) if position > duration => duration,
            _ => position,
        }
    }

    /// Fraction of the file covered by `position`, if the duration is known.
    pub fn progress_ratio(&self, position: TimeDelta) -> Option<f64> {
        let duration = self.duration?;
        if duration <= TimeDelta::zero() {
            return None;
        }
        Some(position.num_milliseconds() as f64 / duration.num_milliseconds() as f64)
    }
}
