// src/domain/cross_reference.rs
//
// Association between a physical file and a logical episode it satisfies,
// weighted by the share of the episode the file covers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate percentage an episode must exceed to count as watched.
/// Marking unwatched requires the aggregate to fall strictly below it.
pub const WATCHED_THRESHOLD: i32 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    pub file_id: Uuid,
    pub episode_id: Uuid,
    /// Share of the episode covered by the file; 0 or negative means 100.
    pub percentage: i32,
}

impl CrossReference {
    pub fn new(file_id: Uuid, episode_id: Uuid, percentage: i32) -> Self {
        Self {
            file_id,
            episode_id,
            percentage,
        }
    }

    pub fn full(file_id: Uuid, episode_id: Uuid) -> Self {
        Self::new(file_id, episode_id, 100)
    }

    pub fn effective_percentage(&self) -> i32 {
        effective_percentage(self.percentage)
    }
}

/// Normalize a stored percentage: zero or negative covers the whole episode.
pub fn effective_percentage(percentage: i32) -> i32 {
    if percentage <= 0 {
        100
    } else {
        percentage
    }
}
