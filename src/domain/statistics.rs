// src/domain/statistics.rs
//
// Derived per-user aggregates. Never edited by hand, only recomputed from
// episode and file records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesUserStats {
    pub user_id: Uuid,
    pub series_id: Uuid,
    pub unwatched_episode_count: u32,
    pub hidden_unwatched_episode_count: u32,
    pub watched_episode_count: u32,
    pub watched_count: u32,
    pub last_watched_at: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
}

impl SeriesUserStats {
    pub fn empty(user_id: Uuid, series_id: Uuid) -> Self {
        Self {
            user_id,
            series_id,
            unwatched_episode_count: 0,
            hidden_unwatched_episode_count: 0,
            watched_episode_count: 0,
            watched_count: 0,
            last_watched_at: None,
            last_updated_at: Utc::now(),
        }
    }

    /// True when every counter matches, ignoring bookkeeping timestamps.
    pub fn same_counters(&self, other: &SeriesUserStats) -> bool {
        self.unwatched_episode_count == other.unwatched_episode_count
            && self.hidden_unwatched_episode_count == other.hidden_unwatched_episode_count
            && self.watched_episode_count == other.watched_episode_count
            && self.watched_count == other.watched_count
            && self.last_watched_at == other.last_watched_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupUserStats {
    pub user_id: Uuid,
    pub group_id: Uuid,
    pub unwatched_episode_count: u32,
    pub watched_episode_count: u32,
    pub watched_count: u32,
    pub last_watched_at: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
}

impl GroupUserStats {
    pub fn empty(user_id: Uuid, group_id: Uuid) -> Self {
        Self {
            user_id,
            group_id,
            unwatched_episode_count: 0,
            watched_episode_count: 0,
            watched_count: 0,
            last_watched_at: None,
            last_updated_at: Utc::now(),
        }
    }

    /// Fold one series into the group totals.
    pub fn accumulate(&mut self, series: &SeriesUserStats) {
        self.add(
            series.unwatched_episode_count,
            series.watched_episode_count,
            series.watched_count,
            series.last_watched_at,
        );
    }

    /// Fold a child group's totals into this group.
    pub fn accumulate_group(&mut self, child: &GroupUserStats) {
        self.add(
            child.unwatched_episode_count,
            child.watched_episode_count,
            child.watched_count,
            child.last_watched_at,
        );
    }

    fn add(
        &mut self,
        unwatched_episode_count: u32,
        watched_episode_count: u32,
        watched_count: u32,
        last_watched_at: Option<DateTime<Utc>>,
    ) {
        self.unwatched_episode_count += unwatched_episode_count;
        self.watched_episode_count += watched_episode_count;
        self.watched_count += watched_count;
        self.last_watched_at = match (self.last_watched_at, last_watched_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}
