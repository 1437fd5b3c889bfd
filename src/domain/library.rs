// src/domain/library.rs
//
// Aggregation roots. Their statistics are derived data and are recomputed,
// never adjusted incrementally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A series of episodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: Uuid,

    /// Owning group (optional for series not yet grouped)
    pub group_id: Option<Uuid>,

    /// Identifier of the anime on the remote metadata service
    pub remote_anime_id: Option<i64>,

    pub name: String,

    /// Whether the remote anime has finished airing
    pub has_ended: bool,

    pub created_at: DateTime<Utc>,
}

impl Series {
    pub fn new(name: impl Into<String>, group_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            remote_anime_id: None,
            name: name.into(),
            has_ended: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_remote_id(mut self, remote_anime_id: i64) -> Self {
        self.remote_anime_id = Some(remote_anime_id);
        self
    }
}

/// A group of series. Groups nest; a group without a parent is top-level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub parent_group_id: Option<Uuid>,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: impl Into<String>, parent_group_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_group_id,
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}
