// src/domain/episode.rs
//
// Logical episode. An episode may be orphaned (series not known locally),
// in which case propagation stops at the episode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Stable identifier
    pub id: Uuid,

    /// Parent series, if known locally
    pub series_id: Option<Uuid>,

    /// Identifier of the episode on the remote metadata service
    pub remote_episode_id: Option<i64>,

    /// Hidden episodes are counted separately in series statistics
    pub is_hidden: bool,

    pub created_at: DateTime<Utc>,
}

impl Episode {
    pub fn new(series_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            series_id,
            remote_episode_id: None,
            is_hidden: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_remote_id(mut self, remote_episode_id: i64) -> Self {
        self.remote_episode_id = Some(remote_episode_id);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }
}
