// src/domain/vote.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DomainError, DomainResult};

/// Vote value that requests deletion of an existing vote
pub const DELETE_VOTE: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeriesVoteType {
    Permanent,
    Temporary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteKind {
    Anime,
    AnimeTemporary,
    Episode,
}

impl VoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteKind::Anime => "anime",
            VoteKind::AnimeTemporary => "anime_temporary",
            VoteKind::Episode => "episode",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "anime" => Some(VoteKind::Anime),
            "anime_temporary" => Some(VoteKind::AnimeTemporary),
            "episode" => Some(VoteKind::Episode),
            _ => None,
        }
    }
}

impl From<SeriesVoteType> for VoteKind {
    fn from(value: SeriesVoteType) -> Self {
        match value {
            SeriesVoteType::Permanent => VoteKind::Anime,
            SeriesVoteType::Temporary => VoteKind::AnimeTemporary,
        }
    }
}

/// A stored vote. `value` is the rating scaled by 100 and floored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub entity_id: i64,
    pub kind: VoteKind,
    pub value: i32,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(entity_id: i64, kind: VoteKind, rating: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id,
            kind,
            value: Self::scale(rating),
            created_at: Utc::now(),
        }
    }

    pub fn scale(rating: f64) -> i32 {
        (rating * 100.0).floor() as i32
    }
}

/// Accepts -1 (delete) or a rating in [0, 10]
pub fn validate_vote_value(value: f64) -> DomainResult<()> {
    if value == DELETE_VOTE || (0.0..=10.0).contains(&value) {
        Ok(())
    } else {
        Err(DomainError::VoteOutOfRange(value))
    }
}
