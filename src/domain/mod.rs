// src/domain/mod.rs
//
// Domain Root - The Single Source of Truth for Domain API
//
// All other modules import from `crate::domain::*`

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod cross_reference;
pub mod episode;
pub mod file;
pub mod library;
pub mod statistics;
pub mod time_ms;
pub mod user;
pub mod user_data;
pub mod vote;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Library hierarchy
pub use episode::Episode;
pub use file::File;
pub use library::{Group, Series};

// File <-> Episode association
pub use cross_reference::{effective_percentage, CrossReference, WATCHED_THRESHOLD};

// Users
pub use user::{RemoteIdentity, User};

// Per-user state
pub use user_data::{
    validate_file_user_data, EpisodeUserData, FileUserData, ImportSource, SaveReason,
};

// Statistics (Derived Data)
pub use statistics::{GroupUserStats, SeriesUserStats};

// Votes
pub use vote::{validate_vote_value, SeriesVoteType, Vote, VoteKind, DELETE_VOTE};

// ============================================================================
// DOMAIN ERROR TYPES
// ============================================================================

use thiserror::Error;

/// Domain-level errors
/// These represent violations of business rules and invariants
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Resume position {position_ms}ms exceeds duration {duration_ms}ms")]
    ResumeExceedsDuration { position_ms: i64, duration_ms: i64 },

    #[error("Vote value {0} must be between 0 and 10, or -1 to delete")]
    VoteOutOfRange(f64),
}

/// Domain result type
pub type DomainResult<T> = Result<T, DomainError>;
