// src/lib.rs
// WatchHub - Watched-state engine for a local-first media library
//
// Architecture:
// - Domain-centric: records, invariants and thresholds live in `domain`
// - Repositories are dumb mappers over SQLite
// - Services own the propagation rules (fan-out, episode aggregation,
//   statistics batching, remote sync scheduling)
// - Event-driven: listeners observe changes, never steer them
// - Remote sync is fire-and-forget through a queued dispatcher

// ============================================================================
// FOUNDATION
// ============================================================================

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod infrastructure;
pub mod repositories;
pub mod services;

// ============================================================================
// APPLICATION LAYER
// ============================================================================

pub mod application;

// ============================================================================
// PUBLIC API - Domain Entities
// ============================================================================

pub use domain::{
    // Library
    CrossReference,
    Episode,
    File,
    Group,
    Series,
    WATCHED_THRESHOLD,
    // Users & per-user state
    EpisodeUserData,
    FileUserData,
    ImportSource,
    RemoteIdentity,
    SaveReason,
    User,
    // Statistics
    GroupUserStats,
    SeriesUserStats,
    // Votes
    SeriesVoteType,
    Vote,
    VoteKind,
    DELETE_VOTE,
};

// ============================================================================
// PUBLIC API - Error Types & Settings
// ============================================================================

pub use config::{Settings, SharedSettings};
pub use error::{AppError, AppResult};

// ============================================================================
// PUBLIC API - Events
// ============================================================================

pub use events::{
    register_import_handlers,
    DomainEvent,
    EpisodeUserDataChanged,
    EpisodeVoted,
    EventBus,
    EventLogEntry,
    FileUserDataChanged,
    SeriesVoted,
    StatisticsScope,
    StatisticsUpdated,
    Subscription,
    WatchStateImported,
};

// ============================================================================
// PUBLIC API - Database & Repositories
// ============================================================================

pub use db::{create_connection_pool, initialize_database, ConnectionPool};
pub use repositories::RepositorySet;

// ============================================================================
// PUBLIC API - Services
// ============================================================================

pub use services::{
    HistoryAction,
    QueuedSyncDispatcher,
    RemoteSyncClient,
    SetEpisodeWatchedRequest,
    SetFileWatchedRequest,
    StatisticsService,
    StatsAggregator,
    SyncDispatcher,
    SyncJob,
    UserDataService,
    VoteService,
};

// ============================================================================
// PUBLIC API - Application Layer
// ============================================================================

pub use application::AppState;
