// src/services/mod.rs
//
// Services Module - Orchestration Layer

pub mod statistics_service;
pub mod sync_dispatcher;
pub mod user_data_service;
pub mod vote_service;

#[cfg(test)]
mod test_fixtures;
#[cfg(test)]
mod user_data_service_tests;

// Re-export all services and their types
pub use statistics_service::{StatisticsService, StatsAggregator};

pub use sync_dispatcher::{
    HistoryAction,
    QueuedSyncDispatcher,
    RemoteSyncClient,
    SyncDispatcher,
    SyncJob,
};

pub use user_data_service::{
    SetEpisodeWatchedRequest,
    SetFileWatchedRequest,
    UserDataService,
};

pub use vote_service::VoteService;
