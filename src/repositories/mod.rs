// src/repositories/mod.rs
//
// Repository layer
//
// CRITICAL RULES:
// - Repositories are DUMB data mappers
// - NO business logic
// - NO event emission
// - NO cross-repository calls
// - Explicit SQL only

mod mapping;

pub mod cross_reference_repository;
pub mod episode_repository;
pub mod file_repository;
pub mod group_repository;
pub mod series_repository;
pub mod statistics_repository;
pub mod user_data_repository;
pub mod user_repository;
pub mod vote_repository;

pub use cross_reference_repository::{CrossReferenceRepository, SqliteCrossReferenceRepository};
pub use episode_repository::{EpisodeRepository, SqliteEpisodeRepository};
pub use file_repository::{FileRepository, SqliteFileRepository};
pub use group_repository::{GroupRepository, SqliteGroupRepository};
pub use series_repository::{SeriesRepository, SqliteSeriesRepository};
pub use statistics_repository::{SqliteStatisticsRepository, StatisticsRepository};
pub use user_data_repository::{SqliteUserDataRepository, UserDataRepository};
pub use user_repository::{SqliteUserRepository, UserRepository};
pub use vote_repository::{SqliteVoteRepository, VoteRepository};

use std::sync::Arc;

use crate::db::ConnectionPool;

/// The repositories the services read and write, bundled for injection.
#[derive(Clone)]
pub struct RepositorySet {
    pub users: Arc<dyn UserRepository>,
    pub files: Arc<dyn FileRepository>,
    pub episodes: Arc<dyn EpisodeRepository>,
    pub series: Arc<dyn SeriesRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub cross_references: Arc<dyn CrossReferenceRepository>,
    pub user_data: Arc<dyn UserDataRepository>,
    pub statistics: Arc<dyn StatisticsRepository>,
    pub votes: Arc<dyn VoteRepository>,
}

impl RepositorySet {
    /// SQLite-backed repositories sharing one pool
    pub fn sqlite(pool: Arc<ConnectionPool>) -> Self {
        Self {
            users: Arc::new(SqliteUserRepository::new(Arc::clone(&pool))),
            files: Arc::new(SqliteFileRepository::new(Arc::clone(&pool))),
            episodes: Arc::new(SqliteEpisodeRepository::new(Arc::clone(&pool))),
            series: Arc::new(SqliteSeriesRepository::new(Arc::clone(&pool))),
            groups: Arc::new(SqliteGroupRepository::new(Arc::clone(&pool))),
            cross_references: Arc::new(SqliteCrossReferenceRepository::new(Arc::clone(&pool))),
            user_data: Arc::new(SqliteUserDataRepository::new(Arc::clone(&pool))),
            statistics: Arc::new(SqliteStatisticsRepository::new(Arc::clone(&pool))),
            votes: Arc::new(SqliteVoteRepository::new(pool)),
        }
    }
}
