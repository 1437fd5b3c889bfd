// src/repositories/statistics_repository.rs
//
// Storage for derived per-user aggregates.

use rusqlite::{params, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::ConnectionPool;
use crate::domain::{GroupUserStats, SeriesUserStats};
use crate::error::{AppError, AppResult};
use crate::repositories::mapping::{
    count_column, optional_timestamp_column, timestamp_column, to_text, uuid_column,
};

pub trait StatisticsRepository: Send + Sync {
    fn get_series_stats(&self, user_id: Uuid, series_id: Uuid)
        -> AppResult<Option<SeriesUserStats>>;

    fn save_series_stats(&self, stats: &SeriesUserStats) -> AppResult<()>;

    fn get_group_stats(&self, user_id: Uuid, group_id: Uuid) -> AppResult<Option<GroupUserStats>>;

    fn save_group_stats(&self, stats: &GroupUserStats) -> AppResult<()>;
}

pub struct SqliteStatisticsRepository {
    pool: Arc<ConnectionPool>,
}

impl SqliteStatisticsRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    fn row_to_series_stats(row: &Row) -> rusqlite::Result<SeriesUserStats> {
        Ok(SeriesUserStats {
            user_id: uuid_column(row, 0)?,
            series_id: uuid_column(row, 1)?,
            unwatched_episode_count: count_column(row, 2)?,
            hidden_unwatched_episode_count: count_column(row, 3)?,
            watched_episode_count: count_column(row, 4)?,
            watched_count: count_column(row, 5)?,
            last_watched_at: optional_timestamp_column(row, 6)?,
            last_updated_at: timestamp_column(row, 7)?,
        })
    }

    fn row_to_group_stats(row: &Row) -> rusqlite::Result<GroupUserStats> {
        Ok(GroupUserStats {
            user_id: uuid_column(row, 0)?,
            group_id: uuid_column(row, 1)?,
            unwatched_episode_count: count_column(row, 2)?,
            watched_episode_count: count_column(row, 3)?,
            watched_count: count_column(row, 4)?,
            last_watched_at: optional_timestamp_column(row, 5)?,
            last_updated_at: timestamp_column(row, 6)?,
        })
    }
}

impl StatisticsRepository for SqliteStatisticsRepository {
    fn get_series_stats(
        &self,
        user_id: Uuid,
        series_id: Uuid,
    ) -> AppResult<Option<SeriesUserStats>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, series_id, unwatched_episode_count, hidden_unwatched_episode_count,
                    watched_episode_count, watched_count, last_watched_at, last_updated_at
             FROM series_user_stats WHERE user_id = ?1 AND series_id = ?2",
        )?;

        match stmt.query_row(
            params![user_id.to_string(), series_id.to_string()],
            Self::row_to_series_stats,
        ) {
            Ok(stats) => Ok(Some(stats)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    fn save_series_stats(&self, stats: &SeriesUserStats) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO series_user_stats (
                user_id, series_id, unwatched_episode_count, hidden_unwatched_episode_count,
                watched_episode_count, watched_count, last_watched_at, last_updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                stats.user_id.to_string(),
                stats.series_id.to_string(),
                stats.unwatched_episode_count,
                stats.hidden_unwatched_episode_count,
                stats.watched_episode_count,
                stats.watched_count,
                to_text(stats.last_watched_at),
                stats.last_updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_group_stats(&self, user_id: Uuid, group_id: Uuid) -> AppResult<Option<GroupUserStats>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, group_id, unwatched_episode_count, watched_episode_count,
                    watched_count, last_watched_at, last_updated_at
             FROM group_user_stats WHERE user_id = ?1 AND group_id = ?2",
        )?;

        match stmt.query_row(
            params![user_id.to_string(), group_id.to_string()],
            Self::row_to_group_stats,
        ) {
            Ok(stats) => Ok(Some(stats)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    fn save_group_stats(&self, stats: &GroupUserStats) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO group_user_stats (
                user_id, group_id, unwatched_episode_count, watched_episode_count,
                watched_count, last_watched_at, last_updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                stats.user_id.to_string(),
                stats.group_id.to_string(),
                stats.unwatched_episode_count,
                stats.watched_episode_count,
                stats.watched_count,
                to_text(stats.last_watched_at),
                stats.last_updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
