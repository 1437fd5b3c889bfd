// src/repositories/episode_repository.rs

use rusqlite::{params, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::ConnectionPool;
use crate::domain::Episode;
use crate::error::{AppError, AppResult};
use crate::repositories::mapping::{optional_uuid_column, timestamp_column, uuid_column};

pub trait EpisodeRepository: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> AppResult<Option<Episode>>;

    fn list_by_series(&self, series_id: Uuid) -> AppResult<Vec<Episode>>;

    fn save(&self, episode: &Episode) -> AppResult<()>;
}

pub struct SqliteEpisodeRepository {
    pool: Arc<ConnectionPool>,
}

const EPISODE_COLUMNS: &str = "id, series_id, remote_episode_id, is_hidden, created_at";

impl SqliteEpisodeRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    fn row_to_episode(row: &Row) -> rusqlite::Result<Episode> {
        Ok(Episode {
            id: uuid_column(row, 0)?,
            series_id: optional_uuid_column(row, 1)?,
            remote_episode_id: row.get(2)?,
            is_hidden: row.get(3)?,
            created_at: timestamp_column(row, 4)?,
        })
    }
}

impl EpisodeRepository for SqliteEpisodeRepository {
    fn get_by_id(&self, id: Uuid) -> AppResult<Option<Episode>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM episodes WHERE id = ?1",
            EPISODE_COLUMNS
        ))?;

        match stmt.query_row(params![id.to_string()], Self::row_to_episode) {
            Ok(episode) => Ok(Some(episode)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    fn list_by_series(&self, series_id: Uuid) -> AppResult<Vec<Episode>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM episodes WHERE series_id = ?1 ORDER BY created_at, id",
            EPISODE_COLUMNS
        ))?;

        let episodes = stmt
            .query_map(params![series_id.to_string()], Self::row_to_episode)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(episodes)
    }

    fn save(&self, episode: &Episode) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO episodes (id, series_id, remote_episode_id, is_hidden, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                episode.id.to_string(),
                episode.series_id.map(|id| id.to_string()),
                episode.remote_episode_id,
                episode.is_hidden,
                episode.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
