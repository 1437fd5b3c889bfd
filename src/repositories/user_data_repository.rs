// src/repositories/user_data_repository.rs
//
// User-Data Store
//
// Keyed upserts of per-user file and episode records. Writes to one key are
// atomic; ordering across keys is the caller's business.

use chrono::TimeDelta;
use rusqlite::{params, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::ConnectionPool;
use crate::domain::{EpisodeUserData, FileUserData};
use crate::error::{AppError, AppResult};
use crate::repositories::mapping::{
    count_column, optional_timestamp_column, optional_uuid_column, timestamp_column, to_text,
    uuid_column,
};

pub trait UserDataRepository: Send + Sync {
    fn get_file_user_data(&self, user_id: Uuid, file_id: Uuid) -> AppResult<Option<FileUserData>>;

    fn save_file_user_data(&self, record: &FileUserData) -> AppResult<()>;

    fn list_file_user_data_for_file(&self, file_id: Uuid) -> AppResult<Vec<FileUserData>>;

    fn list_file_user_data_for_user(&self, user_id: Uuid) -> AppResult<Vec<FileUserData>>;

    fn get_episode_user_data(
        &self,
        user_id: Uuid,
        episode_id: Uuid,
    ) -> AppResult<Option<EpisodeUserData>>;

    fn save_episode_user_data(&self, record: &EpisodeUserData) -> AppResult<()>;

    fn list_episode_user_data_for_episode(
        &self,
        episode_id: Uuid,
    ) -> AppResult<Vec<EpisodeUserData>>;
}

pub struct SqliteUserDataRepository {
    pool: Arc<ConnectionPool>,
}

const FILE_RECORD_COLUMNS: &str = "user_id, file_id, watched_at, watched_count, \
     resume_position_ms, last_played_at, last_updated_at";

const EPISODE_RECORD_COLUMNS: &str =
    "user_id, episode_id, series_id, watched_at, watched_count, last_updated_at";

impl SqliteUserDataRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    fn row_to_file_record(row: &Row) -> rusqlite::Result<FileUserData> {
        let resume_ms: i64 = row.get(4)?;
        Ok(FileUserData {
            user_id: uuid_column(row, 0)?,
            file_id: uuid_column(row, 1)?,
            watched_at: optional_timestamp_column(row, 2)?,
            watched_count: count_column(row, 3)?,
            resume_position: TimeDelta::milliseconds(resume_ms),
            last_played_at: optional_timestamp_column(row, 5)?,
            last_updated_at: timestamp_column(row, 6)?,
        })
    }

    fn row_to_episode_record(row: &Row) -> rusqlite::Result<EpisodeUserData> {
        Ok(EpisodeUserData {
            user_id: uuid_column(row, 0)?,
            episode_id: uuid_column(row, 1)?,
            series_id: optional_uuid_column(row, 2)?,
            watched_at: optional_timestamp_column(row, 3)?,
            watched_count: count_column(row, 4)?,
            last_updated_at: timestamp_column(row, 5)?,
        })
    }

    fn list_file_records(&self, column: &str, id: Uuid) -> AppResult<Vec<FileUserData>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM file_user_data WHERE {} = ?1 ORDER BY user_id, file_id",
            FILE_RECORD_COLUMNS, column
        ))?;

        let records = stmt
            .query_map(params![id.to_string()], Self::row_to_file_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

impl UserDataRepository for SqliteUserDataRepository {
    fn get_file_user_data(&self, user_id: Uuid, file_id: Uuid) -> AppResult<Option<FileUserData>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM file_user_data WHERE user_id = ?1 AND file_id = ?2",
            FILE_RECORD_COLUMNS
        ))?;

        match stmt.query_row(
            params![user_id.to_string(), file_id.to_string()],
            Self::row_to_file_record,
        ) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    fn save_file_user_data(&self, record: &FileUserData) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO file_user_data (
                user_id, file_id, watched_at, watched_count,
                resume_position_ms, last_played_at, last_updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.user_id.to_string(),
                record.file_id.to_string(),
                to_text(record.watched_at),
                record.watched_count,
                record.resume_position.num_milliseconds(),
                to_text(record.last_played_at),
                record.last_updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list_file_user_data_for_file(&self, file_id: Uuid) -> AppResult<Vec<FileUserData>> {
        self.list_file_records("file_id", file_id)
    }

    fn list_file_user_data_for_user(&self, user_id: Uuid) -> AppResult<Vec<FileUserData>> {
        self.list_file_records("user_id", user_id)
    }

    fn get_episode_user_data(
        &self,
        user_id: Uuid,
        episode_id: Uuid,
    ) -> AppResult<Option<EpisodeUserData>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM episode_user_data WHERE user_id = ?1 AND episode_id = ?2",
            EPISODE_RECORD_COLUMNS
        ))?;

        match stmt.query_row(
            params![user_id.to_string(), episode_id.to_string()],
            Self::row_to_episode_record,
        ) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    fn save_episode_user_data(&self, record: &EpisodeUserData) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO episode_user_data (
                user_id, episode_id, series_id, watched_at, watched_count, last_updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.user_id.to_string(),
                record.episode_id.to_string(),
                record.series_id.map(|id| id.to_string()),
                to_text(record.watched_at),
                record.watched_count,
                record.last_updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list_episode_user_data_for_episode(
        &self,
        episode_id: Uuid,
    ) -> AppResult<Vec<EpisodeUserData>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM episode_user_data WHERE episode_id = ?1 ORDER BY user_id",
            EPISODE_RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![episode_id.to_string()], Self::row_to_episode_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}
