// src/repositories/series_repository.rs

use rusqlite::{params, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::ConnectionPool;
use crate::domain::Series;
use crate::error::{AppError, AppResult};
use crate::repositories::mapping::{optional_uuid_column, timestamp_column, uuid_column};

pub trait SeriesRepository: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> AppResult<Option<Series>>;

    fn list_by_group(&self, group_id: Uuid) -> AppResult<Vec<Series>>;

    fn save(&self, series: &Series) -> AppResult<()>;
}

pub struct SqliteSeriesRepository {
    pool: Arc<ConnectionPool>,
}

const SERIES_COLUMNS: &str = "id, group_id, remote_anime_id, name, has_ended, created_at";

impl SqliteSeriesRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    fn row_to_series(row: &Row) -> rusqlite::Result<Series> {
        Ok(Series {
            id: uuid_column(row, 0)?,
            group_id: optional_uuid_column(row, 1)?,
            remote_anime_id: row.get(2)?,
            name: row.get(3)?,
            has_ended: row.get(4)?,
            created_at: timestamp_column(row, 5)?,
        })
    }
}

impl SeriesRepository for SqliteSeriesRepository {
    fn get_by_id(&self, id: Uuid) -> AppResult<Option<Series>> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM series WHERE id = ?1", SERIES_COLUMNS))?;

        match stmt.query_row(params![id.to_string()], Self::row_to_series) {
            Ok(series) => Ok(Some(series)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    fn list_by_group(&self, group_id: Uuid) -> AppResult<Vec<Series>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM series WHERE group_id = ?1 ORDER BY name",
            SERIES_COLUMNS
        ))?;

        let series = stmt
            .query_map(params![group_id.to_string()], Self::row_to_series)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(series)
    }

    fn save(&self, series: &Series) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO series (id, group_id, remote_anime_id, name, has_ended, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                series.id.to_string(),
                series.group_id.map(|id| id.to_string()),
                series.remote_anime_id,
                series.name,
                series.has_ended,
                series.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
