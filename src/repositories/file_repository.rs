// src/repositories/file_repository.rs

use rusqlite::{params, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::ConnectionPool;
use crate::domain::File;
use crate::error::{AppError, AppResult};
use crate::repositories::mapping::{millis_column, timestamp_column, uuid_column};

pub trait FileRepository: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> AppResult<Option<File>>;

    fn save(&self, file: &File) -> AppResult<()>;
}

pub struct SqliteFileRepository {
    pool: Arc<ConnectionPool>,
}

impl SqliteFileRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    fn row_to_file(row: &Row) -> rusqlite::Result<File> {
        Ok(File {
            id: uuid_column(row, 0)?,
            hash: row.get(1)?,
            duration: millis_column(row, 2)?,
            created_at: timestamp_column(row, 3)?,
        })
    }
}

impl FileRepository for SqliteFileRepository {
    fn get_by_id(&self, id: Uuid) -> AppResult<Option<File>> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT id, hash, duration_ms, created_at FROM files WHERE id = ?1")?;

        match stmt.query_row(params![id.to_string()], Self::row_to_file) {
            Ok(file) => Ok(Some(file)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    fn save(&self, file: &File) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO files (id, hash, duration_ms, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                file.id.to_string(),
                file.hash,
                file.duration.map(|d| d.num_milliseconds()),
                file.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
