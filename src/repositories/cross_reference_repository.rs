// src/repositories/cross_reference_repository.rs
//
// Cross-Reference Resolver
//
// Maps files to the episodes they satisfy and back. Episodes named by a
// cross-reference may not exist locally; callers filter those out.

use rusqlite::{params, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::ConnectionPool;
use crate::domain::CrossReference;
use crate::error::AppResult;
use crate::repositories::mapping::uuid_column;

pub trait CrossReferenceRepository: Send + Sync {
    fn episodes_for_file(&self, file_id: Uuid) -> AppResult<Vec<CrossReference>>;

    fn files_for_episode(&self, episode_id: Uuid) -> AppResult<Vec<CrossReference>>;

    fn save(&self, xref: &CrossReference) -> AppResult<()>;

    fn remove(&self, file_id: Uuid, episode_id: Uuid) -> AppResult<()>;
}

pub struct SqliteCrossReferenceRepository {
    pool: Arc<ConnectionPool>,
}

impl SqliteCrossReferenceRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    fn row_to_xref(row: &Row) -> rusqlite::Result<CrossReference> {
        Ok(CrossReference {
            file_id: uuid_column(row, 0)?,
            episode_id: uuid_column(row, 1)?,
            percentage: row.get(2)?,
        })
    }

    fn list_by(&self, column: &str, id: Uuid) -> AppResult<Vec<CrossReference>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT file_id, episode_id, percentage FROM cross_references
             WHERE {} = ?1 ORDER BY file_id, episode_id",
            column
        ))?;

        let xrefs = stmt
            .query_map(params![id.to_string()], Self::row_to_xref)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(xrefs)
    }
}

impl CrossReferenceRepository for SqliteCrossReferenceRepository {
    fn episodes_for_file(&self, file_id: Uuid) -> AppResult<Vec<CrossReference>> {
        self.list_by("file_id", file_id)
    }

    fn files_for_episode(&self, episode_id: Uuid) -> AppResult<Vec<CrossReference>> {
        self.list_by("episode_id", episode_id)
    }

    fn save(&self, xref: &CrossReference) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO cross_references (file_id, episode_id, percentage)
             VALUES (?1, ?2, ?3)",
            params![
                xref.file_id.to_string(),
                xref.episode_id.to_string(),
                xref.percentage,
            ],
        )?;
        Ok(())
    }

    fn remove(&self, file_id: Uuid, episode_id: Uuid) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "DELETE FROM cross_references WHERE file_id = ?1 AND episode_id = ?2",
            params![file_id.to_string(), episode_id.to_string()],
        )?;
        Ok(())
    }
}
