// src/repositories/group_repository.rs

use rusqlite::{params, Row};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::ConnectionPool;
use crate::domain::Group;
use crate::error::{AppError, AppResult};
use crate::repositories::mapping::{optional_uuid_column, timestamp_column, uuid_column};

pub trait GroupRepository: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> AppResult<Option<Group>>;

    fn list_children(&self, parent_id: Uuid) -> AppResult<Vec<Group>>;

    /// Walk the parent chain up to the group without a parent.
    fn top_level_group(&self, id: Uuid) -> AppResult<Option<Group>>;

    fn save(&self, group: &Group) -> AppResult<()>;
}

pub struct SqliteGroupRepository {
    pool: Arc<ConnectionPool>,
}

const GROUP_COLUMNS: &str = "id, parent_group_id, name, created_at";

impl SqliteGroupRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    fn row_to_group(row: &Row) -> rusqlite::Result<Group> {
        Ok(Group {
            id: uuid_column(row, 0)?,
            parent_group_id: optional_uuid_column(row, 1)?,
            name: row.get(2)?,
            created_at: timestamp_column(row, 3)?,
        })
    }
}

impl GroupRepository for SqliteGroupRepository {
    fn get_by_id(&self, id: Uuid) -> AppResult<Option<Group>> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM groups WHERE id = ?1", GROUP_COLUMNS))?;

        match stmt.query_row(params![id.to_string()], Self::row_to_group) {
            Ok(group) => Ok(Some(group)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    fn list_children(&self, parent_id: Uuid) -> AppResult<Vec<Group>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM groups WHERE parent_group_id = ?1 ORDER BY name",
            GROUP_COLUMNS
        ))?;

        let groups = stmt
            .query_map(params![parent_id.to_string()], Self::row_to_group)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(groups)
    }

    fn top_level_group(&self, id: Uuid) -> AppResult<Option<Group>> {
        let mut seen = HashSet::new();
        let mut current = match self.get_by_id(id)? {
            Some(group) => group,
            None => return Ok(None),
        };

        while let Some(parent_id) = current.parent_group_id {
            if !seen.insert(current.id) {
                return Err(AppError::InternalInconsistency(format!(
                    "Group hierarchy cycle at {}",
                    current.id
                )));
            }
            match self.get_by_id(parent_id)? {
                Some(parent) => current = parent,
                // Dangling parent: treat the last known group as the root
                None => break,
            }
        }

        Ok(Some(current))
    }

    fn save(&self, group: &Group) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO groups (id, parent_group_id, name, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                group.id.to_string(),
                group.parent_group_id.map(|id| id.to_string()),
                group.name,
                group.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
