// src/repositories/vote_repository.rs

use rusqlite::{params, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::ConnectionPool;
use crate::domain::{Vote, VoteKind};
use crate::error::{AppError, AppResult};
use crate::repositories::mapping::{timestamp_column, uuid_column};

pub trait VoteRepository: Send + Sync {
    fn get_by_entity_and_kind(&self, entity_id: i64, kind: VoteKind) -> AppResult<Option<Vote>>;

    /// Insert or replace the vote for (entity, kind)
    fn save(&self, vote: &Vote) -> AppResult<()>;

    fn delete(&self, id: Uuid) -> AppResult<()>;
}

pub struct SqliteVoteRepository {
    pool: Arc<ConnectionPool>,
}

impl SqliteVoteRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    fn row_to_vote(row: &Row) -> rusqlite::Result<Vote> {
        let kind_str: String = row.get(2)?;
        let kind = VoteKind::parse(&kind_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Invalid vote kind '{}'", kind_str),
                )),
            )
        })?;

        Ok(Vote {
            id: uuid_column(row, 0)?,
            entity_id: row.get(1)?,
            kind,
            value: row.get(3)?,
            created_at: timestamp_column(row, 4)?,
        })
    }
}

impl VoteRepository for SqliteVoteRepository {
    fn get_by_entity_and_kind(&self, entity_id: i64, kind: VoteKind) -> AppResult<Option<Vote>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, entity_id, kind, value, created_at FROM votes
             WHERE entity_id = ?1 AND kind = ?2",
        )?;

        match stmt.query_row(params![entity_id, kind.as_str()], Self::row_to_vote) {
            Ok(vote) => Ok(Some(vote)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    fn save(&self, vote: &Vote) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO votes (id, entity_id, kind, value, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                vote.id.to_string(),
                vote.entity_id,
                vote.kind.as_str(),
                vote.value,
                vote.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: Uuid) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM votes WHERE id = ?1", params![id.to_string()])?;
        Ok(())
    }
}
