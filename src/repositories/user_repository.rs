// src/repositories/user_repository.rs
//
// User Directory
//
// Read access to local users, including the set of users that share the
// remote "my list" account.

use rusqlite::{params, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::ConnectionPool;
use crate::domain::User;
use crate::error::{AppError, AppResult};
use crate::repositories::mapping::{timestamp_column, uuid_column};

pub trait UserRepository: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    fn list_all(&self) -> AppResult<Vec<User>>;

    /// Users whose remote shared-account flag is set
    fn list_remote_shared_users(&self) -> AppResult<Vec<User>>;

    /// Oldest admin user, used when an operation has no explicit user
    fn first_admin(&self) -> AppResult<Option<User>>;

    fn save(&self, user: &User) -> AppResult<()>;
}

pub struct SqliteUserRepository {
    pool: Arc<ConnectionPool>,
}

const USER_COLUMNS: &str = "id, name, is_admin, remote_shared_account, created_at";

impl SqliteUserRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &Row) -> rusqlite::Result<User> {
        Ok(User {
            id: uuid_column(row, 0)?,
            name: row.get(1)?,
            is_admin: row.get(2)?,
            remote_shared_account: row.get(3)?,
            created_at: timestamp_column(row, 4)?,
        })
    }

    fn list_where(&self, clause: &str) -> AppResult<Vec<User>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users {} ORDER BY created_at, id",
            USER_COLUMNS, clause
        ))?;

        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }
}

impl UserRepository for SqliteUserRepository {
    fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))?;

        match stmt.query_row(params![id.to_string()], Self::row_to_user) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    fn list_all(&self) -> AppResult<Vec<User>> {
        self.list_where("")
    }

    fn list_remote_shared_users(&self) -> AppResult<Vec<User>> {
        self.list_where("WHERE remote_shared_account = 1")
    }

    fn first_admin(&self) -> AppResult<Option<User>> {
        Ok(self.list_where("WHERE is_admin = 1")?.into_iter().next())
    }

    fn save(&self, user: &User) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO users (id, name, is_admin, remote_shared_account, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.name,
                user.is_admin,
                user.remote_shared_account,
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
