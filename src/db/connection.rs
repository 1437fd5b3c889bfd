// src/db/connection.rs
//
// Database connection management
//
// PRINCIPLES:
// - Explicit connection pooling
// - No hidden connection creation
// - Clear error propagation

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::{AppError, AppResult};

/// Type alias for connection pool
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled connection
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Resolve the database file path.
///
/// An explicit path in settings wins; otherwise the file lives in the
/// application data directory: {APP_DATA}/watchhub/watchhub.db
pub fn get_database_path(settings: &Settings) -> AppResult<PathBuf> {
    if let Some(path) = &settings.database.path {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        return Ok(path.clone());
    }

    let app_data_dir = dirs::data_dir()
        .ok_or_else(|| AppError::Config("Could not determine app data directory".to_string()))?;

    let watchhub_dir = app_data_dir.join("watchhub");
    std::fs::create_dir_all(&watchhub_dir)?;

    Ok(watchhub_dir.join("watchhub.db"))
}

/// Create a connection pool from settings
pub fn create_connection_pool(settings: &Settings) -> AppResult<ConnectionPool> {
    let db_path = get_database_path(settings)?;
    create_connection_pool_at(&db_path, settings.database.max_connections)
}

/// Create a connection pool for a database file
///
/// Pool configuration:
/// - SQLite in WAL mode for concurrent readers
/// - Foreign keys enabled
/// - Busy timeout set to avoid immediate lock errors
pub fn create_connection_pool_at(db_path: &Path, max_size: u32) -> AppResult<ConnectionPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = Pool::builder()
        .max_size(max_size.max(1))
        .build(manager)
        .map_err(|e| AppError::Pool(format!("Failed to create connection pool: {}", e)))?;

    log::debug!("Opened database pool at {}", db_path.display());
    Ok(pool)
}

/// Get a connection from the pool
pub fn get_connection(pool: &ConnectionPool) -> AppResult<PooledConn> {
    pool.get()
        .map_err(|e| AppError::Pool(format!("Failed to get database connection: {}", e)))
}
