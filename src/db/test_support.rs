// src/db/test_support.rs
//
// On-disk SQLite databases for tests. In-memory databases are per
// connection, so pooled tests use a temp file instead.

use std::sync::Arc;
use tempfile::TempDir;

use crate::db::{create_connection_pool_at, get_connection, initialize_database, ConnectionPool};

/// Keep the returned `TempDir` alive for as long as the pool is used.
pub fn test_pool() -> (TempDir, Arc<ConnectionPool>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = create_connection_pool_at(&dir.path().join("watchhub-test.db"), 4)
        .expect("connection pool");
    {
        let conn = get_connection(&pool).expect("connection");
        initialize_database(&conn).expect("schema");
    }
    (dir, Arc::new(pool))
}
