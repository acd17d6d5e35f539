//! Database connection and schema management.

use rusqlite::Connection;
use std::path::Path;
use tracing::info;

use crate::storage::error::StorageResult;

/// Database connection wrapper.
///
/// Manages SQLite connection and schema initialization.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a new database connection at the specified path.
    ///
    /// # Errors
    /// * `StorageError::Connection` - If the database connection fails
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Opens an in-memory database for testing.
    ///
    /// # Errors
    /// * `StorageError::Connection` - If the database connection fails
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Gets a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Gets a mutable reference to the underlying connection.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn init_schema(&self) -> StorageResult<()> {
        info!("Initializing database schema");

        self.conn.execute(
            r"
            CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                theme TEXT NOT NULL,
                original_topic TEXT NOT NULL,
                model_id TEXT NOT NULL,
                file_path TEXT NOT NULL UNIQUE,
                saved_at TEXT NOT NULL
            )
            ",
            [],
        )?;

        self.conn.execute("CREATE INDEX IF NOT EXISTS idx_reports_theme ON reports(theme)", [])?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let mut stmt =
            db.conn().prepare("SELECT name FROM sqlite_master WHERE type='table'").unwrap();
        let tables: Vec<String> =
            stmt.query_map([], |row| row.get(0)).unwrap().map(|r| r.unwrap()).collect();

        assert!(tables.contains(&"reports".to_string()));
    }

    #[test]
    fn test_database_open_file_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reports.db");

        drop(Database::open(&path).unwrap());
        assert!(path.exists());

        let db = Database::open(&path).unwrap();
        let count: i64 =
            db.conn().query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
    }
}
