//! SQLite-backed vector index with brute-force cosine search.

use super::KnowledgeError;
use super::embedder::cosine_similarity;
use rusqlite::{Connection, OpenFlags, params};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// One entry to store.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub document: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

/// One query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub id: String,
    pub document: String,
    pub metadata: Value,
    /// Cosine similarity to the query, higher is closer.
    pub score: f32,
}

/// Named collections of embedded documents.
pub trait VectorIndex: Send + Sync {
    /// Inserts records, replacing any with the same id.
    fn add(&self, collection: &str, records: &[VectorRecord]) -> Result<(), KnowledgeError>;

    /// Returns up to `top_k` records closest to `embedding`, best first.
    fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, KnowledgeError>;

    /// Deletes the given ids and returns how many existed.
    fn delete(&self, collection: &str, ids: &[String]) -> Result<usize, KnowledgeError>;

    /// Removes every record of a collection.
    fn clear(&self, collection: &str) -> Result<(), KnowledgeError>;

    /// Number of records in a collection.
    fn count(&self, collection: &str) -> Result<usize, KnowledgeError>;
}

/// Vector index stored in a single SQLite table.
///
/// Writes go through one shared connection. Queries against a file-backed
/// index open their own read-only connection, so concurrent searches do not
/// wait on each other.
pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteVectorIndex {
    /// Opens (creating if needed) an index database at `path`.
    pub fn open(path: &Path) -> Result<Self, KnowledgeError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Opens an in-memory index for testing.
    pub fn open_in_memory() -> Result<Self, KnowledgeError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, KnowledgeError> {
        conn.execute(
            r"
            CREATE TABLE IF NOT EXISTS vectors (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                document TEXT NOT NULL,
                metadata_json TEXT NOT NULL,
                embedding_json TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )
            ",
            [],
        )?;
        info!(in_memory = path.is_none(), "Vector index ready");
        Ok(Self { conn: Mutex::new(conn), path })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, KnowledgeError> {
        self.conn.lock().map_err(|_| KnowledgeError::LockPoisoned)
    }

    fn read_connection(path: &Path) -> Result<Connection, KnowledgeError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    fn load_collection(
        conn: &Connection,
        collection: &str,
    ) -> Result<Vec<(String, String, String, String)>, KnowledgeError> {
        let mut stmt = conn.prepare(
            "SELECT id, document, metadata_json, embedding_json FROM vectors WHERE collection = ?1",
        )?;
        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl VectorIndex for SqliteVectorIndex {
    fn add(&self, collection: &str, records: &[VectorRecord]) -> Result<(), KnowledgeError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO vectors (collection, id, document, metadata_json, embedding_json) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                stmt.execute(params![
                    collection,
                    record.id,
                    record.document,
                    serde_json::to_string(&record.metadata)?,
                    serde_json::to_string(&record.embedding)?,
                ])?;
            }
        }
        tx.commit()?;
        debug!(collection = %collection, count = records.len(), "Upserted vectors");
        Ok(())
    }

    fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, KnowledgeError> {
        let rows = match &self.path {
            Some(path) => Self::load_collection(&Self::read_connection(path)?, collection)?,
            None => Self::load_collection(&*self.lock()?, collection)?,
        };

        let mut hits = Vec::with_capacity(rows.len());
        for (id, document, metadata_json, embedding_json) in rows {
            let stored: Vec<f32> = serde_json::from_str(&embedding_json)?;
            if stored.len() != embedding.len() {
                return Err(KnowledgeError::InvalidData(format!(
                    "collection '{}' holds {}-dimensional vectors, query has {}",
                    collection,
                    stored.len(),
                    embedding.len()
                )));
            }
            hits.push(ScoredDocument {
                score: cosine_similarity(embedding, &stored),
                id,
                document,
                metadata: serde_json::from_str(&metadata_json)?,
            });
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(top_k);
        Ok(hits)
    }

    fn delete(&self, collection: &str, ids: &[String]) -> Result<usize, KnowledgeError> {
        let conn = self.lock()?;
        let mut removed = 0;
        for id in ids {
            removed += conn.execute(
                "DELETE FROM vectors WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;
        }
        Ok(removed)
    }

    fn clear(&self, collection: &str) -> Result<(), KnowledgeError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM vectors WHERE collection = ?1", params![collection])?;
        Ok(())
    }

    fn count(&self, collection: &str) -> Result<usize, KnowledgeError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vectors WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
