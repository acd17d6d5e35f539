//! Report metadata repository.

use crate::storage::database::Database;
use crate::storage::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::{Row, params};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Metadata of a saved report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: i64,
    pub theme: String,
    pub original_topic: String,
    pub model_id: String,
    pub file_path: String,
    pub saved_at: DateTime<Utc>,
}

/// Metadata for a report about to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport {
    pub theme: String,
    pub original_topic: String,
    pub model_id: String,
    pub file_path: String,
    pub saved_at: DateTime<Utc>,
}

/// Repository trait for report metadata.
pub trait ReportRepository {
    /// Inserts a row and returns it with its assigned id.
    fn create(&mut self, report: &NewReport) -> StorageResult<ReportRecord>;

    /// Retrieves a report by id.
    fn get_by_id(&self, id: i64) -> StorageResult<ReportRecord>;

    /// Retrieves the given ids in the given order, skipping missing ones.
    fn get_by_ids(&self, ids: &[i64]) -> StorageResult<Vec<ReportRecord>>;

    /// Distinct themes, alphabetically.
    fn themes(&self) -> StorageResult<Vec<String>>;

    /// Reports of one theme, newest first.
    fn get_by_theme(&self, theme: &str) -> StorageResult<Vec<ReportRecord>>;
}

const SELECT_COLUMNS: &str = "SELECT id, theme, original_topic, model_id, file_path, saved_at FROM reports";

fn parse_timestamp(row: &Row, idx: usize, column_name: &str) -> rusqlite::Result<DateTime<Utc>> {
    let timestamp_str: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&timestamp_str).map(|dt| dt.with_timezone(&Utc)).map_err(|_| {
        rusqlite::Error::InvalidColumnType(
            idx,
            column_name.to_string(),
            rusqlite::types::Type::Text,
        )
    })
}

fn map_row(row: &Row) -> rusqlite::Result<ReportRecord> {
    Ok(ReportRecord {
        id: row.get(0)?,
        theme: row.get(1)?,
        original_topic: row.get(2)?,
        model_id: row.get(3)?,
        file_path: row.get(4)?,
        saved_at: parse_timestamp(row, 5, "saved_at")?,
    })
}

/// SQLite implementation of `ReportRepository`.
pub struct SqliteReportRepository<'a> {
    db: &'a mut Database,
}

impl<'a> SqliteReportRepository<'a> {
    /// Creates a new SQLite report repository.
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }
}

impl ReportRepository for SqliteReportRepository<'_> {
    fn create(&mut self, report: &NewReport) -> StorageResult<ReportRecord> {
        if report.theme.trim().is_empty() {
            return Err(StorageError::InvalidData("report theme must not be empty".to_string()));
        }
        self.db.conn_mut().execute(
            "INSERT INTO reports (theme, original_topic, model_id, file_path, saved_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                report.theme,
                report.original_topic,
                report.model_id,
                report.file_path,
                report.saved_at.to_rfc3339()
            ],
        )?;
        let id = self.db.conn().last_insert_rowid();
        info!(report_id = id, theme = %report.theme, model_id = %report.model_id, "Saved report metadata");

        Ok(ReportRecord {
            id,
            theme: report.theme.clone(),
            original_topic: report.original_topic.clone(),
            model_id: report.model_id.clone(),
            file_path: report.file_path.clone(),
            saved_at: report.saved_at,
        })
    }

    fn get_by_id(&self, id: i64) -> StorageResult<ReportRecord> {
        let mut stmt = self.db.conn().prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], map_row)?;
        match rows.next() {
            Some(Ok(record)) => Ok(record),
            Some(Err(e)) => Err(e.into()),
            None => Err(StorageError::NotFound(format!("report {id}"))),
        }
    }

    fn get_by_ids(&self, ids: &[i64]) -> StorageResult<Vec<ReportRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_by_id(*id) {
                Ok(record) => records.push(record),
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    fn themes(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.db.conn().prepare("SELECT DISTINCT theme FROM reports ORDER BY theme")?;
        let themes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(themes)
    }

    fn get_by_theme(&self, theme: &str) -> StorageResult<Vec<ReportRecord>> {
        let mut stmt = self
            .db
            .conn()
            .prepare(&format!("{SELECT_COLUMNS} WHERE theme = ?1 ORDER BY saved_at DESC, id DESC"))?;
        let records = stmt
            .query_map(params![theme], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
