//! Saved-report archive.
//!
//! A saved report is three things: a markdown file under its theme
//! directory, a metadata row, and a topic embedding in
//! [`REPORTS_COLLECTION`] used by similarity search. The file and row are
//! required; the embedding is best-effort.

use crate::error::{PrismError, Result};
use crate::knowledge::{Embedder, REPORTS_COLLECTION, VectorIndex, VectorRecord};
use crate::storage::{
    Database, NewReport, ReportFileStore, ReportRecord, ReportRepository, SqliteReportRepository,
    StorageError, theme_for_topic,
};
use chrono::Utc;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Number of reports returned by [`ReportArchive::find_similar`].
pub const SIMILAR_REPORTS: usize = 3;

/// Archive of saved reports.
pub struct ReportArchive {
    db: Mutex<Database>,
    files: ReportFileStore,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl ReportArchive {
    pub fn new(
        db: Database,
        files: ReportFileStore,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self { db: Mutex::new(db), files, embedder, index }
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, Database>, StorageError> {
        self.db.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Saves a rendered report and returns its metadata row.
    ///
    /// If the row cannot be inserted the written file is removed again.
    /// Failing to index the topic is logged and does not fail the save.
    pub async fn save(&self, topic: &str, model_id: &str, content: &str) -> Result<ReportRecord> {
        let theme = theme_for_topic(topic);
        if theme.is_empty() {
            return Err(StorageError::InvalidData("report topic must not be empty".to_string()).into());
        }

        let saved_at = Utc::now();
        let path = self.files.write(&theme, model_id, content, saved_at)?;
        let new_report = NewReport {
            theme: theme.clone(),
            original_topic: topic.to_string(),
            model_id: model_id.to_string(),
            file_path: path.display().to_string(),
            saved_at,
        };

        let inserted = {
            let mut db = self.lock()?;
            SqliteReportRepository::new(&mut db).create(&new_report)
        };
        let record = match inserted {
            Ok(record) => record,
            Err(e) => {
                if let Err(remove_err) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %remove_err, "Failed to remove orphaned report file");
                }
                return Err(e.into());
            }
        };

        if let Err(e) = self.index_topic(&record).await {
            warn!(report_id = record.id, error = %e, "Failed to index report topic for similarity search");
        }

        info!(report_id = record.id, theme = %record.theme, model_id = %record.model_id, "Report archived");
        Ok(record)
    }

    async fn index_topic(&self, record: &ReportRecord) -> Result<()> {
        let embedding = self.embedder.embed_one(&record.original_topic).await?;
        self.index.add(
            REPORTS_COLLECTION,
            &[VectorRecord {
                id: record.id.to_string(),
                document: record.original_topic.clone(),
                metadata: json!({"theme": record.theme, "model_id": record.model_id}),
                embedding,
            }],
        )?;
        Ok(())
    }

    /// Distinct themes, alphabetically.
    pub fn themes(&self) -> Result<Vec<String>> {
        let mut db = self.lock()?;
        Ok(SqliteReportRepository::new(&mut db).themes()?)
    }

    /// Reports saved under `theme`, newest first.
    pub fn reports_by_theme(&self, theme: &str) -> Result<Vec<ReportRecord>> {
        let mut db = self.lock()?;
        Ok(SqliteReportRepository::new(&mut db).get_by_theme(theme)?)
    }

    /// Metadata of one report.
    pub fn get(&self, id: i64) -> Result<ReportRecord> {
        let mut db = self.lock()?;
        Ok(SqliteReportRepository::new(&mut db).get_by_id(id)?)
    }

    /// Markdown content of one report.
    ///
    /// # Errors
    /// `StorageError::NotFound` when the row or its file is missing.
    pub fn content(&self, id: i64) -> Result<String> {
        let record = self.get(id)?;
        let path = Path::new(&record.file_path);
        self.files.read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PrismError::Storage(StorageError::NotFound(format!("report file {}", path.display())))
            } else {
                PrismError::Io(e)
            }
        })
    }

    /// The saved reports whose topics are closest to `topic`, closest first.
    pub async fn find_similar(&self, topic: &str) -> Result<Vec<ReportRecord>> {
        if self.index.count(REPORTS_COLLECTION)? == 0 {
            debug!("Similarity collection is empty");
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_one(topic).await?;
        let hits = self.index.query(REPORTS_COLLECTION, &embedding, SIMILAR_REPORTS)?;
        let ids: Vec<i64> = hits
            .iter()
            .filter_map(|hit| match hit.id.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(id = %hit.id, "Ignoring non-numeric id in similarity collection");
                    None
                }
            })
            .collect();

        let mut db = self.lock()?;
        Ok(SqliteReportRepository::new(&mut db).get_by_ids(&ids)?)
    }
}
