//! Storage layer for Prism Core.
//!
//! Report metadata lives in SQLite behind the Repository pattern; report
//! bodies live as markdown files grouped by theme.

pub mod database;
pub mod error;
pub mod files;
pub mod repository;

pub use database::Database;
pub use error::{StorageError, StorageResult};
pub use files::{ReportFileStore, theme_for_topic};
pub use repository::{NewReport, ReportRecord, ReportRepository, SqliteReportRepository};
