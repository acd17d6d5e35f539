//! Markdown report files grouped by theme directory.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

const THEME_CHARS: usize = 20;

/// Theme of a topic: its first 20 characters, trimmed.
pub fn theme_for_topic(topic: &str) -> String {
    topic.chars().take(THEME_CHARS).collect::<String>().trim().to_string()
}

/// Replaces characters that cannot appear in a single path component.
///
/// Empty and dot-only names (`.`, `..`) would not name a child directory, so
/// their dots become underscores.
fn path_component(raw: &str) -> String {
    let cleaned: String =
        raw.chars().map(|c| if matches!(c, ':' | '/' | '\\' | '\0') { '-' } else { c }).collect();
    if cleaned.chars().all(|c| c == '.') {
        return format!("_{}", cleaned.replace('.', "_"));
    }
    cleaned
}

/// File store rooted at one directory.
#[derive(Debug, Clone)]
pub struct ReportFileStore {
    root: PathBuf,
}

impl ReportFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes a report to `<root>/<theme>/<model>_<timestamp>.md`.
    ///
    /// A numeric suffix is appended when a file for the same model and second
    /// already exists, so paths stay unique.
    pub fn write(
        &self,
        theme: &str,
        model_id: &str,
        content: &str,
        at: DateTime<Utc>,
    ) -> std::io::Result<PathBuf> {
        let dir = self.root.join(path_component(theme));
        if dir.parent() != Some(self.root.as_path()) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("theme {theme:?} does not name a directory under {}", self.root.display()),
            ));
        }
        std::fs::create_dir_all(&dir)?;

        let stem = format!("{}_{}", path_component(model_id), at.format("%Y-%m-%dT%H-%M-%S"));
        let mut path = dir.join(format!("{stem}.md"));
        let mut suffix = 1;
        while path.exists() {
            path = dir.join(format!("{stem}_{suffix}.md"));
            suffix += 1;
        }

        std::fs::write(&path, content)?;
        debug!(path = %path.display(), "Wrote report file");
        Ok(path)
    }

    /// Reads a report file.
    pub fn read(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn theme_is_first_twenty_chars_trimmed() {
        assert_eq!(theme_for_topic("Electric Vehicle Market in 2030"), "Electric Vehicle Mar");
        assert_eq!(theme_for_topic("  short  "), "short");
        assert_eq!(theme_for_topic("Global AI chip race "), "Global AI chip race");
        assert_eq!(theme_for_topic("中国新能源汽车市场发展趋势与竞争格局深度分析报告"), "中国新能源汽车市场发展趋势与竞争格局深度");
    }

    #[test]
    fn write_uses_theme_dir_and_sanitized_model() {
        let dir = TempDir::new().unwrap();
        let store = ReportFileStore::new(dir.path());
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();

        let path = store.write("EV", "Qwen/Qwen2.5:7b", "# Report", at).unwrap();
        assert_eq!(path, dir.path().join("EV").join("Qwen-Qwen2.5-7b_2025-03-04T05-06-07.md"));
        assert_eq!(store.read(&path).unwrap(), "# Report");
    }

    #[test]
    fn write_same_second_gets_suffix() {
        let dir = TempDir::new().unwrap();
        let store = ReportFileStore::new(dir.path());
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();

        let first = store.write("EV", "m", "one", at).unwrap();
        let second = store.write("EV", "m", "two", at).unwrap();
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("m_2025-03-04T05-06-07_1.md"));
    }

    #[test]
    fn dot_themes_stay_under_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("storage");
        let store = ReportFileStore::new(&root);
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();

        for topic in ["..", ".", "", "../../etc", "  ..  "] {
            let path = store.write(&theme_for_topic(topic), "mock-a", "x", at).unwrap();
            assert!(path.starts_with(&root), "{topic:?} escaped to {}", path.display());
            assert_eq!(path.parent().unwrap().parent().unwrap(), root);
        }
        assert!(root.join("__").is_dir());
        assert!(root.join("..-..-etc").is_dir());
        assert!(!dir.path().join("mock-a_2025-03-04T05-06-07.md").exists());
    }
}
