use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use gatehouse_core::Report;

use crate::migrate::migrate_report;

/// Named JSON + Markdown report pairs at stable paths. JSON is authoritative; Markdown is derived and never read back.
pub trait ReportStore: Send + Sync {
    fn json_path(&self, id: &str) -> PathBuf;
    fn markdown_path(&self, id: &str) -> PathBuf;

    /// Replaces both artifacts for `report.id`. Last write wins.
    fn write(&self, report: &Report, markdown: &str) -> Result<PathBuf>;

    /// Loads and migrates a report. `Ok(None)` when it has never been written.
    fn load(&self, id: &str) -> Result<Option<Report>>;

    fn exists(&self, id: &str) -> bool {
        self.json_path(id).is_file()
    }

    /// Time since the report was generated, per its own `generated_at`.
    fn age(&self, id: &str) -> Result<Option<Duration>> {
        Ok(self.load(id)?.map(|r| Utc::now().signed_duration_since(r.generated_at)))
    }

    fn is_stale(&self, id: &str, max_age: Duration) -> Result<bool> {
        Ok(match self.age(id)? {
            Some(age) => age > max_age,
            None => true,
        })
    }
}

#[derive(Clone, Debug)]
pub struct FsReportStore {
    pub root: PathBuf,
}

impl FsReportStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn stem(id: &str) -> &str {
        id.strip_suffix(".json").or_else(|| id.strip_suffix(".md")).unwrap_or(id)
    }
}

/// Writes through a sibling temp file and renames, so readers never observe a half-written artifact.
pub(crate) fn write_replace(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("report");
    let tmp = parent.join(format!(".{name}.tmp"));
    std::fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

impl ReportStore for FsReportStore {
    fn json_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.json", Self::stem(id)))
    }

    fn markdown_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.md", Self::stem(id)))
    }

    fn write(&self, report: &Report, markdown: &str) -> Result<PathBuf> {
        let path = self.json_path(&report.id);
        let bytes = serde_json::to_vec_pretty(report)?;
        write_replace(&path, &bytes)?;
        write_replace(&self.markdown_path(&report.id), markdown.as_bytes())?;
        tracing::debug!(report = %report.id, path = %path.display(), "report written");
        Ok(path)
    }

    fn load(&self, id: &str) -> Result<Option<Report>> {
        let path = self.json_path(id);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).with_context(|| format!("read report {}", path.display()))?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).with_context(|| format!("parse report {}", path.display()))?;
        let report = migrate_report(Self::stem(id), value).with_context(|| format!("migrate report {}", path.display()))?;
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::Issue;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn writes_both_artifacts_and_replaces() {
        let dir = tempdir().unwrap();
        let store = FsReportStore::new(dir.path().join("reports"));
        let mut r = Report::new("DRIFT_GUARD", json!({"run": 1}));
        r.push(Issue::hard("tests_min", 2, 5));
        store.write(&r, "# first").unwrap();
        assert!(store.exists("DRIFT_GUARD"));
        assert!(store.exists("DRIFT_GUARD.json"));
        assert!(dir.path().join("reports/DRIFT_GUARD.md").exists());

        let r2 = Report::new("DRIFT_GUARD", json!({"run": 2}));
        store.write(&r2, "# second").unwrap();
        let loaded = store.load("DRIFT_GUARD").unwrap().unwrap();
        assert_eq!(loaded.payload, json!({"run": 2}));
        assert!(loaded.issues_hard.is_empty());
        let md = std::fs::read_to_string(store.markdown_path("DRIFT_GUARD")).unwrap();
        assert_eq!(md, "# second");
    }

    #[test]
    fn missing_report_is_none_and_stale() {
        let dir = tempdir().unwrap();
        let store = FsReportStore::new(dir.path().to_path_buf());
        assert!(store.load("NOPE").unwrap().is_none());
        assert!(store.is_stale("NOPE", Duration::hours(1)).unwrap());
    }

    #[test]
    fn fresh_report_is_not_stale() {
        let dir = tempdir().unwrap();
        let store = FsReportStore::new(dir.path().to_path_buf());
        store.write(&Report::new("R", json!({})), "").unwrap();
        assert!(!store.is_stale("R", Duration::hours(1)).unwrap());
    }

    #[test]
    fn corrupt_json_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("BAD.json"), b"{not json").unwrap();
        let store = FsReportStore::new(dir.path().to_path_buf());
        assert!(store.load("BAD").is_err());
    }
}
