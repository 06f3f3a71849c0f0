use std::path::PathBuf;

use anyhow::{anyhow, Result};
use gatehouse_core::{GateId, Report};

use crate::markdown::render_report;
use crate::store::{FsReportStore, ReportStore};

/// Accepted reports kept outside the normal report path. Gates only read from it; `promote` is the
/// one explicit operator action that writes.
#[derive(Clone, Debug)]
pub struct BaselineStore {
    inner: FsReportStore,
}

impl BaselineStore {
    pub fn new(root: PathBuf) -> Self {
        Self { inner: FsReportStore::new(root) }
    }

    pub fn root(&self) -> &PathBuf {
        &self.inner.root
    }

    pub fn load(&self, id: &str) -> Result<Option<Report>> {
        self.inner.load(id)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.inner.exists(id)
    }

    /// Copies the current report `id` from `current` into the baseline store, unchanged.
    pub fn promote(&self, current: &dyn ReportStore, id: &str) -> Result<PathBuf> {
        let report = current
            .load(id)?
            .ok_or_else(|| anyhow!("cannot promote `{}`: no current report", id))?;
        let title = GateId::from_report_id(&report.id).map(|g| g.title()).unwrap_or("Baseline");
        let md = render_report(&format!("{} (baseline)", title), &report, "");
        let path = self.inner.write(&report, &md)?;
        tracing::info!(report = %report.id, path = %path.display(), "promoted report to baseline");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn promote_copies_current_report() {
        let dir = tempdir().unwrap();
        let current = FsReportStore::new(dir.path().join("reports"));
        let baseline = BaselineStore::new(dir.path().join("baseline"));
        assert!(baseline.promote(&current, "REALITY_TEST").is_err());

        let r = Report::new("REALITY_TEST", json!({"snapshot": {"tests_count": 7}}));
        current.write(&r, "").unwrap();
        baseline.promote(&current, "REALITY_TEST").unwrap();
        let b = baseline.load("REALITY_TEST").unwrap().unwrap();
        assert_eq!(b, r);
        assert!(dir.path().join("baseline/REALITY_TEST.md").exists());
    }
}
