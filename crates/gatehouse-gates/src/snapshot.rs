use anyhow::{Context, Result};
use gatehouse_core::{GateError, GateId, Issue, Report, SnapshotPayload};
use gatehouse_eval::{scan_snapshot, SnapshotConfig};
use gatehouse_store::table;

use crate::config::load_config;
use crate::context::GateContext;
use crate::Gate;

pub const CONFIG_FILE: &str = "snapshot.config.json";

/// Reality scan: produces the repository snapshot every later stage compares against.
pub struct SnapshotGate;

impl Gate for SnapshotGate {
    fn id(&self) -> GateId {
        GateId::Snapshot
    }

    fn check_config(&self, ctx: &GateContext) -> Result<(), GateError> {
        load_config::<SnapshotConfig>(&ctx.config_path(CONFIG_FILE)).map(|_| ())
    }

    fn evaluate(&self, ctx: &GateContext) -> Result<Report> {
        let cfg: SnapshotConfig = load_config(&ctx.config_path(CONFIG_FILE))?;
        let (snapshot, gaps) = scan_snapshot(&ctx.evaluator(), &cfg).context("scan repository")?;
        tracing::debug!(
            endpoints = snapshot.endpoints_count,
            tests = snapshot.tests_count,
            langs = snapshot.langs_files.len(),
            "snapshot scanned"
        );
        let mut report = Report::with_payload(self.id().report_id(), &SnapshotPayload { snapshot })?;
        for gap in gaps {
            report.push(Issue::soft(gap.key, 0, gap.expected));
        }
        Ok(report)
    }

    fn render_body(&self, report: &Report) -> String {
        let Ok(SnapshotPayload { snapshot: s }) = report.payload_as::<SnapshotPayload>() else {
            return String::new();
        };
        let langs = s
            .langs_files
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        let ci = s.ci_gates.iter().cloned().collect::<Vec<_>>().join(", ");
        let rows = vec![
            vec!["languages".to_string(), langs],
            vec!["endpoints".to_string(), s.endpoints_count.to_string()],
            vec!["tests".to_string(), s.tests_count.to_string()],
            vec!["frontend".to_string(), s.frontend.to_string()],
            vec!["backend".to_string(), s.backend.to_string()],
            vec!["db".to_string(), s.db.to_string()],
            vec!["ci gates".to_string(), ci],
            vec!["repo size (MiB)".to_string(), s.repo_size_mb.to_string()],
        ];
        format!("## Snapshot\n\n{}", table(&["fact", "value"], &rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_gate;
    use crate::upstream::read_upstream;
    use tempfile::tempdir;

    #[test]
    fn writes_reality_test_and_reads_it_back() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/backend")).unwrap();
        std::fs::write(dir.path().join("src/backend/main.py"), "@app.get('/health')\n").unwrap();
        let ctx = GateContext::for_root(dir.path());

        let report = run_gate(&SnapshotGate, &ctx).unwrap();
        assert!(report.passed());
        let snap = read_upstream::<SnapshotPayload>(ctx.store.as_ref(), "REALITY_TEST")
            .ready()
            .unwrap()
            .snapshot;
        assert_eq!(snap.endpoints_count, 1);
        assert!(snap.backend);
        assert!(ctx.store.markdown_path("REALITY_TEST").exists());
        assert!(report.issues_soft.iter().any(|i| i.key == "no_tests_found"));
    }
}
