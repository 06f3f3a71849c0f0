use std::collections::BTreeSet;

use anyhow::Result;
use gatehouse_core::{DocSync, GateError, GateId, Issue, Report, Severity, Snapshot, SnapshotPayload};
use gatehouse_store::{bullet_list, table};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::load_config;
use crate::context::GateContext;
use crate::upstream::{read_upstream, Upstream};
use crate::Gate;

pub const CONFIG_FILE: &str = "drift_guard.config.json";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftMode {
    /// fixed floors, regardless of any baseline
    #[default]
    Absolute,
    /// current minus baseline against allowances
    Delta,
}

/// One threshold table. `hard_fail` and `soft_fail` share this shape; unset entries are not checked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftThresholds {
    pub endpoints_min: Option<u64>,
    pub tests_min: Option<u64>,
    pub endpoints_delta_min: Option<i64>,
    pub tests_delta_min: Option<i64>,
    pub size_delta_mb_max: Option<i64>,
    /// max allowed count
    pub doc_missing: Option<usize>,
    /// max allowed count, index file excluded
    pub doc_orphan: Option<usize>,
    pub unknown_langs: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    pub mode: DriftMode,
    pub known_langs: BTreeSet<String>,
    pub baseline_report: String,
    pub hard_fail: DriftThresholds,
    pub soft_fail: DriftThresholds,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            mode: DriftMode::Absolute,
            known_langs: ["py", "ts", "js", "dart"].iter().map(|s| s.to_string()).collect(),
            baseline_report: GateId::Snapshot.report_id().to_string(),
            hard_fail: DriftThresholds {
                endpoints_delta_min: Some(0),
                tests_delta_min: Some(0),
                doc_missing: Some(0),
                doc_orphan: Some(0),
                unknown_langs: true,
                ..Default::default()
            },
            soft_fail: DriftThresholds::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deltas {
    pub endpoints: i64,
    pub tests: i64,
    pub size_mb: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftPayload {
    pub mode: DriftMode,
    pub current: Snapshot,
    pub baseline: Option<Snapshot>,
    pub deltas: Option<Deltas>,
    pub doc_missing: Option<usize>,
    pub doc_orphan: Option<usize>,
    pub unknown_langs: Vec<String>,
}

/// Compares `current` against fixed floors (absolute) or against `baseline` (delta).
///
/// Each threshold table is applied in turn and its issues appended unmerged, so a limit present in both
/// tables yields both a hard and a soft issue. Delta mode without a baseline falls back to absolute.
pub fn compare(current: &Snapshot, baseline: Option<&Snapshot>, docs: Option<&DocSync>, cfg: &DriftConfig) -> Report {
    let mode = match (cfg.mode, baseline) {
        (DriftMode::Delta, None) => DriftMode::Absolute,
        (m, _) => m,
    };
    let deltas = match (mode, baseline) {
        (DriftMode::Delta, Some(b)) => Some(Deltas {
            endpoints: current.endpoints_count as i64 - b.endpoints_count as i64,
            tests: current.tests_count as i64 - b.tests_count as i64,
            size_mb: current.repo_size_mb as i64 - b.repo_size_mb as i64,
        }),
        _ => None,
    };
    let allowed_langs: BTreeSet<String> = match (mode, baseline) {
        (DriftMode::Delta, Some(b)) => b.langs_files.keys().cloned().collect(),
        _ => cfg.known_langs.clone(),
    };
    let unknown_langs: Vec<String> = current
        .langs_files
        .keys()
        .filter(|k| !allowed_langs.contains(*k))
        .cloned()
        .collect();
    let doc_missing = docs.map(|d| d.missing.len());
    let doc_orphan = docs.map(|d| d.orphan.iter().filter(|p| **p != d.index).count());

    let payload = DriftPayload {
        mode,
        current: current.clone(),
        baseline: baseline.cloned(),
        deltas,
        doc_missing,
        doc_orphan,
        unknown_langs,
    };

    let mut issues = vec![];
    if cfg.mode == DriftMode::Delta && baseline.is_none() {
        issues.push(Issue::soft("baseline_missing", "absent", cfg.baseline_report.clone()));
    }
    issues.extend(check_table(&cfg.hard_fail, Severity::Hard, &payload, &allowed_langs));
    issues.extend(check_table(&cfg.soft_fail, Severity::Soft, &payload, &allowed_langs));

    let payload = serde_json::to_value(&payload).unwrap_or_else(|_| json!({}));
    let mut report = Report::new(GateId::Drift.report_id(), payload);
    report.extend(issues);
    report
}

fn check_table(t: &DriftThresholds, sev: Severity, p: &DriftPayload, allowed_langs: &BTreeSet<String>) -> Vec<Issue> {
    let mut out = vec![];
    match &p.deltas {
        None => {
            if let Some(min) = t.endpoints_min {
                if p.current.endpoints_count < min {
                    out.push(Issue::new(sev, "endpoints_min", p.current.endpoints_count, min));
                }
            }
            if let Some(min) = t.tests_min {
                if p.current.tests_count < min {
                    out.push(Issue::new(sev, "tests_min", p.current.tests_count, min));
                }
            }
        }
        Some(d) => {
            if let Some(min) = t.endpoints_delta_min {
                if d.endpoints < min {
                    out.push(Issue::new(sev, "endpoints_delta", d.endpoints, min));
                }
            }
            if let Some(min) = t.tests_delta_min {
                if d.tests < min {
                    out.push(Issue::new(sev, "tests_delta", d.tests, min));
                }
            }
            if let Some(max) = t.size_delta_mb_max {
                if d.size_mb > max {
                    out.push(Issue::new(sev, "size_delta_mb", d.size_mb, max));
                }
            }
        }
    }
    if let (Some(max), Some(n)) = (t.doc_missing, p.doc_missing) {
        if n > max {
            out.push(Issue::new(sev, "doc_missing", n, max));
        }
    }
    if let (Some(max), Some(n)) = (t.doc_orphan, p.doc_orphan) {
        if n > max {
            out.push(Issue::new(sev, "doc_orphan", n, max));
        }
    }
    if t.unknown_langs && !p.unknown_langs.is_empty() {
        let allowed: Vec<&String> = allowed_langs.iter().collect();
        out.push(Issue::new(sev, "unknown_langs", json!(p.unknown_langs), json!(allowed)));
    }
    out
}

pub struct DriftGate;

/// Nothing to compare when the current snapshot is unusable; the drift verdict fails on that alone.
fn snapshot_error(cfg: &DriftConfig, reason: String) -> Report {
    let current_id = GateId::Snapshot.report_id();
    let payload = json!({ "mode": cfg.mode, "snapshot_error": reason.clone() });
    let mut report = Report::new(GateId::Drift.report_id(), payload);
    report.push(Issue::hard("snapshot_error", reason, format!("readable {}", current_id)));
    report
}

impl DriftGate {
    fn config(ctx: &GateContext) -> Result<DriftConfig, GateError> {
        load_config(&ctx.config_path(CONFIG_FILE))
    }
}

impl Gate for DriftGate {
    fn id(&self) -> GateId {
        GateId::Drift
    }

    fn check_config(&self, ctx: &GateContext) -> Result<(), GateError> {
        Self::config(ctx).map(|_| ())
    }

    fn evaluate(&self, ctx: &GateContext) -> Result<Report> {
        let cfg = Self::config(ctx)?;
        let current_id = GateId::Snapshot.report_id();
        let current = match read_upstream::<SnapshotPayload>(ctx.store.as_ref(), current_id) {
            Upstream::Ready(p) => p.snapshot,
            Upstream::Absent => return Err(GateError::MissingReport(current_id.to_string()).into()),
            Upstream::Unreadable(reason) => return Ok(snapshot_error(&cfg, reason)),
        };
        let baseline = match cfg.mode {
            DriftMode::Delta => match ctx.baseline.load(&cfg.baseline_report)? {
                Some(r) => Some(r.payload_as::<SnapshotPayload>()?.snapshot),
                None => None,
            },
            DriftMode::Absolute => None,
        };
        let docmap_id = GateId::DocMap.report_id();
        let docs = read_upstream::<DocSync>(ctx.store.as_ref(), docmap_id);

        let mut report = compare(&current, baseline.as_ref(), docs.clone().ready().as_ref(), &cfg);
        match docs {
            Upstream::Ready(_) => {}
            Upstream::Absent => report.push(Issue::soft("docmap_missing", "absent", docmap_id)),
            Upstream::Unreadable(reason) => {
                report.push(Issue::soft("docmap_unreadable", reason, format!("readable {}", docmap_id)))
            }
        }
        Ok(report)
    }

    fn render_body(&self, report: &Report) -> String {
        let Ok(p) = report.payload_as::<DriftPayload>() else {
            return String::new();
        };
        let opt = |v: Option<usize>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
        let mut rows = vec![
            vec!["endpoints".to_string(), p.current.endpoints_count.to_string()],
            vec!["tests".to_string(), p.current.tests_count.to_string()],
            vec!["repo size (MiB)".to_string(), p.current.repo_size_mb.to_string()],
            vec!["doc missing".to_string(), opt(p.doc_missing)],
            vec!["doc orphan".to_string(), opt(p.doc_orphan)],
        ];
        if let Some(d) = &p.deltas {
            rows.push(vec!["Δ endpoints".to_string(), format!("{:+}", d.endpoints)]);
            rows.push(vec!["Δ tests".to_string(), format!("{:+}", d.tests)]);
            rows.push(vec!["Δ size (MiB)".to_string(), format!("{:+}", d.size_mb)]);
        }
        format!(
            "Mode: `{:?}`\n\n{}\n## Unknown languages\n\n{}",
            p.mode,
            table(&["dimension", "value"], &rows),
            bullet_list(&p.unknown_langs)
        )
    }
}
