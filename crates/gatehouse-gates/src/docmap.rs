use anyhow::Result;
use gatehouse_core::{DocSync, GateError, GateId, Issue, Report, Severity};
use gatehouse_eval::{doc_link_sync, DocLinkParams};
use gatehouse_store::bullet_list;
use serde::{Deserialize, Serialize};

use crate::config::load_config;
use crate::context::GateContext;
use crate::Gate;

pub const CONFIG_FILE: &str = "docmap.config.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DocMapConfig {
    pub index: String,
    pub tree: String,
    pub fail_on_missing: bool,
    pub fail_on_orphans: bool,
}

impl Default for DocMapConfig {
    fn default() -> Self {
        let p = DocLinkParams::default();
        Self {
            index: p.index,
            tree: p.tree,
            fail_on_missing: true,
            fail_on_orphans: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocMapPayload {
    #[serde(flatten)]
    pub sync: DocSync,
    pub missing_count: usize,
    pub orphan_count: usize,
}

pub struct DocMapGate;

impl Gate for DocMapGate {
    fn id(&self) -> GateId {
        GateId::DocMap
    }

    fn check_config(&self, ctx: &GateContext) -> Result<(), GateError> {
        load_config::<DocMapConfig>(&ctx.config_path(CONFIG_FILE)).map(|_| ())
    }

    fn evaluate(&self, ctx: &GateContext) -> Result<Report> {
        let cfg: DocMapConfig = load_config(&ctx.config_path(CONFIG_FILE))?;
        let params = DocLinkParams {
            index: cfg.index.clone(),
            tree: cfg.tree.clone(),
            ..Default::default()
        };
        let sync = doc_link_sync(&ctx.root, &params)?;
        let index_present = ctx.root.join(&sync.index).is_file();
        let payload = DocMapPayload {
            missing_count: sync.missing.len(),
            orphan_count: sync.orphan.len(),
            sync,
        };

        let mut report = Report::with_payload(self.id().report_id(), &payload)?;
        if !index_present {
            report.push(Issue::soft("index_missing", "absent", cfg.index));
            return Ok(report);
        }
        if payload.missing_count > 0 {
            let issue = Issue::new(severity(cfg.fail_on_missing), "doc_missing", payload.missing_count, 0);
            report.push(issue);
        }
        if payload.orphan_count > 0 {
            let issue = Issue::new(severity(cfg.fail_on_orphans), "doc_orphan", payload.orphan_count, 0);
            report.push(issue);
        }
        Ok(report)
    }

    fn render_body(&self, report: &Report) -> String {
        let Ok(p) = report.payload_as::<DocMapPayload>() else {
            return String::new();
        };
        format!(
            "Index: `{}` ({} referenced, {} on disk)\n\n## Missing\n\n{}\n## Orphan\n\n{}",
            p.sync.index,
            p.sync.referenced.len(),
            p.sync.actual.len(),
            bullet_list(&p.sync.missing),
            bullet_list(&p.sync.orphan)
        )
    }
}

fn severity(fail: bool) -> Severity {
    if fail {
        Severity::Hard
    } else {
        Severity::Soft
    }
}
