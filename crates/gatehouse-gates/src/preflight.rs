use std::path::Path;

use anyhow::{Context, Result};
use gatehouse_core::{GateError, GateId, Issue, Report};
use gatehouse_eval::{check_root, scan_tree, LayoutPolicy, RootLayout, TreeFindings};
use gatehouse_store::bullet_list;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::load_config;
use crate::context::GateContext;
use crate::Gate;

pub const CONFIG_FILE: &str = "preflight.config.json";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreflightPayload {
    pub root: RootLayout,
    pub tree: TreeFindings,
}

/// Clean-release check: root allow-lists plus whole-tree deny rules. Any finding is hard.
pub struct PreflightGate;

impl Gate for PreflightGate {
    fn id(&self) -> GateId {
        GateId::Preflight
    }

    fn check_config(&self, ctx: &GateContext) -> Result<(), GateError> {
        load_config::<LayoutPolicy>(&ctx.config_path(CONFIG_FILE)).map(|_| ())
    }

    fn evaluate(&self, ctx: &GateContext) -> Result<Report> {
        let policy: LayoutPolicy = load_config(&ctx.config_path(CONFIG_FILE))?;
        check_layout(&ctx.root, &policy)
    }

    fn render_body(&self, report: &Report) -> String {
        let Ok(p) = report.payload_as::<PreflightPayload>() else {
            return String::new();
        };
        let oversized = p.tree.oversized.iter().map(|o| format!("{} ({} bytes)", o.path, o.bytes));
        format!(
            "Root: {} files, {} dirs\n\n## Illegal root files\n\n{}\n## Illegal root dirs\n\n{}\n## Forbidden\n\n{}\n## Oversized\n\n{}\n## Archives\n\n{}",
            p.root.total_files,
            p.root.total_dirs,
            bullet_list(&p.root.illegal_files),
            bullet_list(&p.root.illegal_dirs),
            bullet_list(&p.tree.forbidden),
            bullet_list(oversized),
            bullet_list(&p.tree.archives)
        )
    }
}

/// The four findings are independent; each non-empty one becomes its own hard issue.
pub fn check_layout(root: &Path, policy: &LayoutPolicy) -> Result<Report> {
    let layout = check_root(root, policy).with_context(|| format!("list root {}", root.display()))?;
    let tree = scan_tree(root, policy).with_context(|| format!("scan tree {}", root.display()))?;

    let payload = PreflightPayload { root: layout, tree };
    let mut report = Report::with_payload(GateId::Preflight.report_id(), &payload)?;
    if !payload.root.illegal_files.is_empty() {
        report.push(Issue::hard("root.illegal_files", json!(payload.root.illegal_files), json!([])));
    }
    if !payload.root.illegal_dirs.is_empty() {
        report.push(Issue::hard("root.illegal_dirs", json!(payload.root.illegal_dirs), json!([])));
    }
    if !payload.tree.forbidden.is_empty() {
        report.push(Issue::hard("tree.forbidden", json!(payload.tree.forbidden), json!([])));
    }
    if !payload.tree.oversized.is_empty() {
        let paths: Vec<_> = payload.tree.oversized.iter().map(|o| o.path.clone()).collect();
        report.push(Issue::hard("tree.oversized", json!(paths), policy.max_file_bytes));
    }
    if !payload.tree.archives.is_empty() {
        report.push(Issue::hard("tree.archives", json!(payload.tree.archives), json!(policy.dist_dirs)));
    }
    Ok(report)
}
