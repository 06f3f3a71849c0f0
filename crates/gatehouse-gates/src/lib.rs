pub mod budget;
pub mod claims;
pub mod config;
pub mod context;
pub mod docmap;
pub mod drift;
pub mod preflight;
pub mod runtime;
pub mod slo;
pub mod snapshot;
pub mod upstream;

pub use config::*;
pub use context::*;
pub use upstream::*;

use anyhow::Result;
use gatehouse_core::{GateError, GateId, Issue, Report};
use gatehouse_store::render_report;
use serde_json::json;

/// A single check over repository state that produces exactly one report.
///
/// Gates never write reports themselves and never read the process environment; `run_gate` persists
/// the result and the context carries everything else.
pub trait Gate: Send + Sync {
    fn id(&self) -> GateId;

    /// Parses the gate's config without evaluating anything. Absent config is fine.
    fn check_config(&self, ctx: &GateContext) -> Result<(), GateError>;

    fn evaluate(&self, ctx: &GateContext) -> Result<Report>;

    /// Gate-specific Markdown placed between the report header and the issue tables.
    fn render_body(&self, _report: &Report) -> String {
        String::new()
    }
}

/// Gates runnable by the pipeline, in no particular order.
pub fn gate_for(id: GateId) -> Option<Box<dyn Gate>> {
    let gate: Box<dyn Gate> = match id {
        GateId::Snapshot => Box::new(snapshot::SnapshotGate),
        GateId::DocMap => Box::new(docmap::DocMapGate),
        GateId::Preflight => Box::new(preflight::PreflightGate),
        GateId::Claims => Box::new(claims::ClaimsGate),
        GateId::Drift => Box::new(drift::DriftGate),
        GateId::Runtime => Box::new(runtime::RuntimeGate),
        GateId::Budget => Box::new(budget::BudgetGate),
        GateId::Release | GateId::Summary => return None,
    };
    Some(gate)
}

/// Evaluates `gate` and persists its report (JSON + Markdown) through the context store.
pub fn run_gate(gate: &dyn Gate, ctx: &GateContext) -> Result<Report> {
    let id = gate.id();
    tracing::info!(gate = %id, run = %ctx.run_id, "gate start");
    let report = gate.evaluate(ctx)?;
    let md = render_report(id.title(), &report, &gate.render_body(&report));
    ctx.store.write(&report, &md)?;
    tracing::info!(
        gate = %id,
        verdict = %report.verdict(),
        hard = report.issues_hard.len(),
        soft = report.issues_soft.len(),
        "gate done"
    );
    Ok(report)
}

/// Report standing in for a gate that aborted, so a broken gate still leaves an artifact behind.
pub fn error_report(id: GateId, err: &anyhow::Error) -> Report {
    let chain = format!("{:#}", err);
    let mut report = Report::new(id.report_id(), json!({ "error": chain }));
    report.push(Issue::hard(GATE_ERROR_KEY, chain, "gate completes"));
    report
}

/// Builds and persists the error report for `id`.
pub fn write_error_report(ctx: &GateContext, id: GateId, err: &anyhow::Error) -> Result<Report> {
    let chain = format!("{:#}", err);
    tracing::warn!(gate = %id, error = %chain, "gate aborted");
    let report = error_report(id, err);
    let body = format!("Gate aborted:\n\n```\n{}\n```\n", chain);
    let md = render_report(id.title(), &report, &body);
    ctx.store.write(&report, &md)?;
    Ok(report)
}
